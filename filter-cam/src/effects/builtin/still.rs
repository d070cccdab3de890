//! Still-image sources
//!
//! The image is opened on the first `apply`, fitted to that first frame's
//! size, and returned on every later tick. A load failure is reported once;
//! the effect then yields nothing until it is rebuilt.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::effects::traits::{Effect, EffectDefinition, Priority, TickContext};
use crate::effects::{Bound, EffectArgs, EffectError, EffectRegistry, ParameterDescriptor};
use crate::frame::{self, Frame};

/// Lazily opened resource state
pub(crate) enum Backing<T> {
    Pending,
    Ready(T),
    Failed,
}

/// Fit a source frame to the target size with the configured policy
pub(crate) fn fit(source: &Frame, width: u32, height: u32, stretch: bool) -> Frame {
    if stretch {
        frame::fit_stretch(source, width, height)
    } else {
        frame::fit_cover(source, width, height)
    }
}

fn load_image(path: &Path) -> Result<Frame, EffectError> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|e| EffectError::ResourceUnavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// A still image replacing the camera frame
pub struct Image {
    effect_type: &'static str,
    image_path: PathBuf,
    resize: bool,
    image: Backing<Frame>,
}

impl Image {
    pub fn new(image_path: impl Into<PathBuf>, resize: bool) -> Self {
        Self {
            effect_type: "Image",
            image_path: image_path.into(),
            resize,
            image: Backing::Pending,
        }
    }
}

impl Effect for Image {
    fn effect_type(&self) -> &'static str {
        self.effect_type
    }

    fn priority(&self) -> Priority {
        Priority::Fast
    }

    fn apply(&mut self, frame: &Frame, _ctx: &mut TickContext<'_>) -> Result<Option<Frame>, EffectError> {
        match &self.image {
            Backing::Ready(image) => Ok(Some(image.clone())),
            Backing::Failed => Ok(None),
            Backing::Pending => match load_image(&self.image_path) {
                Ok(source) => {
                    let (width, height) = frame.dimensions();
                    let fitted = fit(&source, width, height, self.resize);
                    log::debug!(
                        "{}: loaded {} fitted to {}x{}",
                        self.effect_type,
                        self.image_path.display(),
                        width,
                        height
                    );
                    self.image = Backing::Ready(fitted.clone());
                    Ok(Some(fitted))
                }
                Err(err) => {
                    log::warn!("{}: {}", self.effect_type, err);
                    self.image = Backing::Failed;
                    Err(err)
                }
            },
        }
    }
}

pub struct ImageDefinition;

impl EffectDefinition for ImageDefinition {
    fn effect_type(&self) -> &'static str {
        "Image"
    }

    fn display_name(&self) -> &'static str {
        "Image"
    }

    fn category(&self) -> &'static str {
        "Source"
    }

    fn create(&self, args: &EffectArgs, _registry: &EffectRegistry) -> Result<Box<dyn Effect>, EffectError> {
        let path = args.string("Image", 0, "image_path")?;
        let resize = args.bool_or("Image", 1, "resize", false)?;
        Ok(Box::new(Image::new(path, resize)))
    }
}

/// One image picked from a list by index
pub struct ImageList {
    image: Image,
    index: usize,
    count: usize,
}

impl Effect for ImageList {
    fn effect_type(&self) -> &'static str {
        "ImageList"
    }

    fn priority(&self) -> Priority {
        Priority::Fast
    }

    fn apply(&mut self, frame: &Frame, ctx: &mut TickContext<'_>) -> Result<Option<Frame>, EffectError> {
        self.image.apply(frame, ctx)
    }

    fn parameter(&self, name: &str) -> Option<f64> {
        match name {
            "index" => Some(self.index as f64),
            "count" => Some(self.count as f64),
            _ => None,
        }
    }
}

fn last_index(effect: &dyn Effect) -> f64 {
    effect.parameter("count").map_or(0.0, |count| (count - 1.0).max(0.0))
}

pub struct ImageListDefinition;

impl ImageListDefinition {
    fn entry(value: &Value) -> Result<(String, bool), EffectError> {
        let invalid = |reason: &str| EffectError::invalid("ImageList", "images", reason);
        match value {
            Value::String(path) => Ok((path.clone(), false)),
            Value::Array(parts) => {
                let path = parts
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid("entry must start with a path"))?;
                let resize = match parts.get(1) {
                    None | Some(Value::Null) => false,
                    Some(Value::Bool(b)) => *b,
                    Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
                    Some(_) => return Err(invalid("resize flag must be a boolean")),
                };
                Ok((path.to_string(), resize))
            }
            _ => Err(invalid("entry must be [path, resize?]")),
        }
    }
}

impl EffectDefinition for ImageListDefinition {
    fn effect_type(&self) -> &'static str {
        "ImageList"
    }

    fn display_name(&self) -> &'static str {
        "Image List"
    }

    fn category(&self) -> &'static str {
        "Source"
    }

    fn parameters(&self) -> Vec<ParameterDescriptor> {
        vec![ParameterDescriptor::new("Image", "index", 0.0, 0.0).with_max(Bound::Derived(last_index))]
    }

    fn create(&self, args: &EffectArgs, _registry: &EffectRegistry) -> Result<Box<dyn Effect>, EffectError> {
        let images: Vec<Value> = args.parse("ImageList", 0, "images")?;
        let index = args.u32_or("ImageList", 1, "index", 0)? as usize;

        let selected = images.get(index).ok_or_else(|| {
            EffectError::invalid("ImageList", "index", format!("{index} is out of range for {} images", images.len()))
        })?;
        let (path, resize) = Self::entry(selected)?;

        let mut image = Image::new(path, resize);
        image.effect_type = "ImageList";
        Ok(Box::new(ImageList {
            image,
            index,
            count: images.len(),
        }))
    }
}
