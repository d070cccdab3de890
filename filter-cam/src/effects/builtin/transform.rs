//! Stateless per-pixel transforms
//!
//! Every effect here is a pure function of the input frame (Noise also draws
//! from the tick rng). None of them hold state between ticks.

use image::imageops::{self, FilterType};
use image::DynamicImage;
use rand::Rng;

use crate::effects::traits::{Effect, EffectDefinition, TickContext};
use crate::effects::{EffectArgs, EffectError, EffectRegistry, ParameterDescriptor};
use crate::frame::Frame;

/// An argument-free transform backed by a plain function
pub struct SimpleTransform {
    effect_type: &'static str,
    op: fn(&Frame) -> Frame,
}

impl Effect for SimpleTransform {
    fn effect_type(&self) -> &'static str {
        self.effect_type
    }

    fn apply(&mut self, frame: &Frame, _ctx: &mut TickContext<'_>) -> Result<Option<Frame>, EffectError> {
        Ok(Some((self.op)(frame)))
    }
}

/// Definition for an argument-free transform
pub struct SimpleTransformDefinition {
    effect_type: &'static str,
    display_name: &'static str,
    op: fn(&Frame) -> Frame,
}

impl SimpleTransformDefinition {
    pub fn mirror_x() -> Self {
        Self {
            effect_type: "MirrorX",
            display_name: "Mirror X",
            op: imageops::flip_horizontal,
        }
    }

    pub fn mirror_y() -> Self {
        Self {
            effect_type: "MirrorY",
            display_name: "Mirror Y",
            op: imageops::flip_vertical,
        }
    }

    pub fn negative() -> Self {
        Self {
            effect_type: "Negative",
            display_name: "Negative",
            op: negative,
        }
    }

    pub fn grayscale() -> Self {
        Self {
            effect_type: "Grayscale",
            display_name: "Grayscale",
            op: grayscale,
        }
    }
}

impl EffectDefinition for SimpleTransformDefinition {
    fn effect_type(&self) -> &'static str {
        self.effect_type
    }

    fn display_name(&self) -> &'static str {
        self.display_name
    }

    fn category(&self) -> &'static str {
        "Transform"
    }

    fn create(&self, _args: &EffectArgs, _registry: &EffectRegistry) -> Result<Box<dyn Effect>, EffectError> {
        Ok(Box::new(SimpleTransform {
            effect_type: self.effect_type,
            op: self.op,
        }))
    }
}

fn negative(frame: &Frame) -> Frame {
    let mut out = frame.clone();
    imageops::invert(&mut out);
    out
}

fn grayscale(frame: &Frame) -> Frame {
    DynamicImage::ImageLuma8(imageops::grayscale(frame)).to_rgb8()
}

/// Resampling used by [`Pixelized`] for the down and up pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Nearest,
    Linear,
    Cubic,
    /// Area averaging on the way down, blocky on the way up
    Area,
    Lanczos,
}

impl Interpolation {
    fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Interpolation::Nearest),
            1 => Some(Interpolation::Linear),
            2 => Some(Interpolation::Cubic),
            3 => Some(Interpolation::Area),
            4 => Some(Interpolation::Lanczos),
            _ => None,
        }
    }

    fn index(self) -> u32 {
        match self {
            Interpolation::Nearest => 0,
            Interpolation::Linear => 1,
            Interpolation::Cubic => 2,
            Interpolation::Area => 3,
            Interpolation::Lanczos => 4,
        }
    }

    fn filters(self) -> (FilterType, FilterType) {
        match self {
            Interpolation::Nearest => (FilterType::Nearest, FilterType::Nearest),
            Interpolation::Linear => (FilterType::Triangle, FilterType::Triangle),
            Interpolation::Cubic => (FilterType::CatmullRom, FilterType::CatmullRom),
            Interpolation::Area => (FilterType::Triangle, FilterType::Nearest),
            Interpolation::Lanczos => (FilterType::Lanczos3, FilterType::Lanczos3),
        }
    }
}

/// Downscale by `pixelisation_k`, then scale back up
pub struct Pixelized {
    pixelisation_k: u32,
    interpolation: Interpolation,
}

impl Pixelized {
    pub fn new(pixelisation_k: u32, interpolation: Interpolation) -> Self {
        Self {
            pixelisation_k,
            interpolation,
        }
    }
}

impl Effect for Pixelized {
    fn effect_type(&self) -> &'static str {
        "Pixelized"
    }

    fn apply(&mut self, frame: &Frame, _ctx: &mut TickContext<'_>) -> Result<Option<Frame>, EffectError> {
        if self.pixelisation_k == 0 {
            return Ok(Some(frame.clone()));
        }
        let (width, height) = frame.dimensions();
        let (down, up) = self.interpolation.filters();
        let small = imageops::resize(
            frame,
            (width / self.pixelisation_k).max(1),
            (height / self.pixelisation_k).max(1),
            down,
        );
        Ok(Some(imageops::resize(&small, width, height, up)))
    }

    fn parameter(&self, name: &str) -> Option<f64> {
        match name {
            "pixelisation_k" => Some(self.pixelisation_k as f64),
            "interpolation" => Some(self.interpolation.index() as f64),
            _ => None,
        }
    }
}

pub struct PixelizedDefinition;

impl EffectDefinition for PixelizedDefinition {
    fn effect_type(&self) -> &'static str {
        "Pixelized"
    }

    fn display_name(&self) -> &'static str {
        "Pixelized"
    }

    fn category(&self) -> &'static str {
        "Transform"
    }

    fn parameters(&self) -> Vec<ParameterDescriptor> {
        vec![
            ParameterDescriptor::new("Pixelisation", "pixelisation_k", 1.0, 20.0),
            ParameterDescriptor::new("Interpolation", "interpolation", 0.0, 4.0),
        ]
    }

    fn create(&self, args: &EffectArgs, _registry: &EffectRegistry) -> Result<Box<dyn Effect>, EffectError> {
        let k = args.u32_or("Pixelized", 0, "pixelisation_k", 3)?;
        let index = args.u32_or("Pixelized", 1, "interpolation", 3)?;
        let interpolation = Interpolation::from_index(index)
            .ok_or_else(|| EffectError::invalid("Pixelized", "interpolation", format!("{index} is not in 0..=4")))?;
        Ok(Box::new(Pixelized::new(k, interpolation)))
    }
}

/// Blur with a kernel of roughly `blur_k` pixels
pub struct Blur {
    blur_k: u32,
}

impl Effect for Blur {
    fn effect_type(&self) -> &'static str {
        "Blur"
    }

    fn apply(&mut self, frame: &Frame, _ctx: &mut TickContext<'_>) -> Result<Option<Frame>, EffectError> {
        if self.blur_k <= 1 {
            return Ok(Some(frame.clone()));
        }
        let sigma = self.blur_k as f32 / 2.0;
        Ok(Some(imageops::blur(frame, sigma)))
    }

    fn parameter(&self, name: &str) -> Option<f64> {
        (name == "blur_k").then_some(self.blur_k as f64)
    }
}

pub struct BlurDefinition;

impl EffectDefinition for BlurDefinition {
    fn effect_type(&self) -> &'static str {
        "Blur"
    }

    fn display_name(&self) -> &'static str {
        "Blur"
    }

    fn category(&self) -> &'static str {
        "Transform"
    }

    fn parameters(&self) -> Vec<ParameterDescriptor> {
        vec![ParameterDescriptor::new("Blur", "blur_k", 1.0, 100.0)]
    }

    fn create(&self, args: &EffectArgs, _registry: &EffectRegistry) -> Result<Box<dyn Effect>, EffectError> {
        Ok(Box::new(Blur {
            blur_k: args.u32_or("Blur", 0, "blur_k", 1)?,
        }))
    }
}

/// Adds uniform noise in `[0, density)` to every channel, wrapping on overflow
pub struct Noise {
    density: u8,
}

impl Effect for Noise {
    fn effect_type(&self) -> &'static str {
        "Noise"
    }

    fn apply(&mut self, frame: &Frame, ctx: &mut TickContext<'_>) -> Result<Option<Frame>, EffectError> {
        let mut out = frame.clone();
        if self.density > 0 {
            for channel in out.iter_mut() {
                *channel = channel.wrapping_add(ctx.rng.random_range(0..self.density));
            }
        }
        Ok(Some(out))
    }

    fn parameter(&self, name: &str) -> Option<f64> {
        (name == "density").then_some(self.density as f64)
    }
}

pub struct NoiseDefinition;

impl EffectDefinition for NoiseDefinition {
    fn effect_type(&self) -> &'static str {
        "Noise"
    }

    fn display_name(&self) -> &'static str {
        "Noise"
    }

    fn category(&self) -> &'static str {
        "Transform"
    }

    fn parameters(&self) -> Vec<ParameterDescriptor> {
        vec![ParameterDescriptor::new("Density", "density", 1.0, 255.0)]
    }

    fn create(&self, args: &EffectArgs, _registry: &EffectRegistry) -> Result<Box<dyn Effect>, EffectError> {
        let density = args.u32_or("Noise", 0, "density", 8)?;
        let density = u8::try_from(density)
            .map_err(|_| EffectError::invalid("Noise", "density", format!("{density} is above 255")))?;
        Ok(Box::new(Noise { density }))
    }
}

/// Identity transform that declares an output frame rate
pub struct Fps {
    global_fps: Option<f64>,
}

impl Effect for Fps {
    fn effect_type(&self) -> &'static str {
        "FPS"
    }

    fn frame_rate_override(&self) -> Option<f64> {
        self.global_fps
    }

    fn apply(&mut self, frame: &Frame, _ctx: &mut TickContext<'_>) -> Result<Option<Frame>, EffectError> {
        Ok(Some(frame.clone()))
    }

    fn parameter(&self, name: &str) -> Option<f64> {
        if name == "global_fps" {
            self.global_fps
        } else {
            None
        }
    }
}

pub struct FpsDefinition;

impl EffectDefinition for FpsDefinition {
    fn effect_type(&self) -> &'static str {
        "FPS"
    }

    fn display_name(&self) -> &'static str {
        "Frame Rate"
    }

    fn category(&self) -> &'static str {
        "Timing"
    }

    fn parameters(&self) -> Vec<ParameterDescriptor> {
        vec![ParameterDescriptor::fps(3.0)]
    }

    fn create(&self, args: &EffectArgs, _registry: &EffectRegistry) -> Result<Box<dyn Effect>, EffectError> {
        Ok(Box::new(Fps {
            global_fps: positive_fps(args, "FPS", 0)?,
        }))
    }
}

/// Optional `global_fps` argument; must be positive when present
pub(crate) fn positive_fps(args: &EffectArgs, effect: &str, index: usize) -> Result<Option<f64>, EffectError> {
    match args.opt_f64(effect, index, "global_fps")? {
        Some(fps) if fps > 0.0 && fps.is_finite() => Ok(Some(fps)),
        Some(fps) => Err(EffectError::invalid(effect, "global_fps", format!("{fps} is not a positive rate"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::apply_once as apply;
    use image::Rgb;
    use serde_json::json;

    fn frame() -> Frame {
        Frame::from_fn(8, 6, |x, y| Rgb([x as u8 * 30, y as u8 * 40, 200]))
    }

    fn build(definition: &dyn EffectDefinition, args: EffectArgs) -> Box<dyn Effect> {
        definition.create(&args, &EffectRegistry::new()).unwrap()
    }

    #[test]
    fn test_mirror() {
        let input = frame();
        let mut mirror_x = build(&SimpleTransformDefinition::mirror_x(), EffectArgs::default());
        let out = apply(mirror_x.as_mut(), &input).unwrap();
        assert_eq!(out.get_pixel(0, 0), input.get_pixel(7, 0));

        let mut mirror_y = build(&SimpleTransformDefinition::mirror_y(), EffectArgs::default());
        let out = apply(mirror_y.as_mut(), &input).unwrap();
        assert_eq!(out.get_pixel(0, 0), input.get_pixel(0, 5));
    }

    #[test]
    fn test_negative_and_grayscale() {
        let input = Frame::from_pixel(2, 2, Rgb([10, 100, 250]));
        let mut negative = build(&SimpleTransformDefinition::negative(), EffectArgs::default());
        let out = apply(negative.as_mut(), &input).unwrap();
        assert_eq!(out.get_pixel(1, 1), &Rgb([245, 155, 5]));

        let mut gray = build(&SimpleTransformDefinition::grayscale(), EffectArgs::default());
        let out = apply(gray.as_mut(), &input).unwrap();
        let Rgb([r, g, b]) = *out.get_pixel(0, 0);
        assert!(r == g && g == b);
    }

    #[test]
    fn test_pixelized_keeps_size() {
        let input = frame();
        for interpolation in 0..=4 {
            let args = EffectArgs::positional(vec![json!(3), json!(interpolation)]);
            let mut effect = build(&PixelizedDefinition, args);
            assert_eq!(apply(effect.as_mut(), &input).unwrap().dimensions(), (8, 6));
        }
        let args = EffectArgs::default().with("interpolation", 9);
        assert!(PixelizedDefinition.create(&args, &EffectRegistry::new()).is_err());
    }

    #[test]
    fn test_pixelized_nearest_blocks() {
        let input = frame();
        let args = EffectArgs::positional(vec![json!(2), json!(0)]);
        let mut effect = build(&PixelizedDefinition, args);
        let out = apply(effect.as_mut(), &input).unwrap();
        assert_eq!(out.get_pixel(0, 0), out.get_pixel(1, 1));
    }

    #[test]
    fn test_blur_identity_at_one() {
        let input = frame();
        let mut effect = build(&BlurDefinition, EffectArgs::default());
        assert_eq!(apply(effect.as_mut(), &input).unwrap(), input);
        assert_eq!(effect.parameter("blur_k"), Some(1.0));
    }

    #[test]
    fn test_noise_bounded() {
        let input = Frame::from_pixel(4, 4, Rgb([10, 10, 10]));
        let mut effect = build(&NoiseDefinition, EffectArgs::default().with("density", 5));
        let out = apply(effect.as_mut(), &input).unwrap();
        assert!(out.iter().all(|&c| (10..15).contains(&c)));
        assert!(NoiseDefinition
            .create(&EffectArgs::default().with("density", 300), &EffectRegistry::new())
            .is_err());
    }

    #[test]
    fn test_fps_declares_rate() {
        let input = frame();
        let mut effect = build(&FpsDefinition, EffectArgs::positional(vec![json!(12)]));
        assert_eq!(effect.frame_rate_override(), Some(12.0));
        assert_eq!(apply(effect.as_mut(), &input).unwrap(), input);

        let effect = build(&FpsDefinition, EffectArgs::default());
        assert_eq!(effect.frame_rate_override(), None);
        assert!(FpsDefinition
            .create(&EffectArgs::default().with("global_fps", 0), &EffectRegistry::new())
            .is_err());
    }
}
