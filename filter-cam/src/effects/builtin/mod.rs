//! Built-in effects
//!
//! This module contains the standard effects that ship with filter-cam,
//! registered under the names layout files refer to them by.

mod control;
mod hold;
mod pack;
mod still;
mod transform;
mod video;

pub use control::{ControlAction, ControlEffect, ControlEffectDefinition, ACTIVATE_IGNORE, DEACTIVATE_IGNORE};
pub use hold::{Pause, PauseDefinition, SkipFrames, SkipFramesDefinition};
pub use pack::{FilterPack, FilterPackDefinition};
pub use still::{Image, ImageDefinition, ImageList, ImageListDefinition};
pub use transform::{
    Blur, BlurDefinition, Fps, FpsDefinition, Interpolation, Noise, NoiseDefinition, Pixelized,
    PixelizedDefinition, SimpleTransform, SimpleTransformDefinition,
};
pub use video::{StreamOpener, VideoDefinition, VideoLoop};

use super::EffectRegistry;

/// Register all built-in effects with the registry
pub fn register_builtin_effects(registry: &mut EffectRegistry) {
    registry.register(SimpleTransformDefinition::mirror_x());
    registry.register(SimpleTransformDefinition::mirror_y());
    registry.register(SimpleTransformDefinition::negative());
    registry.register(SimpleTransformDefinition::grayscale());
    registry.register(PixelizedDefinition);
    registry.register(BlurDefinition);
    registry.register(NoiseDefinition);

    registry.register(FpsDefinition);
    registry.register(PauseDefinition);
    registry.register(SkipFramesDefinition);

    registry.register(ImageDefinition);
    registry.register(ImageListDefinition);
    registry.register(VideoDefinition::default());

    for action in ControlAction::ALL {
        registry.register(ControlEffectDefinition::new(action));
    }

    registry.register(FilterPackDefinition);
}
