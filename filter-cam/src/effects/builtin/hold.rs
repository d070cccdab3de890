//! Effects that hold a cached frame
//!
//! `Pause` freezes the first frame it sees. `SkipFrames` repeats a frame for
//! `frames_loss` ticks and then lets one live frame through.

use crate::effects::traits::{Effect, EffectDefinition, Priority, TickContext};
use crate::effects::{EffectArgs, EffectError, EffectRegistry, ParameterDescriptor};
use crate::frame::Frame;

/// Frozen frame
///
/// Runs in the always-final bucket, so it freezes the fully processed output
/// even while an override effect is active.
#[derive(Default)]
pub struct Pause {
    saved: Option<Frame>,
}

impl Effect for Pause {
    fn effect_type(&self) -> &'static str {
        "Pause"
    }

    fn priority(&self) -> Priority {
        Priority::AlwaysFinal
    }

    fn apply(&mut self, frame: &Frame, _ctx: &mut TickContext<'_>) -> Result<Option<Frame>, EffectError> {
        let saved = self.saved.get_or_insert_with(|| frame.clone());
        Ok(Some(saved.clone()))
    }
}

pub struct PauseDefinition;

impl EffectDefinition for PauseDefinition {
    fn effect_type(&self) -> &'static str {
        "Pause"
    }

    fn display_name(&self) -> &'static str {
        "Pause"
    }

    fn category(&self) -> &'static str {
        "Timing"
    }

    fn create(&self, _args: &EffectArgs, _registry: &EffectRegistry) -> Result<Box<dyn Effect>, EffectError> {
        Ok(Box::new(Pause::default()))
    }
}

/// Periodic hold: one live frame per `frames_loss + 1` ticks
pub struct SkipFrames {
    frames_loss: u32,
    frames_lost: u32,
    chance: f64,
    saved: Option<Frame>,
}

impl SkipFrames {
    pub fn new(frames_loss: u32, chance: f64) -> Self {
        Self {
            frames_loss,
            frames_lost: 0,
            chance,
            saved: None,
        }
    }
}

impl Effect for SkipFrames {
    fn effect_type(&self) -> &'static str {
        "SkipFrames"
    }

    fn chance(&self) -> f64 {
        self.chance
    }

    fn apply(&mut self, frame: &Frame, _ctx: &mut TickContext<'_>) -> Result<Option<Frame>, EffectError> {
        if self.frames_lost == 0 {
            self.saved = Some(frame.clone());
        }
        if self.frames_lost < self.frames_loss {
            self.frames_lost += 1;
            return Ok(self.saved.clone());
        }
        self.frames_lost = 0;
        Ok(None)
    }

    fn parameter(&self, name: &str) -> Option<f64> {
        match name {
            "frames_loss" => Some(self.frames_loss as f64),
            "chance" => Some(self.chance),
            _ => None,
        }
    }
}

pub struct SkipFramesDefinition;

impl EffectDefinition for SkipFramesDefinition {
    fn effect_type(&self) -> &'static str {
        "SkipFrames"
    }

    fn display_name(&self) -> &'static str {
        "Skip Frames"
    }

    fn category(&self) -> &'static str {
        "Timing"
    }

    fn parameters(&self) -> Vec<ParameterDescriptor> {
        vec![
            ParameterDescriptor::new("Frames loss", "frames_loss", 1.0, 40.0),
            ParameterDescriptor::chance(),
        ]
    }

    fn create(&self, args: &EffectArgs, _registry: &EffectRegistry) -> Result<Box<dyn Effect>, EffectError> {
        let frames_loss = args.u32_or("SkipFrames", 0, "frames_loss", 1)?;
        let chance = args.f64_or("SkipFrames", 1, "chance", 1.0)?;
        if !(0.0..=100.0).contains(&chance) {
            return Err(EffectError::invalid("SkipFrames", "chance", format!("{chance} is not in 0..=100")));
        }
        Ok(Box::new(SkipFrames::new(frames_loss, chance)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::apply_once;
    use image::Rgb;
    use serde_json::json;

    fn solid(v: u8) -> Frame {
        Frame::from_pixel(3, 3, Rgb([v, v, v]))
    }

    #[test]
    fn test_pause_freezes_first_frame() {
        let mut pause = PauseDefinition
            .create(&EffectArgs::default(), &EffectRegistry::new())
            .unwrap();
        assert_eq!(pause.priority(), Priority::AlwaysFinal);

        let first = solid(10);
        assert_eq!(apply_once(pause.as_mut(), &first), Some(first.clone()));
        for v in [20, 30, 40] {
            assert_eq!(apply_once(pause.as_mut(), &solid(v)), Some(first.clone()));
        }
    }

    #[test]
    fn test_pause_rebuilt_recaptures() {
        let mut pause: Box<dyn Effect> = Box::new(Pause::default());
        apply_once(pause.as_mut(), &solid(1));

        let mut rebuilt = PauseDefinition
            .create(&EffectArgs::default(), &EffectRegistry::new())
            .unwrap();
        assert_eq!(apply_once(rebuilt.as_mut(), &solid(2)), Some(solid(2)));
    }

    #[test]
    fn test_skip_frames_cadence() {
        let threshold = 3;
        let mut skip = SkipFrames::new(threshold, 100.0);

        // Two full cycles starting at a boundary
        for cycle in 0..2u8 {
            let start = cycle * 10;
            let mut live = 0;
            let mut held = 0;
            for tick in 0..=threshold as u8 {
                let input = solid(start + tick);
                match apply_once(&mut skip, &input) {
                    None => live += 1,
                    Some(frame) => {
                        assert_eq!(frame, solid(start));
                        held += 1;
                    }
                }
            }
            assert_eq!(live, 1);
            assert_eq!(held, threshold);
        }
    }

    #[test]
    fn test_skip_frames_args() {
        let skip = SkipFramesDefinition
            .create(&EffectArgs::default(), &EffectRegistry::new())
            .unwrap();
        assert_eq!(skip.chance(), 1.0);
        assert_eq!(skip.parameter("frames_loss"), Some(1.0));

        let args = EffectArgs::positional(vec![json!(5)]).with("chance", 40);
        let skip = SkipFramesDefinition.create(&args, &EffectRegistry::new()).unwrap();
        assert_eq!(skip.chance(), 40.0);
        assert_eq!(skip.parameter("frames_loss"), Some(5.0));

        let args = EffectArgs::default().with("chance", 140);
        assert!(SkipFramesDefinition.create(&args, &EffectRegistry::new()).is_err());
    }
}
