//! Helpers shared by effect unit tests

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::traits::{ControlSurface, Effect, TickContext};
use super::EffectError;
use crate::frame::Frame;

/// Control surface that records every call in order
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub calls: Vec<String>,
}

impl ControlSurface for RecordingSurface {
    fn reset_toggles(&mut self) {
        self.calls.push("reset".to_string());
    }

    fn deactivate_all(&mut self, ignore: &[&str]) {
        self.calls.push(format!("deactivate {}", ignore.join(",")));
    }

    fn activate_all(&mut self, ignore: &[&str], own_type: &str) {
        self.calls.push(format!("activate {} own={own_type}", ignore.join(",")));
    }

    fn reload(&mut self) {
        self.calls.push("reload".to_string());
    }
}

/// Call `apply` once with a throwaway surface and a fixed seed
pub fn try_apply_once(effect: &mut dyn Effect, frame: &Frame) -> Result<Option<Frame>, EffectError> {
    let mut surface = RecordingSurface::default();
    let mut rng = StdRng::seed_from_u64(0);
    let mut ctx = TickContext::new(&mut surface, &mut rng);
    effect.apply(frame, &mut ctx)
}

pub fn apply_once(effect: &mut dyn Effect, frame: &Frame) -> Option<Frame> {
    try_apply_once(effect, frame).unwrap()
}
