//! Effect traits and per-tick context
//!
//! This module defines the contract every effect satisfies:
//! - `Effect` - the per-frame capability set (transform, priority, chance,
//!   frame-rate override, control-surface callback)
//! - `ControlSurface` - what an effect may ask of the control surface
//! - `TickContext` - what the executor lends an effect for one tick
//! - `EffectDefinition` - factory trait for building effect instances by name

use std::fmt;

use rand::rngs::StdRng;

use super::{EffectArgs, EffectError, EffectRegistry, ParameterDescriptor};
use crate::frame::Frame;

/// Execution slot of an effect in the chain
///
/// Buckets run in ascending order. While any `Override` effect keeps
/// producing output, `Fast`, `Normal` and `Final` are skipped for the tick;
/// `AlwaysFinal` runs regardless.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    /// -2: apply and veto the normal buckets
    Override,
    /// -1: apply as early as possible
    Fast,
    /// 0: no ordering preference
    #[default]
    Normal,
    /// 1: apply at the very end
    Final,
    /// 2: apply at the very end, even while an override is active
    AlwaysFinal,
}

impl Priority {
    /// All priorities in execution order
    pub const ALL: [Priority; 5] = [
        Priority::Override,
        Priority::Fast,
        Priority::Normal,
        Priority::Final,
        Priority::AlwaysFinal,
    ];

    /// Numeric level (-2..=2)
    pub fn level(self) -> i64 {
        self.index() as i64 - 2
    }

    /// Position in [`Priority::ALL`]
    pub fn index(self) -> usize {
        match self {
            Priority::Override => 0,
            Priority::Fast => 1,
            Priority::Normal => 2,
            Priority::Final => 3,
            Priority::AlwaysFinal => 4,
        }
    }

    pub fn from_level(level: i64) -> Result<Self, EffectError> {
        match level {
            -2 => Ok(Priority::Override),
            -1 => Ok(Priority::Fast),
            0 => Ok(Priority::Normal),
            1 => Ok(Priority::Final),
            2 => Ok(Priority::AlwaysFinal),
            other => Err(EffectError::InvalidPriority(other)),
        }
    }

    /// Whether an active override vetoes this bucket
    pub fn is_vetoable(self) -> bool {
        matches!(self, Priority::Fast | Priority::Normal | Priority::Final)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

/// Requests an effect can make of the control surface
///
/// Called only on ticks where the effect's chance gate passed, before the
/// effect's transform runs.
pub trait ControlSurface {
    /// Put every toggle back to its configured default state
    fn reset_toggles(&mut self);

    /// Switch off every toggle whose effect type is not in `ignore`
    fn deactivate_all(&mut self, ignore: &[&str]);

    /// Switch on every toggle whose effect type is not in `ignore`, and
    /// switch off toggles of `own_type`
    fn activate_all(&mut self, ignore: &[&str], own_type: &str);

    /// Clear the chain and rebuild the control surface from its layout
    fn reload(&mut self);
}

/// Borrowed state handed to effects for one tick
pub struct TickContext<'a> {
    /// Control surface for the callback hook
    pub surface: &'a mut dyn ControlSurface,
    /// Random source for chance gates and noise
    pub rng: &'a mut StdRng,
}

impl<'a> TickContext<'a> {
    pub fn new(surface: &'a mut dyn ControlSurface, rng: &'a mut StdRng) -> Self {
        Self { surface, rng }
    }
}

/// A unit of per-frame work in the pipeline
///
/// `apply` returning `Ok(None)` means "no replacement frame this tick"; the
/// working frame passes through unchanged.
pub trait Effect: Send {
    /// Registered type name (e.g. "MirrorX", "Pause")
    fn effect_type(&self) -> &'static str;

    /// Bucket this effect runs in
    fn priority(&self) -> Priority {
        Priority::Normal
    }

    /// Percentage chance (0-100) that the effect runs on a given tick
    fn chance(&self) -> f64 {
        100.0
    }

    /// Output frame rate this effect asks for when it replaces the frame
    fn frame_rate_override(&self) -> Option<f64> {
        None
    }

    /// Transform a frame
    fn apply(&mut self, frame: &Frame, ctx: &mut TickContext<'_>) -> Result<Option<Frame>, EffectError>;

    /// Act on the control surface (meta effects)
    fn affect_control_surface(&mut self, _surface: &mut dyn ControlSurface) {}

    /// Current value of a numeric attribute, used to resolve parameter
    /// descriptors against a live instance
    fn parameter(&self, _name: &str) -> Option<f64> {
        None
    }
}

/// Factory for one effect type
///
/// Definitions are registered once at startup. Name lookup happens when an
/// effect is built, never per tick.
pub trait EffectDefinition: Send + Sync {
    /// Unique identifier, matching the `filter` key of layout files (e.g. "Blur")
    fn effect_type(&self) -> &'static str;

    /// Human-readable display name
    fn display_name(&self) -> &'static str;

    /// Category for grouping (e.g. "Transform", "Source", "Control")
    fn category(&self) -> &'static str;

    /// Slider-controlled parameters, in display order
    fn parameters(&self) -> Vec<ParameterDescriptor> {
        Vec::new()
    }

    /// Build an instance from construction arguments. The registry is passed
    /// so composite effects can build their children.
    fn create(&self, args: &EffectArgs, registry: &EffectRegistry) -> Result<Box<dyn Effect>, EffectError>;
}

impl fmt::Debug for dyn Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("type", &self.effect_type())
            .field("priority", &self.priority())
            .field("chance", &self.chance())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_levels() {
        for (i, priority) in Priority::ALL.iter().enumerate() {
            assert_eq!(priority.index(), i);
            assert_eq!(Priority::from_level(priority.level()).unwrap(), *priority);
        }
        assert_eq!(Priority::Override.level(), -2);
        assert_eq!(Priority::AlwaysFinal.level(), 2);
        assert!(Priority::from_level(3).is_err());
        assert!(Priority::from_level(-3).is_err());
    }

    #[test]
    fn test_priority_order() {
        let mut sorted = Priority::ALL;
        sorted.sort();
        assert_eq!(sorted, Priority::ALL);
        assert!(Priority::Override < Priority::Normal);
    }

    #[test]
    fn test_priority_default() {
        assert_eq!(Priority::default(), Priority::Normal);
        assert_eq!(Priority::default().level(), 0);
    }

    #[test]
    fn test_vetoable() {
        assert!(!Priority::Override.is_vetoable());
        assert!(Priority::Fast.is_vetoable());
        assert!(Priority::Normal.is_vetoable());
        assert!(Priority::Final.is_vetoable());
        assert!(!Priority::AlwaysFinal.is_vetoable());
    }
}
