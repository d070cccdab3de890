//! Tunable effect parameters
//!
//! A [`ParameterDescriptor`] names one numeric construction argument of an
//! effect and the range a slider may move it through. Bounds can depend on
//! the effect instance (e.g. the number of images in a list), so descriptors
//! are resolved in two phases: build a throwaway instance from the fixed
//! arguments, then evaluate every bound against it once.

use std::fmt;

use super::traits::Effect;

/// A bound that is either fixed or computed from an effect instance
#[derive(Clone, Copy)]
pub enum Bound {
    Fixed(f64),
    Derived(fn(&dyn Effect) -> f64),
}

impl Bound {
    fn resolve(&self, effect: &dyn Effect) -> f64 {
        match self {
            Bound::Fixed(v) => *v,
            Bound::Derived(f) => f(effect),
        }
    }
}

impl From<f64> for Bound {
    fn from(v: f64) -> Self {
        Bound::Fixed(v)
    }
}

impl fmt::Debug for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Fixed(v) => write!(f, "Fixed({v})"),
            Bound::Derived(_) => f.write_str("Derived"),
        }
    }
}

/// Description of one slider-controlled parameter
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    /// Text shown next to the slider
    pub label: &'static str,
    /// Construction argument the slider writes to
    pub variable: &'static str,
    pub min: Bound,
    pub max: Bound,
    pub step: Bound,
    /// Initial slider value; `None` reads the instance's current value
    pub default: Option<Bound>,
    /// Appended to the value in the label (e.g. "%")
    pub suffix: &'static str,
}

impl ParameterDescriptor {
    /// Slider over `variable` in `min..=max` with step 1
    pub fn new(label: &'static str, variable: &'static str, min: f64, max: f64) -> Self {
        Self {
            label,
            variable,
            min: Bound::Fixed(min),
            max: Bound::Fixed(max),
            step: Bound::Fixed(1.0),
            default: None,
            suffix: "",
        }
    }

    /// Probability-of-application slider (0-100 %)
    pub fn chance() -> Self {
        Self::new("Chance", "chance", 0.0, 100.0)
            .with_default(100.0)
            .with_suffix("%")
    }

    /// Output frame rate slider (1-60)
    pub fn fps(default: f64) -> Self {
        Self::new("FPS", "global_fps", 1.0, 60.0).with_default(default)
    }

    pub fn with_max(mut self, max: Bound) -> Self {
        self.max = max;
        self
    }

    pub fn with_default(mut self, default: f64) -> Self {
        self.default = Some(Bound::Fixed(default));
        self
    }

    pub fn with_suffix(mut self, suffix: &'static str) -> Self {
        self.suffix = suffix;
        self
    }

    /// Evaluate every bound against `effect`, once
    pub fn resolve(&self, effect: &dyn Effect) -> ResolvedParameter {
        let min = self.min.resolve(effect);
        let max = self.max.resolve(effect).max(min);
        let step = self.step.resolve(effect);
        let default = match &self.default {
            Some(bound) => bound.resolve(effect),
            None => effect.parameter(self.variable).unwrap_or(min),
        };

        ResolvedParameter {
            label: self.label,
            variable: self.variable,
            min,
            max,
            step: if step > 0.0 { step } else { 1.0 },
            default: default.clamp(min, max),
            suffix: self.suffix,
        }
    }
}

/// A descriptor with all bounds evaluated
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParameter {
    pub label: &'static str,
    pub variable: &'static str,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub default: f64,
    pub suffix: &'static str,
}

impl ResolvedParameter {
    /// Snap `value` to the nearest step inside `[min, max]`
    pub fn clamp(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return self.default;
        }
        let steps = ((value - self.min) / self.step).round();
        (self.min + steps * self.step).clamp(self.min, self.max)
    }

    /// Slider caption, padded so the value column lines up at the width of `max`
    pub fn label(&self, value: f64) -> String {
        let value = format_value(value);
        let width = format_value(self.max).len();
        let spacing = "  ".repeat(width.saturating_sub(value.len()));
        format!("{}: {}{}{}", self.label, spacing, value, self.suffix)
    }
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::traits::TickContext;
    use crate::effects::EffectError;
    use crate::frame::Frame;

    struct Knob {
        level: f64,
        count: usize,
    }

    impl Effect for Knob {
        fn effect_type(&self) -> &'static str {
            "Knob"
        }

        fn apply(&mut self, _frame: &Frame, _ctx: &mut TickContext<'_>) -> Result<Option<Frame>, EffectError> {
            Ok(None)
        }

        fn parameter(&self, name: &str) -> Option<f64> {
            match name {
                "level" => Some(self.level),
                _ => None,
            }
        }
    }

    fn last_index(effect: &dyn Effect) -> f64 {
        effect.parameter("count").unwrap_or(1.0) - 1.0
    }

    #[test]
    fn test_default_from_instance() {
        let knob = Knob { level: 7.0, count: 1 };
        let resolved = ParameterDescriptor::new("Level", "level", 1.0, 20.0).resolve(&knob);
        assert_eq!(resolved.default, 7.0);
        assert_eq!(resolved.min, 1.0);
        assert_eq!(resolved.max, 20.0);
    }

    #[test]
    fn test_explicit_default_wins() {
        let knob = Knob { level: 7.0, count: 1 };
        let resolved = ParameterDescriptor::chance().resolve(&knob);
        assert_eq!(resolved.default, 100.0);
        assert_eq!(resolved.suffix, "%");
    }

    #[test]
    fn test_derived_max() {
        struct Counted(Knob);
        impl Effect for Counted {
            fn effect_type(&self) -> &'static str {
                "Counted"
            }
            fn apply(&mut self, _: &Frame, _: &mut TickContext<'_>) -> Result<Option<Frame>, EffectError> {
                Ok(None)
            }
            fn parameter(&self, name: &str) -> Option<f64> {
                match name {
                    "count" => Some(self.0.count as f64),
                    "index" => Some(0.0),
                    _ => None,
                }
            }
        }

        let effect = Counted(Knob { level: 0.0, count: 4 });
        let resolved = ParameterDescriptor::new("Image", "index", 0.0, 0.0)
            .with_max(Bound::Derived(last_index))
            .resolve(&effect);
        assert_eq!(resolved.max, 3.0);
        assert_eq!(resolved.default, 0.0);
    }

    #[test]
    fn test_clamp_snaps_to_step() {
        let knob = Knob { level: 0.0, count: 0 };
        let resolved = ParameterDescriptor::new("Blur", "blur_k", 1.0, 100.0).resolve(&knob);
        assert_eq!(resolved.clamp(5.4), 5.0);
        assert_eq!(resolved.clamp(-3.0), 1.0);
        assert_eq!(resolved.clamp(500.0), 100.0);
        assert_eq!(resolved.clamp(f64::NAN), resolved.default);
    }

    #[test]
    fn test_label_padding() {
        let knob = Knob { level: 0.0, count: 0 };
        let chance = ParameterDescriptor::chance().resolve(&knob);
        assert_eq!(chance.label(100.0), "Chance: 100%");
        assert_eq!(chance.label(5.0), "Chance:     5%");

        let fps = ParameterDescriptor::fps(3.0).resolve(&knob);
        assert_eq!(fps.label(3.0), "FPS:   3");
        assert_eq!(fps.label(30.0), "FPS: 30");
    }
}
