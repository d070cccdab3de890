//! Composite effect
//!
//! A `FilterPack` owns a flat list of effects built once, at construction,
//! from declarative `{"filter": ..., "args": ...}` entries. On every tick it
//! runs them in order through their own chance gates, ignoring their
//! priorities, and always yields a frame.

use crate::effects::executor::run_gated;
use crate::effects::traits::{Effect, EffectDefinition, Priority, TickContext};
use crate::effects::{EffectArgs, EffectError, EffectRegistry, EffectSpec};
use crate::frame::Frame;

pub struct FilterPack {
    filters: Vec<Box<dyn Effect>>,
    priority: Priority,
    frame_rate_override: Option<f64>,
}

impl FilterPack {
    pub fn new(filters: Vec<Box<dyn Effect>>, priority: Priority) -> Self {
        let frame_rate_override = filters
            .iter()
            .filter_map(|f| f.frame_rate_override())
            .last();
        Self {
            filters,
            priority,
            frame_rate_override,
        }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Effect for FilterPack {
    fn effect_type(&self) -> &'static str {
        "FilterPack"
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn frame_rate_override(&self) -> Option<f64> {
        self.frame_rate_override
    }

    fn apply(&mut self, frame: &Frame, ctx: &mut TickContext<'_>) -> Result<Option<Frame>, EffectError> {
        let mut working: Option<Frame> = None;
        for filter in &mut self.filters {
            let input = working.as_ref().unwrap_or(frame);
            match run_gated(filter.as_mut(), input, ctx) {
                Ok(Some(next)) => working = Some(next),
                Ok(None) => {}
                Err(err) => log::warn!("FilterPack: {} failed: {}", filter.effect_type(), err),
            }
        }
        Ok(Some(working.unwrap_or_else(|| frame.clone())))
    }
}

pub struct FilterPackDefinition;

impl EffectDefinition for FilterPackDefinition {
    fn effect_type(&self) -> &'static str {
        "FilterPack"
    }

    fn display_name(&self) -> &'static str {
        "Filter Pack"
    }

    fn category(&self) -> &'static str {
        "Composite"
    }

    fn create(&self, args: &EffectArgs, registry: &EffectRegistry) -> Result<Box<dyn Effect>, EffectError> {
        let specs: Vec<EffectSpec> = args.parse("FilterPack", 0, "filters")?;
        let priority = Priority::from_level(args.i64_or("FilterPack", 1, "priority", 0)?)?;

        let filters = specs
            .iter()
            .map(|spec| registry.create_from_spec(spec))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Box::new(FilterPack::new(filters, priority)))
    }
}
