//! Per-tick scheduling of the effect chain
//!
//! One executor pass walks the five buckets in ascending priority order.
//! Override effects (bucket -2) hold a veto over buckets -1, 0 and 1 for as
//! long as at least one of them keeps producing a frame: every override
//! effect that fails its chance gate or yields nothing spends one unit of the
//! per-tick budget, and the veto lifts when the budget reaches zero. Bucket 2
//! always runs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::chain::{EffectId, PriorityChain};
use super::traits::{ControlSurface, Effect, Priority, TickContext};
use super::EffectError;
use crate::frame::Frame;

/// Probabilistic admission for one effect on one tick
pub fn chance_gate(chance: f64, rng: &mut StdRng) -> bool {
    if chance >= 100.0 {
        return true;
    }
    if chance <= 0.0 || chance.is_nan() {
        return false;
    }
    chance >= rng.random_range(0.0..100.0)
}

/// Run the gate, then the control-surface callback, then the transform.
///
/// Returns `Ok(None)` when the gate failed.
pub fn run_gated(
    effect: &mut dyn Effect,
    frame: &Frame,
    ctx: &mut TickContext<'_>,
) -> Result<Option<Frame>, EffectError> {
    if !chance_gate(effect.chance(), ctx.rng) {
        return Ok(None);
    }
    effect.affect_control_surface(ctx.surface);
    effect.apply(frame, ctx)
}

/// Result of one executor pass
#[derive(Debug)]
pub struct TickOutput {
    /// Final working frame
    pub frame: Frame,
    /// Frame rate requested by the last effect that replaced the frame
    pub frame_rate_override: Option<f64>,
    /// Effects whose transform failed this tick
    pub failures: Vec<(EffectId, EffectError)>,
}

/// Applies a [`PriorityChain`] to frames
pub struct PipelineExecutor {
    rng: StdRng,
}

impl PipelineExecutor {
    /// Executor with a reproducible random sequence
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_os_rng() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Run one tick of the chain over `frame`
    pub fn run(
        &mut self,
        chain: &mut PriorityChain,
        frame: Frame,
        surface: &mut dyn ControlSurface,
    ) -> TickOutput {
        let mut override_budget = chain.bucket(Priority::Override).len();
        let mut output = TickOutput {
            frame,
            frame_rate_override: None,
            failures: Vec::new(),
        };

        for priority in Priority::ALL {
            if priority.is_vetoable() && override_budget > 0 {
                continue;
            }

            for entry in chain.bucket_mut(priority) {
                let mut ctx = TickContext::new(&mut *surface, &mut self.rng);
                let replaced = match run_gated(entry.effect.as_mut(), &output.frame, &mut ctx) {
                    Ok(replaced) => replaced,
                    Err(err) => {
                        output.failures.push((entry.id, err));
                        None
                    }
                };

                match replaced {
                    Some(frame) => {
                        output.frame = frame;
                        if let Some(fps) = entry.effect.frame_rate_override() {
                            output.frame_rate_override = Some(fps);
                        }
                    }
                    None if priority == Priority::Override => {
                        override_budget = override_budget.saturating_sub(1);
                    }
                    None => {}
                }
            }
        }

        output
    }
}

impl Default for PipelineExecutor {
    fn default() -> Self {
        Self::from_os_rng()
    }
}
