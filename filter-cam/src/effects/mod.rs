//! Effects pipeline engine
//!
//! Every captured frame runs through a chain of effects. This module
//! provides:
//! - A priority-bucketed chain of active effects with an override veto
//! - A probabilistic gate on every effect, every tick
//! - Frame-rate override negotiation between effects
//! - Live reconfiguration through slider-described parameters
//!
//! # Architecture
//!
//! - **Traits** (`traits.rs`): the `Effect` contract, `ControlSurface`
//!   callbacks and the `EffectDefinition` factory trait
//! - **Args** (`args.rs`): positional/keyed construction arguments
//! - **Chain** (`chain.rs`): the five priority buckets
//! - **Executor** (`executor.rs`): the per-tick scheduling algorithm
//! - **Params** (`params.rs`): slider descriptors and their resolution
//! - **Registry** (`registry.rs`): effect definitions by name
//! - **Builtin** (`builtin/`): the effects that ship with filter-cam
//!
//! # Usage
//!
//! ```ignore
//! let registry = EffectRegistry::with_builtin();
//! let chain = PriorityChain::shared();
//! chain.lock().add(registry.create("MirrorX", &EffectArgs::default())?);
//!
//! let mut executor = PipelineExecutor::from_os_rng();
//! let output = executor.run(&mut chain.lock(), frame, &mut requests);
//! ```

mod args;
mod chain;
mod error;
mod executor;
mod params;
mod registry;
mod traits;
pub mod builtin;
#[cfg(test)]
pub(crate) mod testing;

pub use args::*;
pub use chain::*;
pub use error::*;
pub use executor::*;
pub use params::*;
pub use registry::*;
pub use traits::*;
