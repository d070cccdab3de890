//! filter-cam - webcam effects pipeline with virtual camera output
//!
//! Frames from a camera are run through a priority-bucketed chain of effects
//! that a control panel switches on and off while the loop runs. The result
//! goes to a loopback video device and a preview channel.

pub mod camera;
pub mod control;
pub mod effects;
pub mod frame;
pub mod output;
pub mod pipeline;
pub mod settings;
pub mod video;

pub use control::ControlPanel;
pub use effects::{EffectRegistry, PipelineExecutor, PriorityChain};
pub use pipeline::{Pipeline, PipelineError};
