//! Control-surface actions
//!
//! These effects never produce a frame. They sit in the override bucket and
//! act only through the control-surface callback, so they lift the veto on
//! the tick they fire.

use crate::effects::traits::{ControlSurface, Effect, EffectDefinition, Priority, TickContext};
use crate::effects::{EffectArgs, EffectError, EffectRegistry};
use crate::frame::Frame;

/// Effects left alone by `DeactivateAll`
pub const DEACTIVATE_IGNORE: &[&str] = &["Pause"];

/// Effects left alone by `ActivateAll`
pub const ACTIVATE_IGNORE: &[&str] = &["Pause", "ReloadGUI", "ResetButtons", "DeactivateAll"];

/// What a control action asks of the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Reload,
    ResetButtons,
    DeactivateAll,
    ActivateAll,
}

impl ControlAction {
    pub const ALL: [ControlAction; 4] = [
        ControlAction::Reload,
        ControlAction::ResetButtons,
        ControlAction::DeactivateAll,
        ControlAction::ActivateAll,
    ];

    pub fn effect_type(self) -> &'static str {
        match self {
            ControlAction::Reload => "ReloadGUI",
            ControlAction::ResetButtons => "ResetButtons",
            ControlAction::DeactivateAll => "DeactivateAll",
            ControlAction::ActivateAll => "ActivateAll",
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            ControlAction::Reload => "Reload Layout",
            ControlAction::ResetButtons => "Reset Buttons",
            ControlAction::DeactivateAll => "Deactivate All",
            ControlAction::ActivateAll => "Activate All",
        }
    }
}

/// Effect wrapping one [`ControlAction`]
pub struct ControlEffect {
    action: ControlAction,
}

impl Effect for ControlEffect {
    fn effect_type(&self) -> &'static str {
        self.action.effect_type()
    }

    fn priority(&self) -> Priority {
        Priority::Override
    }

    fn apply(&mut self, _frame: &Frame, _ctx: &mut TickContext<'_>) -> Result<Option<Frame>, EffectError> {
        Ok(None)
    }

    fn affect_control_surface(&mut self, surface: &mut dyn ControlSurface) {
        match self.action {
            ControlAction::Reload => surface.reload(),
            ControlAction::ResetButtons => surface.reset_toggles(),
            ControlAction::DeactivateAll => surface.deactivate_all(DEACTIVATE_IGNORE),
            ControlAction::ActivateAll => surface.activate_all(ACTIVATE_IGNORE, self.action.effect_type()),
        }
    }
}

pub struct ControlEffectDefinition {
    action: ControlAction,
}

impl ControlEffectDefinition {
    pub fn new(action: ControlAction) -> Self {
        Self { action }
    }
}

impl EffectDefinition for ControlEffectDefinition {
    fn effect_type(&self) -> &'static str {
        self.action.effect_type()
    }

    fn display_name(&self) -> &'static str {
        self.action.display_name()
    }

    fn category(&self) -> &'static str {
        "Control"
    }

    fn create(&self, _args: &EffectArgs, _registry: &EffectRegistry) -> Result<Box<dyn Effect>, EffectError> {
        Ok(Box::new(ControlEffect { action: self.action }))
    }
}
