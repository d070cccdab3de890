//! Control surface
//!
//! The `ControlPanel` is the headless counterpart of a button grid: one
//! `Toggle` per layout button, each owning at most one live effect in the
//! shared chain, plus the sliders that reconfigure it.
//!
//! Effects never touch the panel during an executor pass. Their requests are
//! queued in `ControlRequests` and applied once the pass has released the
//! chain, so the lock order is always panel → chain.

pub mod console;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::effects::{
    ControlSurface, EffectArgs, EffectError, EffectId, EffectRegistry, ResolvedParameter, SharedChain,
};
use crate::settings::{load_config, KeyAction, PanelLayout, SettingsError};

/// Errors raised by control-panel operations
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error(transparent)]
    Effect(#[from] EffectError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("no toggle at index {0}")]
    NoSuchToggle(usize),

    #[error("{toggle} has no slider for `{variable}`")]
    NoSuchParameter { toggle: String, variable: String },
}

/// A request an effect made of the control surface during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    ResetToggles,
    DeactivateAll { ignore: Vec<String> },
    ActivateAll { ignore: Vec<String>, own_type: String },
    Reload,
}

/// Requests collected over one executor pass
#[derive(Debug, Default)]
pub struct ControlRequests {
    requests: Vec<ControlRequest>,
}

impl ControlRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, ControlRequest> {
        self.requests.drain(..)
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl ControlSurface for ControlRequests {
    fn reset_toggles(&mut self) {
        self.requests.push(ControlRequest::ResetToggles);
    }

    fn deactivate_all(&mut self, ignore: &[&str]) {
        self.requests.push(ControlRequest::DeactivateAll { ignore: owned(ignore) });
    }

    fn activate_all(&mut self, ignore: &[&str], own_type: &str) {
        self.requests.push(ControlRequest::ActivateAll {
            ignore: owned(ignore),
            own_type: own_type.to_string(),
        });
    }

    fn reload(&mut self) {
        self.requests.push(ControlRequest::Reload);
    }
}

/// A slider bound to one construction argument
#[derive(Debug, Clone, PartialEq)]
pub struct Slider {
    pub param: ResolvedParameter,
    pub value: f64,
}

impl Slider {
    pub fn label(&self) -> String {
        self.param.label(self.value)
    }
}

/// One button of the panel
#[derive(Debug)]
pub struct Toggle {
    label: String,
    effect_type: String,
    args: EffectArgs,
    overrides: Map<String, Value>,
    default_enabled: bool,
    hotkeys: Vec<(String, KeyAction)>,
    active: Option<EffectId>,
    sliders: Vec<Slider>,
}

impl Toggle {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn effect_type(&self) -> &str {
        &self.effect_type
    }

    pub fn is_enabled(&self) -> bool {
        self.active.is_some()
    }

    /// Chain slot of the live effect, if enabled
    pub fn active(&self) -> Option<EffectId> {
        self.active
    }

    pub fn sliders(&self) -> &[Slider] {
        &self.sliders
    }

    /// Button text: the label, with bound keys underneath
    pub fn caption(&self) -> String {
        if self.hotkeys.is_empty() {
            return self.label.clone();
        }
        let keys: Vec<&str> = self.hotkeys.iter().map(|(k, _)| k.as_str()).collect();
        format!("{}\n({})", self.label, keys.join(" | "))
    }

    fn current_args(&self) -> EffectArgs {
        self.args.merged(&self.overrides)
    }
}

fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

/// Headless control panel driving a [`SharedChain`]
pub struct ControlPanel {
    registry: Arc<EffectRegistry>,
    chain: SharedChain,
    layout: PanelLayout,
    config_dir: Option<PathBuf>,
    toggles: Vec<Toggle>,
    open: Arc<AtomicBool>,
    reset_pending: bool,
}

impl ControlPanel {
    /// Build the panel for `layout`
    ///
    /// Every effect type is checked and every slider resolved before the
    /// chain is touched. Toggles start off; their configured defaults are
    /// applied on the first [`ControlPanel::reset_if_pending`].
    pub fn from_layout(
        layout: PanelLayout,
        registry: Arc<EffectRegistry>,
        chain: SharedChain,
    ) -> Result<Self, ControlError> {
        let toggles = build_toggles(&layout, &registry)?;
        log::info!("Control panel \"{}\": {} toggles", layout.title, toggles.len());
        Ok(Self {
            registry,
            chain,
            layout,
            config_dir: None,
            toggles,
            open: Arc::new(AtomicBool::new(true)),
            reset_pending: true,
        })
    }

    /// Re-read `gui.json` from `dir` on reload
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    /// Effect types this panel can build
    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    pub fn toggles(&self) -> &[Toggle] {
        &self.toggles
    }

    /// Index of the toggle with this label or effect type (case-insensitive)
    pub fn find(&self, name: &str) -> Option<usize> {
        self.toggles
            .iter()
            .position(|t| t.label.eq_ignore_ascii_case(name))
            .or_else(|| {
                self.toggles
                    .iter()
                    .position(|t| t.effect_type.eq_ignore_ascii_case(name))
            })
    }

    fn get_mut(&mut self, index: usize) -> Result<&mut Toggle, ControlError> {
        self.toggles.get_mut(index).ok_or(ControlError::NoSuchToggle(index))
    }

    /// Build the toggle's effect and add it to the chain
    pub fn activate(&mut self, index: usize) -> Result<(), ControlError> {
        let registry = Arc::clone(&self.registry);
        let chain = Arc::clone(&self.chain);
        let toggle = self.get_mut(index)?;
        if toggle.active.is_some() {
            return Ok(());
        }

        let effect = registry.create(&toggle.effect_type, &toggle.current_args())?;
        let id = chain.lock().add(effect);
        log::debug!("Activated {} as {}", toggle.label, id);
        toggle.active = Some(id);
        Ok(())
    }

    /// Remove the toggle's effect from the chain
    pub fn deactivate(&mut self, index: usize) -> Result<(), ControlError> {
        let chain = Arc::clone(&self.chain);
        let toggle = self.get_mut(index)?;
        if let Some(id) = toggle.active.take() {
            chain.lock().remove(id);
            log::debug!("Deactivated {} ({})", toggle.label, id);
        }
        Ok(())
    }

    /// Flip a toggle; returns the new state
    pub fn toggle(&mut self, index: usize) -> Result<bool, ControlError> {
        let enabled = self.get_mut(index)?.is_enabled();
        self.switch_to(index, !enabled)?;
        Ok(!enabled)
    }

    pub fn switch_to(&mut self, index: usize, on: bool) -> Result<(), ControlError> {
        if on {
            self.activate(index)
        } else {
            self.deactivate(index)
        }
    }

    fn switch_logged(&mut self, index: usize, on: bool) {
        if let Err(err) = self.switch_to(index, on) {
            log::warn!("Could not switch {}: {}", self.toggles[index].label, err);
        }
    }

    /// Return every toggle to its configured default
    pub fn reset_toggles(&mut self) {
        for i in 0..self.toggles.len() {
            let target = self.toggles[i].default_enabled;
            if self.toggles[i].is_enabled() != target {
                self.switch_logged(i, target);
            }
        }
    }

    /// Reset toggles once after construction or reload
    pub fn reset_if_pending(&mut self) {
        if std::mem::take(&mut self.reset_pending) {
            self.reset_toggles();
        }
    }

    pub fn deactivate_all(&mut self, ignore: &[&str]) {
        for i in 0..self.toggles.len() {
            if !ignore.contains(&self.toggles[i].effect_type.as_str()) {
                self.switch_logged(i, false);
            }
        }
    }

    /// Switch on everything not ignored; toggles of `own_type` are switched off
    pub fn activate_all(&mut self, ignore: &[&str], own_type: &str) {
        for i in 0..self.toggles.len() {
            let effect_type = self.toggles[i].effect_type.as_str();
            let is_own = effect_type == own_type;
            let ignored = ignore.contains(&effect_type);
            if is_own {
                self.switch_logged(i, false);
            } else if !ignored {
                self.switch_logged(i, true);
            }
        }
    }

    /// Clear the chain and rebuild every toggle from the layout
    ///
    /// With a config directory the layout file is read again; if it fails to
    /// load or build, the previous layout is rebuilt instead.
    pub fn reload(&mut self) -> Result<(), ControlError> {
        self.chain.lock().clear();
        for toggle in &mut self.toggles {
            toggle.active = None;
        }

        let reloaded = match &self.config_dir {
            Some(dir) => load_config::<PanelLayout>(dir, "gui")
                .map_err(ControlError::from)
                .and_then(|layout| Ok((build_toggles(&layout, &self.registry)?, layout))),
            None => build_toggles(&self.layout, &self.registry).map(|t| (t, self.layout.clone())),
        };

        self.reset_pending = true;
        match reloaded {
            Ok((toggles, layout)) => {
                log::info!("Reloaded layout: {} toggles", toggles.len());
                self.toggles = toggles;
                self.layout = layout;
                Ok(())
            }
            Err(err) => {
                self.toggles = build_toggles(&self.layout, &self.registry)?;
                Err(err)
            }
        }
    }

    /// Move a slider and rebuild the live effect with the new value
    ///
    /// The value is clamped to the slider's range and step. A fresh instance
    /// replaces the old one in the same chain slot; returns the applied value.
    pub fn set_parameter(&mut self, index: usize, variable: &str, value: f64) -> Result<f64, ControlError> {
        let registry = Arc::clone(&self.registry);
        let chain = Arc::clone(&self.chain);
        let toggle = self.get_mut(index)?;

        let slider = toggle
            .sliders
            .iter_mut()
            .find(|s| s.param.variable == variable)
            .ok_or_else(|| ControlError::NoSuchParameter {
                toggle: toggle.label.clone(),
                variable: variable.to_string(),
            })?;
        let value = slider.param.clamp(value);
        slider.value = value;
        toggle.overrides.insert(variable.to_string(), number(value));

        if let Some(id) = toggle.active {
            let effect = registry.create(&toggle.effect_type, &toggle.current_args())?;
            let mut chain = chain.lock();
            if !chain.replace(id, effect) {
                let effect = registry.create(&toggle.effect_type, &toggle.current_args())?;
                toggle.active = Some(chain.add(effect));
            }
            log::debug!("{}: {} = {}", toggle.label, variable, value);
        }
        Ok(value)
    }

    /// Dispatch a hotkey; returns whether any toggle is bound to it
    pub fn press(&mut self, key: &str) -> bool {
        let mut bound = Vec::new();
        for (i, toggle) in self.toggles.iter().enumerate() {
            for (k, action) in &toggle.hotkeys {
                if k == key {
                    bound.push((i, *action));
                }
            }
        }

        for &(i, action) in &bound {
            let result = match action {
                KeyAction::Toggle => self.toggle(i).map(|_| ()),
                KeyAction::On => self.activate(i),
                KeyAction::Off => self.deactivate(i),
            };
            if let Err(err) = result {
                log::warn!("Hotkey {key}: {err}");
            }
        }
        !bound.is_empty()
    }

    /// Apply requests queued by effects during a pass
    pub fn apply_requests(&mut self, requests: &mut ControlRequests) {
        for request in requests.drain() {
            log::debug!("Control request: {request:?}");
            match request {
                ControlRequest::ResetToggles => self.reset_toggles(),
                ControlRequest::DeactivateAll { ignore } => {
                    let ignore: Vec<&str> = ignore.iter().map(String::as_str).collect();
                    self.deactivate_all(&ignore);
                }
                ControlRequest::ActivateAll { ignore, own_type } => {
                    let ignore: Vec<&str> = ignore.iter().map(String::as_str).collect();
                    self.activate_all(&ignore, &own_type);
                }
                ControlRequest::Reload => {
                    if let Err(err) = self.reload() {
                        log::error!("Reload failed: {err}");
                    }
                }
            }
        }
    }

    /// Flag the processing loop polls once per tick
    pub fn open_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.open)
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        log::info!("Control panel closed");
        self.open.store(false, Ordering::Release);
    }
}

fn build_toggles(layout: &PanelLayout, registry: &EffectRegistry) -> Result<Vec<Toggle>, ControlError> {
    layout
        .active_buttons()
        .map(|spec| {
            let effect_type = spec.effect_type().unwrap_or_default().to_string();
            let definition = registry
                .get(&effect_type)
                .ok_or_else(|| EffectError::UnknownEffect(effect_type.clone()))?;

            let mut overrides = Map::new();
            let mut sliders = Vec::new();
            let descriptors = definition.parameters();
            if !descriptors.is_empty() {
                let probe = definition.create(&spec.args, registry)?;
                for descriptor in descriptors {
                    let param = descriptor.resolve(probe.as_ref());
                    overrides.insert(param.variable.to_string(), number(param.default));
                    sliders.push(Slider {
                        value: param.default,
                        param,
                    });
                }
            }

            Ok(Toggle {
                label: spec.label().to_string(),
                effect_type,
                args: spec.args.clone(),
                overrides,
                default_enabled: spec.enabled,
                hotkeys: spec.hotkey.as_ref().map(|h| h.bindings()).unwrap_or_default(),
                active: None,
                sliders,
            })
        })
        .collect()
}
