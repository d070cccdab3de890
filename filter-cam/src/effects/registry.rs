//! Effect registry for managing available effects
//!
//! The registry holds all registered effect definitions and provides
//! methods to query them and build effect instances by name.

use std::collections::HashMap;
use std::sync::Arc;

use super::args::{EffectArgs, EffectSpec};
use super::builtin::register_builtin_effects;
use super::traits::{Effect, EffectDefinition};
use super::EffectError;

/// Registry of available effects
///
/// Effects are registered at startup and can be queried by type or category.
/// The registry owns the effect definitions and provides factory methods.
pub struct EffectRegistry {
    /// Effect definitions by type identifier
    effects: HashMap<String, Arc<dyn EffectDefinition>>,
    /// Effect types grouped by category
    categories: HashMap<String, Vec<String>>,
    /// Ordered list of categories for display
    category_order: Vec<String>,
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            effects: HashMap::new(),
            categories: HashMap::new(),
            category_order: Vec::new(),
        }
    }

    /// Registry pre-populated with every built-in effect
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        register_builtin_effects(&mut registry);
        registry
    }

    /// Register an effect definition
    pub fn register(&mut self, definition: impl EffectDefinition + 'static) {
        let effect_type = definition.effect_type().to_string();
        let category = definition.category().to_string();

        if !self.categories.contains_key(&category) {
            self.category_order.push(category.clone());
        }
        let members = self.categories.entry(category).or_default();
        if !members.contains(&effect_type) {
            members.push(effect_type.clone());
        }

        self.effects.insert(effect_type, Arc::new(definition));
    }

    /// Get an effect definition by type
    pub fn get(&self, effect_type: &str) -> Option<Arc<dyn EffectDefinition>> {
        self.effects.get(effect_type).cloned()
    }

    /// Check if an effect type is registered
    pub fn contains(&self, effect_type: &str) -> bool {
        self.effects.contains_key(effect_type)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Get all category names in registration order
    pub fn categories(&self) -> &[String] {
        &self.category_order
    }

    /// Get all effect types in a category
    pub fn effects_in_category(&self, category: &str) -> Option<&[String]> {
        self.categories.get(category).map(|v| v.as_slice())
    }

    /// Get the display name for an effect type
    pub fn display_name(&self, effect_type: &str) -> Option<&'static str> {
        self.get(effect_type).map(|def| def.display_name())
    }

    /// Build an effect instance.
    ///
    /// Fails with [`EffectError::UnknownEffect`] before any construction work
    /// if the type is not registered.
    pub fn create(&self, effect_type: &str, args: &EffectArgs) -> Result<Box<dyn Effect>, EffectError> {
        let definition = self
            .get(effect_type)
            .ok_or_else(|| EffectError::UnknownEffect(effect_type.to_string()))?;
        definition.create(args, self)
    }

    /// Build an effect from a declarative entry
    pub fn create_from_spec(&self, spec: &EffectSpec) -> Result<Box<dyn Effect>, EffectError> {
        self.create(&spec.filter, &spec.args)
    }
}
