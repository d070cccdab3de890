//! Declarative construction arguments
//!
//! Effects are built from JSON arguments that are either a positional list
//! (`[3, 2]`) or a keyed map (`{"pixelisation_k": 3}`). Both forms are kept in
//! one [`EffectArgs`] value; keyed entries win over positional ones, which is
//! what lets a slider override a single parameter of a button's fixed args.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use super::EffectError;

/// Construction arguments for one effect instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectArgs {
    /// Arguments given by position
    pub positional: Vec<Value>,
    /// Arguments given by name (also holds slider overrides)
    pub keyed: Map<String, Value>,
}

/// Helper for deserializing either a list or a map
#[derive(Deserialize)]
#[serde(untagged)]
enum EffectArgsHelper {
    Positional(Vec<Value>),
    Keyed(Map<String, Value>),
    Empty(Option<()>),
}

impl<'de> Deserialize<'de> for EffectArgs {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match EffectArgsHelper::deserialize(deserializer)? {
            EffectArgsHelper::Positional(positional) => Self::positional(positional),
            EffectArgsHelper::Keyed(keyed) => Self::keyed(keyed),
            EffectArgsHelper::Empty(_) => Self::default(),
        })
    }
}

impl EffectArgs {
    /// Arguments given purely by position
    pub fn positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            keyed: Map::new(),
        }
    }

    /// Arguments given purely by name
    pub fn keyed(values: Map<String, Value>) -> Self {
        Self {
            positional: Vec::new(),
            keyed: values,
        }
    }

    /// Builder-style insert of a named argument
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyed.insert(name.into(), value.into());
        self
    }

    /// Copy of these arguments with `overrides` layered on top
    pub fn merged(&self, overrides: &Map<String, Value>) -> Self {
        let mut merged = self.clone();
        for (name, value) in overrides {
            merged.keyed.insert(name.clone(), value.clone());
        }
        merged
    }

    /// Look up an argument by name, falling back to its position.
    /// JSON `null` counts as absent.
    pub fn get(&self, index: usize, name: &str) -> Option<&Value> {
        self.keyed
            .get(name)
            .or_else(|| self.positional.get(index))
            .filter(|v| !v.is_null())
    }

    pub fn required(&self, effect: &str, index: usize, name: &str) -> Result<&Value, EffectError> {
        self.get(index, name)
            .ok_or_else(|| EffectError::missing(effect, name))
    }

    pub fn opt_f64(&self, effect: &str, index: usize, name: &str) -> Result<Option<f64>, EffectError> {
        match self.get(index, name) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| EffectError::invalid(effect, name, format!("expected a number, got {value}"))),
        }
    }

    pub fn f64_or(&self, effect: &str, index: usize, name: &str, default: f64) -> Result<f64, EffectError> {
        Ok(self.opt_f64(effect, index, name)?.unwrap_or(default))
    }

    /// Non-negative integer argument; fractional values are rounded
    pub fn u32_or(&self, effect: &str, index: usize, name: &str, default: u32) -> Result<u32, EffectError> {
        match self.opt_f64(effect, index, name)? {
            None => Ok(default),
            Some(v) if v >= 0.0 && v <= u32::MAX as f64 => Ok(v.round() as u32),
            Some(v) => Err(EffectError::invalid(effect, name, format!("{v} is out of range"))),
        }
    }

    pub fn i64_or(&self, effect: &str, index: usize, name: &str, default: i64) -> Result<i64, EffectError> {
        Ok(self
            .opt_f64(effect, index, name)?
            .map(|v| v.round() as i64)
            .unwrap_or(default))
    }

    /// Boolean argument; numbers are accepted as truthy/falsy
    pub fn bool_or(&self, effect: &str, index: usize, name: &str, default: bool) -> Result<bool, EffectError> {
        match self.get(index, name) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::Number(n)) => Ok(n.as_f64().is_some_and(|v| v != 0.0)),
            Some(other) => Err(EffectError::invalid(effect, name, format!("expected a boolean, got {other}"))),
        }
    }

    pub fn string(&self, effect: &str, index: usize, name: &str) -> Result<String, EffectError> {
        match self.required(effect, index, name)? {
            Value::String(s) => Ok(s.clone()),
            other => Err(EffectError::invalid(effect, name, format!("expected a string, got {other}"))),
        }
    }

    /// Deserialize an argument into any serde type
    pub fn parse<T: serde::de::DeserializeOwned>(
        &self,
        effect: &str,
        index: usize,
        name: &str,
    ) -> Result<T, EffectError> {
        let value = self.required(effect, index, name)?;
        serde_json::from_value(value.clone()).map_err(|e| EffectError::invalid(effect, name, e.to_string()))
    }
}

/// One entry of a declarative effect list: `{"filter": "MirrorX", "args": [...]}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EffectSpec {
    /// Registered effect type name
    #[serde(alias = "effect")]
    pub filter: String,
    /// Construction arguments (list or map)
    #[serde(default)]
    pub args: EffectArgs,
}

impl EffectSpec {
    pub fn new(filter: impl Into<String>, args: EffectArgs) -> Self {
        Self {
            filter: filter.into(),
            args,
        }
    }
}
