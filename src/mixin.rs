//! Trait composition - band, target, detector and source mixins
//!
//! A `Mixin` is a small value object fixing one or more parameter keys
//! (`band=LM`, `detector=2RG`). Concrete input declarations are composed from
//! an ordered list of mixins, most general first; `compose` merges them with
//! the mixin closest to the leaf winning.
//!
//! `TraitRegistry` maps each key to its trait family (the set of known values).
//! It is an explicit value: build one, pass it around, `clear()` it in tests.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::BindError;
use crate::params::ParameterSet;
use crate::template::is_valid_key;

/// A composable unit fixing named parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mixin {
    /// Trait family the mixin belongs to (`band`, `detector`, ...)
    family: String,
    name: String,
    fixed: ParameterSet,
}

impl Mixin {
    /// Mixin fixing a single key, named `key=value`
    pub fn fixed(key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        let name = format!("{}={}", key, value);
        let mut fixed = ParameterSet::new();
        fixed.insert(key.clone(), value);
        Self {
            family: key,
            name,
            fixed,
        }
    }

    /// Mixin of `family` fixing several keys at once
    pub fn with_params(
        family: impl Into<String>,
        name: impl Into<String>,
        fixed: ParameterSet,
    ) -> Self {
        Self {
            family: family.into(),
            name: name.into(),
            fixed,
        }
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &ParameterSet {
        &self.fixed
    }
}

impl fmt::Display for Mixin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Merge mixins in declaration order; later mixins override earlier ones
pub fn compose(mixins: &[Mixin]) -> ParameterSet {
    mixins.iter().fold(ParameterSet::new(), |mut acc, mixin| {
        acc.override_with(&mixin.fixed);
        acc
    })
}

/// All known values of one parameter key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraitFamily {
    pub key: String,
    pub values: Vec<String>,
}

impl TraitFamily {
    pub fn new<I, S>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

/// Keyword → trait family registry
#[derive(Debug, Clone, Default)]
pub struct TraitRegistry {
    families: BTreeMap<String, TraitFamily>,
}

impl TraitRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the standard instrument families
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(TraitFamily::new("band", ["LM", "N", "IFU"]));
        registry.register(TraitFamily::new("target", ["SCI", "STD", "SKY"]));
        registry.register(TraitFamily::new("detector", ["2RG", "GEO", "IFU"]));
        registry.register(TraitFamily::new("source", ["LAMP", "TWILIGHT", "PINHOLE"]));
        registry
    }

    /// Register (or extend) a family; values already known are not duplicated
    pub fn register(&mut self, family: TraitFamily) {
        match self.families.get_mut(&family.key) {
            Some(existing) => {
                for value in family.values {
                    if !existing.contains(&value) {
                        existing.values.push(value);
                    }
                }
            }
            None => {
                self.families.insert(family.key.clone(), family);
            }
        }
    }

    pub fn family(&self, key: &str) -> Option<&TraitFamily> {
        self.families.get(key)
    }

    pub fn families(&self) -> impl Iterator<Item = &TraitFamily> {
        self.families.values()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Drop every registered family
    pub fn clear(&mut self) {
        self.families.clear();
    }

    /// Build a mixin for a registered key/value pair
    pub fn mixin(&self, key: &str, value: &str) -> Result<Mixin, BindError> {
        match self.families.get(key) {
            Some(family) if family.contains(value) => Ok(Mixin::fixed(key, value)),
            _ => Err(BindError::UnknownTrait {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }

    /// Parse `key=value` into a validated mixin
    pub fn parse_mixin(&self, spec: &str) -> Result<Mixin, BindError> {
        let Some((key, value)) = spec.split_once('=') else {
            return Err(BindError::Definition {
                name: spec.to_string(),
                reason: "trait must be written as key=value".into(),
            });
        };
        let (key, value) = (key.trim(), value.trim());
        if !is_valid_key(key) || value.is_empty() {
            return Err(BindError::Definition {
                name: spec.to_string(),
                reason: "trait must be written as key=value".into(),
            });
        }
        self.mixin(key, value)
    }

    /// Check every value of a registered key is a known member of its family
    pub fn validate(&self, params: &ParameterSet) -> Result<(), BindError> {
        for (key, value) in params.iter() {
            if let Some(family) = self.families.get(key) {
                if !family.contains(value) {
                    return Err(BindError::UnknownTrait {
                        key: key.to_string(),
                        value: value.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_mixin_overrides_root() {
        let composed = compose(&[Mixin::fixed("band", "LM"), Mixin::fixed("band", "N")]);
        assert_eq!(composed.get("band"), Some("N"));
    }

    #[test]
    fn compose_unions_distinct_keys() {
        let composed = compose(&[Mixin::fixed("band", "LM"), Mixin::fixed("target", "SCI")]);
        assert_eq!(composed.get("band"), Some("LM"));
        assert_eq!(composed.get("target"), Some("SCI"));
        assert_eq!(composed.len(), 2);
    }

    #[test]
    fn multi_key_mixin_keeps_its_family() {
        let fixed: ParameterSet = [("source", "LAMP"), ("target", "STD")].into_iter().collect();
        let lamp = Mixin::with_params("source", "lamp_standard", fixed);
        assert_eq!(lamp.family(), "source");
        assert_eq!(lamp.to_string(), "lamp_standard");

        let composed = compose(&[lamp, Mixin::fixed("target", "SCI")]);
        assert_eq!(composed.get("source"), Some("LAMP"));
        assert_eq!(composed.get("target"), Some("SCI"));
    }

    #[test]
    fn compose_empty_is_empty() {
        assert!(compose(&[]).is_empty());
    }

    #[test]
    fn builtin_registry_knows_detectors() {
        let registry = TraitRegistry::builtin();
        let family = registry.family("detector").unwrap();
        assert!(family.contains("2RG"));
        assert!(family.contains("GEO"));
        assert!(!family.contains("XYZ"));
    }

    #[test]
    fn parse_mixin_validates_value() {
        let registry = TraitRegistry::builtin();
        let mixin = registry.parse_mixin("band=LM").unwrap();
        assert_eq!(mixin.name(), "band=LM");
        assert_eq!(mixin.family(), "band");
        assert_eq!(mixin.params().get("band"), Some("LM"));

        let err = registry.parse_mixin("band=XX").unwrap_err();
        assert!(err.to_string().contains("BIND-042"));

        let err = registry.parse_mixin("band").unwrap_err();
        assert!(err.to_string().contains("BIND-040"));
    }

    #[test]
    fn register_extends_existing_family() {
        let mut registry = TraitRegistry::builtin();
        registry.register(TraitFamily::new("detector", ["2RG", "HAWAII"]));
        let family = registry.family("detector").unwrap();
        assert_eq!(family.values, vec!["2RG", "GEO", "IFU", "HAWAII"]);
    }

    #[test]
    fn clear_resets_registry() {
        let mut registry = TraitRegistry::builtin();
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.mixin("band", "LM").is_err());
    }

    #[test]
    fn validate_ignores_unregistered_keys() {
        let registry = TraitRegistry::builtin();
        let params: ParameterSet = [("detector", "GEO"), ("exptime", "10")].into_iter().collect();
        assert!(registry.validate(&params).is_ok());

        let bad: ParameterSet = [("detector", "CCD")].into_iter().collect();
        assert!(registry.validate(&bad).is_err());
    }
}
