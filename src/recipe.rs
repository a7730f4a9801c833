//! Recipe definitions loaded from YAML
//!
//! ```yaml
//! recipe: det_dark
//! traits: ["band=LM"]
//! shared: [detector]
//! inputs:
//!   - name: raw
//!     kind: multi
//!     title: "{detector} raw darks"
//!     tag: "DARK_{detector}_RAW"
//!     group: raw
//! products:
//!   - name: master_dark
//!     tag: "MASTER_DARK_{detector}"
//! ```
//!
//! `RecipeDef` is the raw YAML shape; `Recipe` is the compiled, self-tested
//! form that binds frame sets and names products.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::binder::{Extensions, InputDecl, InputKind};
use crate::error::BindError;
use crate::frame::{FrameGroup, FrameRecord};
use crate::input_set::{InputSet, InputSetDecl, InputSetDef, DEFAULT_SHARED_KEYS};
use crate::mixin::TraitRegistry;
use crate::template::{placeholders, resolve_final};

/// Key always available to product templates
pub const RECIPE_KEY: &str = "recipe";

/// Recipe definition as written in YAML
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipeDef {
    pub recipe: String,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default = "default_shared")]
    pub shared: Vec<String>,
    pub inputs: Vec<InputEntry>,
    #[serde(default)]
    pub products: Vec<ProductEntry>,
}

fn default_shared() -> Vec<String> {
    DEFAULT_SHARED_KEYS.iter().map(|k| k.to_string()).collect()
}

fn default_true() -> bool {
    true
}

/// One `inputs:` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputEntry {
    pub name: String,
    pub kind: InputKind,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub tag: String,
    #[serde(default)]
    pub group: Option<FrameGroup>,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default)]
    pub extensions: Extensions,
}

/// One `products:` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductEntry {
    pub name: String,
    pub tag: String,
    /// Defaults to `<tag>.fits`
    #[serde(default)]
    pub filename: Option<String>,
}

impl ProductEntry {
    fn templates(&self) -> Vec<&str> {
        let mut templates = vec![self.tag.as_str()];
        if let Some(filename) = &self.filename {
            templates.push(filename);
        }
        templates
    }
}

/// Resolved product name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductName {
    pub name: String,
    pub tag: String,
    pub filename: String,
}

impl RecipeDef {
    pub fn from_yaml(yaml: &str) -> Result<Self, BindError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Build the input set declaration and compile it
    pub fn compile(&self, registry: &TraitRegistry) -> Result<Recipe, BindError> {
        let mut decl = InputSetDecl::new(self.recipe.clone()).shared_keys(self.shared.clone());
        for spec in &self.traits {
            decl = decl.mixin(registry.parse_mixin(spec)?);
        }

        for entry in &self.inputs {
            let mut input = InputDecl::new(entry.name.clone(), entry.kind)
                .tag(entry.tag.clone())
                .required(entry.required);
            if let Some(title) = &entry.title {
                input = input.title(title.clone());
            }
            if let Some(description) = &entry.description {
                input = input.description(description.clone());
            }
            if let Some(group) = entry.group {
                input = input.group(group);
            }
            for spec in &entry.traits {
                input = input.mixin(registry.parse_mixin(spec)?);
            }
            for (name, value) in entry.extensions.iter() {
                input = input.extension(name, value);
            }
            decl = decl.input(input);
        }

        let recipe = Recipe {
            name: self.recipe.clone(),
            inputs: decl.compile(registry)?,
            products: self.products.clone(),
        };
        recipe.self_test()?;
        Ok(recipe)
    }
}

/// Compiled recipe
#[derive(Debug, Clone)]
pub struct Recipe {
    pub name: String,
    pub inputs: InputSetDef,
    pub products: Vec<ProductEntry>,
}

impl Recipe {
    /// Parse, compile and self-test a YAML definition
    pub fn from_yaml(yaml: &str, registry: &TraitRegistry) -> Result<Self, BindError> {
        RecipeDef::from_yaml(yaml)?.compile(registry)
    }

    /// Check every title and product template can be fully resolved
    ///
    /// Input titles may use the input's own captures. Product templates may
    /// use set-level traits, `recipe`, and keys a *required* input fixes or
    /// captures; an optional input can stay unbound, leaving its keys unset.
    pub fn self_test(&self) -> Result<(), BindError> {
        let mut product_keys: Vec<String> = vec![RECIPE_KEY.to_string()];
        product_keys.extend(self.inputs.fixed.keys().map(str::to_string));

        for def in &self.inputs.inputs {
            let mut own_keys: Vec<String> = def.pattern.capture_keys();
            own_keys.extend(def.fixed.keys().map(str::to_string));

            for template in [&def.title, &def.description] {
                check_keys(template, &own_keys)?;
            }
            if def.required {
                product_keys.extend(own_keys);
            }
        }

        for product in &self.products {
            for template in product.templates() {
                check_keys(template, &product_keys)?;
            }
        }

        debug!(recipe = %self.name, inputs = self.inputs.inputs.len(), "recipe self-test passed");
        Ok(())
    }

    /// Instantiate and verify the input set for one run
    pub fn bind(&self, frames: &[Arc<FrameRecord>]) -> Result<InputSet, BindError> {
        let mut set = self.inputs.instantiate(frames);
        set.verify()?;
        Ok(set)
    }

    /// Final product names for a verified input set
    pub fn product_names(&self, set: &InputSet) -> Result<Vec<ProductName>, BindError> {
        if !set.is_verified() {
            return Err(BindError::NotVerified);
        }
        let mut available = set.params();
        if !available.contains_key(RECIPE_KEY) {
            available.insert(RECIPE_KEY, self.name.clone());
        }

        self.products
            .iter()
            .map(|product| {
                let tag = resolve_final(&product.tag, &available)?;
                let filename = match &product.filename {
                    Some(template) => resolve_final(template, &available)?,
                    None => format!("{}.fits", tag),
                };
                Ok(ProductName {
                    name: product.name.clone(),
                    tag,
                    filename,
                })
            })
            .collect()
    }
}

fn check_keys(template: &str, available: &[String]) -> Result<(), BindError> {
    let missing: Vec<String> = placeholders(template)
        .into_iter()
        .filter(|key| !available.contains(key))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(BindError::UnresolvedPlaceholder {
            template: template.to_string(),
            missing,
        })
    }
}
