//! Binder Module - declared inputs and their frame binders
//!
//! - `InputDecl`: builder-style declaration of one named input
//! - `InputDef`: compiled declaration (traits merged, title and tag resolved)
//! - `single`: binds at most one frame (last match wins)
//! - `multi`: binds every matching frame, checks parameter consistency
//!
//! Data flow:
//! ```text
//! InputDecl + inherited mixins ──compile──▶ InputDef
//!                                             │ bind(frames)
//!                                             ▼
//!                               SingleFrameBinder | MultiFrameBinder
//!                                             │ verify()
//!                                             ▼
//!                                  bound frame(s) + ParameterSet
//! ```

mod multi;
mod single;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::BindError;
use crate::frame::{FrameGroup, FrameRecord};
use crate::mixin::{compose, Mixin, TraitRegistry};
use crate::params::ParameterSet;
use crate::pattern::TagPattern;
use crate::template::{is_valid_key, try_resolve};

pub use multi::MultiFrameBinder;
pub use single::SingleFrameBinder;

/// Cardinality of an input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    /// Exactly one frame (or none when optional)
    Single,
    /// Zero or more frames
    Multi,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::Single => write!(f, "single"),
            InputKind::Multi => write!(f, "multi"),
        }
    }
}

/// Named extensions attached to a declaration (string → string)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Extensions(BTreeMap<String, String>);

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Declaration of one named input, before compilation
#[derive(Debug, Clone)]
pub struct InputDecl {
    name: String,
    kind: InputKind,
    title: Option<String>,
    description: String,
    tag: String,
    group: Option<FrameGroup>,
    required: bool,
    mixins: Vec<Mixin>,
    extensions: Extensions,
}

impl InputDecl {
    pub fn new(name: impl Into<String>, kind: InputKind) -> Self {
        Self {
            name: name.into(),
            kind,
            title: None,
            description: String::new(),
            tag: String::new(),
            group: None,
            required: true,
            mixins: Vec::new(),
            extensions: Extensions::new(),
        }
    }

    /// Single-frame input
    pub fn single(name: impl Into<String>) -> Self {
        Self::new(name, InputKind::Single)
    }

    /// Multi-frame input
    pub fn multi(name: impl Into<String>) -> Self {
        Self::new(name, InputKind::Multi)
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Tag template, e.g. `DARK_{detector}_RAW`
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn group(mut self, group: FrameGroup) -> Self {
        self.group = Some(group);
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn optional(self) -> Self {
        self.required(false)
    }

    /// Append a mixin; later mixins override earlier ones
    pub fn mixin(mut self, mixin: Mixin) -> Self {
        self.mixins.push(mixin);
        self
    }

    pub fn extension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extensions.insert(name, value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compile against mixins inherited from the enclosing set
    pub fn compile(
        &self,
        inherited: &[Mixin],
        registry: &TraitRegistry,
    ) -> Result<InputDef, BindError> {
        if !is_valid_key(&self.name) {
            return Err(self.definition_error(
                "name must start with a lowercase letter and contain only a-z, 0-9, _",
            ));
        }
        let title = match self.title.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Err(self.definition_error("no title declared")),
        };
        let Some(frame_group) = self.group else {
            return Err(self.definition_error("no frame group declared"));
        };
        if self.tag.is_empty() {
            return Err(self.definition_error("no tag pattern declared"));
        }

        let mixins: Vec<Mixin> = inherited.iter().chain(&self.mixins).cloned().collect();
        let fixed = compose(&mixins);
        registry.validate(&fixed)?;

        let pattern = TagPattern::from_template(&self.tag, &fixed, registry)?;

        Ok(InputDef {
            name: self.name.clone(),
            kind: self.kind,
            title: try_resolve(title, &fixed).text,
            description: try_resolve(&self.description, &fixed).text,
            frame_group,
            pattern,
            required: self.required,
            fixed,
            extensions: self.extensions.clone(),
        })
    }

    fn definition_error(&self, reason: &str) -> BindError {
        BindError::Definition {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Compiled input declaration shared by its binder
#[derive(Debug, Clone)]
pub struct InputDef {
    pub name: String,
    pub kind: InputKind,
    /// Title with trait-fixed keys substituted
    pub title: String,
    pub description: String,
    pub frame_group: FrameGroup,
    pub pattern: TagPattern,
    pub required: bool,
    /// Parameters fixed by traits
    pub fixed: ParameterSet,
    pub extensions: Extensions,
}

impl InputDef {
    /// Instantiate the binder for this declaration against the full frame set
    pub fn bind(self: &Arc<Self>, frames: &[Arc<FrameRecord>]) -> BoundInput {
        match self.kind {
            InputKind::Single => BoundInput::Single(SingleFrameBinder::bind(Arc::clone(self), frames)),
            InputKind::Multi => BoundInput::Multi(MultiFrameBinder::bind(Arc::clone(self), frames)),
        }
    }

    pub fn extension(&self, name: &str) -> Option<&str> {
        self.extensions.get(name)
    }
}

/// A discarded single-frame match (ambiguous input, kept last)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmbiguousMatch {
    pub input: String,
    pub discarded: String,
    pub kept: String,
}

/// Common binder capability
pub trait InputBinder {
    /// Compiled declaration
    fn def(&self) -> &InputDef;

    /// Check cardinality (and consistency); fails on the first problem
    fn verify(&mut self) -> Result<(), BindError>;

    /// Extracted parameters (complete after a successful verify)
    fn params(&self) -> &ParameterSet;

    /// Bound frames in binding order
    fn frames(&self) -> Vec<&Arc<FrameRecord>>;

    fn name(&self) -> &str {
        &self.def().name
    }

    fn required(&self) -> bool {
        self.def().required
    }

    fn frame_group(&self) -> FrameGroup {
        self.def().frame_group
    }

    fn is_bound(&self) -> bool {
        !self.frames().is_empty()
    }

    /// Title with bound parameters substituted where known
    fn title(&self) -> String {
        try_resolve(&self.def().title, self.params()).text
    }

    fn description(&self) -> String {
        try_resolve(&self.def().description, self.params()).text
    }
}

/// Binder instantiated for one input of an input set
#[derive(Debug, Clone)]
pub enum BoundInput {
    Single(SingleFrameBinder),
    Multi(MultiFrameBinder),
}

impl BoundInput {
    pub fn as_single(&self) -> Option<&SingleFrameBinder> {
        match self {
            BoundInput::Single(b) => Some(b),
            BoundInput::Multi(_) => None,
        }
    }

    pub fn as_multi(&self) -> Option<&MultiFrameBinder> {
        match self {
            BoundInput::Multi(b) => Some(b),
            BoundInput::Single(_) => None,
        }
    }

    /// Ambiguity warnings (single-frame binders only)
    pub fn warnings(&self) -> &[AmbiguousMatch] {
        match self {
            BoundInput::Single(b) => b.warnings(),
            BoundInput::Multi(_) => &[],
        }
    }
}

impl InputBinder for BoundInput {
    fn def(&self) -> &InputDef {
        match self {
            BoundInput::Single(b) => b.def(),
            BoundInput::Multi(b) => b.def(),
        }
    }

    fn verify(&mut self) -> Result<(), BindError> {
        match self {
            BoundInput::Single(b) => b.verify(),
            BoundInput::Multi(b) => b.verify(),
        }
    }

    fn params(&self) -> &ParameterSet {
        match self {
            BoundInput::Single(b) => b.params(),
            BoundInput::Multi(b) => b.params(),
        }
    }

    fn frames(&self) -> Vec<&Arc<FrameRecord>> {
        match self {
            BoundInput::Single(b) => b.frames(),
            BoundInput::Multi(b) => b.frames(),
        }
    }
}
