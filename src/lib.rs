//! Framebind - frame classification and input binding for data-reduction recipes

pub mod binder;
pub mod error;
pub mod frame;
pub mod input_set;
pub mod mixin;
pub mod params;
pub mod pattern;
pub mod recipe;
pub mod report;
pub mod template;

pub use binder::{
    AmbiguousMatch, BoundInput, Extensions, InputBinder, InputDecl, InputDef, InputKind,
    MultiFrameBinder, SingleFrameBinder,
};
pub use error::{BindError, FixSuggestion};
pub use frame::{frame_set, parse_manifest, FrameGroup, FrameRecord, FrameSet};
pub use input_set::{InputSet, InputSetDecl, InputSetDef};
pub use mixin::{compose, Mixin, TraitFamily, TraitRegistry};
pub use params::ParameterSet;
pub use pattern::TagPattern;
pub use recipe::{ProductName, Recipe, RecipeDef};
pub use report::BindingReport;
pub use template::{resolve_final, try_resolve, Resolution};
