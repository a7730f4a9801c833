//! Input sets - every named input one recipe run consumes
//!
//! `InputSetDecl` is the declaration (set-level mixins, ordered inputs, shared
//! keys). Compiling it yields an `InputSetDef`, which is instantiated once per
//! run with the full frame collection. Every binder sees the complete,
//! unfiltered collection; overlapping claims are allowed.
//!
//! `InputSet::verify` is fail-fast: binders are verified in declaration
//! order, then shared keys (default `detector`) are checked across binders.

use std::sync::Arc;

use tracing::{info, warn};

use crate::binder::{AmbiguousMatch, BoundInput, InputBinder, InputDecl, InputDef};
use crate::binder::{MultiFrameBinder, SingleFrameBinder};
use crate::error::BindError;
use crate::frame::FrameRecord;
use crate::mixin::{compose, Mixin, TraitRegistry};
use crate::params::ParameterSet;

/// Keys every input set cross-checks unless told otherwise
pub const DEFAULT_SHARED_KEYS: &[&str] = &["detector"];

/// Declaration of an input set
#[derive(Debug, Clone)]
pub struct InputSetDecl {
    name: String,
    mixins: Vec<Mixin>,
    inputs: Vec<InputDecl>,
    shared_keys: Vec<String>,
}

impl InputSetDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mixins: Vec::new(),
            inputs: Vec::new(),
            shared_keys: DEFAULT_SHARED_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Set-level mixin, inherited by every input
    pub fn mixin(mut self, mixin: Mixin) -> Self {
        self.mixins.push(mixin);
        self
    }

    pub fn input(mut self, input: InputDecl) -> Self {
        self.inputs.push(input);
        self
    }

    /// Replace the shared keys
    pub fn shared_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shared_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn compile(&self, registry: &TraitRegistry) -> Result<InputSetDef, BindError> {
        let fixed = compose(&self.mixins);
        registry.validate(&fixed)?;

        let mut inputs: Vec<Arc<InputDef>> = Vec::with_capacity(self.inputs.len());
        for decl in &self.inputs {
            if inputs.iter().any(|def| def.name == decl.name()) {
                return Err(BindError::DuplicateInput {
                    name: decl.name().to_string(),
                });
            }
            inputs.push(Arc::new(decl.compile(&self.mixins, registry)?));
        }

        Ok(InputSetDef {
            name: self.name.clone(),
            fixed,
            inputs,
            shared_keys: self.shared_keys.clone(),
        })
    }
}

/// Compiled input set declaration
#[derive(Debug, Clone)]
pub struct InputSetDef {
    pub name: String,
    /// Parameters fixed by set-level mixins
    pub fixed: ParameterSet,
    pub inputs: Vec<Arc<InputDef>>,
    pub shared_keys: Vec<String>,
}

impl InputSetDef {
    /// Instantiate every binder against the same frame collection
    pub fn instantiate(&self, frames: &[Arc<FrameRecord>]) -> InputSet {
        let binders = self.inputs.iter().map(|def| def.bind(frames)).collect();
        InputSet {
            name: self.name.clone(),
            fixed: self.fixed.clone(),
            binders,
            shared_keys: self.shared_keys.clone(),
            frames: frames.to_vec(),
            verified: false,
        }
    }
}

/// Bound inputs of one recipe run
#[derive(Debug, Clone)]
pub struct InputSet {
    name: String,
    fixed: ParameterSet,
    binders: Vec<BoundInput>,
    shared_keys: Vec<String>,
    frames: Vec<Arc<FrameRecord>>,
    verified: bool,
}

impl InputSet {
    /// Verify each binder in order, then cross-check shared keys
    pub fn verify(&mut self) -> Result<(), BindError> {
        self.verified = false;
        for binder in &mut self.binders {
            binder.verify()?;
        }
        self.check_shared_keys()?;

        for frame in self.unclaimed_frames() {
            warn!(set = %self.name, path = %frame.path, tag = %frame.tag, "frame not claimed by any input");
        }
        info!(
            set = %self.name,
            inputs = self.binders.len(),
            frames = self.frames.len(),
            "input set verified"
        );
        self.verified = true;
        Ok(())
    }

    fn check_shared_keys(&self) -> Result<(), BindError> {
        for key in &self.shared_keys {
            let mut first: Option<(&str, &str)> = None;
            for binder in &self.binders {
                let Some(value) = binder.params().get(key) else {
                    continue;
                };
                match first {
                    None => first = Some((binder.name(), value)),
                    Some((first_input, first_value)) if first_value != value => {
                        return Err(BindError::CrossInputMismatch {
                            key: key.clone(),
                            first_input: first_input.to_string(),
                            first: first_value.to_string(),
                            second_input: binder.name().to_string(),
                            second: value.to_string(),
                        });
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// A verified binder by declared name
    pub fn get(&self, name: &str) -> Result<&BoundInput, BindError> {
        if !self.verified {
            return Err(BindError::NotVerified);
        }
        self.binders
            .iter()
            .find(|b| b.name() == name)
            .ok_or_else(|| BindError::UnknownInput {
                name: name.to_string(),
            })
    }

    /// A verified single-frame binder by name
    pub fn single(&self, name: &str) -> Result<&SingleFrameBinder, BindError> {
        self.get(name)?.as_single().ok_or_else(|| BindError::Definition {
            name: name.to_string(),
            reason: "input is multi-frame, not single-frame".into(),
        })
    }

    /// A verified multi-frame binder by name
    pub fn multi(&self, name: &str) -> Result<&MultiFrameBinder, BindError> {
        self.get(name)?.as_multi().ok_or_else(|| BindError::Definition {
            name: name.to_string(),
            reason: "input is single-frame, not multi-frame".into(),
        })
    }

    /// All binders in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &BoundInput> {
        self.binders.iter()
    }

    /// Binder parameters in declaration order, then set-level traits for
    /// keys no binder supplied. A binder's own parameters already carry its
    /// input-level overrides, so they outrank the set-level values.
    pub fn params(&self) -> ParameterSet {
        let mut params = ParameterSet::new();
        for binder in &self.binders {
            params.fill_from(binder.params());
        }
        params.fill_from(&self.fixed);
        params
    }

    /// Frames no binder matched, in collection order
    pub fn unclaimed_frames(&self) -> Vec<&Arc<FrameRecord>> {
        self.frames
            .iter()
            .filter(|frame| {
                !self
                    .binders
                    .iter()
                    .any(|b| b.def().pattern.is_match(&frame.tag))
            })
            .collect()
    }

    /// Ambiguity warnings from every single-frame binder
    pub fn warnings(&self) -> Vec<&AmbiguousMatch> {
        self.binders.iter().flat_map(|b| b.warnings()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{frame_set, FrameGroup};

    fn dark_set() -> InputSetDef {
        InputSetDecl::new("dark")
            .input(
                InputDecl::multi("raw")
                    .title("raw darks")
                    .tag("DARK_{detector}_RAW")
                    .group(FrameGroup::Raw),
            )
            .input(
                InputDecl::single("linearity")
                    .title("linearity")
                    .tag("LINEARITY_{detector}")
                    .group(FrameGroup::Calib)
                    .optional(),
            )
            .compile(&TraitRegistry::builtin())
            .unwrap()
    }

    #[test]
    fn binds_and_verifies() {
        let frames = frame_set([
            FrameRecord::classified("a.fits", "DARK_2RG_RAW"),
            FrameRecord::classified("b.fits", "DARK_2RG_RAW"),
            FrameRecord::classified("c.fits", "LINEARITY_2RG"),
        ]);
        let mut set = dark_set().instantiate(&frames);
        set.verify().unwrap();

        let raw = set.multi("raw").unwrap();
        assert_eq!(raw.len(), 2);
        let lin = set.single("linearity").unwrap();
        assert_eq!(lin.frame().unwrap().path, "c.fits");
        assert_eq!(set.params().get("detector"), Some("2RG"));
        assert!(set.unclaimed_frames().is_empty());
    }

    #[test]
    fn detector_mismatch_across_inputs() {
        let frames = frame_set([
            FrameRecord::classified("a.fits", "DARK_2RG_RAW"),
            FrameRecord::classified("c.fits", "LINEARITY_GEO"),
        ]);
        let mut set = dark_set().instantiate(&frames);
        let err = set.verify().unwrap_err();
        match &err {
            BindError::CrossInputMismatch {
                key,
                first_input,
                second_input,
                ..
            } => {
                assert_eq!(key, "detector");
                assert_eq!(first_input, "raw");
                assert_eq!(second_input, "linearity");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!set.is_verified());
    }

    #[test]
    fn first_binder_failure_wins() {
        let frames = frame_set([
            FrameRecord::classified("a.fits", "DARK_2RG_RAW"),
            FrameRecord::classified("b.fits", "DARK_GEO_RAW"),
        ]);
        let def = InputSetDecl::new("dark")
            .input(
                InputDecl::multi("raw")
                    .title("raw darks")
                    .tag("DARK_{detector}_RAW")
                    .group(FrameGroup::Raw),
            )
            .input(
                InputDecl::single("bpm")
                    .title("bad pixel map")
                    .tag("BADPIX_MAP_{detector}")
                    .group(FrameGroup::Calib),
            )
            .compile(&TraitRegistry::builtin())
            .unwrap();
        let mut set = def.instantiate(&frames);
        let err = set.verify().unwrap_err();
        assert!(matches!(err, BindError::InconsistentParameterValue { .. }));
    }

    #[test]
    fn access_requires_verification() {
        let set = dark_set().instantiate(&[]);
        assert!(matches!(set.get("raw"), Err(BindError::NotVerified)));
    }

    #[test]
    fn unknown_and_wrong_kind_lookups() {
        let frames = frame_set([FrameRecord::classified("a.fits", "DARK_2RG_RAW")]);
        let mut set = dark_set().instantiate(&frames);
        set.verify().unwrap();
        assert!(matches!(set.get("flat"), Err(BindError::UnknownInput { .. })));
        assert!(set.single("raw").is_err());
        assert!(set.multi("linearity").is_err());
    }

    #[test]
    fn overlapping_binders_share_frames() {
        let def = InputSetDecl::new("overlap")
            .input(
                InputDecl::multi("science")
                    .title("science")
                    .tag("{band}_SCI_RAW")
                    .group(FrameGroup::Raw),
            )
            .input(
                InputDecl::multi("any_raw")
                    .title("any raw")
                    .tag("{band}_{target}_RAW")
                    .group(FrameGroup::Raw),
            )
            .compile(&TraitRegistry::builtin())
            .unwrap();
        let frames = frame_set([
            FrameRecord::classified("s1.fits", "LM_SCI_RAW"),
            FrameRecord::classified("d.fits", "DARK_2RG"),
            FrameRecord::classified("s2.fits", "LM_SCI_RAW"),
        ]);
        let mut set = def.instantiate(&frames);
        set.verify().unwrap();

        let science = set.multi("science").unwrap();
        let any_raw = set.multi("any_raw").unwrap();
        assert_eq!(science.len(), 2);
        assert_eq!(any_raw.len(), 2);
        for (a, b) in science.frames().into_iter().zip(any_raw.frames()) {
            assert!(Arc::ptr_eq(a, b));
        }
        assert_eq!(any_raw.params().get("target"), Some("SCI"));
        assert_eq!(set.unclaimed_frames().len(), 1);
    }

    #[test]
    fn overlapping_binders_with_conflicting_captures_fail() {
        let def = InputSetDecl::new("overlap")
            .input(
                InputDecl::multi("any_raw")
                    .title("any raw")
                    .tag("{band}_{target}_RAW")
                    .group(FrameGroup::Raw),
            )
            .compile(&TraitRegistry::builtin())
            .unwrap();
        let frames = frame_set([
            FrameRecord::classified("s.fits", "LM_SCI_RAW"),
            FrameRecord::classified("k.fits", "LM_SKY_RAW"),
        ]);
        let mut set = def.instantiate(&frames);
        match set.verify().unwrap_err() {
            BindError::InconsistentParameterValue { key, .. } => assert_eq!(key, "target"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_input_names_rejected() {
        let decl = InputSetDecl::new("dup")
            .input(InputDecl::single("a").title("a").tag("A").group(FrameGroup::Raw))
            .input(InputDecl::single("a").title("b").tag("B").group(FrameGroup::Raw));
        let err = decl.compile(&TraitRegistry::builtin()).unwrap_err();
        assert!(matches!(err, BindError::DuplicateInput { .. }));
    }

    #[test]
    fn custom_shared_keys() {
        let def = InputSetDecl::new("bands")
            .shared_keys(["band"])
            .input(
                InputDecl::single("sci")
                    .title("science")
                    .tag("{band}_SCI_RAW")
                    .group(FrameGroup::Raw),
            )
            .input(
                InputDecl::single("std")
                    .title("standard")
                    .tag("{band}_STD_RAW")
                    .group(FrameGroup::Raw),
            )
            .compile(&TraitRegistry::builtin())
            .unwrap();
        let frames = frame_set([
            FrameRecord::classified("s.fits", "LM_SCI_RAW"),
            FrameRecord::classified("t.fits", "N_STD_RAW"),
        ]);
        let mut set = def.instantiate(&frames);
        let err = set.verify().unwrap_err();
        assert!(err.to_string().contains("Mismatched values for 'band'"));
    }

    #[test]
    fn set_mixins_reach_every_input() {
        let def = InputSetDecl::new("lm")
            .mixin(Mixin::fixed("band", "LM"))
            .input(
                InputDecl::multi("sci")
                    .title("{band} science")
                    .tag("{band}_SCI_RAW")
                    .group(FrameGroup::Raw),
            )
            .compile(&TraitRegistry::builtin())
            .unwrap();
        let frames = frame_set([
            FrameRecord::classified("lm.fits", "LM_SCI_RAW"),
            FrameRecord::classified("n.fits", "N_SCI_RAW"),
        ]);
        let mut set = def.instantiate(&frames);
        set.verify().unwrap();
        let sci = set.multi("sci").unwrap();
        assert_eq!(sci.len(), 1);
        assert_eq!(sci.title(), "LM science");
        assert_eq!(set.unclaimed_frames()[0].path, "n.fits");
        assert_eq!(set.params().get("band"), Some("LM"));
    }

    #[test]
    fn input_override_outranks_set_traits_in_params() {
        let def = InputSetDecl::new("lm")
            .mixin(Mixin::fixed("band", "LM"))
            .input(
                InputDecl::multi("sci")
                    .title("{band} science")
                    .tag("{band}_SCI_RAW")
                    .group(FrameGroup::Raw)
                    .mixin(Mixin::fixed("band", "N")),
            )
            .compile(&TraitRegistry::builtin())
            .unwrap();
        let frames = frame_set([FrameRecord::classified("n.fits", "N_SCI_RAW")]);
        let mut set = def.instantiate(&frames);
        set.verify().unwrap();
        assert_eq!(set.multi("sci").unwrap().params().get("band"), Some("N"));
        assert_eq!(set.params().get("band"), Some("N"));
    }

    #[test]
    fn set_traits_fill_params_when_nothing_bound() {
        let def = InputSetDecl::new("lm")
            .mixin(Mixin::fixed("band", "LM"))
            .input(
                InputDecl::multi("sci")
                    .title("science")
                    .tag("{band}_SCI_RAW")
                    .group(FrameGroup::Raw)
                    .optional(),
            )
            .compile(&TraitRegistry::builtin())
            .unwrap();
        let mut set = def.instantiate(&[]);
        set.verify().unwrap();
        assert_eq!(set.params().get("band"), Some("LM"));
    }
}
