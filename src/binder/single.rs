//! Single-frame binder
//!
//! Walks the frame set in order and keeps the last matching record. Every
//! replaced match is logged at warn level and recorded as an `AmbiguousMatch`;
//! ambiguity alone never fails verification.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{AmbiguousMatch, InputBinder, InputDef};
use crate::error::BindError;
use crate::frame::FrameRecord;
use crate::params::ParameterSet;

/// Binds at most one frame to a named input
#[derive(Debug, Clone)]
pub struct SingleFrameBinder {
    def: Arc<InputDef>,
    frame: Option<Arc<FrameRecord>>,
    params: ParameterSet,
    warnings: Vec<AmbiguousMatch>,
}

impl SingleFrameBinder {
    pub fn bind(def: Arc<InputDef>, frames: &[Arc<FrameRecord>]) -> Self {
        let mut current: Option<(Arc<FrameRecord>, ParameterSet)> = None;
        let mut warnings = Vec::new();

        for record in frames {
            let Some(captured) = def.pattern.match_tag(&record.tag) else {
                debug!(input = %def.name, tag = %record.tag, "tag does not match");
                continue;
            };

            if let Some((previous, _)) = &current {
                warn!(
                    input = %def.name,
                    discarded = %previous.path,
                    kept = %record.path,
                    "ambiguous single-frame input, keeping the last match"
                );
                warnings.push(AmbiguousMatch {
                    input: def.name.clone(),
                    discarded: previous.path.clone(),
                    kept: record.path.clone(),
                });
            }
            debug!(input = %def.name, path = %record.path, tag = %record.tag, "frame matched");
            current = Some((Arc::clone(record), captured));
        }

        let (frame, params) = match current {
            Some((record, captured)) => {
                let mut params = def.fixed.clone();
                params.fill_from(&captured);
                (Some(record), params)
            }
            None => (None, ParameterSet::new()),
        };

        Self {
            def,
            frame,
            params,
            warnings,
        }
    }

    /// The bound frame, if any
    pub fn frame(&self) -> Option<&Arc<FrameRecord>> {
        self.frame.as_ref()
    }

    pub fn warnings(&self) -> &[AmbiguousMatch] {
        &self.warnings
    }
}

impl InputBinder for SingleFrameBinder {
    fn def(&self) -> &InputDef {
        &self.def
    }

    fn verify(&mut self) -> Result<(), BindError> {
        if self.frame.is_none() && self.def.required {
            return Err(BindError::MissingRequiredInput {
                title: self.def.title.clone(),
            });
        }
        Ok(())
    }

    fn params(&self) -> &ParameterSet {
        &self.params
    }

    fn frames(&self) -> Vec<&Arc<FrameRecord>> {
        self.frame.iter().collect()
    }
}
