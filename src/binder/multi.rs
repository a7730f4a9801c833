//! Multi-frame binder
//!
//! Binds every matching frame in collection order and stamps each with the
//! input's declared group. On verify, captured parameters are merged across
//! frames; a key captured with two different values is an error.

use std::sync::Arc;

use tracing::debug;

use super::{InputBinder, InputDef};
use crate::error::BindError;
use crate::frame::FrameRecord;
use crate::params::ParameterSet;

/// Binds zero or more frames to a named input
#[derive(Debug, Clone)]
pub struct MultiFrameBinder {
    def: Arc<InputDef>,
    frames: Vec<Arc<FrameRecord>>,
    /// Capture map of each bound frame, same order as `frames`
    captures: Vec<ParameterSet>,
    params: ParameterSet,
}

impl MultiFrameBinder {
    pub fn bind(def: Arc<InputDef>, frames: &[Arc<FrameRecord>]) -> Self {
        let mut bound = Vec::new();
        let mut captures = Vec::new();

        for record in frames {
            let Some(captured) = def.pattern.match_tag(&record.tag) else {
                debug!(input = %def.name, tag = %record.tag, "tag does not match");
                continue;
            };

            debug!(input = %def.name, path = %record.path, tag = %record.tag, "frame matched");
            let stamped = if record.group == def.frame_group {
                Arc::clone(record)
            } else {
                Arc::new(record.reclassified(def.frame_group))
            };
            bound.push(stamped);
            captures.push(captured);
        }

        Self {
            def,
            frames: bound,
            captures,
            params: ParameterSet::new(),
        }
    }

    /// Capture maps of the bound frames, in binding order
    pub fn captures(&self) -> &[ParameterSet] {
        &self.captures
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn merge_captures(&self) -> Result<ParameterSet, BindError> {
        let mut merged = ParameterSet::new();
        for captured in &self.captures {
            for (key, value) in captured.iter() {
                match merged.get(key) {
                    Some(first) if first != value => {
                        return Err(BindError::InconsistentParameterValue {
                            key: key.to_string(),
                            title: self.def.title.clone(),
                            first: first.to_string(),
                            second: value.to_string(),
                        });
                    }
                    Some(_) => {}
                    None => merged.insert(key, value),
                }
            }
        }
        Ok(merged)
    }
}

impl InputBinder for MultiFrameBinder {
    fn def(&self) -> &InputDef {
        &self.def
    }

    fn verify(&mut self) -> Result<(), BindError> {
        if self.frames.is_empty() {
            if self.def.required {
                return Err(BindError::NoInputFrames {
                    title: self.def.title.clone(),
                });
            }
            self.params = ParameterSet::new();
            return Ok(());
        }

        let merged = self.merge_captures()?;
        let mut params = self.def.fixed.clone();
        params.fill_from(&merged);
        self.params = params;
        Ok(())
    }

    fn params(&self) -> &ParameterSet {
        &self.params
    }

    fn frames(&self) -> Vec<&Arc<FrameRecord>> {
        self.frames.iter().collect()
    }
}
