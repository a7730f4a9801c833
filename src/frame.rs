//! Frame records and set-of-frames manifests
//!
//! Manifest format, one record per line:
//! ```text
//! # path                 tag               [group]
//! raw/dark_001.fits      DARK_2RG_RAW
//! calib/lin_2rg.fits     LINEARITY_2RG     CALIB
//! ```
//! When the group column is absent the group is classified from the tag.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BindError;

/// Frame group classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameGroup {
    Raw,
    Calib,
    Product,
}

impl FrameGroup {
    /// Default classification of a tag without an explicit group
    pub fn classify(tag: &str) -> Self {
        if tag.ends_with("_RAW") {
            FrameGroup::Raw
        } else {
            FrameGroup::Calib
        }
    }
}

impl fmt::Display for FrameGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameGroup::Raw => write!(f, "RAW"),
            FrameGroup::Calib => write!(f, "CALIB"),
            FrameGroup::Product => write!(f, "PRODUCT"),
        }
    }
}

impl FromStr for FrameGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RAW" => Ok(FrameGroup::Raw),
            "CALIB" => Ok(FrameGroup::Calib),
            "PRODUCT" => Ok(FrameGroup::Product),
            other => Err(format!("unknown frame group '{}'", other)),
        }
    }
}

/// One input frame: file reference, tag and group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameRecord {
    pub path: String,
    pub tag: String,
    pub group: FrameGroup,
    /// Opaque metadata carried through untouched
    #[serde(skip_serializing_if = "Value::is_null")]
    pub extra_metadata: Value,
}

impl FrameRecord {
    pub fn new(path: impl Into<String>, tag: impl Into<String>, group: FrameGroup) -> Self {
        Self {
            path: path.into(),
            tag: tag.into(),
            group,
            extra_metadata: Value::Null,
        }
    }

    /// Record with its group classified from the tag
    pub fn classified(path: impl Into<String>, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let group = FrameGroup::classify(&tag);
        Self::new(path, tag, group)
    }

    /// Copy of this record stamped with another group
    pub fn reclassified(&self, group: FrameGroup) -> Self {
        Self {
            group,
            ..self.clone()
        }
    }
}

/// Shared, read-only frame collection handed to binders
pub type FrameSet = Vec<Arc<FrameRecord>>;

/// Wrap plain records for binding
pub fn frame_set(records: impl IntoIterator<Item = FrameRecord>) -> FrameSet {
    records.into_iter().map(Arc::new).collect()
}

/// Parse a set-of-frames manifest
pub fn parse_manifest(text: &str) -> Result<FrameSet, BindError> {
    let mut frames = FrameSet::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let record = match fields.as_slice() {
            [path, tag] => FrameRecord::classified(*path, *tag),
            [path, tag, group] => {
                let group = group.parse::<FrameGroup>().map_err(|reason| BindError::Manifest {
                    line: idx + 1,
                    reason,
                })?;
                FrameRecord::new(*path, *tag, group)
            }
            _ => {
                return Err(BindError::Manifest {
                    line: idx + 1,
                    reason: format!("expected '<path> <tag> [group]', got {} fields", fields.len()),
                })
            }
        };
        frames.push(Arc::new(record));
    }

    Ok(frames)
}
