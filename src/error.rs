//! Error types with fix suggestions

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
#[derive(Error, Debug)]
pub enum BindError {
    // ─────────────────────────────────────────────────────────────
    // Binder verification errors (BIND-010 to BIND-011)
    // ─────────────────────────────────────────────────────────────

    #[error("BIND-010: Missing required input '{title}'")]
    MissingRequiredInput { title: String },

    #[error("BIND-011: No input frames found for '{title}'")]
    NoInputFrames { title: String },

    // ─────────────────────────────────────────────────────────────
    // Parameter consistency errors (BIND-020 to BIND-021)
    // ─────────────────────────────────────────────────────────────

    #[error("BIND-020: Multiple values for key '{key}' under single input '{title}': '{first}' vs '{second}'")]
    InconsistentParameterValue {
        key: String,
        title: String,
        first: String,
        second: String,
    },

    #[error("BIND-021: {} across inputs: '{first_input}' has {key}='{first}', '{second_input}' has {key}='{second}'", mismatch_label(.key))]
    CrossInputMismatch {
        key: String,
        first_input: String,
        first: String,
        second_input: String,
        second: String,
    },

    // ─────────────────────────────────────────────────────────────
    // Template errors (BIND-030)
    // ─────────────────────────────────────────────────────────────

    #[error("BIND-030: Unresolved placeholder(s) {} in '{template}'", format_keys(.missing))]
    UnresolvedPlaceholder {
        template: String,
        missing: Vec<String>,
    },

    // ─────────────────────────────────────────────────────────────
    // Definition errors (BIND-040 to BIND-043)
    // ─────────────────────────────────────────────────────────────

    #[error("BIND-040: Invalid definition of '{name}': {reason}")]
    Definition { name: String, reason: String },

    #[error("BIND-041: Invalid tag pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("BIND-042: Unknown trait '{key}={value}'")]
    UnknownTrait { key: String, value: String },

    #[error("BIND-043: Duplicate input '{name}' in input set")]
    DuplicateInput { name: String },

    // ─────────────────────────────────────────────────────────────
    // Input set access errors (BIND-050 to BIND-051)
    // ─────────────────────────────────────────────────────────────

    #[error("BIND-050: Unknown input '{name}'")]
    UnknownInput { name: String },

    #[error("BIND-051: Input set has not been verified")]
    NotVerified,

    // ─────────────────────────────────────────────────────────────
    // Loading errors (BIND-060 to BIND-063)
    // ─────────────────────────────────────────────────────────────

    #[error("BIND-060: Manifest line {line}: {reason}")]
    Manifest { line: usize, reason: String },

    #[error("BIND-061: YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("BIND-062: JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn mismatch_label(key: &str) -> String {
    if key == "detector" {
        "Mismatched detectors".to_string()
    } else {
        format!("Mismatched values for '{}'", key)
    }
}

fn format_keys(keys: &[String]) -> String {
    keys.iter()
        .map(|k| format!("{{{}}}", k))
        .collect::<Vec<_>>()
        .join(", ")
}

impl FixSuggestion for BindError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            BindError::MissingRequiredInput { .. } => {
                Some("Add a frame with a matching tag to the manifest, or mark the input optional")
            }
            BindError::NoInputFrames { .. } => {
                Some("Add at least one frame with a matching tag to the manifest")
            }
            BindError::InconsistentParameterValue { .. } => {
                Some("Split the frames into separate runs so each run sees a single value")
            }
            BindError::CrossInputMismatch { .. } => {
                Some("Use calibration frames taken with the same configuration as the raw frames")
            }
            BindError::UnresolvedPlaceholder { .. } => {
                Some("Declare a trait that fixes the key, or capture it in an input tag pattern")
            }
            BindError::Definition { .. } => Some("Every input needs a name, a title and a tag"),
            BindError::InvalidPattern { .. } => {
                Some("Use {key} placeholders with lowercase keys, each key at most once")
            }
            BindError::UnknownTrait { .. } => {
                Some("Run `framebind traits` to list the registered trait values")
            }
            BindError::DuplicateInput { .. } => Some("Use unique input names in the recipe"),
            BindError::UnknownInput { .. } => Some("Check the input name against the recipe inputs"),
            BindError::NotVerified => Some("Call verify() before reading bound inputs"),
            BindError::Manifest { .. } => Some("Use one '<path> <tag> [group]' record per line"),
            BindError::Yaml(_) => Some("Check YAML syntax: indentation and quoting"),
            BindError::Json(_) => None,
        }
    }
}
