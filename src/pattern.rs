//! Tag patterns - full-match rules over frame tags
//!
//! A pattern is written as a template: `DARK_{detector}_RAW`. Placeholders
//! already fixed by the declaration's traits become literal text; the rest
//! compile to named capture groups. Registered trait keys capture only their
//! known values (`(?P<detector>2RG|GEO|IFU)`), other keys capture one
//! underscore-free token.
//!
//! Matching is always anchored to the whole tag.

use std::fmt;

use regex::Regex;

use crate::error::BindError;
use crate::mixin::TraitRegistry;
use crate::params::ParameterSet;
use crate::template::{try_resolve, Token, TEMPLATE_RESOLVER};

/// Capture used for keys without a registered trait family
const GENERIC_CAPTURE: &str = "[A-Za-z0-9]+";

/// Compiled tag matching rule
#[derive(Debug, Clone)]
pub struct TagPattern {
    /// Template (or raw regex) after fixed-parameter substitution
    source: String,
    regex: Regex,
}

impl TagPattern {
    /// Compile a template, substituting `fixed` parameters first
    pub fn from_template(
        template: &str,
        fixed: &ParameterSet,
        registry: &TraitRegistry,
    ) -> Result<Self, BindError> {
        let source = try_resolve(template, fixed).text;
        let tokens = TEMPLATE_RESOLVER.tokenize(&source);

        let mut body = String::with_capacity(source.len() * 2);
        let mut seen: Vec<&str> = Vec::new();

        for token in tokens.iter() {
            match token {
                Token::Literal(range) => {
                    let text = &source[range.clone()];
                    if text.contains(['{', '}']) {
                        return Err(BindError::InvalidPattern {
                            pattern: template.to_string(),
                            reason: "stray brace (use {{ or }} for a literal brace)".into(),
                        });
                    }
                    body.push_str(&regex::escape(text));
                }
                Token::Brace(c) => body.push_str(&regex::escape(&c.to_string())),
                Token::Placeholder(key) => {
                    if seen.contains(&key.as_str()) {
                        return Err(BindError::InvalidPattern {
                            pattern: template.to_string(),
                            reason: format!("placeholder {{{}}} appears more than once", key),
                        });
                    }
                    seen.push(key);
                    body.push_str(&capture_group(key, registry));
                }
            }
        }

        let regex = compile_anchored(&body, template)?;
        Ok(Self { source, regex })
    }

    /// Compile a raw regex with named captures; still anchored
    pub fn from_regex(pattern: &str) -> Result<Self, BindError> {
        let regex = compile_anchored(pattern, pattern)?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Match a whole tag, returning the named captures
    pub fn match_tag(&self, tag: &str) -> Option<ParameterSet> {
        let caps = self.regex.captures(tag)?;
        let mut params = ParameterSet::new();
        for name in self.regex.capture_names().flatten() {
            if let Some(m) = caps.name(name) {
                params.insert(name, m.as_str());
            }
        }
        Some(params)
    }

    pub fn is_match(&self, tag: &str) -> bool {
        self.regex.is_match(tag)
    }

    /// Named capture keys, in pattern order
    pub fn capture_keys(&self) -> Vec<String> {
        self.regex.capture_names().flatten().map(str::to_string).collect()
    }

    /// True when the pattern captures nothing
    pub fn is_literal(&self) -> bool {
        self.regex.capture_names().flatten().next().is_none()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for TagPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn capture_group(key: &str, registry: &TraitRegistry) -> String {
    match registry.family(key) {
        Some(family) if !family.values.is_empty() => {
            let alternatives: Vec<String> =
                family.values.iter().map(|v| regex::escape(v)).collect();
            format!("(?P<{}>{})", key, alternatives.join("|"))
        }
        _ => format!("(?P<{}>{})", key, GENERIC_CAPTURE),
    }
}

fn compile_anchored(body: &str, pattern: &str) -> Result<Regex, BindError> {
    Regex::new(&format!("^(?:{})$", body)).map_err(|e| BindError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}
