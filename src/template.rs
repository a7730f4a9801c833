//! Two-phase `{key}` template resolver with caching
//!
//! Templates such as `{band}_{target}_BKG_SUBTRACTED` are resolved in stages:
//! - `try_resolve`: substitutes known keys, leaves unknown `{key}` tokens intact
//!   so a more specific declaration can fill them later
//! - `resolve_final`: used for end-user output (filenames, product tags); any
//!   remaining placeholder is a definition error
//!
//! `{{` and `}}` escape literal braces. Text in braces that is not a valid key
//! (`{2,3}`, `{ }`) is kept as literal text.
//!
//! Tokenized templates are cached and shared via Arc.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;
use std::sync::Arc;

use crate::error::BindError;
use crate::params::ParameterSet;

/// Valid placeholder keys: `band`, `detector`, `source_id`
static KEY_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").unwrap());

/// Check whether `key` is a valid placeholder key
pub fn is_valid_key(key: &str) -> bool {
    KEY_PATTERN.is_match(key)
}

/// Token representing a parsed template fragment
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Literal text (stores range in original string)
    Literal(Range<usize>),
    /// Escaped brace: `{{` or `}}`
    Brace(char),
    /// Placeholder: `{key}`
    Placeholder(String),
}

/// Outcome of a partial resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Template text with every known key substituted
    pub text: String,
    /// Keys still unresolved, in order of first appearance
    pub missing: Vec<String>,
}

impl Resolution {
    /// True when no placeholder is left
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Template resolver with caching
pub struct TemplateResolver {
    /// Cache of parsed templates
    cache: DashMap<String, Arc<Vec<Token>>>,
}

impl Default for TemplateResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateResolver {
    /// Create a new template resolver
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// Parse template into tokens (with caching)
    pub fn tokenize(&self, template: &str) -> Arc<Vec<Token>> {
        if let Some(cached) = self.cache.get(template) {
            return Arc::clone(&cached);
        }

        let mut tokens = Vec::new();
        let mut chars = template.char_indices().peekable();
        let mut literal_start = 0;

        while let Some((i, ch)) = chars.next() {
            match ch {
                '{' | '}' if chars.peek().map(|(_, c)| *c) == Some(ch) => {
                    if i > literal_start {
                        tokens.push(Token::Literal(literal_start..i));
                    }
                    chars.next(); // consume second brace
                    tokens.push(Token::Brace(ch));
                    literal_start = i + 2;
                }
                '{' => {
                    let Some(close) = template[i + 1..].find('}') else {
                        continue;
                    };
                    let key = &template[i + 1..i + 1 + close];
                    if !is_valid_key(key) {
                        continue;
                    }
                    if i > literal_start {
                        tokens.push(Token::Literal(literal_start..i));
                    }
                    tokens.push(Token::Placeholder(key.to_string()));
                    let end = i + close + 2;
                    while chars.peek().is_some_and(|(j, _)| *j < end) {
                        chars.next();
                    }
                    literal_start = end;
                }
                _ => {} // Part of literal
            }
        }

        if literal_start < template.len() {
            tokens.push(Token::Literal(literal_start..template.len()));
        }

        let tokens = Arc::new(tokens);
        self.cache.insert(template.to_string(), tokens.clone());
        tokens
    }

    /// Substitute known keys, keep unknown placeholders (and brace escapes)
    pub fn try_resolve(&self, template: &str, available: &ParameterSet) -> Resolution {
        let tokens = self.tokenize(template);
        let mut text = String::with_capacity(template.len());
        let mut missing: Vec<String> = Vec::new();

        for token in tokens.iter() {
            match token {
                Token::Literal(range) => text.push_str(&template[range.clone()]),
                Token::Brace(c) => {
                    text.push(*c);
                    text.push(*c);
                }
                Token::Placeholder(key) => match available.get(key) {
                    Some(value) => text.push_str(value),
                    None => {
                        text.push('{');
                        text.push_str(key);
                        text.push('}');
                        if !missing.contains(key) {
                            missing.push(key.clone());
                        }
                    }
                },
            }
        }

        Resolution { text, missing }
    }

    /// Resolve completely, failing on any leftover placeholder
    pub fn resolve_final(
        &self,
        template: &str,
        available: &ParameterSet,
    ) -> Result<String, BindError> {
        let tokens = self.tokenize(template);
        let mut text = String::with_capacity(template.len());
        let mut missing: Vec<String> = Vec::new();

        for token in tokens.iter() {
            match token {
                Token::Literal(range) => text.push_str(&template[range.clone()]),
                Token::Brace(c) => text.push(*c),
                Token::Placeholder(key) => match available.get(key) {
                    Some(value) => text.push_str(value),
                    None if !missing.contains(key) => missing.push(key.clone()),
                    None => {}
                },
            }
        }

        if missing.is_empty() {
            Ok(text)
        } else {
            Err(BindError::UnresolvedPlaceholder {
                template: template.to_string(),
                missing,
            })
        }
    }

    /// Placeholder keys in order of first appearance
    pub fn placeholders(&self, template: &str) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for token in self.tokenize(template).iter() {
            if let Token::Placeholder(key) = token {
                if !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
        }
        keys
    }
}

/// Global template resolver instance
pub static TEMPLATE_RESOLVER: Lazy<TemplateResolver> = Lazy::new(TemplateResolver::new);

/// Partially resolve `template` against `available`
pub fn try_resolve(template: &str, available: &ParameterSet) -> Resolution {
    TEMPLATE_RESOLVER.try_resolve(template, available)
}

/// Fully resolve `template`; leftover placeholders are an error
pub fn resolve_final(template: &str, available: &ParameterSet) -> Result<String, BindError> {
    TEMPLATE_RESOLVER.resolve_final(template, available)
}

/// Placeholder keys of `template`
pub fn placeholders(template: &str) -> Vec<String> {
    TEMPLATE_RESOLVER.placeholders(template)
}
