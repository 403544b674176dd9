//! Template placeholder resolver
//!
//! Templates use `$name` and `${name}` placeholders with `$$` for a literal
//! dollar sign. Values come from three merged layers: built-in defaults, the
//! ambient execution context, then explicit overrides. Substitution is plain
//! text replacement; a placeholder with no value is an error.

use crate::{ConfigError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"\$(?:(?P<escaped>\$)|(?P<named>[_a-zA-Z][_a-zA-Z0-9]*)|\{(?P<braced>[_a-zA-Z][_a-zA-Z0-9]*)\}|(?P<invalid>))",
        )
        .expect("placeholder pattern is valid")
    })
}

/// Values available to a template
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionContext {
    params: HashMap<String, String>,
}

impl ResolutionContext {
    /// Create an empty resolution context
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the three layers; later layers win (`overrides > context > defaults`)
    pub fn layered(
        defaults: &HashMap<String, String>,
        context: &HashMap<String, String>,
        overrides: &HashMap<String, String>,
    ) -> Self {
        let mut params = HashMap::with_capacity(defaults.len() + context.len() + overrides.len());
        for layer in [defaults, context, overrides] {
            for (key, value) in layer {
                params.insert(key.clone(), value.clone());
            }
        }
        Self { params }
    }

    /// Add or update a value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// Look up a value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Replace every placeholder in `template` with its value from `context`
pub fn substitute(template: &str, context: &ResolutionContext) -> Result<String> {
    let mut result = String::with_capacity(template.len());
    let mut missing = Vec::new();
    let mut last = 0;

    for cap in placeholder_pattern().captures_iter(template) {
        let Some(whole) = cap.get(0) else { continue };
        result.push_str(&template[last..whole.start()]);
        last = whole.end();

        if cap.name("escaped").is_some() {
            result.push('$');
            continue;
        }

        let name = match cap.name("named").or_else(|| cap.name("braced")) {
            Some(name) => name.as_str(),
            None => {
                let text: String = template[whole.start()..].chars().take(12).collect();
                return Err(ConfigError::InvalidPlaceholder {
                    offset: whole.start(),
                    text,
                });
            }
        };

        match context.get(name) {
            Some(value) => result.push_str(value),
            None => {
                if !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
            }
        }
    }
    result.push_str(&template[last..]);

    if !missing.is_empty() {
        return Err(ConfigError::MissingParameter(missing.join(", ")));
    }
    Ok(result)
}
