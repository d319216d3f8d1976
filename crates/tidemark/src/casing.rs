//! Bidirectional mapping between logical and physical identifier casing.
//!
//! Declared schemas may be authored with mixed-case ("logical") names while
//! the database stores lower-snake-case ("physical") names. Translation to
//! physical form happens once, when the declared snapshot is built; every
//! differ operates on physical names only. The reverse direction exists
//! solely for user-facing output such as rename prompts.

use serde::{Deserialize, Serialize};

/// Case-conversion rule applied to declared identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CaseRule {
    /// camelCase to snake_case, and back for display.
    #[default]
    Snake,
    /// Plain lowercasing. Not reversible; display uses the physical name.
    Lower,
}

/// Casing translator configuration.
///
/// When disabled (the default), logical and physical names are identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CasingConfig {
    /// Whether translation is applied at all.
    pub enabled: bool,
    /// The conversion rule.
    pub rule: CaseRule,
}

impl CasingConfig {
    /// Creates a disabled configuration (identity mapping).
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Creates an enabled configuration with the given rule.
    #[must_use]
    pub fn enabled(rule: CaseRule) -> Self {
        Self {
            enabled: true,
            rule,
        }
    }

    /// Translates a logical identifier to its physical form.
    #[must_use]
    pub fn to_physical(&self, logical: &str) -> String {
        if !self.enabled {
            return logical.to_string();
        }
        match self.rule {
            CaseRule::Snake => camel_to_snake(logical),
            CaseRule::Lower => logical.to_lowercase(),
        }
    }

    /// Translates a physical identifier back to its logical form.
    ///
    /// Used for display only; diffing never sees logical names.
    #[must_use]
    pub fn to_logical(&self, physical: &str) -> String {
        if !self.enabled {
            return physical.to_string();
        }
        match self.rule {
            CaseRule::Snake => snake_to_camel(physical),
            CaseRule::Lower => physical.to_string(),
        }
    }
}

fn camel_to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_ascii_uppercase() {
            let prev = i.checked_sub(1).map(|j| chars[j]);
            let next = chars.get(i + 1);
            // A word starts after a lowercase/digit, or where an uppercase
            // run ends ("HTTPServer" is "http" + "server", not six words).
            let boundary = prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit())
                || (prev.is_some_and(|p| p.is_ascii_uppercase())
                    && next.is_some_and(|n| n.is_ascii_lowercase()));
            if boundary {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn snake_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.push(ch.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}
