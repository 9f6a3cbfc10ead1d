//! Data the styling engine is generated from.
//!
//! The engine resolves `<prefix>-<theme>-<role>` tokens through a color table
//! built from the registry. Regenerate it whenever a theme or role changes.

use std::collections::BTreeMap;

use serde::Serialize;

use super::class_names::ClassRewriter;
use super::theme::{ThemeId, ThemeRegistry};

/// Color table plus the safelist pattern, as handed to the styling engine build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StylingTable {
    pub colors: BTreeMap<String, String>,
    pub safelist: String,
    /// Safelisted tokens without a color entry
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<String>,
}

impl StylingTable {
    pub fn generate(registry: &ThemeRegistry, rewriter: &ClassRewriter) -> Self {
        Self {
            colors: color_table(registry),
            safelist: safelist_pattern(rewriter),
            unresolved: unresolved_tokens(registry, rewriter),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// One `"<theme>-<role>" -> "#RRGGBB"` entry per role each palette defines.
pub fn color_table(registry: &ThemeRegistry) -> BTreeMap<String, String> {
    let mut table = BTreeMap::new();
    for theme in ThemeId::ALL {
        for (role, color) in registry.palette(theme).roles() {
            table.insert(format!("{}-{}", theme, role), color.to_string());
        }
    }
    table
}

/// Regex source matching every token the rewriter can emit.
pub fn safelist_pattern(rewriter: &ClassRewriter) -> String {
    let themes: Vec<&str> = ThemeId::ALL.iter().map(|id| id.as_str()).collect();
    let roles: Vec<&str> = rewriter.roles().collect();
    format!("(bg|text|border)-({})-({})", themes.join("|"), roles.join("|"))
}

/// Tokens the rewriter may emit that have no color in the table.
/// These render unstyled until a palette defines the role.
pub fn unresolved_tokens(registry: &ThemeRegistry, rewriter: &ClassRewriter) -> Vec<String> {
    let mut missing = Vec::new();
    for theme in ThemeId::ALL {
        let palette = registry.palette(theme);
        for role in rewriter.roles() {
            if !palette.defines(role) {
                missing.push(format!("{}-{}", theme, role));
            }
        }
    }
    missing
}
