//! Utility-class rewriting.
//!
//! Authored class strings use theme-neutral color tokens such as
//! `bg-primary` or `text-text`. Before they reach the styling engine those
//! tokens are namespaced with the active theme (`bg-joy-primary`), which the
//! engine resolves through its generated color table (see [`super::styling`]).
//!
//! Token grammar, per whitespace-separated token:
//!
//! ```text
//! token  := prefix "-" role | literal
//! prefix := "bg" | "text" | "border"
//! role   := everything after the first hyphen
//! ```
//!
//! Only tokens whose role is a themed role are rewritten. Everything else
//! (`text-2xl`, `bg-white/20`, `border-2`, `p-4`) passes through untouched.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use super::theme::{ThemeId, ThemeRegistry, THEMED_ROLES};

fn token_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^(bg|text|border)-(.*)$").expect("Invalid class token regex pattern"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// StyleClassString
// ═══════════════════════════════════════════════════════════════════════════════

/// Class string exactly as authored on a component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StyleClassString(String);

impl StyleClassString {
    pub fn new(classes: impl Into<String>) -> Self {
        Self(classes.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.split_whitespace()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens().next().is_none()
    }
}

impl From<&str> for StyleClassString {
    fn from(classes: &str) -> Self {
        Self::new(classes)
    }
}

impl From<String> for StyleClassString {
    fn from(classes: String) -> Self {
        Self(classes)
    }
}

impl fmt::Display for StyleClassString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Rewriter
// ═══════════════════════════════════════════════════════════════════════════════

/// How the rewriter sees a single token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassToken<'a> {
    /// `<prefix>-<role>` with a themed role
    Themed { prefix: &'a str, role: &'a str },
    /// Anything that passes through unchanged
    Literal(&'a str),
}

/// Pure class-string transform keyed by the active theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRewriter {
    roles: BTreeSet<String>,
}

impl ClassRewriter {
    /// Rewriter that themes [`THEMED_ROLES`] plus every role the registry defines
    pub fn new(registry: &ThemeRegistry) -> Self {
        let mut roles: BTreeSet<String> = THEMED_ROLES.iter().map(|role| role.to_string()).collect();
        roles.extend(registry.roles().into_iter().map(str::to_string));
        Self { roles }
    }

    pub fn is_themed_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }

    pub fn classify<'a>(&self, token: &'a str) -> ClassToken<'a> {
        let Some(caps) = token_regex().captures(token) else {
            return ClassToken::Literal(token);
        };
        let (Some(prefix), Some(role)) = (caps.get(1), caps.get(2)) else {
            return ClassToken::Literal(token);
        };
        let role = role.as_str();

        // already namespaced: `bg-joy` or `bg-joy-primary`
        let head = role.split('-').next().unwrap_or(role);
        if head.parse::<ThemeId>().is_ok() {
            return ClassToken::Literal(token);
        }

        if self.is_themed_role(role) {
            ClassToken::Themed {
                prefix: prefix.as_str(),
                role,
            }
        } else {
            ClassToken::Literal(token)
        }
    }

    /// Namespace every themed token of `input` with `theme`.
    ///
    /// Token order is kept; runs of whitespace collapse to single spaces.
    pub fn rewrite(&self, input: &str, theme: ThemeId) -> String {
        input
            .split_whitespace()
            .map(|token| match self.classify(token) {
                ClassToken::Themed { prefix, role } => format!("{}-{}-{}", prefix, theme, role),
                ClassToken::Literal(literal) => literal.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn rewrite_class(&self, classes: &StyleClassString, theme: ThemeId) -> String {
        self.rewrite(classes.as_str(), theme)
    }
}
