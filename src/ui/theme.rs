use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ThemeError;

/// Theme used until a stored selection has been hydrated.
pub const DEFAULT_THEME: ThemeId = ThemeId::Sorrow;

/// Roles the app styles through utility classes whether or not a palette
/// defines them yet.
pub const THEMED_ROLES: &[&str] = &[
    "primary",
    "background",
    "gradientStart",
    "gradientEnd",
    "text",
    "accent",
    "surface",
];

// ═══════════════════════════════════════════════════════════════════════════════
// Theme identifiers
// ═══════════════════════════════════════════════════════════════════════════════

/// Closed set of mood themes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeId {
    Joy,
    Serenity,
    Tension,
    Sorrow,
    Fury,
    Haze,
}

impl ThemeId {
    pub const COUNT: usize = 6;

    /// Every theme, in mood-picker order.
    pub const ALL: [ThemeId; Self::COUNT] = [
        ThemeId::Joy,
        ThemeId::Serenity,
        ThemeId::Tension,
        ThemeId::Sorrow,
        ThemeId::Fury,
        ThemeId::Haze,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ThemeId::Joy => "joy",
            ThemeId::Serenity => "serenity",
            ThemeId::Tension => "tension",
            ThemeId::Sorrow => "sorrow",
            ThemeId::Fury => "fury",
            ThemeId::Haze => "haze",
        }
    }

    /// Emotion shown on the mood-picker icon that selects this theme
    pub fn emotion(self) -> &'static str {
        match self {
            ThemeId::Joy => "joy",
            ThemeId::Serenity => "calm",
            ThemeId::Tension => "anxiety",
            ThemeId::Sorrow => "sad",
            ThemeId::Fury => "anger",
            ThemeId::Haze => "confusion",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl Default for ThemeId {
    fn default() -> Self {
        DEFAULT_THEME
    }
}

impl fmt::Display for ThemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeId {
    type Err = ThemeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ThemeId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| ThemeError::UnknownTheme(s.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Colors
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid hex color: {0}")]
pub struct ParseColorError(pub String);

/// 24-bit color, written as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HexColor {
    pub const fn from_u32(rgb: u32) -> Self {
        Self {
            r: ((rgb >> 16) & 0xFF) as u8,
            g: ((rgb >> 8) & 0xFF) as u8,
            b: (rgb & 0xFF) as u8,
        }
    }
}

impl FromStr for HexColor {
    type Err = ParseColorError;

    /// Accepts `#RGB` and `#RRGGBB`, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseColorError(s.to_string());
        let digits = s.trim().strip_prefix('#').ok_or_else(err)?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }
        let expanded: String = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 => digits.to_string(),
            _ => return Err(err()),
        };
        let rgb = u32::from_str_radix(&expanded, 16).map_err(|_| err())?;
        Ok(Self::from_u32(rgb))
    }
}

impl TryFrom<String> for HexColor {
    type Error = ParseColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.to_string()
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Palette
// ═══════════════════════════════════════════════════════════════════════════════

/// Concrete colors for the roles one theme defines. Role names are open-ended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Palette {
    roles: BTreeMap<String, HexColor>,
}

impl Palette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: &str, color: HexColor) -> Self {
        self.set(role, color);
        self
    }

    pub fn set(&mut self, role: &str, color: HexColor) {
        self.roles.insert(role.to_string(), color);
    }

    pub fn get(&self, role: &str) -> Option<HexColor> {
        self.roles.get(role).copied()
    }

    pub fn defines(&self, role: &str) -> bool {
        self.roles.contains_key(role)
    }

    pub fn roles(&self) -> impl Iterator<Item = (&str, HexColor)> {
        self.roles.iter().map(|(role, color)| (role.as_str(), *color))
    }

    /// Background gradient endpoints, when both are defined
    pub fn gradient(&self) -> Option<(HexColor, HexColor)> {
        Some((self.get("gradientStart")?, self.get("gradientEnd")?))
    }

    /// Merge `other` on top of this palette. Roles in `other` win.
    pub fn merge(&mut self, other: &Palette) {
        for (role, color) in other.roles() {
            self.set(role, color);
        }
    }
}

fn built_in_palette(id: ThemeId) -> Palette {
    // primary, background, tabBar, tabIcon, gradientStart, gradientEnd, text
    let [primary, background, tab_bar, tab_icon, gradient_start, gradient_end, text] = match id {
        ThemeId::Joy => [0xFFD700, 0xFFF8DC, 0xFFE066, 0xB8860B, 0xFFE27A, 0xFFF1B0, 0xB8860B],
        ThemeId::Serenity => [0x7FDBFF, 0xE0F7FA, 0xB2EBF2, 0x0288D1, 0xA4E1F9, 0xD4F5FA, 0x0288D1],
        ThemeId::Tension => [0xFF6F61, 0xFFF3E0, 0xFFAB91, 0xD84315, 0xFF977D, 0xFFE0BD, 0xD84315],
        ThemeId::Sorrow => [0x5C6BC0, 0xECEFF1, 0xC5CAE9, 0x3F51B5, 0x9FA8DA, 0xE2E6F3, 0x3F51B5],
        ThemeId::Fury => [0xD32F2F, 0xFFEBEE, 0xEF9A9A, 0xB71C1C, 0xF46A6A, 0xFFC1C1, 0xB71C1C],
        ThemeId::Haze => [0x9575CD, 0xF3E5F5, 0xCE93D8, 0x6A1B9A, 0xBFA2E0, 0xECDCF4, 0x6A1B9A],
    };

    Palette::new()
        .with("primary", HexColor::from_u32(primary))
        .with("background", HexColor::from_u32(background))
        .with("tabBar", HexColor::from_u32(tab_bar))
        .with("tabIcon", HexColor::from_u32(tab_icon))
        .with("gradientStart", HexColor::from_u32(gradient_start))
        .with("gradientEnd", HexColor::from_u32(gradient_end))
        .with("text", HexColor::from_u32(text))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════════════

/// Fixed mapping from every [`ThemeId`] to exactly one [`Palette`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeRegistry {
    palettes: [Palette; ThemeId::COUNT],
}

impl Default for ThemeRegistry {
    fn default() -> Self {
        Self::built_in()
    }
}

impl ThemeRegistry {
    /// Registry with the app's bundled palettes
    pub fn built_in() -> Self {
        Self {
            palettes: ThemeId::ALL.map(built_in_palette),
        }
    }

    /// Registry where every theme starts from an empty palette
    pub fn empty() -> Self {
        Self {
            palettes: ThemeId::ALL.map(|_| Palette::new()),
        }
    }

    pub fn list_themes(&self) -> BTreeSet<ThemeId> {
        ThemeId::ALL.into_iter().collect()
    }

    /// Validate a theme name against the registered set.
    pub fn resolve(&self, name: &str) -> Result<ThemeId, ThemeError> {
        name.parse()
    }

    pub fn palette(&self, id: ThemeId) -> &Palette {
        &self.palettes[id.index()]
    }

    pub fn palette_mut(&mut self, id: ThemeId) -> &mut Palette {
        &mut self.palettes[id.index()]
    }

    pub fn palette_by_name(&self, name: &str) -> Result<&Palette, ThemeError> {
        Ok(self.palette(self.resolve(name)?))
    }

    /// True iff at least one palette defines `role`.
    pub fn is_recognized_role(&self, role: &str) -> bool {
        self.palettes.iter().any(|palette| palette.defines(role))
    }

    /// Union of the roles defined by any palette, sorted.
    pub fn roles(&self) -> BTreeSet<&str> {
        self.palettes
            .iter()
            .flat_map(|palette| palette.roles().map(|(role, _)| role))
            .collect()
    }

    /// Registry as a JSON object keyed by theme name
    pub fn to_json(&self) -> String {
        let map: BTreeMap<&str, &Palette> = ThemeId::ALL
            .into_iter()
            .map(|id| (id.as_str(), self.palette(id)))
            .collect();
        serde_json::to_string_pretty(&map).unwrap_or_else(|_| "{}".to_string())
    }
}
