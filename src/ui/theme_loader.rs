use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use super::theme::{HexColor, Palette, ThemeId, ThemeRegistry};
use crate::error::ThemeError;

// ═══════════════════════════════════════════════════════════════════════════════
// Override files: <themes_dir>/<theme>.json
//
// {
//   "roles": { "accent": "#FFB300", "surface": "#FFFDF5" }
// }
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct PaletteOverrideJson {
    #[serde(default)]
    roles: BTreeMap<String, String>,
}

/// Parse one override file body into a palette fragment.
pub fn parse_palette_override(theme: ThemeId, json: &str) -> Result<Palette, ThemeError> {
    let parsed: PaletteOverrideJson =
        serde_json::from_str(json).map_err(|e| ThemeError::MalformedOverride {
            theme: theme.to_string(),
            message: e.to_string(),
        })?;

    let mut palette = Palette::new();
    for (role, value) in parsed.roles {
        if role.is_empty() {
            continue;
        }
        let color: HexColor = value.parse().map_err(|_| ThemeError::InvalidColor {
            role: role.clone(),
            value: value.clone(),
        })?;
        palette.set(&role, color);
    }
    Ok(palette)
}

/// Apply every valid override file in `dir` to `registry`.
/// Returns the number of themes that were changed.
pub fn apply_overrides(registry: &mut ThemeRegistry, dir: &Path) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "no theme overrides");
            return 0;
        }
    };

    let mut applied = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let theme = match registry.resolve(stem) {
            Ok(theme) => theme,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping override for unregistered theme");
                continue;
            }
        };

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "failed to read theme override");
                continue;
            }
        };

        match parse_palette_override(theme, &content) {
            Ok(fragment) => {
                registry.palette_mut(theme).merge(&fragment);
                debug!(%theme, roles = fragment.roles().count(), "applied theme override");
                applied += 1;
            }
            Err(e) => warn!(file = %path.display(), error = %e, "ignoring invalid theme override"),
        }
    }
    applied
}

impl ThemeRegistry {
    /// Built-in palettes with any override files from `dir` merged on top
    pub fn with_overrides(dir: &Path) -> Self {
        let mut registry = Self::built_in();
        apply_overrides(&mut registry, dir);
        registry
    }
}
