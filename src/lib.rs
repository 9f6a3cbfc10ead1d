//! Mood-theme engine.
//!
//! - [`ui::theme`]: theme ids, palettes and the registry
//! - [`services::theme_store`]: persisted active theme with subscribers
//! - [`ui::class_names`]: rewriting of utility-class strings for a theme
//! - [`ui::themed`]: components whose class names follow the store

pub mod config;
pub mod error;
pub mod logging;
pub mod services;
pub mod ui;

pub use error::{ConfigError, StorageError, ThemeError};
pub use services::storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use services::theme_store::{Lifecycle, Subscription, ThemeState, ThemeStore};
pub use ui::class_names::{ClassRewriter, StyleClassString};
pub use ui::theme::{HexColor, Palette, ThemeId, ThemeRegistry, DEFAULT_THEME};
pub use ui::themed::{ClassNameProp, Component, ThemeClasses, Themed};
