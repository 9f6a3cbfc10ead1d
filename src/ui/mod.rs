pub mod class_names;
pub mod styling;
pub mod theme;
pub mod theme_loader;
pub mod themed;
