pub mod storage;
pub mod theme_store;
