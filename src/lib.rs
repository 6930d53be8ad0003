pub mod app;
pub mod config;
pub mod density;
pub mod error;
pub mod input;
pub mod plot;
pub mod presentation;
pub mod rendering;
