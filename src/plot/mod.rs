//! Datasets: record layout, loading, caching, enumeration and the session
//! that ties them to the density pass.

pub mod cache;
pub mod catalog;
pub mod loader;
pub mod procedural;
pub mod session;
pub mod types;
