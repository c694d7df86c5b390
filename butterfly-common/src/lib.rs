//! Common types for the butterfly-osm toolkit

pub mod error;
pub mod ids;
pub mod io_config;

pub use error::{Error, Result};
pub use ids::*;
pub use io_config::IoConfig;
