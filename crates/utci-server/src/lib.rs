//! Shared library surface for the UTCI route server and its tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod raster_source;
pub mod state;
