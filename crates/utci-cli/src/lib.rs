//! UTCI CLI - command line tools for the UTCI route scorer.
//!
//! Binaries:
//! - utci-convert: GeoTIFF to quantized npz
//! - utci-compare: check that both encodings (and optionally a running
//!   server) rank routes the same way
//! - utci-score: score encoded polylines offline

pub mod api;
pub mod args;
pub mod input;
pub mod logging;
pub mod report;

pub use args::{RasterArgs, ScoringArgs};
pub use input::{Leg, RouteInput};
pub use logging::init_tracing;
