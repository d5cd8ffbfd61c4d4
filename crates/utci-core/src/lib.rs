pub mod aggregate;
pub mod compare;
pub mod models;
pub mod polyline;
pub mod projection;
pub mod raster;
pub mod resample;
pub mod sampler;
pub mod scoring;

pub use aggregate::{aggregate, BatchStats, RouteStats, ValueRange, DEFAULT_SHADE_PERCENTILE};
pub use compare::{compare_batches, EncodingComparison, RouteComparison, Tolerance};
pub use models::{GeoPoint, ProjectedPoint, Route, RouteError, SampledRoute};
pub use polyline::{decode, encode, DecodeError};
pub use projection::{Crs, ProjectionError, UtmZone};
pub use raster::{
    load, DenseGrid, GeoTransform, GridGeometry, LoadOptions, QuantizedGrid, RasterError,
    RasterField, RasterFormat, DEFAULT_SCALE,
};
pub use resample::{resample, ResampleError, DEFAULT_SPACING_M, MIN_SPACING_M};
pub use sampler::{
    sample_batch, sample_route, BatchSample, ExportFailure, ExportSink, NoopSink, SampleError,
};
pub use scoring::{
    prepare_route, score_encoded_paths, RouteFailure, ScoredBatch, ScoringOptions, SkippedRoute,
};
