//! On-disk export of sampled routes.
//!
//! Each request overwrites `route_<n>_with_raster_values.geojson` (one
//! point feature per sample, `n` counting from 1) and `raster_values.txt`
//! in the output directory.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::PathBuf;

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;
use utci_core::{ExportSink, SampledRoute};

#[derive(Debug, Clone)]
pub struct FileExportSink {
    dir: PathBuf,
    /// CRS of the projected `x`/`y` properties.
    epsg: u32,
}

impl FileExportSink {
    pub fn new(dir: impl Into<PathBuf>, epsg: u32) -> Self {
        Self {
            dir: dir.into(),
            epsg,
        }
    }

    pub fn route_path(&self, route_id: usize) -> PathBuf {
        let name = format!("route_{}_with_raster_values.geojson", route_id + 1);
        self.dir.join(name)
    }

    pub fn values_path(&self) -> PathBuf {
        self.dir.join("raster_values.txt")
    }

    fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)
    }
}

impl ExportSink for FileExportSink {
    fn export_route(&self, route: &SampledRoute) -> io::Result<()> {
        self.ensure_dir()?;
        let collection = route_features(route, self.epsg);
        fs::write(self.route_path(route.route_id), collection.to_string())
    }

    fn export_batch(&self, routes: &[SampledRoute]) -> io::Result<()> {
        self.ensure_dir()?;
        fs::write(self.values_path(), values_dump(routes))
    }
}

fn route_features(route: &SampledRoute, epsg: u32) -> FeatureCollection {
    let features = route
        .points
        .iter()
        .zip(&route.projected)
        .zip(&route.values)
        .enumerate()
        .map(|(index, ((point, projected), value))| {
            let mut properties = JsonObject::new();
            properties.insert("route_id".to_string(), json!(route.route_id));
            properties.insert("point_index".to_string(), json!(index));
            properties.insert("x".to_string(), json!(projected.x));
            properties.insert("y".to_string(), json!(projected.y));
            properties.insert("epsg".to_string(), json!(epsg));
            properties.insert("raster_value".to_string(), json!(value));
            Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(vec![point.lon, point.lat]))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn values_dump(routes: &[SampledRoute]) -> String {
    let mut out = String::from("--- Raster Values by Route ---\n");
    for route in routes {
        let _ = writeln!(out, "Route {}: {:?}", route.route_id, route.values);
    }
    out.push_str("--- End of Raster Values ---\n");
    out
}
