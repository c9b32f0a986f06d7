use std::time::Instant;

use chrono::{Local, SecondsFormat};
use serde::Serialize;
use serde_json::Value;

use crate::config::RunConfig;
use crate::crs::{Crs, Reprojector};
use crate::feature::Feature;
use crate::grid::{Bounds, RasterGrid};
use crate::io::multipolygon_to_geojson;
use crate::pipeline::RunPaths;
use crate::prepare::{Outcome, ShapeClassifier};

/// Small-shape diagnostics. Observed extremes are only tracked when small-shape handling is on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeIndexStats {
    pub cell_shape_index: f64,
    pub all_touched_small_factor: f64,
    pub shape_index_threshold: Option<f64>,
    pub min_shape_index: Option<f64>,
    pub max_shape_index: Option<f64>,
}

/// Audit record of one run, written as camelCase JSON.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    timestamp: String,
    params: RunConfig,
    paths: RunPaths,
    in_crs: String,
    out_crs: String,
    in_bounds: Bounds,
    out_bounds: Bounds,
    width: usize,
    height: usize,
    cell_size: f64,
    included: Vec<Value>,
    included_small: Vec<Value>,
    excluded: Vec<Value>,
    fixed: Vec<Value>,
    errored: Vec<Value>,
    feature_count: usize,
    included_count: usize,
    excluded_count: usize,
    included_small_count: usize,
    fixed_count: usize,
    error_count: usize,
    shape_index: ShapeIndexStats,
    input_sha256: Option<String>,
    execution_time: f64,
}

impl Manifest {
    #[inline] pub fn timestamp(&self) -> &str { &self.timestamp }
    #[inline] pub fn params(&self) -> &RunConfig { &self.params }
    #[inline] pub fn paths(&self) -> &RunPaths { &self.paths }
    #[inline] pub fn in_bounds(&self) -> &Bounds { &self.in_bounds }
    #[inline] pub fn out_bounds(&self) -> &Bounds { &self.out_bounds }
    #[inline] pub fn width(&self) -> usize { self.width }
    #[inline] pub fn height(&self) -> usize { self.height }
    #[inline] pub fn included(&self) -> &[Value] { &self.included }
    #[inline] pub fn included_small(&self) -> &[Value] { &self.included_small }
    #[inline] pub fn excluded(&self) -> &[Value] { &self.excluded }
    #[inline] pub fn fixed(&self) -> &[Value] { &self.fixed }
    #[inline] pub fn errored(&self) -> &[Value] { &self.errored }
    #[inline] pub fn feature_count(&self) -> usize { self.feature_count }
    #[inline] pub fn included_count(&self) -> usize { self.included_count }
    #[inline] pub fn excluded_count(&self) -> usize { self.excluded_count }
    #[inline] pub fn included_small_count(&self) -> usize { self.included_small_count }
    #[inline] pub fn fixed_count(&self) -> usize { self.fixed_count }
    #[inline] pub fn error_count(&self) -> usize { self.error_count }
    #[inline] pub fn shape_index(&self) -> &ShapeIndexStats { &self.shape_index }
    #[inline] pub fn input_sha256(&self) -> Option<&str> { self.input_sha256.as_deref() }
    /// Wall-clock seconds, rounded to hundredths.
    #[inline] pub fn execution_time(&self) -> f64 { self.execution_time }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Collects per-feature outcomes into id lists and diagnostics while a run is in progress.
pub struct ManifestRecorder {
    started: Instant,
    timestamp: String,
    unique_id_field: Option<String>,
    classifier: ShapeClassifier,
    feature_count: usize,
    included: Vec<Value>,
    included_small: Vec<Value>,
    excluded: Vec<Value>,
    fixed: Vec<Value>,
    errored: Vec<Value>,
    min_shape_index: Option<f64>,
    max_shape_index: Option<f64>,
}

impl ManifestRecorder {
    /// `started` is when the run began; the manifest reports time elapsed since then.
    pub fn new(started: Instant, unique_id_field: Option<&str>, classifier: ShapeClassifier) -> Self {
        Self {
            started,
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
            unique_id_field: unique_id_field.map(str::to_owned),
            classifier,
            feature_count: 0,
            included: Vec::new(),
            included_small: Vec::new(),
            excluded: Vec::new(),
            fixed: Vec::new(),
            errored: Vec::new(),
            min_shape_index: None,
            max_shape_index: None,
        }
    }

    /// File one feature under exactly one of included / excluded / errored.
    pub fn record(&mut self, feature: &Feature, outcome: &Outcome) {
        let id = feature.public_id(self.unique_id_field.as_deref());
        self.feature_count += 1;

        match outcome {
            Outcome::Included { shape, shape_index, fixed } => {
                if *fixed {
                    self.fixed.push(id.clone());
                }
                if shape.is_small() {
                    self.included_small.push(id.clone());
                }
                if self.classifier.is_enabled() {
                    self.min_shape_index = Some(self.min_shape_index.map_or(*shape_index, |m| m.min(*shape_index)));
                    self.max_shape_index = Some(self.max_shape_index.map_or(*shape_index, |m| m.max(*shape_index)));
                }
                self.included.push(id);
            }
            Outcome::Excluded(_) => self.excluded.push(id),
            Outcome::Errored(_) => self.errored.push(id),
        }
    }

    pub fn shape_index_stats(&self) -> ShapeIndexStats {
        ShapeIndexStats {
            cell_shape_index: self.classifier.cell_shape_index(),
            all_touched_small_factor: self.classifier.factor(),
            shape_index_threshold: self.classifier.threshold(),
            min_shape_index: self.min_shape_index,
            max_shape_index: self.max_shape_index,
        }
    }

    /// Stop the clock and assemble the manifest.
    pub fn finish(
        self,
        config: &RunConfig,
        paths: &RunPaths,
        in_crs: &Crs,
        in_bounds: Bounds,
        grid: &RasterGrid,
        input_sha256: Option<String>,
    ) -> Manifest {
        let elapsed = self.started.elapsed().as_secs_f64();
        let shape_index = self.shape_index_stats();

        Manifest {
            timestamp: self.timestamp,
            params: config.clone(),
            paths: paths.clone(),
            in_crs: in_crs.to_string(),
            out_crs: config.out_crs().to_string(),
            in_bounds,
            out_bounds: *grid.out_bounds(),
            width: grid.width(),
            height: grid.height(),
            cell_size: grid.cell_size(),
            feature_count: self.feature_count,
            included_count: self.included.len(),
            excluded_count: self.excluded.len(),
            included_small_count: self.included_small.len(),
            fixed_count: self.fixed.len(),
            error_count: self.errored.len(),
            included: self.included,
            included_small: self.included_small,
            excluded: self.excluded,
            fixed: self.fixed,
            errored: self.errored,
            shape_index,
            input_sha256,
            execution_time: (elapsed * 100.0).round() / 100.0,
        }
    }
}

/// Ordered audit lines for a run, one block per fixed or skipped feature.
#[derive(Debug, Default, Clone)]
pub struct RunLog {
    lines: Vec<String>,
}

impl RunLog {
    pub fn new() -> Self { Self::default() }

    #[inline] pub fn push(&mut self, line: impl Into<String>) { self.lines.push(line.into()); }

    #[inline] pub fn lines(&self) -> &[String] { &self.lines }

    #[inline] pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    /// Add the block for one feature. `to_input` maps output-CRS geometry back to the input
    /// CRS so a repaired geometry is logged in the same coordinates as the original.
    pub fn record(&mut self, feature: &Feature, outcome: &Outcome, to_input: Option<&Reprojector>) {
        match outcome {
            Outcome::Included { shape, fixed: true, .. } => {
                let geometry = match to_input.map(|r| r.reproject(shape.geometry())) {
                    Some(Ok(geometry)) => geometry,
                    Some(Err(e)) => {
                        log::warn!("feature {}: logging repaired geometry in the output CRS: {e:#}", feature.index());
                        shape.geometry().clone()
                    }
                    None => shape.geometry().clone(),
                };
                let mut repaired = feature.raw().clone();
                if let Some(obj) = repaired.as_object_mut() {
                    obj.insert("geometry".into(), multipolygon_to_geojson(&geometry));
                }
                self.push("Fixed invalid feature geometry");
                self.push(feature.raw().to_string());
                self.push("With new geometry");
                self.push(repaired.to_string());
                self.push("");
            }
            Outcome::Included { .. } => {}
            Outcome::Excluded(issue) | Outcome::Errored(issue) => {
                self.push(format!("Skipping feature: {issue}"));
                self.push(feature.raw().to_string());
                self.push("");
            }
        }
    }

    pub fn to_text(&self) -> String {
        self.lines.join("\n")
    }
}
