use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::RunConfig;
use crate::crs::{Crs, Reprojector};
use crate::geom::{GeometryOps, PlanarOps};
use crate::grid::RasterGrid;
use crate::io::{feature_collection, read_vector, sha256_file, GeoTiffWriter, RasterWriter};
use crate::manifest::{Manifest, ManifestRecorder, RunLog};
use crate::prepare::{FeaturePreparer, Outcome, ShapeClassifier};
use crate::raster::{RasterCompositor, Rasterizer, ScanlineRasterizer};
use crate::sink::{Artifact, ConsoleSink, FileSink, OutputSink};

/// Where a run reads from and writes to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunPaths {
    infile: PathBuf,
    raster: PathBuf,
    log: PathBuf,
    manifest: PathBuf,
    errors: PathBuf,
}

impl RunPaths {
    /// `outfile` if given, else `<outPath or input dir>/<input stem>.tif`; companions share
    /// the raster's name without its extension.
    pub fn derive(config: &RunConfig) -> Self {
        let infile = config.infile().to_path_buf();
        let raster = match config.outfile() {
            Some(outfile) => outfile.to_path_buf(),
            None => {
                let dir = config.out_path()
                    .or_else(|| infile.parent())
                    .unwrap_or(Path::new(""));
                let mut name = infile.file_stem().map(OsString::from).unwrap_or_default();
                name.push(".tif");
                dir.join(name)
            }
        };

        let base = raster.with_extension("");
        let companion = |suffix: &str| {
            let mut name = base.clone().into_os_string();
            name.push(suffix);
            PathBuf::from(name)
        };

        Self {
            log: companion(".log.txt"),
            manifest: companion(".manifest.json"),
            errors: companion(".error.geojson"),
            infile,
            raster,
        }
    }

    #[inline] pub fn infile(&self) -> &Path { &self.infile }

    #[inline] pub fn raster(&self) -> &Path { &self.raster }

    #[inline] pub fn log(&self) -> &Path { &self.log }

    #[inline] pub fn manifest(&self) -> &Path { &self.manifest }

    #[inline] pub fn errors(&self) -> &Path { &self.errors }
}

/// Generates SAP heatmaps. The geometry rules, rasterizer and raster writer are replaceable.
pub struct SapMapper {
    ops: Box<dyn GeometryOps>,
    rasterizer: Box<dyn Rasterizer>,
    writer: Option<Box<dyn RasterWriter>>,
}

impl Default for SapMapper {
    fn default() -> Self {
        Self {
            ops: Box::new(PlanarOps),
            rasterizer: Box::new(ScanlineRasterizer),
            writer: None,
        }
    }
}

impl SapMapper {
    pub fn new() -> Self { Self::default() }

    pub fn with_geometry_ops(mut self, ops: impl GeometryOps + 'static) -> Self {
        self.ops = Box::new(ops);
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: impl Rasterizer + 'static) -> Self {
        self.rasterizer = Box::new(rasterizer);
        self
    }

    /// Replaces the GeoTIFF writer (which honours `atomicWrites`).
    pub fn with_writer(mut self, writer: impl RasterWriter + 'static) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }

    /// Run with companion outputs sent to files (`logToFile`) or to stdout.
    pub fn run(&self, config: &RunConfig) -> Result<Option<Manifest>> {
        if config.log_to_file() {
            let paths = RunPaths::derive(config);
            self.run_with_sink(config, &mut FileSink::for_run(&paths, config.atomic_writes()))
        } else {
            self.run_with_sink(config, &mut ConsoleSink)
        }
    }

    /// Generate one heatmap.
    ///
    /// Returns `Ok(None)` without touching any file when the output already exists (and
    /// `overwrite` is off), or when the input is missing, unreadable or has no features.
    pub fn run_with_sink(&self, config: &RunConfig, sink: &mut dyn OutputSink) -> Result<Option<Manifest>> {
        let started = Instant::now();
        let paths = RunPaths::derive(config);

        if paths.raster().exists() && !config.overwrite() {
            log::info!("{} already exists, skipping", paths.raster().display());
            return Ok(None);
        }
        if !paths.infile().exists() {
            log::warn!("input {} not found, skipping", paths.infile().display());
            return Ok(None);
        }
        let source = match read_vector(paths.infile()) {
            Ok(source) => source,
            Err(e) => {
                log::warn!("could not read {}, skipping: {e:#}", paths.infile().display());
                return Ok(None);
            }
        };
        if source.is_empty() {
            log::warn!("input {} has no features, skipping", paths.infile().display());
            return Ok(None);
        }

        let in_crs = config.in_crs().or(source.crs()).cloned().unwrap_or_else(Crs::wgs84);
        let out_crs = config.out_crs();
        let reprojector = if in_crs != *out_crs { Some(Reprojector::new(&in_crs, out_crs)?) } else { None };

        let Some(in_bounds) = config.bounds().copied().or_else(|| source.bounds()) else {
            log::warn!("no feature in {} has coordinates, skipping", paths.infile().display());
            return Ok(None);
        };
        let planned_bounds = match &reprojector {
            Some(r) => r.reproject_bounds(&in_bounds)
                .with_context(|| format!("Failed to reproject bounds {:?}", <[f64; 4]>::from(in_bounds)))?,
            None => in_bounds,
        };
        let grid = RasterGrid::plan(&planned_bounds, config.out_resolution(), config.bounds_precision())?;
        log::debug!("grid {}x{} over {:?}", grid.width(), grid.height(), <[f64; 4]>::from(*grid.out_bounds()));

        let classifier = ShapeClassifier::new(
            grid.cell_shape_index(),
            config.all_touched_small(),
            config.all_touched_small_factor(),
        );
        let preparer = FeaturePreparer::new(config, self.ops.as_ref(), classifier);
        let outcomes = preparer.prepare_all(source.features(), reprojector.as_ref());

        let to_input = match &reprojector {
            Some(_) => Some(Reprojector::new(out_crs, &in_crs)?),
            None => None,
        };
        let mut recorder = ManifestRecorder::new(started, config.unique_id_field(), classifier);
        let mut run_log = RunLog::new();
        let mut normal = Vec::new();
        let mut small = Vec::new();
        let mut errors = Vec::new();

        for (feature, outcome) in source.features().iter().zip(outcomes) {
            recorder.record(feature, &outcome);
            run_log.record(feature, &outcome, to_input.as_ref());
            match outcome {
                Outcome::Included { shape, .. } if shape.is_small() => small.push(shape),
                Outcome::Included { shape, .. } => normal.push(shape),
                Outcome::Excluded(_) => {}
                Outcome::Errored(_) => errors.push(feature.raw()),
            }
        }

        let raster = RasterCompositor::new(self.rasterizer.as_ref()).compose(&normal, &small, &grid);
        match &self.writer {
            Some(writer) => writer.write(paths.raster(), &raster, &grid, out_crs)?,
            None => GeoTiffWriter::new(config.atomic_writes()).write(paths.raster(), &raster, &grid, out_crs)?,
        }

        let input_sha256 = match sha256_file(paths.infile()) {
            Ok(hash) => Some(hash),
            Err(e) => {
                log::warn!("could not hash input: {e:#}");
                None
            }
        };
        let manifest = recorder.finish(config, &paths, &in_crs, in_bounds, &grid, input_sha256);

        sink.put(Artifact::Manifest, &manifest.to_json()?)?;
        sink.put(Artifact::Log, &run_log.to_text())?;
        if !errors.is_empty() {
            sink.put(Artifact::Errors, &feature_collection(errors).to_string())?;
        }

        log_summary(&manifest);
        Ok(Some(manifest))
    }
}

fn log_summary(manifest: &Manifest) {
    log::info!(
        "{} written in {}s ({}x{} cells)",
        manifest.paths().raster().display(),
        manifest.execution_time(),
        manifest.width(),
        manifest.height(),
    );
    log::info!("{} of {} features burned in", manifest.included_count(), manifest.feature_count());

    let stats = manifest.shape_index();
    if let Some(threshold) = stats.shape_index_threshold {
        log::info!("{} small features burned in with all-touched", manifest.included_small_count());
        log::info!(
            "cellShapeIndex: {}, shapeIndexThreshold: {threshold}, minShapeIndex: {:?}, maxShapeIndex: {:?}",
            stats.cell_shape_index,
            stats.min_shape_index,
            stats.max_shape_index,
        );
    }
    if manifest.fixed_count() > 0 {
        log::info!("{} features had their geometry fixed", manifest.fixed_count());
    }
    if manifest.excluded_count() > 0 {
        log::info!("{} features excluded, see log for details", manifest.excluded_count());
    }
    if manifest.error_count() > 0 {
        log::warn!("{} features could not be used, see {}", manifest.error_count(), manifest.paths().errors().display());
    }
}

/// Generate a heatmap with the default geometry rules, rasterizer and GeoTIFF writer.
pub fn gen_sap_map(config: &RunConfig) -> Result<Option<Manifest>> {
    SapMapper::default().run(config)
}
