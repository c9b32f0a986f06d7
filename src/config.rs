use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crs::Crs;
use crate::error::SapError;
use crate::grid::Bounds;
use crate::sap::HeatMethod;

/// Default table for a run. Deserializes from the camelCase option mapping (unknown keys are
/// rejected) and is turned into a validated [`RunConfig`] by [`RunConfigBuilder::build`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct RunConfigBuilder {
    /// Vector input (GeoJSON or Shapefile).
    pub infile: Option<PathBuf>,
    /// Output raster; derived from `infile` when absent.
    pub outfile: Option<PathBuf>,
    /// Directory for the derived output name.
    pub out_path: Option<PathBuf>,
    pub overwrite: bool,
    /// `count`, `area` or `sap`.
    pub method: HeatMethod,
    pub importance_field: Option<String>,
    pub importance_factor_field: Option<String>,
    /// Divisor applied to feature area before weighting.
    pub area_factor: f64,
    pub unique_id_field: Option<String>,
    /// Overrides whatever CRS the input declares.
    pub in_crs_string: Option<String>,
    pub out_crs_string: String,
    /// Cell size in output CRS units.
    #[serde(alias = "cellSize")]
    pub out_resolution: f64,
    /// `[west, south, east, north]` in the input CRS.
    pub bounds: Option<Bounds>,
    pub bounds_precision: u32,
    pub all_touched_small: bool,
    pub all_touched_small_factor: f64,
    pub fix_geom: bool,
    pub max_area: Option<f64>,
    pub max_sap: Option<f64>,
    pub log_to_file: bool,
    pub atomic_writes: bool,
}

impl Default for RunConfigBuilder {
    fn default() -> Self {
        Self {
            infile: None,
            outfile: None,
            out_path: None,
            overwrite: false,
            method: HeatMethod::Sap,
            importance_field: None,
            importance_factor_field: None,
            area_factor: 1.0,
            unique_id_field: None,
            in_crs_string: None,
            out_crs_string: "epsg:3857".into(),
            out_resolution: 1000.0,
            bounds: None,
            bounds_precision: 0,
            all_touched_small: false,
            all_touched_small_factor: 1.25,
            fix_geom: false,
            max_area: None,
            max_sap: None,
            log_to_file: false,
            atomic_writes: false,
        }
    }
}

impl RunConfigBuilder {
    /// Defaults with `infile` set.
    pub fn new(infile: impl Into<PathBuf>) -> Self {
        Self { infile: Some(infile.into()), ..Self::default() }
    }

    /// Validate every option and resolve the CRS strings.
    pub fn build(self) -> Result<RunConfig, SapError> {
        let infile = self.infile.clone()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| SapError::config("infile is required"))?;

        positive("outResolution", self.out_resolution)?;
        positive("areaFactor", self.area_factor)?;
        positive("allTouchedSmallFactor", self.all_touched_small_factor)?;
        if let Some(max_area) = self.max_area { positive("maxArea", max_area)?; }
        if let Some(max_sap) = self.max_sap { positive("maxSap", max_sap)?; }

        if let Some(b) = &self.bounds {
            if !b.is_finite() || b.west > b.east || b.south > b.north {
                return Err(SapError::config(format!(
                    "bounds must be finite [west, south, east, north], got {:?}", <[f64; 4]>::from(*b),
                )));
            }
        }

        let in_crs = self.in_crs_string.as_deref().map(Crs::parse).transpose()?;
        let out_crs = Crs::parse(&self.out_crs_string)?;

        Ok(RunConfig { infile, in_crs, out_crs, options: self })
    }
}

#[inline]
fn positive(name: &str, value: f64) -> Result<(), SapError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SapError::config(format!("{name} must be a positive number, got {value}")))
    }
}

/// Validated, immutable options for one run.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct RunConfig {
    #[serde(skip)]
    infile: PathBuf,
    #[serde(skip)]
    in_crs: Option<Crs>,
    #[serde(skip)]
    out_crs: Crs,
    options: RunConfigBuilder,
}

impl RunConfig {
    #[inline] pub fn builder(infile: impl Into<PathBuf>) -> RunConfigBuilder { RunConfigBuilder::new(infile) }

    /// Parse and validate a JSON option mapping.
    pub fn from_json(json: &str) -> Result<Self, SapError> {
        let builder: RunConfigBuilder = serde_json::from_str(json)
            .map_err(|e| SapError::config(e.to_string()))?;
        builder.build()
    }

    pub fn from_value(value: Value) -> Result<Self, SapError> {
        let builder: RunConfigBuilder = serde_json::from_value(value)
            .map_err(|e| SapError::config(e.to_string()))?;
        builder.build()
    }

    #[inline] pub fn infile(&self) -> &Path { &self.infile }

    #[inline] pub fn outfile(&self) -> Option<&Path> { self.options.outfile.as_deref() }

    #[inline] pub fn out_path(&self) -> Option<&Path> { self.options.out_path.as_deref() }

    #[inline] pub fn overwrite(&self) -> bool { self.options.overwrite }

    #[inline] pub fn method(&self) -> HeatMethod { self.options.method }

    #[inline] pub fn importance_field(&self) -> Option<&str> { self.options.importance_field.as_deref() }

    #[inline] pub fn importance_factor_field(&self) -> Option<&str> { self.options.importance_factor_field.as_deref() }

    #[inline] pub fn area_factor(&self) -> f64 { self.options.area_factor }

    #[inline] pub fn unique_id_field(&self) -> Option<&str> { self.options.unique_id_field.as_deref() }

    /// Explicit input CRS, if one was configured.
    #[inline] pub fn in_crs(&self) -> Option<&Crs> { self.in_crs.as_ref() }

    #[inline] pub fn out_crs(&self) -> &Crs { &self.out_crs }

    #[inline] pub fn out_resolution(&self) -> f64 { self.options.out_resolution }

    #[inline] pub fn bounds(&self) -> Option<&Bounds> { self.options.bounds.as_ref() }

    #[inline] pub fn bounds_precision(&self) -> u32 { self.options.bounds_precision }

    #[inline] pub fn all_touched_small(&self) -> bool { self.options.all_touched_small }

    #[inline] pub fn all_touched_small_factor(&self) -> f64 { self.options.all_touched_small_factor }

    #[inline] pub fn fix_geom(&self) -> bool { self.options.fix_geom }

    #[inline] pub fn max_area(&self) -> Option<f64> { self.options.max_area }

    #[inline] pub fn max_sap(&self) -> Option<f64> { self.options.max_sap }

    #[inline] pub fn log_to_file(&self) -> bool { self.options.log_to_file }

    #[inline] pub fn atomic_writes(&self) -> bool { self.options.atomic_writes }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{RunConfig, RunConfigBuilder};
    use crate::error::SapError;
    use crate::grid::Bounds;
    use crate::sap::HeatMethod;

    #[test]
    fn defaults() {
        let config = RunConfig::builder("in.geojson").build().unwrap();
        assert_eq!(config.out_resolution(), 1000.0);
        assert_eq!(config.area_factor(), 1.0);
        assert_eq!(config.all_touched_small_factor(), 1.25);
        assert_eq!(config.out_crs().epsg(), Some(3857));
        assert!(config.in_crs().is_none());
        assert!(!config.overwrite() && !config.fix_geom() && !config.log_to_file());
        assert!(!config.all_touched_small() && !config.atomic_writes());
        assert_eq!(config.max_area(), None);
        assert_eq!(config.method(), HeatMethod::Sap);
    }

    #[test]
    fn method_by_name() {
        let config = RunConfig::from_json(r#"{"infile": "a.geojson", "method": "count"}"#).unwrap();
        assert_eq!(config.method(), HeatMethod::Count);
        let err = RunConfig::from_json(r#"{"infile": "a.geojson", "method": "density"}"#).unwrap_err();
        assert!(matches!(err, SapError::Config(_)));
    }

    #[test]
    fn from_json_with_alias() {
        let config = RunConfig::from_value(json!({
            "infile": "data/respondents.geojson",
            "cellSize": 100,
            "bounds": [-400, -400, 400, 400],
            "importanceField": "weight",
            "inCrsString": "EPSG:3857",
            "allTouchedSmall": true,
        })).unwrap();

        assert_eq!(config.out_resolution(), 100.0);
        assert_eq!(config.bounds(), Some(&Bounds::new(-400.0, -400.0, 400.0, 400.0)));
        assert_eq!(config.importance_field(), Some("weight"));
        assert_eq!(config.in_crs().and_then(|c| c.epsg()), Some(3857));
        assert!(config.all_touched_small());
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = RunConfig::from_json(r#"{"infile": "a.geojson", "outResolutoin": 5}"#).unwrap_err();
        assert!(matches!(err, SapError::Config(_)));
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            RunConfigBuilder { out_resolution: 0.0, ..RunConfigBuilder::new("a.geojson") },
            RunConfigBuilder { out_resolution: -1.0, ..RunConfigBuilder::new("a.geojson") },
            RunConfigBuilder { area_factor: 0.0, ..RunConfigBuilder::new("a.geojson") },
            RunConfigBuilder { all_touched_small_factor: f64::NAN, ..RunConfigBuilder::new("a.geojson") },
            RunConfigBuilder { max_area: Some(0.0), ..RunConfigBuilder::new("a.geojson") },
            RunConfigBuilder { max_sap: Some(-3.0), ..RunConfigBuilder::new("a.geojson") },
            RunConfigBuilder { out_crs_string: "not a crs".into(), ..RunConfigBuilder::new("a.geojson") },
            RunConfigBuilder { bounds: Some(Bounds::new(10.0, 0.0, 0.0, 10.0)), ..RunConfigBuilder::new("a.geojson") },
            RunConfigBuilder::default(),
        ];
        for builder in bad {
            assert!(matches!(builder.clone().build(), Err(SapError::Config(_))), "{builder:?}");
        }
    }

    #[test]
    fn echoes_options_in_camel_case() {
        let config = RunConfig::builder("in.geojson").build().unwrap();
        let echoed = serde_json::to_value(&config).unwrap();
        assert_eq!(echoed["outResolution"], json!(1000.0));
        assert_eq!(echoed["outCrsString"], json!("epsg:3857"));
        assert_eq!(echoed["infile"], json!("in.geojson"));
        assert_eq!(echoed["maxSap"], json!(null));
        assert_eq!(echoed["method"], json!("sap"));
    }
}
