use serde::{Deserialize, Serialize};

/// Per-feature inputs to the SAP formula other than area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SapParams {
    /// Importance of the shape, typically 1-100 per respondent.
    pub importance: f64,
    /// Area is divided by this, e.g. 1e6 turns square metres into square kilometres.
    pub area_factor: f64,
    /// Multiplies importance, e.g. to scale from one respondent to a group.
    pub importance_factor: f64,
    /// Upper bound on the scaled area; large shapes get more heat per cell.
    pub max_area: Option<f64>,
    /// Upper bound on the resulting SAP.
    pub max_sap: Option<f64>,
}

impl Default for SapParams {
    fn default() -> Self {
        Self {
            importance: 1.0,
            area_factor: 1.0,
            importance_factor: 1.0,
            max_area: None,
            max_sap: None,
        }
    }
}

/// Spatial Access Priority of one shape: importance per unit of (scaled) area.
///
/// Applied in order: scale area by `area_factor`, clip by `max_area`, divide, clip by `max_sap`.
/// `area` must be strictly positive; callers filter zero-area shapes beforehand.
pub fn calc_sap(area: f64, params: &SapParams) -> f64 {
    debug_assert!(area > 0.0, "calc_sap requires a positive area, got {area}");

    let mut scaled_area = area / params.area_factor;
    if let Some(max_area) = params.max_area {
        scaled_area = scaled_area.min(max_area);
    }

    let sap = params.importance_factor * params.importance / scaled_area;
    match params.max_sap {
        Some(max_sap) => sap.min(max_sap),
        None => sap,
    }
}

/// How much heat one feature adds to every cell it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeatMethod {
    /// 1 per feature, so cells count overlapping features.
    Count,
    /// 1 / area, with no scaling, weighting or caps.
    Area,
    /// Importance per scaled area, see [`calc_sap`].
    #[default]
    Sap,
}

impl HeatMethod {
    /// Heat value of a shape with the given positive area.
    pub fn heat(self, area: f64, params: &SapParams) -> f64 {
        match self {
            Self::Count => 1.0,
            Self::Area => 1.0 / area,
            Self::Sap => calc_sap(area, params),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{calc_sap, HeatMethod, SapParams};

    // 100 x 200 rectangle
    const AREA: f64 = 20_000.0;

    #[test]
    fn defaults_to_unit_importance() {
        assert_eq!(calc_sap(AREA, &SapParams::default()), 0.00005);
    }

    #[test]
    fn importance_over_area() {
        let params = SapParams { importance: 20.0, ..Default::default() };
        assert_eq!(calc_sap(AREA, &params), 0.001);
    }

    #[test]
    fn area_factor_scales_to_planning_units() {
        let per_km = SapParams { importance: 20.0, area_factor: 1_000_000.0, ..Default::default() };
        assert_eq!(calc_sap(AREA, &per_km), 1000.0);

        let per_cell = SapParams { importance: 20.0, area_factor: 10_000.0, ..Default::default() };
        assert_eq!(calc_sap(AREA, &per_cell), 10.0);
    }

    #[test]
    fn importance_factor_multiplies() {
        let params = SapParams { importance: 20.0, importance_factor: 3000.0, ..Default::default() };
        assert_eq!(calc_sap(AREA, &params), 3.0);

        let scaled = SapParams {
            importance: 20.0,
            area_factor: 20_000.0,
            importance_factor: 3000.0,
            ..Default::default()
        };
        assert_eq!(calc_sap(AREA, &scaled), 60_000.0);
    }

    #[test]
    fn max_area_clips_after_scaling() {
        // scaled area is 2, clipped to 1
        let params = SapParams {
            importance: 20.0,
            area_factor: 10_000.0,
            max_area: Some(1.0),
            ..Default::default()
        };
        assert_eq!(calc_sap(AREA, &params), 20.0);
    }

    #[test]
    fn max_sap_clips_last() {
        let params = SapParams {
            importance: 20.0,
            area_factor: 10_000.0,
            max_area: Some(1.0),
            max_sap: Some(15.0),
            ..Default::default()
        };
        assert_eq!(calc_sap(AREA, &params), 15.0);

        let loose = SapParams { max_sap: Some(100.0), ..params };
        assert_eq!(calc_sap(AREA, &loose), 20.0);
    }

    #[test]
    fn heat_methods() {
        let params = SapParams { importance: 20.0, area_factor: 10_000.0, max_sap: Some(5.0), ..Default::default() };
        assert_eq!(HeatMethod::Count.heat(AREA, &params), 1.0);
        assert_eq!(HeatMethod::Area.heat(AREA, &params), 0.00005);
        assert_eq!(HeatMethod::Sap.heat(AREA, &params), 5.0);
        assert_eq!(HeatMethod::default(), HeatMethod::Sap);
    }

    #[test]
    fn heat_method_names() {
        assert_eq!(serde_json::to_value(HeatMethod::Count).unwrap(), serde_json::json!("count"));
        let parsed: HeatMethod = serde_json::from_str("\"area\"").unwrap();
        assert_eq!(parsed, HeatMethod::Area);
        assert!(serde_json::from_str::<HeatMethod>("\"Sap\"").is_err());
    }
}
