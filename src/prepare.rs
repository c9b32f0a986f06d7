use anyhow::Result;
use geo::{Area, MultiPolygon};
use rayon::prelude::*;

use crate::config::RunConfig;
use crate::crs::Reprojector;
use crate::error::FeatureIssue;
use crate::feature::Feature;
use crate::geom::{has_coordinates, shape_index, GeometryOps, Validity};
use crate::sap::{HeatMethod, SapParams};

/// A shape ready to burn: output-CRS geometry and its SAP weight.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedShape {
    geometry: MultiPolygon<f64>,
    weight: f64,
    small: bool,
}

impl WeightedShape {
    pub fn new(geometry: MultiPolygon<f64>, weight: f64, small: bool) -> Self {
        Self { geometry, weight, small }
    }

    #[inline] pub fn geometry(&self) -> &MultiPolygon<f64> { &self.geometry }

    #[inline] pub fn weight(&self) -> f64 { self.weight }

    /// Routed through the all-touched pass.
    #[inline] pub fn is_small(&self) -> bool { self.small }
}

/// Decides which shapes are too small or narrow for centre-point rasterization.
///
/// The reference is the shape index of one square cell (`cell_size / 4`); a shape is small
/// when its own index falls below that times `factor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeClassifier {
    cell_shape_index: f64,
    factor: f64,
    threshold: Option<f64>,
}

impl ShapeClassifier {
    pub fn new(cell_shape_index: f64, enabled: bool, factor: f64) -> Self {
        Self {
            cell_shape_index,
            factor,
            threshold: enabled.then(|| cell_shape_index * factor),
        }
    }

    #[inline] pub fn cell_shape_index(&self) -> f64 { self.cell_shape_index }

    #[inline] pub fn factor(&self) -> f64 { self.factor }

    /// None when small-shape handling is off.
    #[inline] pub fn threshold(&self) -> Option<f64> { self.threshold }

    #[inline] pub fn is_enabled(&self) -> bool { self.threshold.is_some() }

    #[inline]
    pub fn is_small(&self, shape_index: f64) -> bool {
        self.threshold.is_some_and(|t| shape_index < t)
    }
}

/// What happened to one feature.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// `fixed` means the geometry is the repaired one.
    Included { shape: WeightedShape, shape_index: f64, fixed: bool },
    /// Dropped, but not an error (nothing to burn).
    Excluded(FeatureIssue),
    /// Unrecoverable; the raw feature goes to the error collection.
    Errored(FeatureIssue),
}

/// Turns source features into weighted shapes.
pub struct FeaturePreparer<'a> {
    ops: &'a dyn GeometryOps,
    classifier: ShapeClassifier,
    fix_geom: bool,
    method: HeatMethod,
    importance_field: Option<&'a str>,
    importance_factor_field: Option<&'a str>,
    area_factor: f64,
    max_area: Option<f64>,
    max_sap: Option<f64>,
}

impl<'a> FeaturePreparer<'a> {
    pub fn new(config: &'a RunConfig, ops: &'a dyn GeometryOps, classifier: ShapeClassifier) -> Self {
        Self {
            ops,
            classifier,
            fix_geom: config.fix_geom(),
            method: config.method(),
            importance_field: config.importance_field(),
            importance_factor_field: config.importance_factor_field(),
            area_factor: config.area_factor(),
            max_area: config.max_area(),
            max_sap: config.max_sap(),
        }
    }

    #[inline] pub fn classifier(&self) -> &ShapeClassifier { &self.classifier }

    /// Prepare every feature. Reprojection runs in source order on this thread; the rest
    /// runs in parallel, and outcomes come back in source order.
    pub fn prepare_all(&self, features: &[Feature], reprojector: Option<&Reprojector>) -> Vec<Outcome> {
        let geometries: Vec<Result<MultiPolygon<f64>>> = features.iter()
            .map(|feature| match reprojector {
                Some(r) => r.reproject(feature.geometry()),
                None => Ok(feature.geometry().clone()),
            })
            .collect();

        features.par_iter()
            .zip(geometries.into_par_iter())
            .map(|(feature, geometry)| self.prepare(feature, geometry))
            .collect()
    }

    /// Validate, optionally repair, weight and classify one feature whose geometry is
    /// already in the output CRS.
    pub fn prepare(&self, feature: &Feature, geometry: Result<MultiPolygon<f64>>) -> Outcome {
        let mut geometry = match geometry {
            Ok(g) => g,
            Err(e) => {
                log::debug!("feature {}: {e:#}", feature.index());
                return Outcome::Errored(FeatureIssue::ReprojectionFailed);
            }
        };

        let mut fixed = false;
        if let Validity::Invalid(reason) = self.ops.check(&geometry) {
            log::debug!("feature {}: {reason}", feature.index());
            if !self.fix_geom {
                return Outcome::Errored(FeatureIssue::InvalidGeometry);
            }
            let repaired = self.ops.repair(&geometry);
            if !(self.ops.check(&repaired).is_valid() && repaired.unsigned_area() > 0.0) {
                return Outcome::Errored(FeatureIssue::RepairFailed);
            }
            geometry = repaired;
            fixed = true;
        }

        if !has_coordinates(&geometry) {
            return Outcome::Excluded(FeatureIssue::NoCoordinates);
        }
        let area = geometry.unsigned_area();
        if area == 0.0 {
            return Outcome::Excluded(FeatureIssue::ZeroArea);
        }

        let params = SapParams {
            importance: self.numeric(feature, self.importance_field),
            area_factor: self.area_factor,
            importance_factor: self.numeric(feature, self.importance_factor_field),
            max_area: self.max_area,
            max_sap: self.max_sap,
        };
        let weight = self.method.heat(area, &params);
        let shape_index = shape_index(area, &geometry);
        let small = self.classifier.is_small(shape_index);

        Outcome::Included { shape: WeightedShape::new(geometry, weight, small), shape_index, fixed }
    }

    /// Missing, null or non-numeric attributes count as 1.
    #[inline]
    fn numeric(&self, feature: &Feature, field: Option<&str>) -> f64 {
        field.and_then(|f| feature.property_f64(f)).unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use approx::assert_relative_eq;
    use geo::{polygon, MultiPolygon};
    use serde_json::{json, Value};

    use super::{FeaturePreparer, Outcome, ShapeClassifier};
    use crate::config::{RunConfig, RunConfigBuilder};
    use crate::crs::{Crs, Reprojector};
    use crate::error::FeatureIssue;
    use crate::feature::Feature;
    use crate::geom::{GeometryOps, PlanarOps, Validity};
    use crate::sap::HeatMethod;

    fn square(x: f64, y: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x, y: y), (x: x + size, y: y), (x: x + size, y: y + size), (x: x, y: y + size), (x: x, y: y),
        ]])
    }

    fn bow_tie() -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 2.0), (x: 2.0, y: 0.0), (x: 0.0, y: 2.0), (x: 0.0, y: 0.0)]])
    }

    fn feature(index: usize, geometry: MultiPolygon<f64>, props: Value) -> Feature {
        let Value::Object(map) = props else { panic!("expected object") };
        Feature::from_parts(index, geometry, map)
    }

    fn config(builder: RunConfigBuilder) -> RunConfig {
        builder.build().unwrap()
    }

    fn classifier() -> ShapeClassifier {
        ShapeClassifier::new(25.0, false, 1.25)
    }

    fn included_weight(outcome: &Outcome) -> f64 {
        match outcome {
            Outcome::Included { shape, .. } => shape.weight(),
            other => panic!("expected included, got {other:?}"),
        }
    }

    /// Accepts everything; repair always yields nothing.
    struct Permissive;

    impl GeometryOps for Permissive {
        fn check(&self, _: &MultiPolygon<f64>) -> Validity { Validity::Valid }
        fn repair(&self, _: &MultiPolygon<f64>) -> MultiPolygon<f64> { MultiPolygon(vec![]) }
    }

    /// Rejects everything.
    struct Strict;

    impl GeometryOps for Strict {
        fn check(&self, _: &MultiPolygon<f64>) -> Validity { Validity::Invalid("nope".into()) }
        fn repair(&self, shape: &MultiPolygon<f64>) -> MultiPolygon<f64> { shape.clone() }
    }

    #[test]
    fn weights_by_area_and_importance() {
        let config = config(RunConfigBuilder {
            area_factor: 10_000.0,
            importance_field: Some("importance".into()),
            importance_factor_field: Some("factor".into()),
            ..RunConfigBuilder::new("in.geojson")
        });
        let preparer = FeaturePreparer::new(&config, &PlanarOps, classifier());

        let plain = feature(0, square(0.0, 0.0, 100.0), json!({}));
        let weighted = feature(1, square(0.0, 0.0, 200.0), json!({ "importance": "20", "factor": 3 }));
        let junk = feature(2, square(0.0, 0.0, 100.0), json!({ "importance": "high", "factor": null }));

        assert_eq!(included_weight(&preparer.prepare(&plain, Ok(plain.geometry().clone()))), 1.0);
        assert_eq!(included_weight(&preparer.prepare(&weighted, Ok(weighted.geometry().clone()))), 15.0);
        assert_eq!(included_weight(&preparer.prepare(&junk, Ok(junk.geometry().clone()))), 1.0);
    }

    #[test]
    fn invalid_geometry_without_fix_is_an_error() {
        let config = config(RunConfigBuilder::new("in.geojson"));
        let preparer = FeaturePreparer::new(&config, &PlanarOps, classifier());
        let f = feature(0, bow_tie(), json!({}));
        assert_eq!(preparer.prepare(&f, Ok(bow_tie())), Outcome::Errored(FeatureIssue::InvalidGeometry));
    }

    #[test]
    fn invalid_geometry_is_repaired_when_enabled() {
        let config = config(RunConfigBuilder { fix_geom: true, ..RunConfigBuilder::new("in.geojson") });
        let preparer = FeaturePreparer::new(&config, &PlanarOps, classifier());
        let f = feature(0, bow_tie(), json!({}));

        match preparer.prepare(&f, Ok(bow_tie())) {
            Outcome::Included { shape, fixed, .. } => {
                assert!(fixed);
                assert_eq!(shape.weight(), 0.5);
                assert!(PlanarOps.check(shape.geometry()).is_valid());
            }
            other => panic!("expected repaired feature, got {other:?}"),
        }
    }

    #[test]
    fn heat_follows_method() {
        let f = feature(0, square(0.0, 0.0, 200.0), json!({ "importance": 20 }));
        let weight = |method| {
            let config = config(RunConfigBuilder {
                method,
                area_factor: 10_000.0,
                importance_field: Some("importance".into()),
                ..RunConfigBuilder::new("in.geojson")
            });
            let preparer = FeaturePreparer::new(&config, &PlanarOps, classifier());
            included_weight(&preparer.prepare(&f, Ok(f.geometry().clone())))
        };

        assert_eq!(weight(HeatMethod::Count), 1.0);
        assert_eq!(weight(HeatMethod::Area), 1.0 / 40_000.0);
        assert_eq!(weight(HeatMethod::Sap), 5.0);
    }

    #[test]
    fn overlapping_members_are_merged_when_fixing() {
        let member = square(0.0, 0.0, 200.0).0[0].clone();
        let doubled = MultiPolygon(vec![member.clone(), member]);
        let f = feature(0, doubled.clone(), json!({}));

        let builder = RunConfigBuilder { area_factor: 10_000.0, ..RunConfigBuilder::new("in.geojson") };
        let config_off = config(builder.clone());
        let preparer = FeaturePreparer::new(&config_off, &PlanarOps, classifier());
        assert_eq!(preparer.prepare(&f, Ok(doubled.clone())), Outcome::Errored(FeatureIssue::InvalidGeometry));

        let config_on = config(RunConfigBuilder { fix_geom: true, ..builder });
        let preparer = FeaturePreparer::new(&config_on, &PlanarOps, classifier());
        match preparer.prepare(&f, Ok(doubled)) {
            Outcome::Included { shape, fixed, .. } => {
                assert!(fixed);
                // one 200 x 200 square, not two
                assert_relative_eq!(shape.weight(), 0.25, epsilon = 1e-9);
                assert!(PlanarOps.check(shape.geometry()).is_valid());
            }
            other => panic!("expected merged feature, got {other:?}"),
        }
    }

    #[test]
    fn failed_repair_is_an_error() {
        let config = config(RunConfigBuilder { fix_geom: true, ..RunConfigBuilder::new("in.geojson") });
        let preparer = FeaturePreparer::new(&config, &Strict, classifier());
        let f = feature(0, square(0.0, 0.0, 1.0), json!({}));
        assert_eq!(preparer.prepare(&f, Ok(square(0.0, 0.0, 1.0))), Outcome::Errored(FeatureIssue::RepairFailed));
    }

    #[test]
    fn empty_and_flat_geometries_are_excluded() {
        let config = config(RunConfigBuilder::new("in.geojson"));
        let preparer = FeaturePreparer::new(&config, &Permissive, classifier());

        let empty = feature(0, MultiPolygon(vec![]), json!({}));
        assert_eq!(preparer.prepare(&empty, Ok(MultiPolygon(vec![]))), Outcome::Excluded(FeatureIssue::NoCoordinates));

        let flat = MultiPolygon(vec![polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0), (x: 0.0, y: 0.0)]]);
        let f = feature(1, flat.clone(), json!({}));
        assert_eq!(preparer.prepare(&f, Ok(flat)), Outcome::Excluded(FeatureIssue::ZeroArea));
    }

    #[test]
    fn reprojection_failure_is_an_error() {
        let config = config(RunConfigBuilder::new("in.geojson"));
        let preparer = FeaturePreparer::new(&config, &PlanarOps, classifier());
        let f = feature(0, square(0.0, 0.0, 1.0), json!({}));
        assert_eq!(preparer.prepare(&f, Err(anyhow!("out of range"))), Outcome::Errored(FeatureIssue::ReprojectionFailed));
    }

    #[test]
    fn narrow_shapes_are_small_only_when_enabled() {
        let config = config(RunConfigBuilder::new("in.geojson"));
        let strip = feature(0, MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0), (x: 400.0, y: 0.0), (x: 400.0, y: 10.0), (x: 0.0, y: 10.0), (x: 0.0, y: 0.0),
        ]]), json!({}));
        let block = feature(1, square(0.0, 0.0, 400.0), json!({}));

        let on = ShapeClassifier::new(25.0, true, 1.25);
        assert_eq!(on.threshold(), Some(31.25));
        let preparer = FeaturePreparer::new(&config, &PlanarOps, on);
        let outcomes = preparer.prepare_all(&[strip.clone(), block.clone()], None);
        let small: Vec<bool> = outcomes.iter()
            .map(|o| match o { Outcome::Included { shape, .. } => shape.is_small(), _ => panic!() })
            .collect();
        assert_eq!(small, vec![true, false]);

        let off = ShapeClassifier::new(25.0, false, 1.25);
        assert!(!off.is_enabled());
        let preparer = FeaturePreparer::new(&config, &PlanarOps, off);
        assert!(preparer.prepare_all(&[strip], None).iter()
            .all(|o| matches!(o, Outcome::Included { shape, .. } if !shape.is_small())));
    }

    #[test]
    fn outcomes_keep_source_order() {
        let config = config(RunConfigBuilder::new("in.geojson"));
        let preparer = FeaturePreparer::new(&config, &PlanarOps, classifier());
        let features: Vec<Feature> = (0..200)
            .map(|i| feature(i, square(0.0, 0.0, (i + 1) as f64), json!({})))
            .collect();

        let outcomes = preparer.prepare_all(&features, None);
        for (i, outcome) in outcomes.iter().enumerate() {
            let side = (i + 1) as f64;
            assert_eq!(included_weight(outcome), 1.0 / (side * side));
        }
    }

    #[test]
    fn reprojects_before_weighting() {
        let config = config(RunConfigBuilder::new("in.geojson"));
        let preparer = FeaturePreparer::new(&config, &PlanarOps, classifier());
        let reprojector = Reprojector::new(&Crs::wgs84(), &Crs::from_epsg(3857).unwrap()).unwrap();
        let f = feature(0, square(0.0, 0.0, 0.01), json!({}));

        let outcomes = preparer.prepare_all(std::slice::from_ref(&f), Some(&reprojector));
        let weight = included_weight(&outcomes[0]);
        // ~1113 m on a side at the equator
        assert!(weight > 1.0 / 1.3e6 && weight < 1.0 / 1.2e6, "{weight}");
    }
}
