use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    config::LayerJoin,
    detection::DetectionTable,
    enrich::{EnrichedColumn, EnrichedRow, EnrichedSchema, EnrichedTable},
    errors::{FireError, Result},
    territory::{TerritoryField, TerritoryLayer, TerritoryLayers},
};

/// One left join: the layer, and the schema slot each of its fields lands in.
struct JoinStep<'a> {
    layer: &'a TerritoryLayer,
    slots: Vec<(usize, TerritoryField)>,
}

impl JoinStep<'_> {
    fn fill(&self, mut row: EnrichedRow, territory: usize) -> EnrichedRow {
        let territory = &self.layer.territories()[territory];
        for (idx, field) in &self.slots {
            row.values[*idx] = territory.field(field).cloned();
        }
        row
    }
}

/// Joins detections against an ordered list of territory layers.
///
/// Every layer contributes its code column, its name column and the configured attribute
/// columns. Joins are left joins on strict containment: a detection outside every territory
/// of a layer keeps one row with empty values, a detection inside `n` overlapping territories
/// becomes `n` rows (in territory order). When a later layer exposes a column name already
/// taken, the earlier column is kept and the later one is discarded.
pub struct SpatialEnricher<'a> {
    steps: Vec<JoinStep<'a>>,
    schema: Arc<EnrichedSchema>,
}

impl<'a> SpatialEnricher<'a> {
    /// Resolve the join plan. Every joined layer must be loaded in `layers`.
    pub fn new(layers: &'a TerritoryLayers, joins: &[LayerJoin]) -> Result<Self> {
        let mut schema = EnrichedSchema::default();
        let mut steps = Vec::with_capacity(joins.len());

        for join in joins {
            let layer = layers.get(join.kind)
                .ok_or_else(|| FireError::Config(format!("layer {} is joined but not loaded", join.kind)))?;

            let fields = [
                (TerritoryField::Code, join.kind.code_column().to_string()),
                (TerritoryField::Name, join.kind.name_column().to_string()),
            ]
            .into_iter()
            .chain(join.columns.iter().map(|name| (TerritoryField::Attribute(name.clone()), name.clone())));

            let mut slots = Vec::new();
            for (field, name) in fields {
                let column = EnrichedColumn { name: name.clone(), layer: join.kind, field: field.clone() };
                match schema.push(column)? {
                    Some(idx) => slots.push((idx, field)),
                    None => debug!(layer = %join.kind, column = %name, "column provided by an earlier layer, discarding"),
                }
            }
            steps.push(JoinStep { layer, slots });
        }

        Ok(Self { steps, schema: Arc::new(schema) })
    }

    #[inline] pub fn schema(&self) -> &EnrichedSchema { &self.schema }

    /// Join `table` against every layer in order. Any layer in another CRS than the
    /// table aborts the whole enrichment.
    pub fn enrich(&self, table: &DetectionTable) -> Result<EnrichedTable> {
        for step in &self.steps {
            step.layer.ensure_crs(table.crs())?;
        }

        let width = self.schema.len();
        let mut rows = table.rows().iter()
            .map(|detection| EnrichedRow { detection: detection.clone(), values: vec![None; width] })
            .collect::<Vec<_>>();

        for step in &self.steps {
            let mut joined = Vec::with_capacity(rows.len());
            let mut matched = 0usize;
            for row in rows {
                let hits = step.layer.containing(&row.detection.position);
                let Some((&last, rest)) = hits.split_last() else {
                    joined.push(row);
                    continue;
                };
                matched += 1;
                for &i in rest {
                    joined.push(step.fill(row.clone(), i));
                }
                joined.push(step.fill(row, last));
            }
            debug!(layer = %step.layer.kind(), matched, rows = joined.len(), "joined layer");
            rows = joined;
        }

        info!(detections = table.len(), rows = rows.len(), layers = self.steps.len(), "enriched detections");
        Ok(EnrichedTable::new(table.crs(), self.schema.clone(), rows))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};
    use geo::{polygon, MultiPolygon};

    use super::SpatialEnricher;
    use crate::{
        clip::StudyBoundary,
        config::LayerJoin,
        detection::{DetectionTable, FireDetection},
        errors::FireError,
        geom::Crs,
        territory::{LayerKind, TerritoryFeature, TerritoryLayer, TerritoryLayers},
    };

    fn square(x0: f64, y0: f64, side: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x0, y: y0), (x: x0 + side, y: y0), (x: x0 + side, y: y0 + side), (x: x0, y: y0 + side), (x: x0, y: y0),
        ]])
    }

    fn detection(id: &str, x: f64, y: f64) -> FireDetection {
        FireDetection::new(
            id,
            NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            y,
            x,
        )
    }

    fn layers() -> TerritoryLayers {
        let boundary = StudyBoundary::new(Crs::SIRGAS2000, square(0.0, 0.0, 10.0)).unwrap();
        TerritoryLayers::new(boundary)
            .with_layer(TerritoryLayer::from_features(LayerKind::City, Crs::SIRGAS2000, vec![
                TerritoryFeature::new(Some("1500107"), Some("Abaetetuba"), square(0.0, 0.0, 5.0)).with_attribute("state", "PA"),
            ])).unwrap()
            .with_layer(TerritoryLayer::from_features(LayerKind::ProtectedArea, Crs::SIRGAS2000, vec![
                TerritoryFeature::new(Some("UC-1"), Some("Reserva A"), square(1.0, 1.0, 2.0)),
                TerritoryFeature::new(Some("UC-2"), Some("Reserva B"), square(2.0, 2.0, 2.0)),
            ])).unwrap()
            .with_layer(TerritoryLayer::from_features(LayerKind::Grid, Crs::SIRGAS2000, vec![
                TerritoryFeature::new(Some("1"), None, square(0.0, 0.0, 10.0)).with_attribute("state", "PA, AM"),
            ])).unwrap()
    }

    #[test]
    fn overlapping_territories_multiply_rows() {
        let layers = layers();
        let joins = [
            LayerJoin::new(LayerKind::City, &["state"]),
            LayerJoin::new(LayerKind::ProtectedArea, &[]),
        ];
        let enricher = SpatialEnricher::new(&layers, &joins).unwrap();
        let table = DetectionTable::new(Crs::SIRGAS2000, vec![
            detection("both", 2.5, 2.5),
            detection("one", 1.5, 1.5),
            detection("none", 7.0, 7.0),
        ]);
        let enriched = enricher.enrich(&table).unwrap();

        assert_eq!(enriched.len(), 4);
        let codes = enriched.rows().iter()
            .map(|row| (row.detection.id.as_str(), enriched.code(row, LayerKind::ProtectedArea).map(|c| c.to_string())))
            .collect::<Vec<_>>();
        assert_eq!(codes, [
            ("both", Some("UC-1".to_string())),
            ("both", Some("UC-2".to_string())),
            ("one", Some("UC-1".to_string())),
            ("none", None),
        ]);
        let none = &enriched.rows()[3];
        assert_eq!(enriched.value(none, "city"), None);
        assert_eq!(enriched.value(&enriched.rows()[0], "state"), Some("PA"));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn later_colliding_columns_are_discarded() {
        let layers = layers();
        let joins = [
            LayerJoin::new(LayerKind::City, &["state"]),
            LayerJoin::new(LayerKind::Grid, &["state"]),
        ];
        let enricher = SpatialEnricher::new(&layers, &joins).unwrap();
        let names = enricher.schema().columns().iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["city_code", "city", "state", "cell_code", "cell"]);

        let enriched = enricher.enrich(&DetectionTable::new(Crs::SIRGAS2000, vec![detection("a", 1.0, 0.5)])).unwrap();
        assert_eq!(enriched.value(&enriched.rows()[0], "state"), Some("PA"));
        assert_eq!(enriched.schema().layers(), [LayerKind::City, LayerKind::Grid]);
    }

    #[test]
    fn attribute_shadowing_a_code_column_is_rejected() {
        let layers = layers();
        let joins = [
            LayerJoin::new(LayerKind::City, &["cell_code"]),
            LayerJoin::new(LayerKind::Grid, &[]),
        ];
        assert!(matches!(SpatialEnricher::new(&layers, &joins), Err(FireError::Config(_))));
    }

    #[test]
    fn crs_mismatch_aborts() {
        let layers = layers();
        let enricher = SpatialEnricher::new(&layers, &[LayerJoin::new(LayerKind::City, &[])]).unwrap();
        let table = DetectionTable::new(Crs::WGS84, vec![detection("a", 1.0, 1.0)]);
        assert!(matches!(enricher.enrich(&table), Err(FireError::CoordinateMismatch { .. })));
    }

    #[test]
    fn subsets_follow_territory_codes() {
        let layers = layers();
        let enricher = SpatialEnricher::new(&layers, &[LayerJoin::new(LayerKind::ProtectedArea, &[])]).unwrap();
        let enriched = enricher.enrich(&DetectionTable::new(Crs::SIRGAS2000, vec![
            detection("a", 1.5, 1.5),
            detection("b", 3.5, 3.5),
            detection("c", 8.0, 8.0),
        ])).unwrap();
        assert_eq!(enriched.inside(LayerKind::ProtectedArea).len(), 2);
        assert_eq!(enriched.in_territory(LayerKind::ProtectedArea, &"UC-2".into()).len(), 1);
        assert!(enriched.inside(LayerKind::Biome).is_empty());
    }
}
