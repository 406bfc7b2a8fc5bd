//! One run of the core: project, clip, enrich and deduplicate each window, fold the
//! fresh 24h tables into the archive, then aggregate every layer.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use polars::frame::DataFrame;
use tracing::{debug, info};

use crate::{
    aggregate::{aggregate_layers, AggregationReport, TimeWindow, WindowSet, WindowTables},
    archive::{update_cumulative, ArchiveUpdate},
    clip::{clip_points, prepare_layer, StudyBoundary},
    config::PipelineConfig,
    dedup::{resolve, AuditEntry, DuplicatePass},
    detection::{DetectionTable, GeometryProjector},
    enrich::{EnrichedTable, SpatialEnricher},
    errors::{FireError, Result},
    territory::{
        annotate_intersections, build_grid, grid_summaries, land_summaries, LayerKind, TerritoryFeature,
        TerritoryLayer, TerritoryLayers,
    },
};

/// The static layers of a run and the territories dropped while preparing them.
#[derive(Debug)]
pub struct LayerBuild {
    pub layers: TerritoryLayers,
    pub rejected: Vec<FireError>,
}

/// Prepare the static layers of a run from loaded features, all expressed in the reference CRS.
///
/// Every layer is trimmed to the boundary. Protected areas and indigenous lands are annotated
/// with the biomes, cities and states they intersect. When the grid is joined but was not
/// loaded, it is built over the boundary and annotated with every other layer.
pub fn build_layers(
    config: &PipelineConfig,
    boundary: StudyBoundary,
    loaded: Vec<(LayerKind, Vec<TerritoryFeature>)>,
) -> Result<LayerBuild> {
    let crs = config.reference_crs;
    if boundary.crs() != crs {
        return Err(FireError::CoordinateMismatch { layer: "boundary".into(), expected: crs.epsg(), found: boundary.crs().epsg() });
    }

    let mut prepared: BTreeMap<LayerKind, TerritoryLayer> = BTreeMap::new();
    let mut rejected = Vec::new();
    for (kind, features) in loaded {
        let layer = prepare_layer(kind, crs, features, &boundary)?;
        rejected.extend(layer.rejected);
        if prepared.insert(kind, layer.layer).is_some() {
            return Err(FireError::Config(format!("layer {kind} is loaded twice")));
        }
    }

    let mut annotated = Vec::new();
    for target in [LayerKind::ProtectedArea, LayerKind::IndigenousLand] {
        let Some(mut layer) = prepared.get(&target).cloned() else { continue };
        for source in [LayerKind::Biome, LayerKind::City] {
            if let Some(source_layer) = prepared.get(&source) {
                layer = annotate_intersections(&layer, source_layer, &land_summaries(source))?;
            }
        }
        annotated.push(layer);
    }
    for layer in annotated {
        prepared.insert(layer.kind(), layer);
    }

    let joins_grid = config.layers.iter().any(|join| join.kind == LayerKind::Grid);
    if joins_grid && !prepared.contains_key(&LayerKind::Grid) {
        let mut grid = build_grid(&boundary, config.grid_cell_degrees)?;
        for source in [LayerKind::City, LayerKind::Biome, LayerKind::IndigenousLand, LayerKind::ProtectedArea] {
            if let Some(source_layer) = prepared.get(&source) {
                grid = annotate_intersections(&grid, source_layer, &grid_summaries(source))?;
            }
        }
        prepared.insert(LayerKind::Grid, grid);
    } else if !joins_grid {
        debug!("grid not joined, not building it");
    }

    let mut layers = TerritoryLayers::new(boundary);
    for layer in prepared.into_values() {
        layers.insert(layer)?;
    }
    info!(layers = layers.len(), rejected = rejected.len(), "prepared static layers");
    Ok(LayerBuild { layers, rejected })
}

/// Enriched tables of one window and the duplicates removed on the way.
#[derive(Debug, Clone)]
pub struct WindowRun {
    pub tables: WindowTables,
    pub audit: Vec<AuditEntry>,
}

/// Raw inputs of a full run.
#[derive(Debug, Clone, Copy)]
pub struct RunInputs<'a> {
    pub last_24h: &'a DataFrame,
    pub last_7d: &'a DataFrame,
    /// The previously published cumulative clean table, if any.
    pub previous: Option<&'a DataFrame>,
    /// Reference "today" for retention and burn days.
    pub reference: NaiveDate,
}

/// Everything a run publishes.
#[derive(Debug)]
pub struct RunOutput {
    pub last_24h: WindowTables,
    pub last_7d: WindowTables,
    pub cumulative: WindowTables,
    pub audit: Vec<AuditEntry>,
    pub report: AggregationReport,
}

impl RunOutput {
    pub fn window(&self, window: TimeWindow) -> &WindowTables {
        match window {
            TimeWindow::Last24h => &self.last_24h,
            TimeWindow::Last7d => &self.last_7d,
            TimeWindow::Cumulative => &self.cumulative,
        }
    }
}

/// The stages of one run, bound to a configuration and the static territory layers.
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    layers: &'a TerritoryLayers,
    projector: GeometryProjector,
    enricher: SpatialEnricher<'a>,
}

impl<'a> Pipeline<'a> {
    /// Validate the configuration against the loaded layers. Fails on any configuration-class
    /// error (undefined CRS, layers in another CRS, joined layer not loaded).
    pub fn new(config: &'a PipelineConfig, layers: &'a TerritoryLayers) -> Result<Self> {
        config.validate()?;
        if layers.crs() != config.reference_crs {
            return Err(FireError::CoordinateMismatch {
                layer: "boundary".into(),
                expected: config.reference_crs.epsg(),
                found: layers.crs().epsg(),
            });
        }
        let projector = GeometryProjector::new(config.source_crs, config.reference_crs, config.columns.clone())?;
        let enricher = SpatialEnricher::new(layers, &config.layers)?;
        Ok(Self { config, layers, projector, enricher })
    }

    #[inline] pub fn config(&self) -> &PipelineConfig { self.config }

    #[inline] pub fn layers(&self) -> &TerritoryLayers { self.layers }

    /// Layers aggregated by [`aggregate`](Self::aggregate), in join order.
    pub fn layer_kinds(&self) -> Vec<LayerKind> {
        self.config.layers.iter().map(|join| join.kind).collect()
    }

    /// Project and clip a raw table to the study boundary.
    pub fn ingest(&self, raw: &DataFrame) -> Result<DetectionTable> {
        let projected = self.projector.project(raw)?;
        clip_points(&projected, self.layers.boundary())
    }

    /// Join detections against every configured layer.
    pub fn enrich(&self, detections: &DetectionTable) -> Result<EnrichedTable> {
        self.enricher.enrich(detections)
    }

    /// Ingest, enrich and deduplicate one window.
    pub fn run_window(&self, raw: &DataFrame, label: &str, run_date: NaiveDate) -> Result<WindowRun> {
        let enriched = self.enrich(&self.ingest(raw)?)?;
        let resolved = resolve(&enriched);
        let audit = vec![
            AuditEntry::new(run_date, label, DuplicatePass::Join, resolved.join_removed),
            AuditEntry::new(run_date, label, DuplicatePass::Source, resolved.source_removed),
        ];
        Ok(WindowRun {
            tables: WindowTables { clean: resolved.clean, with_duplicates: resolved.with_duplicates },
            audit,
        })
    }

    /// Rebuild the archived cumulative tables from their published clean table.
    /// Identifiers are kept; enrichment is recomputed against the current layers.
    pub fn restore_archive(&self, raw: &DataFrame) -> Result<WindowTables> {
        let resolved = resolve(&self.enrich(&self.ingest(raw)?)?);
        Ok(WindowTables { clean: resolved.clean, with_duplicates: resolved.with_duplicates })
    }

    /// Fold fresh tables into the archive under the configured retention.
    pub fn update_archive(&self, previous: &WindowTables, fresh: &WindowTables, reference: NaiveDate) -> Result<ArchiveUpdate> {
        update_cumulative(previous, fresh, self.config.retention, reference)
    }

    /// Aggregate every configured layer. Failures are isolated per layer in the report.
    pub fn aggregate(&self, windows: WindowSet<'_>, reference: NaiveDate) -> AggregationReport {
        aggregate_layers(self.layers, &self.layer_kinds(), windows, reference)
    }

    /// The whole run. Inputs are never modified; on error nothing is returned.
    pub fn run(&self, inputs: RunInputs<'_>) -> Result<RunOutput> {
        let RunInputs { last_24h, last_7d, previous, reference } = inputs;

        let day = self.run_window(last_24h, TimeWindow::Last24h.to_str(), reference)?;
        let week = self.run_window(last_7d, TimeWindow::Last7d.to_str(), reference)?;

        let previous = match previous {
            Some(raw) => self.restore_archive(raw)?,
            None => {
                let empty = self.enrich(&DetectionTable::new(self.layers.crs(), vec![]))?;
                WindowTables { clean: empty.clone(), with_duplicates: empty }
            }
        };
        let update = self.update_archive(&previous, &day.tables, reference)?;

        let mut audit = day.audit;
        audit.extend(week.audit);
        audit.push(AuditEntry::new(reference, TimeWindow::Cumulative.to_str(), DuplicatePass::Source, update.source_removed));

        let report = self.aggregate(WindowSet::with_duplicates(&day.tables, &week.tables, &update.tables), reference);
        info!(
            detections_24h = day.tables.clean.len(),
            detections_7d = week.tables.clean.len(),
            detections_cumulative = update.tables.clean.len(),
            aggregated = report.aggregates.len(),
            failed = report.failures.len(),
            "run complete",
        );

        Ok(RunOutput {
            last_24h: day.tables,
            last_7d: week.tables,
            cumulative: update.tables,
            audit,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use geo::{polygon, MultiPolygon};

    use super::build_layers;
    use crate::{
        clip::StudyBoundary,
        config::{LayerJoin, PipelineConfig},
        errors::FireError,
        geom::Crs,
        territory::{LayerKind, TerritoryFeature},
    };

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0),
        ]])
    }

    fn config(joins: Vec<LayerJoin>) -> PipelineConfig {
        PipelineConfig { layers: joins, grid_cell_degrees: 5.0, ..PipelineConfig::default() }
    }

    fn loaded() -> Vec<(LayerKind, Vec<TerritoryFeature>)> {
        vec![
            (LayerKind::Biome, vec![TerritoryFeature::new(Some("1"), Some("Amazonia"), rect(0.0, 0.0, 10.0, 10.0))]),
            (LayerKind::City, vec![
                TerritoryFeature::new(Some("1500107"), Some("Abaetetuba"), rect(0.0, 0.0, 4.0, 4.0)).with_attribute("state", "PA"),
            ]),
            (LayerKind::ProtectedArea, vec![
                TerritoryFeature::new(Some("P1"), Some("Reserva"), rect(2.0, 2.0, 3.0, 3.0)),
                TerritoryFeature::new(Some("P2"), None, MultiPolygon::new(vec![polygon![
                    (x: 6.0, y: 6.0), (x: 7.0, y: 7.0), (x: 8.0, y: 8.0), (x: 6.0, y: 6.0),
                ]])),
            ]),
        ]
    }

    #[test]
    fn lands_are_annotated_and_grid_is_built() {
        let boundary = StudyBoundary::new(Crs::SIRGAS2000, rect(0.0, 0.0, 10.0, 10.0)).unwrap();
        let config = config(vec![
            LayerJoin::new(LayerKind::ProtectedArea, &[]),
            LayerJoin::new(LayerKind::Grid, &[]),
        ]);
        let build = build_layers(&config, boundary, loaded()).unwrap();

        assert_eq!(build.layers.len(), 4);
        assert_eq!(build.rejected.len(), 1);

        let lands = build.layers.get(LayerKind::ProtectedArea).unwrap();
        assert_eq!(lands.len(), 1);
        let reserve = &lands.territories()[0];
        assert_eq!(reserve.attributes.get("biomes").map(|v| v.as_ref()), Some("Amazonia"));
        assert_eq!(reserve.attributes.get("cities").map(|v| v.as_ref()), Some("Abaetetuba"));
        assert_eq!(reserve.attributes.get("states").map(|v| v.as_ref()), Some("PA"));

        let grid = build.layers.get(LayerKind::Grid).unwrap();
        assert_eq!(grid.len(), 4);
        let first = grid.get(&"1".into()).unwrap();
        assert_eq!(first.attributes.get("city").map(|v| v.as_ref()), Some("Abaetetuba"));
        assert_eq!(first.attributes.get("state").map(|v| v.as_ref()), Some("PA"));
        assert_eq!(first.attributes.get("protected_area_code").map(|v| v.as_ref()), Some("P1"));
        let last = grid.get(&"4".into()).unwrap();
        assert!(!last.attributes.contains_key("city"));
        assert_eq!(last.attributes.get("biome").map(|v| v.as_ref()), Some("Amazonia"));
    }

    #[test]
    fn grid_is_skipped_when_not_joined() {
        let boundary = StudyBoundary::new(Crs::SIRGAS2000, rect(0.0, 0.0, 10.0, 10.0)).unwrap();
        let build = build_layers(&config(vec![LayerJoin::new(LayerKind::Biome, &[])]), boundary, loaded()).unwrap();
        assert!(build.layers.get(LayerKind::Grid).is_none());
    }

    #[test]
    fn boundary_in_another_crs_is_rejected() {
        let boundary = StudyBoundary::new(Crs::WGS84, rect(0.0, 0.0, 10.0, 10.0)).unwrap();
        let err = build_layers(&config(vec![]), boundary, loaded()).unwrap_err();
        assert!(matches!(err, FireError::CoordinateMismatch { .. }));
    }
}
