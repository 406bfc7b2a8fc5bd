use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use chrono::NaiveDate;
use polars::{df, frame::DataFrame, prelude::DataFrameJoinOps};
use tracing::{error, info};

use crate::{
    aggregate::{TimeWindow, WindowSet},
    burn_days::burn_days_by_territory,
    enrich::EnrichedTable,
    errors::{FireError, Result},
    territory::{LayerKind, Territory, TerritoryCode, TerritoryLayer, TerritoryLayers},
};

/// Fire statistics of one territory. The cumulative count anchors the row; window counts
/// are absent when the territory has no detection in that window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerritoryCounts {
    pub code: TerritoryCode,
    pub fires_cumulative: u32,
    pub fires_7d: Option<u32>,
    pub fires_24h: Option<u32>,
    /// Consecutive burn days, from the cumulative history.
    pub burn_days: u32,
}

impl TerritoryCounts {
    pub fn fires(&self, window: TimeWindow) -> Option<u32> {
        match window {
            TimeWindow::Last24h => self.fires_24h,
            TimeWindow::Last7d => self.fires_7d,
            TimeWindow::Cumulative => Some(self.fires_cumulative),
        }
    }
}

/// A territory layer with its fire statistics merged on the territory code.
#[derive(Debug, Clone)]
pub struct LandAggregate {
    layer: TerritoryLayer,
    reference: NaiveDate,
    counts: Vec<TerritoryCounts>,
    index: AHashMap<TerritoryCode, usize>,
}

impl LandAggregate {
    #[inline] pub fn kind(&self) -> LayerKind { self.layer.kind() }

    #[inline] pub fn layer(&self) -> &TerritoryLayer { &self.layer }

    /// Reference date the burn days were counted back from.
    #[inline] pub fn reference(&self) -> NaiveDate { self.reference }

    /// Statistics of the territories with at least one cumulative detection, by code.
    #[inline] pub fn counts(&self) -> &[TerritoryCounts] { &self.counts }

    pub fn get(&self, code: &TerritoryCode) -> Option<&TerritoryCounts> {
        self.index.get(code).map(|&i| &self.counts[i])
    }

    /// Every territory of the static layer, in layer order, with its statistics if it burned.
    pub fn rows(&self) -> impl Iterator<Item = (&Territory, Option<&TerritoryCounts>)> + '_ {
        self.layer.territories().iter().map(|territory| (territory, self.get(&territory.code)))
    }

    /// The territory burning for the most consecutive days; `position` 1 is the first.
    /// Ties are broken by code.
    pub fn longest_burning(&self, position: usize) -> Option<&TerritoryCounts> {
        let mut ranked = self.counts.iter().filter(|c| c.burn_days > 0).collect::<Vec<_>>();
        ranked.sort_by(|a, b| b.burn_days.cmp(&a.burn_days).then_with(|| a.code.cmp(&b.code)));
        ranked.get(position.checked_sub(1)?).copied()
    }

    /// The static territory table left-joined with the statistics on the code column.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let code = self.layer.kind().code_column();
        let stats = df!(
            code => self.counts.iter().map(|c| c.code.as_str()).collect::<Vec<_>>(),
            TimeWindow::Cumulative.count_column() => self.counts.iter().map(|c| c.fires_cumulative).collect::<Vec<_>>(),
            TimeWindow::Last7d.count_column() => self.counts.iter().map(|c| c.fires_7d).collect::<Vec<_>>(),
            TimeWindow::Last24h.count_column() => self.counts.iter().map(|c| c.fires_24h).collect::<Vec<_>>(),
            "burn_days" => self.counts.iter().map(|c| c.burn_days).collect::<Vec<_>>(),
        )?;
        Ok(self.layer.to_frame()?.left_join(&stats, [code], [code])?)
    }
}

/// Number of distinct detections per territory of `layer` in `table`.
/// Rows outside the layer are excluded. A detection listed twice under the same code
/// counts once; under two codes (overlapping territories) it counts for both.
///
/// This is not a plain row count: on a with-duplicates table, a detection multiplied by an
/// overlap in another joined layer would otherwise be counted once per extra row.
pub fn count_by_territory(table: &EnrichedTable, layer: LayerKind) -> Result<BTreeMap<TerritoryCode, u32>> {
    let idx = table.schema().code_index(layer).ok_or_else(|| FireError::Aggregation {
        layer: layer.to_string(),
        reason: format!("detections carry no {} column", layer.code_column()),
    })?;

    let mut seen = AHashSet::with_capacity(table.len());
    let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
    for row in table.rows() {
        let Some(code) = row.value(idx) else { continue };
        if seen.insert((code, row.detection.id.as_str())) {
            *counts.entry(code).or_default() += 1;
        }
    }
    Ok(counts.into_iter().map(|(code, n)| (TerritoryCode::from(code), n)).collect())
}

/// Aggregate one layer: count each window, compute burn days from the cumulative history,
/// left-merge those on the cumulative counts, then left-merge onto the static layer.
///
/// The cumulative counts are the merge base, so a territory with 7d or 24h detections but
/// none left in the retained cumulative table (early January under `CalendarYear`) has no
/// counts at all.
pub fn aggregate_layer(layer: &TerritoryLayer, windows: WindowSet<'_>, reference: NaiveDate) -> Result<LandAggregate> {
    let kind = layer.kind();
    for window in TimeWindow::ALL {
        let table = windows.get(window);
        if table.crs() != layer.crs() {
            return Err(FireError::Aggregation {
                layer: kind.to_string(),
                reason: format!("{window} detections are in {}, layer is in {}", table.crs(), layer.crs()),
            });
        }
    }

    let cumulative = count_by_territory(windows.cumulative, kind)?;
    let last_7d = count_by_territory(windows.last_7d, kind)?;
    let last_24h = count_by_territory(windows.last_24h, kind)?;
    let burn_days = burn_days_by_territory(windows.cumulative, kind, reference);

    let mut counts = Vec::with_capacity(cumulative.len());
    let mut index = AHashMap::with_capacity(cumulative.len());
    for (code, fires) in cumulative {
        if layer.get(&code).is_none() {
            continue;
        }
        index.insert(code.clone(), counts.len());
        counts.push(TerritoryCounts {
            fires_7d: last_7d.get(&code).copied(),
            fires_24h: last_24h.get(&code).copied(),
            burn_days: burn_days.get(&code).copied().unwrap_or(0),
            fires_cumulative: fires,
            code,
        });
    }

    info!(layer = %kind, territories = layer.len(), burning = counts.len(), "aggregated layer");
    Ok(LandAggregate { layer: layer.clone(), reference, counts, index })
}

/// Per-layer aggregates and the layers that failed. One failure never stops the others.
#[derive(Debug, Default)]
pub struct AggregationReport {
    pub aggregates: BTreeMap<LayerKind, LandAggregate>,
    pub failures: Vec<FireError>,
}

/// Aggregate every listed layer independently.
pub fn aggregate_layers(
    layers: &TerritoryLayers,
    kinds: &[LayerKind],
    windows: WindowSet<'_>,
    reference: NaiveDate,
) -> AggregationReport {
    let mut report = AggregationReport::default();
    for &kind in kinds {
        let result = layers.get(kind)
            .ok_or_else(|| FireError::Aggregation { layer: kind.to_string(), reason: "layer not loaded".into() })
            .and_then(|layer| aggregate_layer(layer, windows, reference));
        match result {
            Ok(aggregate) => {
                report.aggregates.insert(kind, aggregate);
            }
            Err(err) => {
                error!(layer = %kind, error = %err, "layer aggregation failed");
                report.failures.push(err);
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};
    use geo::{polygon, MultiPolygon};

    use super::{aggregate_layer, aggregate_layers, count_by_territory};
    use crate::{
        aggregate::{TimeWindow, WindowSet},
        clip::StudyBoundary,
        config::LayerJoin,
        detection::{DetectionTable, FireDetection},
        enrich::{EnrichedTable, SpatialEnricher},
        errors::FireError,
        geom::Crs,
        territory::{LayerKind, TerritoryCode, TerritoryFeature, TerritoryLayer, TerritoryLayers},
    };

    fn square(x0: f64, y0: f64, side: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x0, y: y0), (x: x0 + side, y: y0), (x: x0 + side, y: y0 + side), (x: x0, y: y0 + side), (x: x0, y: y0),
        ]])
    }

    fn on(id: &str, day: u32, x: f64, y: f64) -> FireDetection {
        FireDetection::new(
            id,
            NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            NaiveTime::from_hms_opt(4, 0, 0).unwrap(),
            y,
            x,
        )
    }

    fn layers() -> TerritoryLayers {
        let boundary = StudyBoundary::new(Crs::SIRGAS2000, square(0.0, 0.0, 10.0)).unwrap();
        TerritoryLayers::new(boundary)
            .with_layer(TerritoryLayer::from_features(LayerKind::IndigenousLand, Crs::SIRGAS2000, vec![
                TerritoryFeature::new(Some("A"), Some("Alpha"), square(0.0, 0.0, 2.0)),
                TerritoryFeature::new(Some("B"), Some("Beta"), square(1.0, 1.0, 2.0)),
                TerritoryFeature::new(Some("C"), Some("Gamma"), square(6.0, 6.0, 2.0)),
            ]))
            .unwrap()
            .with_layer(TerritoryLayer::from_features(LayerKind::Biome, Crs::SIRGAS2000, vec![
                TerritoryFeature::new(Some("1"), Some("Amazonia"), square(0.0, 0.0, 10.0)),
            ]))
            .unwrap()
    }

    fn enrich(layers: &TerritoryLayers, detections: Vec<FireDetection>) -> EnrichedTable {
        let enricher = SpatialEnricher::new(layers, &[LayerJoin::new(LayerKind::IndigenousLand, &[])]).unwrap();
        enricher.enrich(&DetectionTable::new(Crs::SIRGAS2000, detections)).unwrap()
    }

    #[test]
    fn overlapping_territories_count_the_detection_once_each() {
        let layers = layers();
        // "x" falls inside A and B; "y" only inside A; "z" outside every land.
        let table = enrich(&layers, vec![on("x", 10, 1.5, 1.5), on("y", 10, 0.5, 0.5), on("z", 10, 5.0, 5.0)]);
        let counts = count_by_territory(&table, LayerKind::IndigenousLand).unwrap();
        assert_eq!(counts.get(&TerritoryCode::from("A")), Some(&2));
        assert_eq!(counts.get(&TerritoryCode::from("B")), Some(&1));
        assert_eq!(counts.len(), 2);

        let doubled = table.concat(&table).unwrap();
        assert_eq!(count_by_territory(&doubled, LayerKind::IndigenousLand).unwrap(), counts);
    }

    #[test]
    fn every_static_territory_is_present() {
        let layers = layers();
        let cumulative = enrich(&layers, vec![
            on("a1", 10, 0.5, 0.5),
            on("a2", 9, 0.5, 0.5),
            on("a3", 8, 0.5, 0.5),
            on("a4", 5, 0.5, 0.5),
            on("b1", 9, 2.5, 2.5),
        ]);
        let last_7d = cumulative.filter(|row| row.detection.date >= NaiveDate::from_ymd_opt(2024, 1, 9).unwrap());
        let last_24h = cumulative.empty_like();
        let windows = WindowSet { last_24h: &last_24h, last_7d: &last_7d, cumulative: &cumulative };

        let land = layers.get(LayerKind::IndigenousLand).unwrap();
        let aggregate = aggregate_layer(land, windows, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()).unwrap();

        let a = aggregate.get(&"A".into()).unwrap();
        assert_eq!((a.fires_cumulative, a.fires_7d, a.fires_24h, a.burn_days), (4, Some(2), None, 3));
        let b = aggregate.get(&"B".into()).unwrap();
        assert_eq!((b.fires(TimeWindow::Cumulative), b.burn_days), (Some(1), 0));
        assert!(aggregate.get(&"C".into()).is_none());
        assert_eq!(aggregate.rows().count(), 3);
        assert_eq!(aggregate.longest_burning(1).map(|c| c.code.as_str()), Some("A"));
        assert!(aggregate.longest_burning(2).is_none());

        let df = aggregate.to_frame().unwrap();
        assert_eq!(df.height(), 3);
        let codes = df.column("indigenous_land_code").unwrap().str().unwrap();
        let fires = df.column("fires_cumulative").unwrap().u32().unwrap();
        let gamma = (0..df.height()).find(|&i| codes.get(i) == Some("C")).unwrap();
        assert_eq!(fires.get(gamma), None);
        let alpha = (0..df.height()).find(|&i| codes.get(i) == Some("A")).unwrap();
        assert_eq!(fires.get(alpha), Some(4));
    }

    #[test]
    fn window_counts_need_a_cumulative_row() {
        let layers = layers();
        // The archive kept only "a"; "b" burned in the window but fell outside retention.
        let cumulative = enrich(&layers, vec![on("a", 2, 0.5, 0.5)]);
        let recent = enrich(&layers, vec![on("a", 2, 0.5, 0.5), on("b", 2, 6.5, 6.5)]);
        let windows = WindowSet { last_24h: &recent, last_7d: &recent, cumulative: &cumulative };

        let land = layers.get(LayerKind::IndigenousLand).unwrap();
        let aggregate = aggregate_layer(land, windows, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()).unwrap();

        let a = aggregate.get(&"A".into()).unwrap();
        assert_eq!((a.fires_cumulative, a.fires_7d, a.fires_24h), (1, Some(1), Some(1)));
        assert!(aggregate.get(&"C".into()).is_none());
    }

    #[test]
    fn one_failing_layer_does_not_stop_the_others() {
        let layers = layers();
        let table = enrich(&layers, vec![on("a", 10, 0.5, 0.5)]);
        let windows = WindowSet { last_24h: &table, last_7d: &table, cumulative: &table };
        let report = aggregate_layers(
            &layers,
            &[LayerKind::Biome, LayerKind::IndigenousLand, LayerKind::City],
            windows,
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
        );
        assert_eq!(report.aggregates.len(), 1);
        assert!(report.aggregates.contains_key(&LayerKind::IndigenousLand));
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures.iter().all(|err| matches!(err, FireError::Aggregation { .. }) && !err.is_fatal()));
    }
}
