use chrono::{NaiveDate, NaiveTime};
use firescope::{
    aggregate::{aggregate_layer, TimeWindow, WindowSet, WindowTables},
    build_layers,
    burn_days::consecutive_burn_days,
    dedup::{resolve, DuplicatePass},
    detection::{DetectionTable, FireDetection},
    enrich::SpatialEnricher,
    territory::{LayerKind, TerritoryCode, TerritoryFeature, TerritoryLayers},
    Crs, LayerJoin, Pipeline, PipelineConfig, RunInputs, StudyBoundary,
};
use geo::{polygon, MultiPolygon};
use polars::df;

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![polygon![
        (x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0),
    ]])
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
}

fn detection(id: &str, date: NaiveDate, lon: f64) -> FireDetection {
    FireDetection::new(id, date, NaiveTime::from_hms_opt(4, 30, 0).unwrap(), 5.0, lon)
}

fn config() -> PipelineConfig {
    PipelineConfig {
        source_crs: Crs::SIRGAS2000,
        layers: vec![
            LayerJoin::new(LayerKind::City, &["state"]),
            LayerJoin::new(LayerKind::ProtectedArea, &[]),
        ],
        ..PipelineConfig::default()
    }
}

/// A 100 x 10 region with three cities and two overlapping protected areas.
fn layers(config: &PipelineConfig) -> TerritoryLayers {
    let boundary = StudyBoundary::new(Crs::SIRGAS2000, rect(0.0, 0.0, 100.0, 10.0)).unwrap();
    let loaded = vec![
        (LayerKind::City, vec![
            TerritoryFeature::new(Some("C1"), Some("Altamira"), rect(0.0, 0.0, 40.0, 10.0)).with_attribute("state", "PA"),
            TerritoryFeature::new(Some("C2"), Some("Labrea"), rect(40.0, 0.0, 80.0, 10.0)).with_attribute("state", "AM"),
            TerritoryFeature::new(Some("C3"), Some("Humaita"), rect(80.0, 0.0, 100.0, 10.0)).with_attribute("state", "AM"),
        ]),
        (LayerKind::ProtectedArea, vec![
            TerritoryFeature::new(Some("A"), Some("Reserva A"), rect(0.0, 0.0, 10.0, 10.0)),
            TerritoryFeature::new(Some("B"), Some("Reserva B"), rect(5.0, 0.0, 20.0, 10.0)),
        ]),
    ];
    build_layers(config, boundary, loaded).unwrap().layers
}

#[test]
fn overlapping_territories_multiply_rows_until_resolved() {
    let config = config();
    let layers = layers(&config);
    let enricher = SpatialEnricher::new(&layers, &[LayerJoin::new(LayerKind::ProtectedArea, &[])]).unwrap();

    // Points at 5.5 .. 9.5 fall in both protected areas.
    let points = (0..100).map(|i| detection(&format!("p{i}"), day(10), i as f64 + 0.5)).collect();
    let enriched = enricher.enrich(&DetectionTable::new(Crs::SIRGAS2000, points)).unwrap();
    assert_eq!(enriched.len(), 105);

    let resolved = resolve(&enriched);
    assert_eq!(resolved.clean.len(), 100);
    assert_eq!(resolved.with_duplicates.len(), 105);
    assert_eq!(resolved.join_removed.len(), 5);
    assert!(resolved.source_removed.is_empty());
    assert_eq!(resolved.clean.inside(LayerKind::ProtectedArea).len(), 20);
}

#[test]
fn refetched_window_drops_reidentified_detections_entirely() {
    let config = config();
    let layers = layers(&config);
    let enricher = SpatialEnricher::new(&layers, &[LayerJoin::new(LayerKind::City, &[])]).unwrap();

    let mut points = (0..10).map(|i| detection(&format!("first-{i}"), day(10), 30.0 + i as f64)).collect::<Vec<_>>();
    points.extend((0..3).map(|i| detection(&format!("second-{i}"), day(10), 30.0 + i as f64)));
    let enriched = enricher.enrich(&DetectionTable::new(Crs::SIRGAS2000, points)).unwrap();

    let resolved = resolve(&enriched);
    assert!(resolved.join_removed.is_empty());
    assert_eq!(resolved.source_removed.len(), 3);
    assert_eq!(resolved.clean.len(), 10);
    assert_eq!(resolved.with_duplicates.len(), 10);
    assert!(resolved.with_duplicates.rows().iter().all(|row| row.detection.id.as_str().starts_with("first-")));
}

#[test]
fn resolving_twice_changes_nothing() {
    let config = config();
    let layers = layers(&config);
    let enricher = SpatialEnricher::new(&layers, &config.layers).unwrap();
    let points = (0..20).map(|i| detection(&format!("p{i}"), day(10), i as f64 + 0.5)).collect();
    let once = resolve(&enricher.enrich(&DetectionTable::new(Crs::SIRGAS2000, points)).unwrap());
    let twice = resolve(&once.clean);

    assert_eq!(twice.clean.len(), once.clean.len());
    assert!(twice.join_removed.is_empty());
    assert!(twice.source_removed.is_empty());
    let ids = |table: &firescope::enrich::EnrichedTable| {
        table.rows().iter().map(|row| row.detection.id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&twice.clean), ids(&once.clean));
}

#[test]
fn burn_day_streaks() {
    assert_eq!(consecutive_burn_days([day(10), day(9), day(8)], day(10)), 3);
    assert_eq!(consecutive_burn_days([day(9), day(8)], day(10)), 0);
    assert_eq!(consecutive_burn_days(Vec::<NaiveDate>::new(), day(10)), 0);
    assert_eq!(consecutive_burn_days([day(10), day(8), day(7)], day(10)), 1);
}

#[test]
fn territories_without_fires_stay_in_the_aggregate() {
    let config = config();
    let layers = layers(&config);
    let enricher = SpatialEnricher::new(&layers, &config.layers).unwrap();
    let table = enricher.enrich(&DetectionTable::new(Crs::SIRGAS2000, vec![
        detection("a", day(9), 1.0),
        detection("b", day(10), 2.0),
    ])).unwrap();
    let resolved = resolve(&table);
    let tables = WindowTables { clean: resolved.clean, with_duplicates: resolved.with_duplicates };

    let cities = layers.get(LayerKind::City).unwrap();
    let aggregate = aggregate_layer(cities, WindowSet::with_duplicates(&tables, &tables, &tables), day(10)).unwrap();
    let rows = aggregate.rows().collect::<Vec<_>>();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].1.map(|c| (c.fires_cumulative, c.burn_days)), Some((2, 2)));
    assert!(rows[1].1.is_none());
    assert!(rows[2].1.is_none());

    let df = aggregate.to_frame().unwrap();
    assert_eq!(df.height(), 3);
    assert_eq!(df.column(TimeWindow::Cumulative.count_column()).unwrap().null_count(), 2);
}

#[test]
fn full_run_publishes_every_window_and_layer() {
    let config = config();
    let layers = layers(&config);
    let pipeline = Pipeline::new(&config, &layers).unwrap();

    let last_24h = df!(
        "uuid" => ["a", "b", "c", "z"],
        "acq_date" => ["2024-09-10", "2024-09-10", "2024-09-10", "2024-09-10"],
        "acq_time" => ["130", "1415", "1415", "0200"],
        "latitude" => [5.0, 5.0, 5.0, 5.0],
        "longitude" => [7.5, 45.0, 45.0, 150.0],
    ).unwrap();
    let last_7d = df!(
        "uuid" => ["a", "b", "d", "e"],
        "acq_date" => ["2024-09-10", "2024-09-10", "2024-09-08", "2024-09-09"],
        "acq_time" => ["130", "1415", "0300", "0400"],
        "latitude" => [5.0, 5.0, 5.0, 5.0],
        "longitude" => [7.5, 45.0, 30.0, 31.0],
    ).unwrap();

    let first = pipeline.run(RunInputs { last_24h: &last_24h, last_7d: &last_7d, previous: None, reference: day(10) }).unwrap();

    assert_eq!(first.last_24h.clean.len(), 2);
    assert_eq!(first.last_24h.with_duplicates.len(), 3);
    assert_eq!(first.last_7d.clean.len(), 4);
    assert_eq!(first.cumulative.clean.len(), 2);
    assert_eq!(first.audit.len(), 5);
    let removed = |table: &str, pass: DuplicatePass| {
        first.audit.iter().find(|e| e.table == table && e.pass == pass).map(|e| e.removed.len())
    };
    assert_eq!(removed("24h", DuplicatePass::Join), Some(1));
    assert_eq!(removed("24h", DuplicatePass::Source), Some(1));
    assert_eq!(removed("7d", DuplicatePass::Join), Some(1));
    assert_eq!(removed("cumulative", DuplicatePass::Source), Some(0));

    assert!(first.report.failures.is_empty());
    let cities = &first.report.aggregates[&LayerKind::City];
    let c1 = cities.get(&TerritoryCode::from("C1")).unwrap();
    assert_eq!((c1.fires_cumulative, c1.fires_7d, c1.fires_24h, c1.burn_days), (1, Some(3), Some(1), 1));
    assert!(cities.get(&TerritoryCode::from("C3")).is_none());
    let lands = &first.report.aggregates[&LayerKind::ProtectedArea];
    assert_eq!(lands.get(&TerritoryCode::from("A")).map(|c| c.fires_cumulative), Some(1));
    assert_eq!(lands.get(&TerritoryCode::from("B")).map(|c| c.fires_cumulative), Some(1));

    // Next day: the archive is restored from the published clean table.
    let previous = first.cumulative.clean.to_frame(&config.columns).unwrap();
    let next_24h = df!(
        "uuid" => ["b", "f"],
        "acq_date" => ["2024-09-10", "2024-09-11"],
        "acq_time" => ["1415", "0200"],
        "latitude" => [5.0, 5.0],
        "longitude" => [45.0, 46.0],
    ).unwrap();
    let second = pipeline.run(RunInputs {
        last_24h: &next_24h,
        last_7d: &next_24h,
        previous: Some(&previous),
        reference: day(11),
    }).unwrap();

    assert_eq!(second.cumulative.clean.len(), 3);
    let cities = &second.report.aggregates[&LayerKind::City];
    let c2 = cities.get(&TerritoryCode::from("C2")).unwrap();
    assert_eq!((c2.fires_cumulative, c2.burn_days), (2, 2));
    assert_eq!(cities.get(&TerritoryCode::from("C1")).map(|c| c.burn_days), Some(0));
}
