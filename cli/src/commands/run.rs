use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use firescope::{
    aggregate::{TimeWindow, WindowTables},
    detection::assign_identifiers,
    io::{self, SourceManifest},
    build_layers, DetectionColumns, Pipeline, PipelineConfig, RunInputs, RunOutput, StudyBoundary,
};
use polars::frame::DataFrame;
use tracing::{info, warn};

const CUMULATIVE_CLEAN: &str = "fires_cumulative.csv";
const AUDIT_LOG: &str = "duplicates_log.csv";

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::RunArgs) -> Result<()> {
    let out_dir = args.output.clone().unwrap_or_else(|| "./output".into());
    let reference = args.date.unwrap_or_else(|| chrono::Local::now().date_naive());

    let config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("[run] Failed to load configuration {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let (_, backup) = sibling_dirs(&out_dir)?;
    recover_backup(&out_dir, &backup)?;
    let manifest = SourceManifest::from_json_file(&args.sources)?;

    info!(boundary = %manifest.boundary.display(), "loading static layers");
    let boundary = StudyBoundary::new(config.reference_crs, io::read_boundary(&manifest.boundary)?)?;
    let mut loaded = Vec::with_capacity(manifest.layers.len());
    for source in &manifest.layers {
        loaded.push((source.kind, io::read_layer_source(source)?));
    }
    let build = build_layers(&config, boundary, loaded)?;
    for rejected in &build.rejected {
        warn!(error = %rejected, "territory left out of its layer");
    }

    let pipeline = Pipeline::new(&config, &build.layers)?;

    let id = config.columns.id.as_str();
    let last_24h = assign_identifiers(&io::csv::read_csv(&args.last_24h)?, id)?;
    let last_7d = assign_identifiers(&io::csv::read_csv(&args.last_7d)?, id)?;
    let previous_path = args.previous.clone().or_else(|| {
        let published = out_dir.join(CUMULATIVE_CLEAN);
        published.exists().then_some(published)
    });
    let previous = match &previous_path {
        Some(path) => Some(assign_identifiers(&io::csv::read_csv(path)?, id)?),
        None => None,
    };

    let output = pipeline.run(RunInputs {
        last_24h: &last_24h,
        last_7d: &last_7d,
        previous: previous.as_ref(),
        reference,
    })?;
    for failure in &output.report.failures {
        warn!(error = %failure, "layer not published");
    }

    publish(&output, &config.columns, &out_dir)?;
    info!(output = %out_dir.display(), "run published");
    Ok(())
}

/// Write every table into a staging directory next to `out_dir`, then swap it in.
/// The previous output is renamed aside and put back if the swap fails. Entries of the
/// previous output that this run did not write are moved into the new one.
fn publish(output: &RunOutput, columns: &DetectionColumns, out_dir: &Path) -> Result<()> {
    let (staging, backup) = sibling_dirs(out_dir)?;
    recover_backup(out_dir, &backup)?;

    if staging.exists() {
        fs::remove_dir_all(&staging)
            .with_context(|| format!("[run] Failed to clear stale staging directory {}", staging.display()))?;
    }
    fs::create_dir_all(&staging)
        .with_context(|| format!("[run] Failed to create staging directory {}", staging.display()))?;

    // The audit log accumulates across runs.
    let log = out_dir.join(AUDIT_LOG);
    if log.exists() {
        fs::copy(&log, staging.join(AUDIT_LOG))
            .with_context(|| format!("[run] Failed to carry over {}", log.display()))?;
    }

    for window in TimeWindow::ALL {
        write_window(output.window(window), window, columns, &staging)?;
    }

    for entry in output.audit.iter().filter(|entry| !entry.is_empty()) {
        io::csv::append_csv(&mut entry.to_frame(columns)?, &staging.join(AUDIT_LOG))?;
    }

    for (kind, aggregate) in &output.report.aggregates {
        let mut df = aggregate.to_frame()?;
        write_table(&mut df, &staging, &format!("{kind}_aggregate"))?;
        io::geojson::write_aggregate(aggregate, &staging.join(format!("{kind}_aggregate.geojson")))?;
    }

    swap_in(&staging, out_dir, &backup)
}

/// Staging and backup directories, siblings of `out_dir`.
fn sibling_dirs(out_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let name = out_dir.file_name()
        .with_context(|| format!("[run] Output directory {} must be a named directory", out_dir.display()))?
        .to_string_lossy();
    Ok((
        out_dir.with_file_name(format!(".{name}.staging")),
        out_dir.with_file_name(format!(".{name}.previous")),
    ))
}

fn swap_in(staging: &Path, out_dir: &Path, backup: &Path) -> Result<()> {
    let had_previous = out_dir.exists();
    if had_previous {
        fs::rename(out_dir, backup)
            .with_context(|| format!("[run] Failed to move {} aside", out_dir.display()))?;
    }

    if let Err(err) = fs::rename(staging, out_dir) {
        if had_previous {
            fs::rename(backup, out_dir)
                .with_context(|| format!("[run] Failed to restore {} from {}", out_dir.display(), backup.display()))?;
        }
        return Err(err)
            .with_context(|| format!("[run] Failed to move {} to {}", staging.display(), out_dir.display()));
    }

    if had_previous {
        keep_foreign_entries(backup, out_dir)?;
        fs::remove_dir_all(backup)
            .with_context(|| format!("[run] Failed to remove {}", backup.display()))?;
    }
    Ok(())
}

/// Finish a swap that was interrupted: restore the backup when the output is gone,
/// otherwise hand its foreign entries over and drop it.
fn recover_backup(out_dir: &Path, backup: &Path) -> Result<()> {
    if !backup.exists() {
        return Ok(());
    }
    if out_dir.exists() {
        keep_foreign_entries(backup, out_dir)?;
        fs::remove_dir_all(backup)
            .with_context(|| format!("[run] Failed to remove {}", backup.display()))
    } else {
        warn!(backup = %backup.display(), "restoring output left aside by an interrupted run");
        fs::rename(backup, out_dir)
            .with_context(|| format!("[run] Failed to restore {} from {}", out_dir.display(), backup.display()))
    }
}

/// Move every entry of `from` that `to` does not have.
fn keep_foreign_entries(from: &Path, to: &Path) -> Result<()> {
    let entries = fs::read_dir(from)
        .with_context(|| format!("[run] Failed to list {}", from.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("[run] Failed to list {}", from.display()))?;
        let target = to.join(entry.file_name());
        if !target.exists() {
            fs::rename(entry.path(), &target)
                .with_context(|| format!("[run] Failed to keep {}", entry.path().display()))?;
        }
    }
    Ok(())
}

fn write_window(tables: &WindowTables, window: TimeWindow, columns: &DetectionColumns, dir: &Path) -> Result<()> {
    let mut clean = tables.clean.to_frame(columns)?;
    write_table(&mut clean, dir, &format!("fires_{window}"))?;
    let mut with_duplicates = tables.with_duplicates.to_frame(columns)?;
    write_table(&mut with_duplicates, dir, &format!("fires_{window}_with_duplicates"))
}

fn write_table(df: &mut DataFrame, dir: &Path, stem: &str) -> Result<()> {
    io::csv::write_csv(df, &dir.join(format!("{stem}.csv")))?;
    #[cfg(feature = "parquet")]
    io::parquet::write_parquet(df, &dir.join(format!("{stem}.parquet")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use chrono::NaiveDate;
    use firescope::{
        build_layers,
        territory::{LayerKind, TerritoryFeature},
        Crs, LayerJoin, Pipeline, PipelineConfig, RunInputs, RunOutput, StudyBoundary,
    };
    use geo::{polygon, MultiPolygon};
    use polars::df;

    use super::{publish, recover_backup, sibling_dirs, AUDIT_LOG, CUMULATIVE_CLEAN};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0),
        ]])
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            source_crs: Crs::SIRGAS2000,
            layers: vec![LayerJoin::new(LayerKind::City, &[])],
            ..PipelineConfig::default()
        }
    }

    /// One city; "b" re-reports "a" under a new id, so every run logs a removal.
    fn run_once(config: &PipelineConfig) -> RunOutput {
        let boundary = StudyBoundary::new(Crs::SIRGAS2000, rect(0.0, 0.0, 10.0, 10.0)).unwrap();
        let loaded = vec![(LayerKind::City, vec![
            TerritoryFeature::new(Some("C1"), Some("Altamira"), rect(0.0, 0.0, 10.0, 10.0)),
        ])];
        let layers = build_layers(config, boundary, loaded).unwrap().layers;
        let pipeline = Pipeline::new(config, &layers).unwrap();
        let raw = df!(
            "uuid" => ["a", "b"],
            "acq_date" => ["2024-09-10", "2024-09-10"],
            "acq_time" => ["0130", "0130"],
            "latitude" => [5.0, 5.0],
            "longitude" => [5.0, 5.0],
        ).unwrap();
        pipeline.run(RunInputs {
            last_24h: &raw,
            last_7d: &raw,
            previous: None,
            reference: NaiveDate::from_ymd_opt(2024, 9, 10).unwrap(),
        }).unwrap()
    }

    fn log_height(out_dir: &Path) -> usize {
        firescope::io::csv::read_csv(&out_dir.join(AUDIT_LOG)).unwrap().height()
    }

    #[test]
    fn publishing_keeps_files_the_run_did_not_write() {
        let config = config();
        let output = run_once(&config);
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("output");
        fs::create_dir_all(out_dir.join("maps")).unwrap();
        fs::write(out_dir.join("index.html"), "<html></html>").unwrap();
        fs::write(out_dir.join("maps").join("tile.png"), [0u8; 4]).unwrap();
        fs::write(out_dir.join("fires_24h.csv"), "stale").unwrap();

        publish(&output, &config.columns, &out_dir).unwrap();

        assert_eq!(fs::read_to_string(out_dir.join("index.html")).unwrap(), "<html></html>");
        assert!(out_dir.join("maps").join("tile.png").exists());
        assert_ne!(fs::read_to_string(out_dir.join("fires_24h.csv")).unwrap(), "stale");
        assert!(out_dir.join(CUMULATIVE_CLEAN).exists());
        assert!(out_dir.join("city_aggregate.csv").exists());
        assert!(out_dir.join("city_aggregate.geojson").exists());

        let (staging, backup) = sibling_dirs(&out_dir).unwrap();
        assert!(!staging.exists());
        assert!(!backup.exists());
    }

    #[test]
    fn duplicates_log_grows_across_runs() {
        let config = config();
        let output = run_once(&config);
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("output");

        publish(&output, &config.columns, &out_dir).unwrap();
        let first = log_height(&out_dir);
        assert!(first > 0);

        publish(&output, &config.columns, &out_dir).unwrap();
        assert_eq!(log_height(&out_dir), 2 * first);
    }

    #[test]
    fn unnamed_output_directories_are_rejected() {
        let config = config();
        let output = run_once(&config);
        assert!(publish(&output, &config.columns, Path::new(".")).is_err());
        assert!(publish(&output, &config.columns, Path::new("/")).is_err());
        assert!(sibling_dirs(Path::new("..")).is_err());
    }

    #[test]
    fn interrupted_swap_is_recovered() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("output");
        let (_, backup) = sibling_dirs(&out_dir).unwrap();

        // Output moved aside, new one never arrived.
        fs::create_dir_all(&backup).unwrap();
        fs::write(backup.join(CUMULATIVE_CLEAN), "uuid\n").unwrap();
        recover_backup(&out_dir, &backup).unwrap();
        assert!(out_dir.join(CUMULATIVE_CLEAN).exists());
        assert!(!backup.exists());

        // New output in place, foreign entries not handed over yet.
        fs::create_dir_all(&backup).unwrap();
        fs::write(backup.join("index.html"), "kept").unwrap();
        fs::write(backup.join(CUMULATIVE_CLEAN), "old").unwrap();
        recover_backup(&out_dir, &backup).unwrap();
        assert_eq!(fs::read_to_string(out_dir.join("index.html")).unwrap(), "kept");
        assert_eq!(fs::read_to_string(out_dir.join(CUMULATIVE_CLEAN)).unwrap(), "uuid\n");
        assert!(!backup.exists());
    }
}
