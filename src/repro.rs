//! Reproducibility harness: fetch the same pinned query several times and
//! check that every run returned the same set of element identities.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Utc};
use tracing::{info, warn};

use crate::error::{PoiError, Result};
use crate::geometry::build_square_bbox;
use crate::normalize::elements_id_hash;
use crate::overpass::{OverpassClient, build_query};
use crate::tags::load_filters;
use crate::types::{GeoPoint, ReproComparison, ReproRun};

pub const RUN_DIR_FORMAT: &str = "%Y%m%dT%H%M%SZ";
pub const DEFAULT_RUNS: u32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct ReproRequest {
    pub center: GeoPoint,
    pub tags_path: PathBuf,
    pub runs: u32,
    pub snapshot_iso: Option<String>,
    pub out_dir: PathBuf,
}

impl ReproRequest {
    pub fn new(center: GeoPoint, tags_path: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        ReproRequest {
            center,
            tags_path: tags_path.into(),
            runs: DEFAULT_RUNS,
            snapshot_iso: None,
            out_dir: out_dir.into(),
        }
    }

    pub fn with_runs(mut self, runs: u32) -> Self {
        self.runs = runs;
        self
    }

    pub fn with_snapshot(mut self, snapshot_iso: Option<String>) -> Self {
        self.snapshot_iso = snapshot_iso;
        self
    }
}

/// Runs the harness and returns the timestamped directory holding one
/// `run_{i}.json` per fetch.
pub fn run_repro(request: &ReproRequest, client: &OverpassClient) -> Result<PathBuf> {
    if request.runs == 0 {
        return Err(PoiError::Config("repro needs at least one run".to_string()));
    }

    let bbox = build_square_bbox(request.center, client.settings.side_m)?;
    let fragments = load_filters(&request.tags_path)?;
    if fragments.is_empty() {
        return Err(PoiError::Config("no tag filters to query".to_string()));
    }
    let query = build_query(
        &bbox,
        &fragments,
        request.snapshot_iso.as_deref(),
        client.query_timeout_s(),
    );

    let run_dir = create_run_dir(&request.out_dir)?;
    if request.snapshot_iso.is_none() {
        warn!("repro without a snapshot date compares live data; runs may legitimately differ");
    }

    for run in 0..request.runs {
        let response = client.fetch(&query)?;
        let record = ReproRun {
            run,
            bbox: bbox.to_array(),
            utm_zone: bbox.utm_zone,
            overpass_url: client.url().to_string(),
            osm_base_ts: response.osm_base_ts(),
            elements_count: response.elements.len(),
            id_hash: elements_id_hash(&response.elements),
        };
        let path = run_dir.join(format!("run_{run}.json"));
        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        serde_json::to_writer_pretty(&mut file, &record)?;
        file.flush()?;
        info!(
            run,
            elements = record.elements_count,
            id_hash = %record.id_hash,
            "repro run recorded"
        );
    }

    Ok(run_dir)
}

/// Runs the harness and compares exactly the runs it just wrote.
pub fn run_and_compare(
    request: &ReproRequest,
    client: &OverpassClient,
) -> Result<(PathBuf, ReproComparison)> {
    let run_dir = run_repro(request, client)?;
    let comparison = compare_runs(&run_dir)?;
    Ok((run_dir, comparison))
}

/// Creates a fresh run directory named after the current UTC second. A name
/// already taken in the same second gets a `-1`, `-2`, ... suffix; existing
/// directories are never reused.
fn create_run_dir(out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)?;
    let stamp = Utc::now().format(RUN_DIR_FORMAT).to_string();
    let mut suffix = 0u32;
    loop {
        let name = match suffix {
            0 => stamp.clone(),
            n => format!("{stamp}-{n}"),
        };
        let candidate = out_dir.join(name);
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => suffix += 1,
            Err(err) => return Err(err.into()),
        }
    }
}

/// `(timestamp, suffix)` for a run directory name, `None` for anything else.
fn run_dir_key(name: &str) -> Option<(NaiveDateTime, u32)> {
    let stamp = name.get(..16)?;
    let time = NaiveDateTime::parse_from_str(stamp, RUN_DIR_FORMAT).ok()?;
    let suffix = match &name[16..] {
        "" => 0,
        rest => rest.strip_prefix('-')?.parse().ok()?,
    };
    Some((time, suffix))
}

/// Loads every `*.json` run record in `run_dir`, ordered by run index.
pub fn compare_runs(run_dir: &Path) -> Result<ReproComparison> {
    let paths: Vec<PathBuf> = fs::read_dir(run_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some("json")
        })
        .collect();

    let mut runs = Vec::with_capacity(paths.len());
    for path in paths {
        let run: ReproRun = serde_json::from_str(&fs::read_to_string(&path)?)?;
        runs.push((run.run, path, run.id_hash));
    }
    runs.sort();

    let comparison =
        ReproComparison::from_hashes(runs.into_iter().map(|(_, _, hash)| hash).collect());
    info!(
        dir = %run_dir.display(),
        runs = comparison.runs,
        stable = comparison.stable,
        "compared repro runs"
    );
    Ok(comparison)
}

/// The newest run directory under `out_dir`. Directories whose names are not
/// run timestamps are ignored.
pub fn latest_run_dir(out_dir: &Path) -> Result<Option<PathBuf>> {
    if !out_dir.exists() {
        return Ok(None);
    }
    let latest = fs::read_dir(out_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .filter_map(|path| {
            let key = run_dir_key(path.file_name()?.to_str()?)?;
            Some((key, path))
        })
        .max()
        .map(|(_, path)| path);
    Ok(latest)
}
