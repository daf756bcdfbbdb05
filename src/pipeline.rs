//! The extraction run end to end: bbox, filters, chunked fetch, normalize, write.

use std::path::PathBuf;

use tracing::info;

use crate::error::Result;
use crate::geometry::build_square_bbox;
use crate::normalize::{SkipCounts, normalize, rows_id_hash};
use crate::output::write_outputs;
use crate::overpass::OverpassClient;
use crate::tags::{hash_filters, load_filters};
use crate::types::{BoundingBox, ExtractionMeta, GeoPoint};

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractRequest {
    pub center: GeoPoint,
    /// Recorded in the metadata only; the centre is already resolved.
    pub input_address: Option<String>,
    pub tags_path: PathBuf,
    pub snapshot_iso: Option<String>,
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSummary {
    pub csv_path: PathBuf,
    pub json_path: PathBuf,
    pub bbox: BoundingBox,
    pub tagset_hash: String,
    pub rows: usize,
    pub skipped: SkipCounts,
    pub id_list_sha256: String,
    pub osm_base_ts: Option<String>,
}

/// Runs one extraction. Nothing is written unless every chunk was fetched.
pub fn extract(request: &ExtractRequest, client: &OverpassClient) -> Result<ExtractionSummary> {
    let bbox = build_square_bbox(request.center, client.settings.side_m)?;
    let fragments = load_filters(&request.tags_path)?;
    let tagset_hash = hash_filters(&fragments);
    info!(%bbox, zone = bbox.utm_zone, filters = fragments.len(), %tagset_hash, "starting extraction");

    let response = client.fetch_chunked(
        &bbox,
        &fragments,
        request.snapshot_iso.as_deref(),
        client.settings.chunk_size,
    )?;
    let osm_base_ts = response.osm_base_ts();
    let normalized = normalize(&response.elements);

    let meta = ExtractionMeta::new(
        request.input_address.as_deref(),
        request.center,
        &bbox,
        tagset_hash.clone(),
        client.url().to_string(),
        osm_base_ts.clone(),
    );
    let (csv_path, json_path) = write_outputs(&normalized.rows, &request.out_dir, &meta)?;

    Ok(ExtractionSummary {
        csv_path,
        json_path,
        bbox,
        tagset_hash,
        rows: normalized.rows.len(),
        id_list_sha256: rows_id_hash(&normalized.rows),
        skipped: normalized.skipped,
        osm_base_ts,
    })
}
