use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::{OverpassClient, build_query};
use crate::error::{PoiError, Result};
use crate::tags::TagFilterFragment;
use crate::types::{BoundingBox, Element, OverpassResponse, RawResponse};

/// Remark fragments Overpass uses when it cut a result short.
const TRUNCATION_MARKERS: [&str; 4] = ["too many", "timeout", "runtime error", "limited"];

/// Ceiling on one response body; ureq's default of 10 MiB is too tight for
/// dense city centres.
const MAX_RESPONSE_BYTES: u64 = 256 * 1024 * 1024;

impl OverpassClient {
    /// Posts `query` and returns the validated response, retrying transient
    /// failures with exponential backoff. Only the final failure reaches the
    /// caller, as `FetchExhausted`.
    pub fn fetch(&self, query: &str) -> Result<RawResponse> {
        let retry = self.settings.retry;
        let attempts = retry.max_retries.max(1);
        debug!(url = %self.url, "overpass query:\n{query}");

        let mut last_error = None;
        for attempt in 0..attempts {
            match self.fetch_once(query) {
                Ok(response) => {
                    if attempt > 0 {
                        info!(attempt = attempt + 1, "overpass request succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(err) if err.is_transient() => {
                    warn!(attempt = attempt + 1, of = attempts, error = %err, "overpass attempt failed");
                    last_error = Some(err);
                    if attempt + 1 < attempts {
                        let delay = retry.backoff(attempt);
                        debug!(?delay, "backing off");
                        std::thread::sleep(delay);
                    }
                }
                Err(err) => return Err(err),
            }
        }

        Err(PoiError::FetchExhausted {
            attempts,
            source: Box::new(last_error.unwrap_or_else(|| {
                PoiError::IncompleteResponse("no attempt was made".to_string())
            })),
        })
    }

    fn fetch_once(&self, query: &str) -> Result<RawResponse> {
        let mut response = self
            .agent
            .post(&self.url)
            .header("User-Agent", self.settings.user_agent.as_str())
            .send_form([("data", query)])?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(PoiError::HttpStatus {
                status,
                url: self.url.clone(),
            });
        }

        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_RESPONSE_BYTES)
            .read_to_string()?;
        parse_response(&body)
    }

    /// Fetches `fragments` in groups of `chunk_size`, one request per group,
    /// strictly in order. Elements are merged by `(kind, id)`; a later chunk's
    /// copy replaces an earlier one and the last chunk's `osm3s` block is kept.
    pub fn fetch_chunked(
        &self,
        bbox: &BoundingBox,
        fragments: &[TagFilterFragment],
        snapshot_iso: Option<&str>,
        chunk_size: usize,
    ) -> Result<RawResponse> {
        if chunk_size == 0 {
            return Err(PoiError::Config("chunk size must be at least 1".to_string()));
        }
        if fragments.is_empty() {
            return Err(PoiError::Config("no tag filters to query".to_string()));
        }

        let chunks = fragments.len().div_ceil(chunk_size);
        let mut merged = ElementMerge::default();
        let mut osm3s = None;

        for (index, chunk) in fragments.chunks(chunk_size).enumerate() {
            let query = build_query(bbox, chunk, snapshot_iso, self.query_timeout_s());
            let response = self.fetch(&query)?;
            info!(
                chunk = index + 1,
                of = chunks,
                elements = response.elements.len(),
                "fetched chunk"
            );
            if response.osm3s.is_some() {
                osm3s = response.osm3s;
            }
            merged.extend(index, response.elements);
        }

        let elements = merged.into_elements();
        info!(elements = elements.len(), chunks, "merged chunked fetch");
        Ok(RawResponse { osm3s, elements })
    }
}

/// Validates one response body.
pub fn parse_response(body: &str) -> Result<RawResponse> {
    let response: OverpassResponse = serde_json::from_str(body)?;

    if let Some(remark) = &response.remark {
        let lowered = remark.to_lowercase();
        if TRUNCATION_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            return Err(PoiError::IncompleteResponse(remark.clone()));
        }
        debug!(%remark, "overpass remark");
    }

    let elements = response.elements.ok_or_else(|| {
        PoiError::IncompleteResponse("response has no elements list".to_string())
    })?;

    Ok(RawResponse {
        osm3s: response.osm3s,
        elements,
    })
}

/// Identity-keyed merge that keeps first-seen positions and last-seen payloads.
#[derive(Default)]
struct ElementMerge {
    elements: Vec<Element>,
    origins: Vec<usize>,
    index: HashMap<(String, i64), usize>,
}

impl ElementMerge {
    fn extend(&mut self, chunk: usize, elements: Vec<Element>) {
        for element in elements {
            let Some(id) = element.id else { continue };
            if element.type_field.is_empty() {
                continue;
            }
            let key = (element.type_field.clone(), id);
            match self.index.get(&key) {
                Some(&slot) => {
                    if self.elements[slot] != element && self.origins[slot] != chunk {
                        warn!(
                            kind = %key.0,
                            id,
                            first_chunk = self.origins[slot] + 1,
                            chunk = chunk + 1,
                            "conflicting payloads for one element, keeping the later chunk"
                        );
                    }
                    self.elements[slot] = element;
                    self.origins[slot] = chunk;
                }
                None => {
                    self.index.insert(key, self.elements.len());
                    self.elements.push(element);
                    self.origins.push(chunk);
                }
            }
        }
    }

    fn into_elements(self) -> Vec<Element> {
        self.elements
    }
}
