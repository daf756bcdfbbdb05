//! Tag filter configuration.
//!
//! A configuration is a list of entries, each either a bare key (presence
//! filter) or a key with values (one equality filter per value):
//!
//! ```toml
//! [[tags]]
//! key = "amenity"
//! values = ["cafe", "bar"]
//!
//! [[tags]]
//! key = "shop"
//! ```
//!
//! The same shape is accepted as YAML (`.yml`/`.yaml`):
//!
//! ```yaml
//! tags:
//!   - key: amenity
//!     values: [cafe, bar]
//!   - key: shop
//! ```
//!
//! and as JSON (`{"tags": [{"key": "shop"}]}`).
//! Only the resulting *set* of fragments matters: entry order, duplicates and
//! file formatting do not change the fragments or their hash.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PoiError, Result};
use crate::hash::joined_sha256;

/// One Overpass tag predicate, e.g. `["amenity"="cafe"]` or `["shop"]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TagFilterFragment(String);

impl TagFilterFragment {
    pub fn presence(key: &str) -> Self {
        TagFilterFragment(format!("[\"{}\"]", escape(key)))
    }

    pub fn equals(key: &str, value: &str) -> Self {
        TagFilterFragment(format!("[\"{}\"=\"{}\"]", escape(key), escape(value)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TagFilterFragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TagFilterFragment {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagEntry {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub values: Option<Vec<String>>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagConfig {
    #[serde(default)]
    pub tags: Vec<TagEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFormat {
    Toml,
    Yaml,
    Json,
}

impl TagFormat {
    /// `.json` is JSON, `.yml`/`.yaml` is YAML; everything else is read as TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => TagFormat::Json,
            Some(ext) if ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml") => {
                TagFormat::Yaml
            }
            _ => TagFormat::Toml,
        }
    }
}

impl TagConfig {
    pub fn parse(text: &str, format: TagFormat) -> Result<Self> {
        let config: TagConfig = match format {
            TagFormat::Toml => toml::from_str(text)?,
            // An empty YAML document is an empty config.
            TagFormat::Yaml if text.trim().is_empty() => TagConfig::default(),
            TagFormat::Yaml => serde_yaml::from_str(text)?,
            TagFormat::Json => serde_json::from_str(text)?,
        };
        Ok(config)
    }

    /// Expands every entry and returns the fragments deduplicated and sorted.
    pub fn fragments(&self) -> Result<Vec<TagFilterFragment>> {
        let mut set = BTreeSet::new();
        for (index, entry) in self.tags.iter().enumerate() {
            let key = match entry.key.as_deref().map(str::trim) {
                Some(key) if !key.is_empty() => key,
                _ => {
                    return Err(PoiError::Config(format!(
                        "tag entry {index} has no key"
                    )));
                }
            };
            match entry.values.as_deref() {
                Some(values) if !values.is_empty() => {
                    for value in values {
                        set.insert(TagFilterFragment::equals(key, value));
                    }
                }
                _ => {
                    set.insert(TagFilterFragment::presence(key));
                }
            }
        }
        Ok(set.into_iter().collect())
    }
}

/// Reads a tag configuration file and returns its canonical fragments.
pub fn load_filters(path: &Path) -> Result<Vec<TagFilterFragment>> {
    let text = std::fs::read_to_string(path).map_err(|err| {
        PoiError::Config(format!("cannot read tag config {}: {err}", path.display()))
    })?;
    let fragments = parse_filters(&text, TagFormat::from_path(path))?;
    debug!(path = %path.display(), count = fragments.len(), "loaded tag filters");
    Ok(fragments)
}

pub fn parse_filters(text: &str, format: TagFormat) -> Result<Vec<TagFilterFragment>> {
    let config = TagConfig::parse(text, format).map_err(|err| match err {
        PoiError::Toml(err) => PoiError::Config(format!("malformed tag config: {err}")),
        PoiError::Yaml(err) => PoiError::Config(format!("malformed tag config: {err}")),
        PoiError::Json(err) => PoiError::Config(format!("malformed tag config: {err}")),
        other => other,
    })?;
    config.fragments()
}

/// SHA-256 over the fragments joined by `|`, in the order given (callers pass
/// the canonical sorted order).
pub fn hash_filters(fragments: &[TagFilterFragment]) -> String {
    joined_sha256(fragments)
}
