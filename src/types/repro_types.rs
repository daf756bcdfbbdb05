use serde::{Deserialize, Serialize};

/// One harness execution, persisted as `run_{run}.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReproRun {
    pub run: u32,
    pub bbox: [f64; 4],
    pub utm_zone: u8,
    pub overpass_url: String,
    pub osm_base_ts: Option<String>,
    pub elements_count: usize,
    pub id_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReproComparison {
    pub runs: usize,
    pub stable: bool,
    pub hashes: Vec<String>,
}

impl ReproComparison {
    pub fn from_hashes(hashes: Vec<String>) -> Self {
        let stable = match hashes.split_first() {
            Some((first, rest)) => rest.iter().all(|h| h == first),
            None => false,
        };
        ReproComparison {
            runs: hashes.len(),
            stable,
            hashes,
        }
    }

    /// Distinct hashes in first-seen order.
    pub fn distinct_hashes(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for hash in &self.hashes {
            if !seen.contains(&hash.as_str()) {
                seen.push(hash);
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_hashes_are_stable() {
        let cmp = ReproComparison::from_hashes(vec!["a".into(); 5]);
        assert!(cmp.stable);
        assert_eq!(cmp.runs, 5);
        assert_eq!(cmp.distinct_hashes(), vec!["a"]);
    }

    #[test]
    fn a_divergent_hash_is_unstable() {
        let cmp = ReproComparison::from_hashes(vec!["a".into(), "a".into(), "b".into()]);
        assert!(!cmp.stable);
        assert_eq!(cmp.distinct_hashes(), vec!["a", "b"]);
    }

    #[test]
    fn no_runs_is_not_stable() {
        let cmp = ReproComparison::from_hashes(vec![]);
        assert!(!cmp.stable);
        assert_eq!(cmp.runs, 0);
    }
}
