mod client;
mod query;

pub use client::*;
pub use query::*;

use ureq::Agent;

use crate::settings::Settings;

/// Blocking Overpass client. One agent is shared by every request of a run.
#[derive(Clone)]
pub struct OverpassClient {
    url: String,
    pub agent: Agent,
    pub settings: Settings,
}

impl Default for OverpassClient {
    fn default() -> Self {
        OverpassClient::with_settings(Settings::default())
    }
}

impl OverpassClient {
    pub fn new(url: &str) -> Self {
        OverpassClient::with_settings(Settings::default().with_overpass_url(url))
    }

    pub fn with_settings(settings: Settings) -> Self {
        // Status codes are inspected by the retry loop, not turned into errors by ureq.
        let config = Agent::config_builder()
            .timeout_global(Some(settings.timeout))
            .http_status_as_error(false)
            .build();
        let agent: Agent = config.into();
        OverpassClient {
            url: settings.overpass_url.clone(),
            agent,
            settings,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: &str) {
        self.url = url.to_string();
        self.settings.overpass_url = url.to_string();
    }

    /// The `[timeout:]` value written into every query.
    pub fn query_timeout_s(&self) -> u64 {
        self.settings.timeout.as_secs().max(1)
    }
}
