use crate::error::{Result, ScanError};
use crate::output::Line;
use crate::record::{ResolvedAddress, TestDescriptor};
use crate::resolver::DEFAULT_MAX_RESOLVE_DEPTH;
use reqwest::{Client, Response};
use serde_json::value::RawValue;
use std::fmt;
use std::time::Duration;
use tracing::debug;

pub const SUMMARY_PATH: &str = "/toolkit/services/host.cgi?method=get_summary";
pub const TEST_LIST_PATH: &str = "/perfsonar-graphs/graphData.cgi?action=test_list&url=http%3A%2F%2Flocalhost%2Fesmond%2Fperfsonar%2Farchive%2F";
pub const TEST_RESULTS_PATH: &str = "/perfsonar-graphs/graphData.cgi?action=tests&url=http%3A%2F%2Flocalhost%2Fesmond%2Fperfsonar%2Farchive%2F";

pub const SUMMARY_CONTENT_TYPE: &str = "application/json";
pub const CATALOG_CONTENT_TYPE: &str = "text/json";

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PORT: u16 = 80;

/// Where and how each host is harvested
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub port: u16,
    pub timeout: Duration,
    pub user_agent: String,
    pub summary_path: String,
    pub test_list_path: String,
    pub results_path: String,
    pub summary_content_type: String,
    pub catalog_content_type: String,
    pub max_resolve_depth: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: format!("lsmap/{}", env!("CARGO_PKG_VERSION")),
            summary_path: SUMMARY_PATH.to_string(),
            test_list_path: TEST_LIST_PATH.to_string(),
            results_path: TEST_RESULTS_PATH.to_string(),
            summary_content_type: SUMMARY_CONTENT_TYPE.to_string(),
            catalog_content_type: CATALOG_CONTENT_TYPE.to_string(),
            max_resolve_depth: DEFAULT_MAX_RESOLVE_DEPTH,
        }
    }
}

impl HarvestConfig {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

}

/// The three steps of the harvest protocol, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestStep {
    Summary,
    TestList,
    Results,
}

impl fmt::Display for HarvestStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HarvestStep::Summary => "summary",
            HarvestStep::TestList => "test_list",
            HarvestStep::Results => "results",
        };
        f.write_str(name)
    }
}

/// HTTP side of the harvest protocol
#[derive(Debug, Clone)]
pub struct HarvestClient {
    client: Client,
    config: HarvestConfig,
}

impl HarvestClient {
    pub fn new(config: HarvestConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .connect_timeout(config.timeout / 2)
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn url_for(&self, address: &ResolvedAddress, path: &str) -> String {
        format!("http://{}:{}{}", address, self.config.port, path)
    }

    /// Step 1: the host's capability summary, as raw bytes
    pub async fn fetch_summary(&self, address: &ResolvedAddress) -> Result<Line> {
        let url = self.url_for(address, &self.config.summary_path);
        let response = self
            .get_expecting(&url, &self.config.summary_content_type)
            .await?;
        let body = response.bytes().await?;
        Ok(body.trim_ascii_end().to_vec())
    }

    /// Step 2: the host's configured tests. A `null` catalog is empty.
    pub async fn fetch_tests(&self, address: &ResolvedAddress) -> Result<Vec<TestDescriptor>> {
        let url = self.url_for(address, &self.config.test_list_path);
        let response = self
            .get_expecting(&url, &self.config.catalog_content_type)
            .await?;
        let body = response.bytes().await?;
        let tests: Option<Vec<TestDescriptor>> = serde_json::from_slice(&body)?;
        Ok(tests.unwrap_or_default())
    }

    /// Step 3: latest results, each element kept as the host sent it
    pub async fn fetch_results(&self, address: &ResolvedAddress) -> Result<Vec<Box<RawValue>>> {
        let url = self.url_for(address, &self.config.results_path);
        let response = self
            .get_expecting(&url, &self.config.catalog_content_type)
            .await?;
        let body = response.bytes().await?;
        let results: Option<Vec<Box<RawValue>>> = serde_json::from_slice(&body)?;
        Ok(results.unwrap_or_default())
    }

    async fn get_expecting(&self, url: &str, expected: &str) -> Result<Response> {
        debug!("Fetching {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let matches = content_type
            .as_ref()
            .map(|ct| ct.contains(expected))
            .unwrap_or(false);

        if !matches {
            return Err(ScanError::UnexpectedContentType {
                url: url.to_string(),
                content_type,
            });
        }

        Ok(response)
    }
}
