use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

const PORTAL_BASE: &str = "https://tmrsearch.ipindia.gov.in/eregister";

/// Run configuration. Loaded from an optional TOML file, then overridden from the environment.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Newline separated list of application numbers.
    pub number_list_path: PathBuf,
    /// Directory holding the per-worker shards and the combined table.
    pub output_dir: PathBuf,
    pub combined_file_name: String,
    pub worker_count: usize,
    pub portal: PortalConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Hit once per session to seed the captcha cookie.
    pub captcha_image_url: String,
    /// Application view page. Seeds the form cookie and serves both request phases.
    pub detail_url: String,
    pub captcha_api_url: String,
    pub user_agent: String,
    /// No timeout when unset.
    pub request_timeout_secs: Option<u64>,
    pub accept_invalid_certs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            number_list_path: PathBuf::from("data/application_num/application_numbers.txt"),
            output_dir: PathBuf::from("data/extracted"),
            combined_file_name: "combined_trademark_data.csv".to_string(),
            worker_count: 4,
            portal: PortalConfig::default(),
        }
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            captcha_image_url: format!("{PORTAL_BASE}/captcha.ashx"),
            detail_url: format!("{PORTAL_BASE}/Application_View.aspx"),
            captcha_api_url: format!("{PORTAL_BASE}/Viewdetails_Copyright.aspx/GetCaptcha"),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0"
                .to_string(),
            request_timeout_secs: None,
            accept_invalid_certs: true,
        }
    }
}

impl PortalConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_toml_str(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = var("TMSCRAP_NUMBER_LIST") {
            self.number_list_path = v.into();
        }
        if let Some(v) = var("TMSCRAP_OUTPUT_DIR") {
            self.output_dir = v.into();
        }
        if let Some(v) = var("TMSCRAP_WORKERS").and_then(|v| v.parse().ok()) {
            self.worker_count = v;
        }
        if let Some(v) = var("TMSCRAP_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.portal.request_timeout_secs = Some(v);
        }
        if let Some(v) = var("TMSCRAP_USER_AGENT") {
            self.portal.user_agent = v;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(Error::InvalidConfig("worker_count must be at least 1".into()));
        }
        if self.combined_file_name.trim().is_empty() {
            return Err(Error::InvalidConfig("combined_file_name is empty".into()));
        }
        Ok(())
    }

    pub fn combined_path(&self) -> PathBuf {
        self.output_dir.join(&self.combined_file_name)
    }
}
