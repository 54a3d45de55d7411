use std::fmt;
use std::time::Duration;

use clap::Args;

pub const DEFAULT_ENDPOINT: &str = "https://ark.cn-beijing.volces.com/api/v3";

/// Where and how to reach the vision model.
#[derive(Clone, Args)]
pub struct UpstreamConfig {
    /// Bearer credential for the vision API.
    #[arg(long, env = "ARK_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Base URL; requests go to `<endpoint>/responses`.
    #[arg(long, env = "ARK_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Model identifier sent with every request.
    #[arg(long, env = "ARK_MODEL_ID")]
    pub model: String,

    /// Upstream request timeout in seconds.
    #[arg(long, env = "ARK_TIMEOUT_SECS", default_value_t = 120)]
    pub timeout_secs: u64,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn responses_url(&self) -> String {
        format!("{}/responses", self.endpoint.trim_end_matches('/'))
    }
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
