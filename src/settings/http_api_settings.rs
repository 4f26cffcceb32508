use serde_with::serde_as;
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpApiSettings {
    pub host: String,

    pub port: u16,

    /// Inbound request timeout; unbounded when absent.
    #[serde(alias = "timeout_secs")]
    #[serde_as(as = "Option<serde_with::DurationSeconds<u64>>")]
    pub timeout: Option<Duration>,
}

impl HttpApiSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
