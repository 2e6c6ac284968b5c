use serde::Deserialize;

/// Retry policy for calls to the upstream log API.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first. Default: 4.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u8,
    /// Backoff base in milliseconds. Default: 500.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on any single delay. Default: 10000.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u8 {
    4
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}
