// SPDX-License-Identifier: MIT

//! Environment-driven configuration, following the teacher's
//! `daemon::env` precedent of naming every tunable as a typed constant or
//! function rather than scattering literals through the handlers (§10.4).

use std::collections::HashSet;
use std::time::Duration;

fn env_duration_secs(key: &str, default_secs: u64) -> Duration {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).map(Duration::from_secs).unwrap_or(Duration::from_secs(default_secs))
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Every timing, sizing, and auth tunable the coordination plane needs,
/// loaded once at startup (§4.C, §4.E, §4.F, §4.H, §6).
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP/WebSocket server binds to.
    pub bind_address: String,
    /// Accepted `X-Api-Key` values (§6); empty means every write is
    /// rejected, not that auth is disabled — an empty set is a
    /// misconfiguration to fail loudly on, not bypass silently.
    pub api_keys: HashSet<String>,
    /// Directory for the Claim Store's WAL and snapshots.
    pub storage_dir: std::path::PathBuf,
    /// Path to the file-based review queue fallback (§6), if enabled
    /// alongside (not instead of) the Claim Store's own review rows.
    pub review_queue_file: Option<std::path::PathBuf>,

    /// `T_session` (§4.C): a session is stale past this since its last
    /// heartbeat.
    pub t_session: Duration,
    /// `T_machine` (§4.C): a machine is offline past this since its last
    /// heartbeat.
    pub t_machine: Duration,
    /// `T_review` (§4.C, §4.E): a review claim times out past this.
    pub t_review: Duration,
    /// `T_stop_grace` (§4.H): grace period before a surplus worker is
    /// force-terminated.
    pub t_stop_grace: Duration,
    /// How often the Liveness Monitor ticks.
    pub liveness_tick_interval: Duration,
    /// How often the Orchestrator Loop reconciles each workspace.
    pub orchestrator_tick_interval: Duration,
    /// How often the housekeeping pass runs.
    pub housekeeping_tick_interval: Duration,

    /// Per-project Event Bus ring buffer size (§4.F, default 50).
    pub event_ring_buffer_size: usize,
    /// Per-subscriber outbound buffer size before it is dropped (§4.F,
    /// default 256).
    pub subscriber_buffer_size: usize,
    /// Per-workspace cap on unsolicited worker restarts per window (§4.H).
    pub restart_cap: u32,
    /// Per-API-key request budget for the Control API's rate limiter
    /// (§4.G: "Rate limiting is per key, not per IP").
    pub rate_limit_per_second: u32,
}

impl Config {
    /// Loads configuration from the environment, falling back to the
    /// defaults named throughout §4 and §6.
    pub fn from_env() -> Self {
        let api_keys = std::env::var("FLEETD_API_KEYS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            bind_address: env_string("FLEETD_BIND_ADDRESS", "0.0.0.0:8080"),
            api_keys,
            storage_dir: std::env::var("FLEETD_STORAGE_DIR").unwrap_or_else(|_| "./data".to_string()).into(),
            review_queue_file: std::env::var("FLEETD_REVIEW_QUEUE_FILE").ok().map(Into::into),

            t_session: env_duration_secs("FLEETD_T_SESSION_SECS", 5 * 60),
            t_machine: env_duration_secs("FLEETD_T_MACHINE_SECS", 10 * 60),
            t_review: env_duration_secs("FLEETD_T_REVIEW_SECS", 2 * 60 * 60),
            t_stop_grace: env_duration_secs("FLEETD_T_STOP_GRACE_SECS", 5),
            liveness_tick_interval: env_duration_secs("FLEETD_LIVENESS_TICK_SECS", 30),
            orchestrator_tick_interval: env_duration_secs("FLEETD_ORCHESTRATOR_TICK_SECS", 5),
            housekeeping_tick_interval: env_duration_secs("FLEETD_HOUSEKEEPING_TICK_SECS", 60 * 60),

            event_ring_buffer_size: env_u32("FLEETD_EVENT_RING_BUFFER_SIZE", 50) as usize,
            subscriber_buffer_size: env_u32("FLEETD_SUBSCRIBER_BUFFER_SIZE", 256) as usize,
            restart_cap: env_u32("FLEETD_RESTART_CAP", 5),
            rate_limit_per_second: env_u32("FLEETD_RATE_LIMIT_PER_SECOND", 20),
        }
    }

    pub fn is_known_api_key(&self, key: &str) -> bool {
        self.api_keys.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_duration_var_falls_back_to_named_default() {
        assert_eq!(env_duration_secs("FLEETD_TEST_UNSET_DURATION_VAR", 300), Duration::from_secs(300));
        assert_eq!(env_duration_secs("FLEETD_TEST_UNSET_DURATION_VAR", 600), Duration::from_secs(600));
        assert_eq!(env_duration_secs("FLEETD_TEST_UNSET_DURATION_VAR", 7200), Duration::from_secs(7200));
    }

    #[test]
    fn unset_api_keys_var_yields_empty_set() {
        let keys: HashSet<String> = "".split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();
        assert!(keys.is_empty());
    }

    /// `std::env::set_var` mutates process-global state, so this test must
    /// not interleave with any other test that also touches `FLEETD_*`
    /// environment variables (same reason the teacher reaches for
    /// `serial_test` around its own env-dependent tests).
    #[test]
    #[serial_test::serial]
    fn from_env_reads_overridden_api_keys() {
        std::env::set_var("FLEETD_API_KEYS", "key-a, key-b ,key-c");
        let config = Config::from_env();
        std::env::remove_var("FLEETD_API_KEYS");
        assert!(config.is_known_api_key("key-a"));
        assert!(config.is_known_api_key("key-b"));
        assert!(config.is_known_api_key("key-c"));
        assert!(!config.is_known_api_key("key-d"));
    }
}
