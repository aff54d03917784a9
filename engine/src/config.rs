//! Engine configuration.

use std::collections::BTreeMap;
use std::time::Duration;

/// Default bound on concurrently provisioning nodes.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 4;

/// Default per-call provider timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Engine configuration for one run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of nodes provisioning at once.
    pub concurrency_limit: usize,

    /// Compute the plan without calling create/update/delete.
    pub dry_run: bool,

    /// Timeout applied to provider calls unless overridden.
    pub default_timeout: Duration,

    /// Per-kind timeout overrides (cluster creation legitimately takes
    /// much longer than a policy attachment).
    pub kind_timeouts: BTreeMap<String, Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            dry_run: false,
            default_timeout: DEFAULT_CALL_TIMEOUT,
            kind_timeouts: BTreeMap::from([
                ("cluster".to_string(), Duration::from_secs(1800)),
                ("node-group".to_string(), Duration::from_secs(900)),
            ]),
        }
    }
}

impl EngineConfig {
    /// Effective timeout for a node: declaration override first, then
    /// the kind table, then the default.
    pub fn timeout_for(&self, kind: &str, decl_override_secs: Option<u64>) -> Duration {
        if let Some(secs) = decl_override_secs {
            return Duration::from_secs(secs);
        }
        self.kind_timeouts
            .get(kind)
            .copied()
            .unwrap_or(self.default_timeout)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("cluster", None, 1800)]
    #[case("node-group", None, 900)]
    #[case("cluster", Some(60), 60)]
    #[case("iam-role", None, DEFAULT_CALL_TIMEOUT.as_secs())]
    #[case("iam-role", Some(10), 10)]
    fn test_timeout_precedence(
        #[case] kind: &str,
        #[case] decl_override: Option<u64>,
        #[case] expected_secs: u64,
    ) {
        let config = EngineConfig::default();
        assert_eq!(
            config.timeout_for(kind, decl_override),
            Duration::from_secs(expected_secs)
        );
    }
}
