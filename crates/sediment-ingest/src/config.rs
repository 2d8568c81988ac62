//! Write-buffer configuration.
//!
//! [`WriteBufferConfig`] is plain serializable data, suitable for the
//! node's config file. [`WriteBufferOptions`] wraps it with the pieces
//! that cannot be serialized: replacement sync policies, the id
//! allocator, and the failure handler.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::delete::IdAllocator;
use crate::error::SyncError;
use crate::policy::SyncPolicy;

/// Delete-routing strategy for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Probe per-segment primary-key Bloom filters and fan tombstones out
    /// to every admitting segment.
    BfPkOracle,
    /// Accumulate all tombstones into a per-partition level-zero segment.
    L0Delta,
}

/// Handler invoked when a sync task fails permanently.
pub type FailureHandler = Arc<dyn Fn(&SyncError) + Send + Sync>;

/// Serializable write-buffer tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteBufferConfig {
    /// Active delete-routing strategy.
    pub delete_policy: DeletePolicy,
    /// Byte threshold of the buffer-limit sync policy.
    pub buffer_size_limit: usize,
    /// Row threshold of the buffer-limit sync policy.
    pub buffer_row_limit: usize,
    /// Wall-clock age threshold of the stale-buffer sync policy.
    pub buffer_stale_duration: Duration,
    /// Checkpoint-lag threshold of the cp-lag sync policy.
    pub cp_lag_limit: Duration,
    /// Whether sync tasks carry the V2 storage schema handle.
    pub storage_v2_enabled: bool,
    /// Optional hard per-segment byte cap; exceeding it rejects the batch
    /// with `BufferFull`. `None` disables the cap.
    pub hard_segment_limit: Option<usize>,
}

impl Default for WriteBufferConfig {
    fn default() -> Self {
        Self {
            delete_policy: DeletePolicy::BfPkOracle,
            buffer_size_limit: 16 * 1024 * 1024,
            buffer_row_limit: 65_536,
            buffer_stale_duration: Duration::from_secs(600),
            cp_lag_limit: Duration::from_secs(600),
            storage_v2_enabled: false,
            hard_segment_limit: None,
        }
    }
}

/// Construction options: config plus the non-serializable collaborator
/// overrides.
#[derive(Default)]
pub struct WriteBufferOptions {
    pub(crate) config: WriteBufferConfig,
    pub(crate) sync_policies: Option<Vec<Box<dyn SyncPolicy>>>,
    pub(crate) id_allocator: Option<Arc<dyn IdAllocator>>,
    pub(crate) failure_handler: Option<FailureHandler>,
}

impl WriteBufferOptions {
    /// Starts from the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn with_config(mut self, config: WriteBufferConfig) -> Self {
        self.config = config;
        self
    }

    /// Selects the delete-routing strategy.
    #[must_use]
    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.config.delete_policy = policy;
        self
    }

    /// Replaces the baseline sync-policy set.
    #[must_use]
    pub fn with_sync_policies(mut self, policies: Vec<Box<dyn SyncPolicy>>) -> Self {
        self.sync_policies = Some(policies);
        self
    }

    /// Installs the segment-id allocator required by the L0 strategy.
    #[must_use]
    pub fn with_id_allocator(mut self, allocator: Arc<dyn IdAllocator>) -> Self {
        self.id_allocator = Some(allocator);
        self
    }

    /// Installs a handler for permanent sync failures.
    #[must_use]
    pub fn with_failure_handler(mut self, handler: FailureHandler) -> Self {
        self.failure_handler = Some(handler);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = WriteBufferConfig::default();
        assert_eq!(config.delete_policy, DeletePolicy::BfPkOracle);
        assert_eq!(config.buffer_size_limit, 16 * 1024 * 1024);
        assert!(config.hard_segment_limit.is_none());
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = WriteBufferConfig {
            delete_policy: DeletePolicy::L0Delta,
            hard_segment_limit: Some(1024),
            ..WriteBufferConfig::default()
        };

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("l0_delta"));
        let restored: WriteBufferConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.delete_policy, DeletePolicy::L0Delta);
        assert_eq!(restored.hard_segment_limit, Some(1024));
    }

    #[test]
    fn test_options_builder() {
        let options = WriteBufferOptions::new()
            .with_delete_policy(DeletePolicy::L0Delta)
            .with_sync_policies(Vec::new());
        assert_eq!(options.config.delete_policy, DeletePolicy::L0Delta);
        assert!(options.sync_policies.is_some());
    }
}
