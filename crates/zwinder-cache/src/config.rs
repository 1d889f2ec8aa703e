//! Cache configuration.
//!
//! Plain value types; the host editor owns any dialogs or files they come
//! from. Settings are not part of the persisted blob and must be supplied
//! again on [`load`](crate::StateManager::load).

use zwinder_core::RingConfig;

/// Configuration for the whole cache: one ring config per tier plus the
/// ancient-anchor spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Head buffer. Every capture that advances the head lands here.
    pub current: RingConfig,
    /// Overflow tier fed by the head buffer's evictions, typically coarser
    /// cadence and a larger share of the budget per retained second.
    pub recent: RingConfig,
    /// Fills holes re-opened behind the head after a backward seek.
    pub gap: RingConfig,
    /// Target minimum frame spacing between auto-promoted long-term
    /// anchors. Caller-reserved frames are exempt.
    pub ancient_interval: u32,
}

impl Default for CacheConfig {
    /// Sizes the tiers for an interactive editing session: a large dense
    /// head, a coarser recent tier, and a small gap tier.
    fn default() -> Self {
        Self {
            current: RingConfig::new(256 << 20, 2),
            recent: RingConfig::new(128 << 20, 16),
            gap: RingConfig::new(64 << 20, 1),
            ancient_interval: 5_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_internally_consistent() {
        let config = CacheConfig::default();
        assert!(config.current.size_bytes > config.gap.size_bytes);
        assert!(config.recent.rewind_frequency >= config.current.rewind_frequency);
        assert!(config.ancient_interval > 0);
    }
}
