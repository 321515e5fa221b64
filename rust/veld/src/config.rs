//! Processing configuration: declarative policies plus execution knobs.

use veld_common::verify_arg;

/// Memory management strategy hints.
///
/// These are declarative hints carried through the configuration; they do not
/// change how the engine allocates today. Pool-backed allocation is available
/// directly through [`veld_slab_pool::SlabPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryPolicy {
    #[default]
    Standard,
    Pooled,
    Preallocated,
    ZeroCopy,
}

/// Concurrency strategy selected by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcurrencyPolicy {
    /// Single-threaded, in-order execution.
    Sequential,
    /// Chunked execution on the shared worker pool.
    Parallel,
    /// Choose sequential or parallel from input size and detected hardware
    /// concurrency.
    #[default]
    Adaptive,
    /// Same chunked strategy as [`Parallel`](Self::Parallel); both route
    /// through the shared worker pool.
    ThreadPool,
}

/// Safety level hints.
///
/// Advisory only: the engine always catches mapping-function failures and
/// reports them through the result, regardless of the level declared here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SafetyPolicy {
    Minimal,
    #[default]
    Standard,
    Guaranteed,
    ThreadSafe,
}

/// Configuration for a processing run.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub memory: MemoryPolicy,
    pub concurrency: ConcurrencyPolicy,
    pub safety: SafetyPolicy,
    /// Upper bound on worker threads for the parallel strategy. The engine
    /// never uses more threads than input elements.
    pub max_threads: usize,
    /// Advisory chunk granularity. Partitioning in the parallel strategy is
    /// derived from `max_threads`, not from this field.
    pub chunk_size: usize,
    /// Emit `log::debug!` events describing strategy choice and timing.
    pub enable_logging: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        ProcessConfig {
            memory: MemoryPolicy::default(),
            concurrency: ConcurrencyPolicy::default(),
            safety: SafetyPolicy::default(),
            max_threads: crate::engine::hardware_concurrency(),
            chunk_size: 1000,
            enable_logging: false,
        }
    }
}

impl ProcessConfig {
    /// Checks that all execution knobs are usable.
    pub fn validate(&self) -> veld_common::Result<()> {
        verify_arg!(max_threads, self.max_threads >= 1);
        verify_arg!(chunk_size, self.chunk_size >= 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProcessConfig::default();
        assert_eq!(config.concurrency, ConcurrencyPolicy::Adaptive);
        assert_eq!(config.memory, MemoryPolicy::Standard);
        assert_eq!(config.safety, SafetyPolicy::Standard);
        assert_eq!(config.chunk_size, 1000);
        assert!(config.max_threads >= 1);
        assert!(!config.enable_logging);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_threads() {
        let config = ProcessConfig {
            max_threads: 0,
            ..ProcessConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_threads"));
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let config = ProcessConfig {
            chunk_size: 0,
            ..ProcessConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
