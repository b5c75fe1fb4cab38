use crate::index::InfiniteIntersectionStrategy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Engine tuning loaded from a JSON file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How an infinite range meets an exact or pruned one
    #[serde(default)]
    pub infinite_intersection: InfiniteIntersectionStrategy,

    /// Threads for materializing pending union children.
    /// 0 means use the CPU count.
    #[serde(default = "default_initializer_threads")]
    pub initializer_threads: usize,
}

fn default_initializer_threads() -> usize {
    4
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            infinite_intersection: InfiniteIntersectionStrategy::default(),
            initializer_threads: default_initializer_threads(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse config file")
    }

    /// Resolves 0 to the CPU count
    pub fn effective_initializer_threads(&self) -> usize {
        if self.initializer_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.initializer_threads
        }
    }

    /// Pool the union builder runs scanner initializers on
    pub fn thread_pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.effective_initializer_threads())
            .thread_name(|i| format!("shardjoin-init-{}", i))
            .build()
            .context("Failed to build initializer thread pool")
    }
}
