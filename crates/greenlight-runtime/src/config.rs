//! Loop configuration and defaults.

/// Default maximum model iterations per turn.
pub(crate) const DEFAULT_MAX_ITERATIONS: usize = 8;

/// Configuration for the conversation loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Maximum model iterations per turn. Bounds the back-and-forth if
    /// the model keeps requesting tools without producing a final
    /// answer.
    pub max_iterations: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cap_is_bounded() {
        let config = LoopConfig::default();
        assert!(config.max_iterations > 0);
    }
}
