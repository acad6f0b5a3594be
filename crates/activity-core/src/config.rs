//! Configuration knobs (spec §6).

/// Tunables for one ingest run. Defaults match spec §6.
#[derive(Debug, Clone, Copy)]
pub struct IngestConfig {
    /// Sliding window, in minutes, during which a user's prior simhashes are
    /// candidates for the duplicate-content penalty.
    pub similarity_window_minutes: u32,
    /// Smoothing constant `N` for all EMAs (`alpha = 2/(N+1)`).
    pub ema_smoothing_n: u32,
}

impl IngestConfig {
    pub fn alpha(&self) -> f64 {
        2.0 / (self.ema_smoothing_n as f64 + 1.0)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            similarity_window_minutes: 10,
            ema_smoothing_n: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_alpha_matches_spec() {
        let config = IngestConfig::default();
        assert!((config.alpha() - 2.0 / 501.0).abs() < 1e-12);
    }
}
