//=========================================================================
// Engine Configuration
//=========================================================================
//
// Tunables for request processing and the frame loop. Populated through
// `EngineBuilder` and frozen once the engine is built.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::time::Duration;

//=== EngineConfig ========================================================

/// Startup configuration for the loader subsystems.
///
/// # Default Values
///
/// - **render_budget**: 8 ms of render-thread requests per frame
/// - **drain_poll_interval**: 10 ms between drain barrier polls
/// - **drain_timeout**: none (the barrier waits indefinitely)
/// - **target_fps**: 60.0
/// - **background_thread_name**: `"aetheric-background"`
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Time budget for render-thread requests in each frame.
    pub render_budget: Duration,

    /// Sleep between drain barrier polls.
    pub drain_poll_interval: Duration,

    /// Upper bound on a drain barrier wait. `None` waits forever, which
    /// stalls bootstrap if preload work keeps resubmitting requests.
    pub drain_timeout: Option<Duration>,

    /// Frame rate targeted by [`crate::Engine::run_until`].
    pub target_fps: f64,

    /// Name given to the background worker thread.
    pub background_thread_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            render_budget: Duration::from_millis(8),
            drain_poll_interval: Duration::from_millis(10),
            drain_timeout: None,
            target_fps: 60.0,
            background_thread_name: "aetheric-background".to_string(),
        }
    }
}

impl EngineConfig {
    /// Duration of one frame at the target frame rate.
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps)
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_conventions() {
        let config = EngineConfig::default();
        assert_eq!(config.render_budget, Duration::from_millis(8));
        assert_eq!(config.drain_poll_interval, Duration::from_millis(10));
        assert_eq!(config.drain_timeout, None);
        assert_eq!(config.target_fps, 60.0);
        assert_eq!(config.background_thread_name, "aetheric-background");
    }

    #[test]
    fn frame_duration_follows_target_fps() {
        let config = EngineConfig {
            target_fps: 50.0,
            ..EngineConfig::default()
        };
        assert_eq!(config.frame_duration(), Duration::from_millis(20));
    }
}
