//=========================================================================
// Aetheric Engine
//
// Builder and frame loop driver for the loader subsystems.
//
// Architecture:
// ```text
//     EngineBuilder  ──build()──>  Engine  ──update()──>  one frame
//         │                          │
//         ├─ with_fps()              ├─ run_until()  paced frames
//         ├─ with_render_budget()    └─ shutdown()   dispose scenes,
//         └─ with_drain_timeout()                    then requests
// ```
//
// Frame order:
//   abort check ─> swap ready scene ─> time-boxed render requests
//     ─> dispatch Update ─> dispatch Render
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};
use thiserror::Error;

//=== Internal Dependencies ===============================================

use crate::core::bootstrap::{BootstrapError, GameBootstrap, GameInitializer};
use crate::core::component::LifecyclePhase;
use crate::core::globals::{EngineConfig, EngineContext};
use crate::core::request::RequestError;

//=== EngineError =========================================================

/// Errors surfaced by the frame loop.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The abort signal was raised, usually by a failed bootstrap.
    #[error("engine aborted: {0}")]
    Aborted(String),

    /// The request processors could not be started.
    #[error("engine startup failed: {0}")]
    Startup(#[from] RequestError),
}

//=== EngineBuilder =======================================================

/// Builder for configuring and constructing an [`Engine`].
///
/// # Default Values
///
/// - **FPS**: 60.0
/// - **Render budget**: 8 ms per frame
/// - **Drain poll interval**: 10 ms
/// - **Drain timeout**: none
///
/// # Examples
///
/// ```no_run
/// use aetheric_loader::EngineBuilder;
/// use std::time::Duration;
///
/// let engine = EngineBuilder::new()
///     .with_fps(120.0)
///     .with_render_budget(Duration::from_millis(4))
///     .with_drain_timeout(Duration::from_secs(30))
///     .build()
///     .expect("engine");
/// ```
pub struct EngineBuilder {
    config: EngineConfig,
}

impl EngineBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    /// Sets the target frames per second for [`Engine::run_until`].
    ///
    /// # Panics
    ///
    /// Panics if `fps <= 0.0`.
    pub fn with_fps(mut self, fps: f64) -> Self {
        assert!(fps > 0.0, "FPS must be positive, got {}", fps);
        self.config.target_fps = fps;
        self
    }

    /// Sets how long render-thread requests may run each frame.
    ///
    /// # Panics
    ///
    /// Panics if `budget` is zero.
    pub fn with_render_budget(mut self, budget: Duration) -> Self {
        assert!(!budget.is_zero(), "Render budget must be positive");
        self.config.render_budget = budget;
        self
    }

    /// Sets the sleep between drain barrier polls.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    pub fn with_drain_poll_interval(mut self, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "Drain poll interval must be positive");
        self.config.drain_poll_interval = interval;
        self
    }

    /// Bounds every drain barrier wait. Without this the barrier waits
    /// for as long as requests keep arriving.
    ///
    /// # Panics
    ///
    /// Panics if `timeout` is zero.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        assert!(!timeout.is_zero(), "Drain timeout must be positive");
        self.config.drain_timeout = Some(timeout);
        self
    }

    /// Names the background worker thread.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn with_background_thread_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        assert!(!name.is_empty(), "Background thread name must not be empty");
        self.config.background_thread_name = name;
        self
    }

    /// Builds the engine. The calling thread becomes the render thread.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Startup`] if the background worker cannot
    /// be spawned.
    pub fn build(self) -> Result<Engine, EngineError> {
        info!(
            target: "engine",
            "Building engine (FPS: {}, render budget: {:?})",
            self.config.target_fps,
            self.config.render_budget
        );

        Ok(Engine {
            ctx: EngineContext::new(self.config)?,
            last_frame: Instant::now(),
            frames: 0,
            shut_down: false,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//=== Engine ==============================================================

/// Frame loop driver.
///
/// Owns the [`EngineContext`] and must be driven from the thread that
/// built it (the render thread).
pub struct Engine {
    ctx: EngineContext,
    last_frame: Instant,
    frames: u64,
    shut_down: bool,
}

impl Engine {
    //--- Initialization ---------------------------------------------------

    /// Gives game code access to the context before the loop starts,
    /// e.g. to register scenes that bootstrap does not declare.
    pub fn init<F>(self, init_fn: F) -> Self
    where
        F: FnOnce(&EngineContext),
    {
        info!(target: "engine", "Initializing engine systems");
        init_fn(&self.ctx);
        self
    }

    /// Shared engine context.
    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// Starts the game's bootstrap sequence. See [`GameBootstrap::load`].
    pub fn bootstrap<F>(&self, initializer: Arc<dyn GameInitializer>, on_complete: F)
    where
        F: FnOnce(Result<(), BootstrapError>) + Send + 'static,
    {
        GameBootstrap::new(self.ctx.clone(), initializer).load(on_complete);
    }

    //--- Execution --------------------------------------------------------

    /// Runs one frame.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Aborted`] if the abort signal is raised.
    pub fn update(&mut self) -> Result<(), EngineError> {
        if let Some(message) = self.ctx.abort().message() {
            return Err(EngineError::Aborted(message));
        }

        let now = Instant::now();
        let delta = now - self.last_frame;
        self.last_frame = now;

        //--- 1. Swap in a freshly loaded scene ----------------------------
        let scenes = self.ctx.scenes();
        if scenes.has_new_scene() {
            if let Err(err) = scenes.switch_to_new_scene() {
                warn!(target: "engine", "Scene swap skipped: {}", err);
            }
        }

        //--- 2. Budgeted render-thread work -------------------------------
        self.ctx.requests().run_time_boxed_render_requests();

        //--- 3. Component phases ------------------------------------------
        scenes.dispatch(LifecyclePhase::Update, delta);
        scenes.dispatch(LifecyclePhase::Render, delta);

        self.frames += 1;
        Ok(())
    }

    /// Runs frames paced at the target FPS until `should_stop` returns
    /// true or the engine aborts.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Aborted`] if the abort signal is raised.
    pub fn run_until<F>(&mut self, mut should_stop: F) -> Result<(), EngineError>
    where
        F: FnMut(&EngineContext) -> bool,
    {
        let frame_duration = self.ctx.config().frame_duration();
        info!(target: "engine", "Entering frame loop (target frame time: {:?})", frame_duration);

        loop {
            let frame_start = Instant::now();
            if should_stop(&self.ctx) {
                break;
            }

            self.update()?;

            let elapsed = frame_start.elapsed();
            if elapsed < frame_duration {
                thread::sleep(frame_duration - elapsed);
            }
        }

        info!(target: "engine", "Frame loop exited after {} frame(s)", self.frames);
        Ok(())
    }

    /// Number of frames run so far.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    //--- Shutdown ---------------------------------------------------------

    /// Disposes scenes, then request processors. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.ctx.dispose();
        info!(target: "engine", "Engine shutdown complete");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
