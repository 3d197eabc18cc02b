//=========================================================================
// Scene System
//=========================================================================
//
// Named scene definitions, their live instances, and the load/swap
// state machine that moves the engine from one scene to the next.
//
// Architecture:
//   SceneLifecycleCoordinator
//     ├─ registry: Mutex<SceneRegistry>   (names, loading/active, ready slot)
//     └─ active:   Mutex<SceneInstance>   (render thread only)
//
// State machine:
// ```text
//   EMPTY/ACTIVE ──load(name)──> LOADING(name) ──loader ok──> READY(name)
//        ^                            │                           │
//        └──────── loader fails ──────┘        switch_to_new_scene (render thread)
//                                                                 v
//                                                           ACTIVE(name)
// ```
//
//=========================================================================

//=== External Dependencies ===============================================

use thiserror::Error;

//=== Internal Dependencies ===============================================

use crate::core::request::RequestCoordinator;

//=== Module Declarations =================================================

mod lifecycle;
mod scene_instance;
mod scene_registry;

//=== Public API ==========================================================

pub use lifecycle::SceneLifecycleCoordinator;
pub use scene_instance::{Entity, SceneInstance};
pub use scene_registry::{SceneDescriptor, SceneRegistry};

//=== SceneLoader Trait ===================================================

/// Context passed to a loader while it builds a scene.
pub struct LoadContext<'a> {
    /// Request submission, e.g. to queue GPU uploads for the render thread.
    pub requests: &'a RequestCoordinator,

    /// Name of the scene being loaded.
    pub scene: &'a str,
}

/// Game-supplied capability that builds a scene's entities.
///
/// Runs wherever `load_scene` is called: inline on the render thread for
/// synchronous loads, on the background thread for async loads. Graphics
/// work must be routed through `ctx.requests`.
pub trait SceneLoader: Send + Sync {
    /// Unique scene name.
    fn name(&self) -> &str;

    /// Whether the scene should be kept warm (backgrounded) instead of
    /// disposed when another scene replaces it.
    fn retain_state(&self) -> bool {
        false
    }

    /// Builds the scene's entities.
    fn load_entities(&self, ctx: &LoadContext<'_>) -> anyhow::Result<Vec<Entity>>;
}

//=== SceneError ==========================================================

/// Errors produced by scene registration, loading and swapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    /// A load was requested while another is in flight.
    #[error("cannot load scene '{requested}': scene '{loading}' is already loading")]
    AlreadyLoading { requested: String, loading: String },

    /// No descriptor with this name is registered.
    #[error("unknown scene '{0}'")]
    UnknownScene(String),

    /// A descriptor with this name is already registered.
    #[error("scene '{0}' is already registered")]
    DuplicateScene(String),

    /// `switch_to_new_scene` was called with no loaded scene waiting.
    #[error("no loaded scene is ready to swap in")]
    NoSceneReady,

    /// The scene's loader returned an error or panicked.
    #[error("loader for scene '{scene}' failed: {message}")]
    LoaderFailure { scene: String, message: String },

    /// The coordinator was torn down; no further scenes are accepted.
    #[error("scene coordinator has been disposed")]
    CoordinatorDisposed,
}
