//=========================================================================
// Prelude
//=========================================================================
//
// Convenience module that re-exports commonly used types and traits.
//
// Usage:
//   use aetheric_loader::prelude::*;
//
//=========================================================================

//=== Public API ==========================================================

// Engine core
pub use crate::engine::{Engine, EngineBuilder, EngineError};

// Global context
pub use crate::core::globals::{AbortSignal, EngineConfig, EngineContext};

// Bootstrap
pub use crate::core::bootstrap::{BootstrapError, GameBootstrap, GameInitializer};

// Requests
pub use crate::core::request::{RequestCoordinator, RequestError};

// Components
pub use crate::core::component::{
    Backgroundable, Component, ComponentHandle, HookContext, Initializable, LifecyclePhase,
    Renderable, Startable, Updatable,
};

// Scene system
pub use crate::core::scene::{Entity, LoadContext, SceneError, SceneLifecycleCoordinator, SceneLoader};
