//=========================================================================
// Core Systems
//
// Engine-lifetime subsystems that sit between the frame loop and game
// code.
//
// Layout:
// - `request`:   background and render-thread work queues, drain barrier
// - `component`: lifecycle phases, capability traits, event dispatch
// - `scene`:     scene registry, instances, load/swap coordination
// - `bootstrap`: one-time startup sequence
// - `globals`:   configuration, abort signal and the shared context
//
//=========================================================================

pub mod bootstrap;
pub mod component;
pub mod globals;
pub mod request;
pub mod scene;

//=== Public API ==========================================================

pub use bootstrap::{BootstrapError, GameBootstrap, GameInitializer};
pub use globals::{AbortSignal, EngineConfig, EngineContext};
