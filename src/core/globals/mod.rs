//=========================================================================
// Global Engine State
//=========================================================================
//
// Explicit engine-lifetime state shared by every subsystem.
//
// Architecture:
//   EngineConfig:  tunables fixed at startup (budgets, drain policy)
//   AbortSignal:   settable fatal message polled by the frame loop
//   EngineContext: RequestCoordinator + SceneLifecycleCoordinator +
//                  AbortSignal, cloned into every thread that needs them
//
//=========================================================================

//=== Module Declarations =================================================

mod abort_signal;
mod engine_config;
mod engine_context;

//=== Public API ==========================================================

pub use abort_signal::AbortSignal;
pub use engine_config::EngineConfig;
pub use engine_context::EngineContext;
