//=========================================================================
// Aetheric Loader — Library Root
//
// Asynchronous resource loading and scene lifecycle for the Aetheric
// Engine.
//
// Responsibilities:
// - Route deferred work to a background worker or the render thread
// - Load scenes off-thread and swap them in on the render thread
// - Dispatch lifecycle hooks to game components
// - Run the one-time bootstrap sequence (splash, preload, first scene)
//
// Typical usage:
// ```no_run
// use aetheric_loader::EngineBuilder;
//
// let mut engine = EngineBuilder::new().with_fps(60.0).build().unwrap();
// // engine.bootstrap(Arc::new(MyGame), |result| { ... });
// engine.run_until(|ctx| ctx.scenes().active_scene_name().as_deref() == Some("Credits")).unwrap();
// engine.shutdown();
// ```
//
//=========================================================================

//--- Public Modules ------------------------------------------------------
//
// `core` holds every subsystem. It is public so games can reach the
// coordinators directly; most code only needs the `prelude`.
//
pub mod core;
pub mod prelude;

//--- Internal Modules ----------------------------------------------------
//
// `engine` defines the builder and the frame loop driver.
//
mod engine;

//--- Public Exports ------------------------------------------------------

pub use engine::{Engine, EngineBuilder, EngineError};
