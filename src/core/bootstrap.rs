//=========================================================================
// Game Bootstrap
//=========================================================================
//
// One-time startup sequence: splash, preload, drain, first scene.
//
// Sequence:
// ```text
//   load(on_complete)                             calling thread
//     1. register splash + scene loaders
//     2. load splash synchronously (swap now if on render thread)
//     3. submit_background ─────────────────────> background thread
//                                                  preload resources
//                                                  drain_then_run ────> watcher thread
//                                                                        load first scene
//                                                                        on_complete(Ok)
// ```
//
// Every failure along the chain is delivered exactly once through
// `on_complete` and written to the abort signal, so the frame loop sees
// it even though bootstrap finishes off-thread.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{error, info};
use parking_lot::Mutex;
use thiserror::Error;

//=== Internal Dependencies ===============================================

use crate::core::globals::{AbortSignal, EngineContext};
use crate::core::request::{describe_panic, RequestError};
use crate::core::scene::{SceneError, SceneLoader};

//=== GameInitializer =====================================================

/// Game-supplied startup capability.
pub trait GameInitializer: Send + Sync {
    /// Preloads game resources. Runs on the background thread; may submit
    /// further background or render-thread requests, which bootstrap waits
    /// for before loading the first scene.
    fn load_resources(&self, ctx: &EngineContext) -> anyhow::Result<()>;

    /// Scene loaders in declaration order. The first one is loaded once
    /// preload has drained.
    fn scene_loaders(&self) -> Vec<Arc<dyn SceneLoader>>;

    /// Optional splash scene shown before any background work starts.
    fn splash_loader(&self) -> Option<Arc<dyn SceneLoader>> {
        None
    }
}

//=== BootstrapError ======================================================

/// Failures of the startup sequence.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("game declares no scenes")]
    NoScenes,

    #[error("scene registration failed: {0}")]
    Registration(#[source] SceneError),

    #[error("splash scene failed: {0}")]
    Splash(#[source] SceneError),

    #[error("could not schedule preload: {0}")]
    Submit(#[source] RequestError),

    #[error("resource preload failed: {0}")]
    Preload(String),

    #[error("waiting for preload requests failed: {0}")]
    Drain(#[source] RequestError),

    #[error("first scene failed: {0}")]
    FirstScene(#[source] SceneError),
}

//=== Completion ==========================================================

type CompletionFn = Box<dyn FnOnce(Result<(), BootstrapError>) + Send>;

/// Once-only completion slot shared along the bootstrap chain.
#[derive(Clone)]
struct Completion {
    callback: Arc<Mutex<Option<CompletionFn>>>,
    abort: AbortSignal,
}

impl Completion {
    fn new(callback: CompletionFn, abort: AbortSignal) -> Self {
        Self {
            callback: Arc::new(Mutex::new(Some(callback))),
            abort,
        }
    }

    fn finish(&self, result: Result<(), BootstrapError>) {
        let Some(callback) = self.callback.lock().take() else {
            return;
        };
        match &result {
            Ok(()) => info!(target: "bootstrap", "Bootstrap complete"),
            Err(err) => {
                error!(target: "bootstrap", "Bootstrap failed: {}", err);
                self.abort.raise(format!("Bootstrap failed: {}", err));
            }
        }
        callback(result);
    }
}

//=== GameBootstrap =======================================================

/// Drives the startup sequence for one game.
pub struct GameBootstrap {
    ctx: EngineContext,
    initializer: Arc<dyn GameInitializer>,
}

impl GameBootstrap {
    pub fn new(ctx: EngineContext, initializer: Arc<dyn GameInitializer>) -> Self {
        Self { ctx, initializer }
    }

    /// Runs the startup sequence.
    ///
    /// Returns once the splash scene (if any) is loaded; the rest runs on
    /// the background and watcher threads. `on_complete` is called exactly
    /// once, with the error if any step failed.
    pub fn load<F>(&self, on_complete: F)
    where
        F: FnOnce(Result<(), BootstrapError>) + Send + 'static,
    {
        let completion = Completion::new(Box::new(on_complete), self.ctx.abort().clone());
        if let Err(err) = self.start(&completion) {
            completion.finish(Err(err));
        }
    }

    fn start(&self, completion: &Completion) -> Result<(), BootstrapError> {
        let scenes = self.ctx.scenes();
        let loaders = self.initializer.scene_loaders();
        let first_scene = loaders
            .first()
            .map(|loader| loader.name().to_string())
            .ok_or(BootstrapError::NoScenes)?;
        let splash = self.initializer.splash_loader();

        //--- 1. Register scenes -------------------------------------------
        let splash_name = splash.as_ref().map(|loader| loader.name().to_string());
        scenes
            .register_scenes(splash.into_iter().chain(loaders))
            .map_err(BootstrapError::Registration)?;

        //--- 2. Splash ----------------------------------------------------
        if let Some(name) = splash_name {
            scenes.load_scene(&name).map_err(BootstrapError::Splash)?;
            if self.ctx.requests().is_render_thread() {
                scenes.switch_to_new_scene().map_err(BootstrapError::Splash)?;
            }
            info!(target: "bootstrap", "Splash scene '{}' shown", name);
        }

        //--- 3. Preload, drain, first scene -------------------------------
        let ctx = self.ctx.clone();
        let initializer = Arc::clone(&self.initializer);
        let chain = completion.clone();
        self.ctx
            .requests()
            .submit_background(move || preload_then_load(ctx, initializer, first_scene, chain))
            .map_err(BootstrapError::Submit)
    }
}

/// Background half of the sequence.
fn preload_then_load(
    ctx: EngineContext,
    initializer: Arc<dyn GameInitializer>,
    first_scene: String,
    completion: Completion,
) {
    info!(target: "bootstrap", "Preloading game resources");
    let preload = panic::catch_unwind(AssertUnwindSafe(|| initializer.load_resources(&ctx)));
    let preload = match preload {
        Ok(result) => result.map_err(|err| format!("{:#}", err)),
        Err(payload) => Err(format!("preload panicked: {}", describe_panic(payload.as_ref()))),
    };
    if let Err(message) = preload {
        completion.finish(Err(BootstrapError::Preload(message)));
        return;
    }

    let scenes = Arc::clone(ctx.scenes());
    let chain = completion.clone();
    let watcher = ctx.requests().drain_then_run(move |drained| {
        let result = drained
            .map_err(BootstrapError::Drain)
            .and_then(|()| scenes.load_scene(&first_scene).map_err(BootstrapError::FirstScene));
        chain.finish(result);
    });
    if let Err(err) = watcher {
        completion.finish(Err(BootstrapError::Drain(err)));
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::component::tests::Recorder;
    use crate::core::component::ComponentHandle;
    use crate::core::globals::EngineConfig;
    use crate::core::scene::{Entity, LoadContext};
    use crossbeam_channel::{unbounded, Receiver};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    type Log = Arc<parking_lot::Mutex<Vec<String>>>;

    //--- Test game --------------------------------------------------------

    struct RecordingLoader {
        name: &'static str,
        log: Log,
        requires: Option<Arc<AtomicBool>>,
        fail: bool,
    }

    impl SceneLoader for RecordingLoader {
        fn name(&self) -> &str {
            self.name
        }

        fn load_entities(&self, _ctx: &LoadContext<'_>) -> anyhow::Result<Vec<Entity>> {
            if let Some(flag) = &self.requires {
                anyhow::ensure!(flag.load(Ordering::SeqCst), "{} loaded before preload finished", self.name);
            }
            if self.fail {
                anyhow::bail!("{} level data is corrupt", self.name);
            }
            Ok(vec![Entity::new(self.name)
                .with_component(ComponentHandle::new(Recorder::new(self.name, &self.log)))])
        }
    }

    struct TestGame {
        log: Log,
        uploaded: Arc<AtomicBool>,
        parsed: Arc<AtomicBool>,
        splash: bool,
        fail_preload: bool,
        fail_first_scene: bool,
        scenes: bool,
    }

    impl TestGame {
        fn new(log: &Log) -> Self {
            Self {
                log: Arc::clone(log),
                uploaded: Arc::new(AtomicBool::new(false)),
                parsed: Arc::new(AtomicBool::new(false)),
                splash: true,
                fail_preload: false,
                fail_first_scene: false,
                scenes: true,
            }
        }
    }

    impl GameInitializer for TestGame {
        fn load_resources(&self, ctx: &EngineContext) -> anyhow::Result<()> {
            if self.fail_preload {
                anyhow::bail!("texture atlas missing");
            }
            // One background parse that chains a render-thread upload.
            let requests = Arc::clone(ctx.requests());
            let parsed = Arc::clone(&self.parsed);
            let uploaded = Arc::clone(&self.uploaded);
            ctx.requests().submit_background(move || {
                parsed.store(true, Ordering::SeqCst);
                requests.submit_render_thread(move || uploaded.store(true, Ordering::SeqCst));
            })?;
            Ok(())
        }

        fn scene_loaders(&self) -> Vec<Arc<dyn SceneLoader>> {
            if !self.scenes {
                return Vec::new();
            }
            vec![Arc::new(RecordingLoader {
                name: "Main",
                log: Arc::clone(&self.log),
                requires: Some(Arc::clone(&self.uploaded)),
                fail: self.fail_first_scene,
            })]
        }

        fn splash_loader(&self) -> Option<Arc<dyn SceneLoader>> {
            self.splash.then(|| {
                Arc::new(RecordingLoader {
                    name: "Splash",
                    log: Arc::clone(&self.log),
                    requires: None,
                    fail: false,
                }) as Arc<dyn SceneLoader>
            })
        }
    }

    fn context() -> EngineContext {
        EngineContext::new(EngineConfig {
            drain_poll_interval: Duration::from_millis(2),
            ..EngineConfig::default()
        })
        .unwrap()
    }

    /// Pumps render-thread requests until bootstrap reports back.
    fn wait_for(ctx: &EngineContext, rx: &Receiver<Result<(), BootstrapError>>) -> Result<(), BootstrapError> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            ctx.requests().run_time_boxed_render_requests();
            if let Ok(result) = rx.recv_timeout(Duration::from_millis(5)) {
                return result;
            }
            assert!(Instant::now() < deadline, "bootstrap never completed");
        }
    }

    //=====================================================================
    // End-to-End Tests
    //=====================================================================

    #[test]
    fn splash_then_main_after_drain() {
        let ctx = context();
        let log: Log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let game = Arc::new(TestGame::new(&log));
        let uploaded = Arc::clone(&game.uploaded);
        let parsed = Arc::clone(&game.parsed);

        let (tx, rx) = unbounded();
        GameBootstrap::new(ctx.clone(), game).load(move |result| tx.send(result).unwrap());

        assert_eq!(
            ctx.scenes().active_scene_name().as_deref(),
            Some("Splash"),
            "Splash is active before bootstrap completes"
        );

        wait_for(&ctx, &rx).unwrap();
        assert!(parsed.load(Ordering::SeqCst));
        assert!(uploaded.load(Ordering::SeqCst), "Render-thread request drained first");
        assert!(ctx.scenes().has_new_scene());

        // One simulated frame.
        ctx.scenes().switch_to_new_scene().unwrap();

        assert_eq!(ctx.scenes().active_scene_name().as_deref(), Some("Main"));
        let splash_disposals = log.lock().iter().filter(|entry| *entry == "Splash:dispose").count();
        assert_eq!(splash_disposals, 1);
        assert!(!ctx.abort().is_raised());
    }

    #[test]
    fn bootstrap_without_splash_loads_first_scene() {
        let ctx = context();
        let log: Log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut game = TestGame::new(&log);
        game.splash = false;

        let (tx, rx) = unbounded();
        GameBootstrap::new(ctx.clone(), Arc::new(game)).load(move |result| tx.send(result).unwrap());
        assert_eq!(ctx.scenes().active_scene_name(), None);

        wait_for(&ctx, &rx).unwrap();
        assert_eq!(ctx.scenes().loading_scene_name().as_deref(), Some("Main"));
    }

    //=====================================================================
    // Failure Tests
    //=====================================================================

    #[test]
    fn preload_failure_is_reported_once_and_raises_abort() {
        let ctx = context();
        let log: Log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut game = TestGame::new(&log);
        game.fail_preload = true;

        let (tx, rx) = unbounded();
        GameBootstrap::new(ctx.clone(), Arc::new(game)).load(move |result| tx.send(result).unwrap());

        let result = wait_for(&ctx, &rx);
        assert!(matches!(result, Err(BootstrapError::Preload(ref message)) if message.contains("texture atlas")));
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err(), "Completion fires once");

        let abort = ctx.abort().message().unwrap_or_default();
        assert!(abort.contains("texture atlas missing"));
        assert!(!ctx.scenes().has_new_scene());
        assert_eq!(ctx.scenes().active_scene_name().as_deref(), Some("Splash"));
    }

    #[test]
    fn first_scene_failure_is_reported_once_and_raises_abort() {
        let ctx = context();
        let log: Log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut game = TestGame::new(&log);
        game.fail_first_scene = true;

        let (tx, rx) = unbounded();
        GameBootstrap::new(ctx.clone(), Arc::new(game)).load(move |result| tx.send(result).unwrap());

        let result = wait_for(&ctx, &rx);
        assert!(matches!(
            result,
            Err(BootstrapError::FirstScene(SceneError::LoaderFailure { ref scene, .. })) if scene == "Main"
        ));
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err(), "Completion fires once");

        let abort = ctx.abort().message().unwrap_or_default();
        assert!(abort.contains("level data is corrupt"));
        assert!(!ctx.scenes().has_new_scene());
        assert_eq!(ctx.scenes().active_scene_name().as_deref(), Some("Splash"));
        assert_eq!(ctx.scenes().loading_scene_name(), None);
    }

    #[test]
    fn game_without_scenes_fails_immediately() {
        let ctx = context();
        let log: Log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut game = TestGame::new(&log);
        game.scenes = false;

        let (tx, rx) = unbounded();
        GameBootstrap::new(ctx.clone(), Arc::new(game)).load(move |result| tx.send(result).unwrap());

        assert!(matches!(rx.try_recv(), Ok(Err(BootstrapError::NoScenes))));
        assert!(ctx.abort().is_raised());
    }

    #[test]
    fn drain_timeout_is_reported() {
        let ctx = EngineContext::new(EngineConfig {
            drain_poll_interval: Duration::from_millis(2),
            drain_timeout: Some(Duration::from_millis(30)),
            ..EngineConfig::default()
        })
        .unwrap();
        let log: Log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let game = Arc::new(TestGame::new(&log));

        let (tx, rx) = unbounded();
        GameBootstrap::new(ctx.clone(), game).load(move |result| tx.send(result).unwrap());

        // Never pump the render queue, so the upload stays outstanding.
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(result, Err(BootstrapError::Drain(RequestError::DrainTimeout(_)))));
        assert!(ctx.abort().is_raised());
    }
}
