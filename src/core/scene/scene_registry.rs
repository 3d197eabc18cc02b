//=========================================================================
// Scene Registry
//=========================================================================
//
// Name-keyed table of scene descriptors plus the loading/active pointers.
//
// Invariants:
// - names are unique
// - at most one scene is loading (from `begin_load` until the ready
//   instance is taken by a swap, or the load fails)
// - `take_ready` moves loading -> active in one step
//
// Not thread-safe on its own; SceneLifecycleCoordinator wraps it in a
// mutex so the active/loading pair is never observed half-updated.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};

//=== Internal Dependencies ===============================================

use super::{SceneError, SceneInstance, SceneLoader};

//=== SceneDescriptor =====================================================

/// A registered scene: its loader, retention policy and any warm instance.
pub struct SceneDescriptor {
    name: String,
    loader: Arc<dyn SceneLoader>,
    retain_state: bool,
    instance: Option<SceneInstance>,
}

impl SceneDescriptor {
    fn new(loader: Arc<dyn SceneLoader>) -> Self {
        Self {
            name: loader.name().to_string(),
            retain_state: loader.retain_state(),
            loader,
            instance: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn retain_state(&self) -> bool {
        self.retain_state
    }

    /// Returns true if a backgrounded instance is being kept warm.
    pub fn is_warm(&self) -> bool {
        self.instance.is_some()
    }
}

//=== LoadTicket ==========================================================

/// What a granted load has to do to produce its instance.
pub(crate) enum LoadTicket {
    /// Run the loader.
    Fresh(Arc<dyn SceneLoader>),
    /// Reuse a retained instance.
    Warm(SceneInstance),
}

//=== SceneRegistry =======================================================

/// Scene descriptors and the registry-wide loading/active state.
#[derive(Default)]
pub struct SceneRegistry {
    descriptors: HashMap<String, SceneDescriptor>,
    order: Vec<String>,
    active: Option<String>,
    loading: Option<String>,
    ready: Option<SceneInstance>,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    //--- Registration -----------------------------------------------------

    /// Registers a loader under its name.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::DuplicateScene`] if the name is taken.
    pub fn register(&mut self, loader: Arc<dyn SceneLoader>) -> Result<(), SceneError> {
        let name = loader.name().to_string();
        if self.descriptors.contains_key(&name) {
            warn!(target: "scenes", "Scene '{}' is already registered", name);
            return Err(SceneError::DuplicateScene(name));
        }
        debug!(target: "scenes", "Registered scene '{}'", name);
        self.descriptors.insert(name.clone(), SceneDescriptor::new(loader));
        self.order.push(name);
        Ok(())
    }

    //--- Load State Machine -----------------------------------------------

    /// Claims the single loading slot for `name`.
    pub(crate) fn begin_load(&mut self, name: &str) -> Result<LoadTicket, SceneError> {
        if let Some(loading) = &self.loading {
            return Err(SceneError::AlreadyLoading {
                requested: name.to_string(),
                loading: loading.clone(),
            });
        }
        let descriptor = self
            .descriptors
            .get_mut(name)
            .ok_or_else(|| SceneError::UnknownScene(name.to_string()))?;

        self.loading = Some(name.to_string());
        Ok(match descriptor.instance.take() {
            Some(instance) => LoadTicket::Warm(instance),
            None => LoadTicket::Fresh(Arc::clone(&descriptor.loader)),
        })
    }

    /// Stores the loaded instance; the scene is now ready to swap in.
    pub(crate) fn complete_load(&mut self, mut instance: SceneInstance) {
        instance.mark_ready();
        self.ready = Some(instance);
    }

    /// Releases the loading slot after a failed load.
    pub(crate) fn fail_load(&mut self) {
        self.loading = None;
    }

    /// Takes the ready instance and makes it the active scene.
    pub(crate) fn take_ready(&mut self) -> Option<SceneInstance> {
        let instance = self.ready.take()?;
        self.active = self.loading.take();
        Some(instance)
    }

    /// Keeps a backgrounded instance warm in its descriptor.
    ///
    /// Returns the instance back if the scene is not retained or already
    /// has a warm instance, so the caller can dispose it.
    pub(crate) fn park(&mut self, instance: SceneInstance) -> Result<(), SceneInstance> {
        match self.descriptors.get_mut(instance.name()) {
            Some(descriptor) if descriptor.retain_state && descriptor.instance.is_none() => {
                descriptor.instance = Some(instance);
                Ok(())
            }
            _ => Err(instance),
        }
    }

    /// Removes every instance the registry holds (ready and warm).
    pub(crate) fn take_all_instances(&mut self) -> Vec<SceneInstance> {
        let mut instances: Vec<SceneInstance> = self.ready.take().into_iter().collect();
        for name in &self.order {
            if let Some(instance) = self.descriptors.get_mut(name).and_then(|d| d.instance.take()) {
                instances.push(instance);
            }
        }
        self.loading = None;
        instances
    }

    //--- Queries ----------------------------------------------------------

    /// Returns true when a loaded scene is waiting to be swapped in.
    pub fn has_ready(&self) -> bool {
        self.ready.is_some()
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn loading_name(&self) -> Option<&str> {
        self.loading.as_deref()
    }

    pub fn descriptor(&self, name: &str) -> Option<&SceneDescriptor> {
        self.descriptors.get(name)
    }

    pub fn is_retained(&self, name: &str) -> bool {
        self.descriptors.get(name).is_some_and(|d| d.retain_state)
    }

    /// Scene names in registration order.
    pub fn scene_names(&self) -> &[String] {
        &self.order
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
