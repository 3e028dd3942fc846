use async_trait::async_trait;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use taskcore::{ResourceAccessor, ResourceError, Value};
use tokio::sync::{Mutex, RwLock};

/// The only surface a concrete resource type must supply; keyed storage,
/// concurrency control, health-check scheduling and eviction are common
/// infrastructure in `ResourceManager`.
#[async_trait]
pub trait ResourceFactory: Send + Sync + 'static {
    type Resource: Send + Sync + 'static;

    async fn create_resource(
        &self,
        key: &str,
        config: &Value,
    ) -> Result<Self::Resource, ResourceError>;

    /// Subsystem-specific liveness probe (e.g. "is the socket connected").
    async fn check_health(&self, _resource: &Self::Resource) -> bool {
        true
    }

    async fn cleanup_resource(&self, _resource: &Self::Resource) {}
}

struct Slot<R> {
    instance: Option<Arc<R>>,
    /// Current borrowers of this key, across instance generations.
    ref_count: usize,
    last_health_check: Instant,
    /// Instances replaced while still borrowed; torn down at the key's
    /// last release, never out from under an active borrower.
    retired: Vec<Arc<R>>,
}

impl<R> Default for Slot<R> {
    fn default() -> Self {
        Self {
            instance: None,
            ref_count: 0,
            last_health_check: Instant::now(),
            retired: Vec::new(),
        }
    }
}

/// Generic keyed pool guaranteeing at most one live resource instance per
/// logical key: lazy creation, shared borrows, health-checked reuse and
/// reference-counted teardown.
pub struct ResourceManager<F: ResourceFactory> {
    factory: F,
    slots: RwLock<HashMap<String, Arc<Mutex<Slot<F::Resource>>>>>,
    health_check_interval: Duration,
}

impl<F: ResourceFactory> ResourceManager<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            slots: RwLock::new(HashMap::new()),
            health_check_interval: Duration::from_secs(30),
        }
    }

    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// The per-key slot. The global map lock is held only long enough to
    /// clone the slot handle, so unrelated keys never contend.
    async fn slot(&self, key: &str) -> Arc<Mutex<Slot<F::Resource>>> {
        if let Some(slot) = self.slots.read().await.get(key) {
            return slot.clone();
        }
        self.slots
            .write()
            .await
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Borrow the resource for `key`, creating it on first acquisition.
    ///
    /// Construction happens under the key's slot lock, so concurrent callers
    /// for the same new key coalesce onto a single `create_resource` call.
    /// A stale entry is re-probed; an unhealthy one is evicted and recreated
    /// transparently.
    pub async fn get_or_create(
        &self,
        key: &str,
        config: &Value,
    ) -> Result<Arc<F::Resource>, ResourceError> {
        let slot = self.slot(key).await;
        let mut guard = slot.lock().await;

        let reusable = match guard.instance.clone() {
            Some(instance) => {
                if guard.last_health_check.elapsed() < self.health_check_interval {
                    Some(instance)
                } else if self.factory.check_health(&instance).await {
                    guard.last_health_check = Instant::now();
                    Some(instance)
                } else {
                    tracing::warn!(key, "Resource failed health check; evicting");
                    None
                }
            }
            None => None,
        };

        if let Some(instance) = reusable {
            guard.ref_count += 1;
            return Ok(instance);
        }

        if let Some(stale) = guard.instance.take() {
            if guard.ref_count == 0 {
                self.factory.cleanup_resource(stale.as_ref()).await;
            } else {
                guard.retired.push(stale);
            }
        }

        let instance = Arc::new(self.factory.create_resource(key, config).await?);
        tracing::debug!(key, "Created resource");
        guard.instance = Some(instance.clone());
        guard.last_health_check = Instant::now();
        guard.ref_count += 1;
        Ok(instance)
    }

    /// Drop one borrow of `key`. The last releaser tears the resource down,
    /// exactly once, along with any retired generations.
    pub async fn release(&self, key: &str) -> Result<(), ResourceError> {
        let slot = self
            .slots
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| ResourceError::UnknownKey(key.to_string()))?;
        let mut guard = slot.lock().await;

        if guard.ref_count == 0 {
            return Err(ResourceError::UnknownKey(key.to_string()));
        }
        guard.ref_count -= 1;
        if guard.ref_count == 0 {
            if let Some(instance) = guard.instance.take() {
                self.factory.cleanup_resource(instance.as_ref()).await;
                tracing::debug!(key, "Cleaned up resource after last release");
            }
            let retired = std::mem::take(&mut guard.retired);
            for instance in retired {
                self.factory.cleanup_resource(instance.as_ref()).await;
            }
        }
        Ok(())
    }

    /// Explicitly evict `key`. Tears down immediately when unreferenced;
    /// otherwise the instance is retired and torn down at the last release,
    /// and the next acquisition creates a fresh one. Returns whether the
    /// teardown happened now.
    pub async fn evict(&self, key: &str) -> bool {
        let Some(slot) = self.slots.read().await.get(key).cloned() else {
            return false;
        };
        let mut guard = slot.lock().await;
        match guard.instance.take() {
            Some(instance) if guard.ref_count == 0 => {
                self.factory.cleanup_resource(instance.as_ref()).await;
                true
            }
            Some(instance) => {
                guard.retired.push(instance);
                false
            }
            None => false,
        }
    }

    /// Current borrow count for a key, for tests and diagnostics.
    pub async fn ref_count(&self, key: &str) -> usize {
        match self.slots.read().await.get(key) {
            Some(slot) => slot.lock().await.ref_count,
            None => 0,
        }
    }
}

/// Immutable type-keyed registry of resource managers, built once at
/// startup and handed to every execution context.
pub struct ResourceHub {
    managers: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ResourceHub {
    pub fn builder() -> ResourceHubBuilder {
        ResourceHubBuilder {
            managers: HashMap::new(),
        }
    }

    pub fn manager<F: ResourceFactory>(&self) -> Option<Arc<ResourceManager<F>>> {
        self.managers
            .get(&TypeId::of::<ResourceManager<F>>())
            .cloned()
            .and_then(|any| any.downcast::<ResourceManager<F>>().ok())
    }
}

impl ResourceAccessor for ResourceHub {
    fn get_any(&self, type_id: TypeId) -> Option<Arc<dyn Any + Send + Sync>> {
        self.managers.get(&type_id).cloned()
    }
}

pub struct ResourceHubBuilder {
    managers: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ResourceHubBuilder {
    pub fn with_manager<F: ResourceFactory>(mut self, manager: Arc<ResourceManager<F>>) -> Self {
        self.managers
            .insert(TypeId::of::<ResourceManager<F>>(), manager);
        self
    }

    pub fn build(self) -> Arc<ResourceHub> {
        Arc::new(ResourceHub {
            managers: self.managers,
        })
    }
}
