//! Car model loading.
//!
//! Models are fetched asynchronously and never block the simulation tick.
//! A [`ModelCache`] is shared by every session in the process: entries are
//! only ever added, keyed by asset path, and concurrent requests for the
//! same path share one fetch. When a fetch fails the caller gets a
//! [`FallbackMesh`] instead, which has no effect on physics.

use crate::error::{Result, SimError};
use bytes::Bytes;
use glam::Vec3;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Binary glTF files start with this magic
const GLB_MAGIC: &[u8; 4] = b"glTF";

/// Default body colour of the player fallback box
pub const PLAYER_FALLBACK_COLOR: u32 = 0x4a9eff;

/// Body dimensions of the fallback primitive
pub const FALLBACK_BODY_SIZE: Vec3 = Vec3::new(2.0, 1.0, 4.0);

/// A fetched model, shared between every car that uses it
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModel {
    pub path: String,
    pub bytes: Bytes,
}

/// Coloured box shown when a model is unavailable
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackMesh {
    pub size: Vec3,
    pub color: u32,
}

impl FallbackMesh {
    pub fn new(color: u32) -> Self {
        Self {
            size: FALLBACK_BODY_SIZE,
            color,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Renderable {
    Model(Arc<LoadedModel>),
    Fallback(FallbackMesh),
}

impl Renderable {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Renderable::Fallback(_))
    }
}

/// Where model bytes come from
pub trait ModelSource: Send + Sync + 'static {
    fn fetch(&self, path: &str) -> impl Future<Output = Result<Bytes>> + Send;
}

/// Reads models from a directory; asset paths like `/models/x.glb` resolve under it
#[derive(Debug, Clone)]
pub struct FsModelSource {
    root: PathBuf,
}

impl FsModelSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl ModelSource for FsModelSource {
    async fn fetch(&self, path: &str) -> Result<Bytes> {
        let full_path = self.resolve(path);
        let data = tokio::fs::read(&full_path).await.map_err(|e| SimError::Asset {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        if !data.starts_with(GLB_MAGIC) {
            return Err(SimError::Asset {
                path: path.to_string(),
                reason: "not a binary glTF file".to_string(),
            });
        }

        Ok(Bytes::from(data))
    }
}

type Slot = Arc<OnceCell<Arc<LoadedModel>>>;

/// Process-wide, append-only model cache
pub struct ModelCache<S: ModelSource> {
    source: Arc<S>,
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl<S: ModelSource> Clone for ModelCache<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<S: ModelSource> ModelCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn slot(&self, path: &str) -> Slot {
        let mut slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(slots.entry(path.to_string()).or_default())
    }

    /// Fetch a model, sharing in-flight and completed loads by path.
    ///
    /// A failed fetch leaves the slot empty so a later call retries.
    pub async fn load(&self, path: &str) -> Result<Arc<LoadedModel>> {
        let slot = self.slot(path);
        let model = slot
            .get_or_try_init(|| async {
                let bytes = self.source.fetch(path).await?;
                debug!(path, size = bytes.len(), "Model loaded");
                Ok::<_, SimError>(Arc::new(LoadedModel {
                    path: path.to_string(),
                    bytes,
                }))
            })
            .await?;
        Ok(Arc::clone(model))
    }

    /// Load a model, degrading to a coloured box on failure
    pub async fn load_renderable(&self, path: &str, fallback_color: u32) -> Renderable {
        match self.load(path).await {
            Ok(model) => Renderable::Model(model),
            Err(e) => {
                warn!("Failed to load model {}: {}, using fallback", path, e);
                Renderable::Fallback(FallbackMesh::new(fallback_color))
            }
        }
    }

    /// Already-resolved model, without starting a fetch
    pub fn get(&self, path: &str) -> Option<Arc<LoadedModel>> {
        let slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.get(path).and_then(|slot| slot.get().cloned())
    }

    pub fn loaded_count(&self) -> usize {
        let slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.values().filter(|slot| slot.initialized()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    struct CountingSource {
        fetches: Arc<AtomicUsize>,
    }

    impl ModelSource for CountingSource {
        async fn fetch(&self, path: &str) -> Result<Bytes> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if path.contains("missing") {
                return Err(SimError::Asset {
                    path: path.to_string(),
                    reason: "not found".to_string(),
                });
            }
            Ok(Bytes::from_static(b"glTF\x02\x00\x00\x00"))
        }
    }

    fn counting_cache() -> (ModelCache<CountingSource>, Arc<AtomicUsize>) {
        let fetches = Arc::new(AtomicUsize::new(0));
        let cache = ModelCache::new(CountingSource {
            fetches: Arc::clone(&fetches),
        });
        (cache, fetches)
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_fetch() {
        let (cache, fetches) = counting_cache();
        let other = cache.clone();

        let (a, b) = tokio::join!(
            cache.load("/models/bmw_m4.glb"),
            other.load("/models/bmw_m4.glb")
        );

        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        cache.load("/models/bmw_m4.glb").await.unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.loaded_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_degrades_to_fallback_and_retries() {
        let (cache, fetches) = counting_cache();

        let renderable = cache.load_renderable("/models/missing.glb", 0xff2222).await;
        assert_eq!(renderable, Renderable::Fallback(FallbackMesh::new(0xff2222)));
        assert!(cache.get("/models/missing.glb").is_none());

        cache.load_renderable("/models/missing.glb", 0xff2222).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fs_source_checks_magic() {
        let temp_dir = TempDir::new().unwrap();
        let models = temp_dir.path().join("models");
        std::fs::create_dir_all(&models).unwrap();
        std::fs::write(models.join("good.glb"), b"glTF\x02\x00\x00\x00rest").unwrap();
        std::fs::write(models.join("bad.glb"), b"<html>").unwrap();

        let cache = ModelCache::new(FsModelSource::new(temp_dir.path()));

        let good = cache.load("/models/good.glb").await.unwrap();
        assert_eq!(good.bytes.len(), 12);

        let bad = cache.load("/models/bad.glb").await;
        assert!(matches!(bad, Err(SimError::Asset { .. })));

        let absent = cache.load_renderable("/models/nope.glb", 0x22ffff).await;
        assert!(absent.is_fallback());
    }
}
