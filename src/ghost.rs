//! Ghost runs: recording, playback and per-map persistence
//!
//! The recorder samples the player at 12 Hz while the race runs. Stores keep
//! one run per map and only ever replace it with a faster one.

use crate::data::MapId;
use crate::error::{Result, SimError};
use crate::physics::normalize_angle;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Sampling cadence of the recorder (12 Hz)
pub const GHOST_SAMPLE_INTERVAL: f32 = 1.0 / 12.0;

/// A single trajectory sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GhostFrame {
    pub x: f32,
    pub z: f32,
    /// Yaw in radians
    pub r: f32,
    /// Race time in seconds
    pub t: f32,
}

/// Interpolated ghost pose
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GhostPose {
    pub x: f32,
    pub z: f32,
    pub rotation: f32,
}

impl From<GhostFrame> for GhostPose {
    fn from(frame: GhostFrame) -> Self {
        Self {
            x: frame.x,
            z: frame.z,
            rotation: frame.r,
        }
    }
}

fn round_to(value: f32, scale: f32) -> f32 {
    (value * scale).round() / scale
}

/// Records the player trajectory at a fixed cadence
#[derive(Debug, Clone)]
pub struct GhostRecorder {
    frames: Vec<GhostFrame>,
    interval: f32,
    timer: f32,
}

impl Default for GhostRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl GhostRecorder {
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            interval: GHOST_SAMPLE_INTERVAL,
            timer: 0.0,
        }
    }

    /// Accumulate `dt` and emit a frame once the interval has elapsed.
    ///
    /// The timer restarts from zero on emission, so leftover time is dropped
    /// and the effective cadence is slightly below 12 Hz.
    pub fn record(&mut self, x: f32, z: f32, rotation: f32, race_time: f32, dt: f32) {
        self.timer += dt;
        if self.timer < self.interval {
            return;
        }
        self.timer = 0.0;
        self.frames.push(GhostFrame {
            x: round_to(x, 100.0),
            z: round_to(z, 100.0),
            r: round_to(rotation, 1000.0),
            t: round_to(race_time, 1000.0),
        });
    }

    pub fn frames(&self) -> &[GhostFrame] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn into_frames(self) -> Vec<GhostFrame> {
        self.frames
    }
}

/// Plays a recorded run back against a monotonically increasing clock
#[derive(Debug, Clone)]
pub struct GhostReplayer {
    frames: Vec<GhostFrame>,
    cursor: usize,
}

impl GhostReplayer {
    pub fn new(frames: Vec<GhostFrame>) -> Self {
        Self { frames, cursor: 0 }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Playback time past the last frame
    pub fn is_finished(&self, time: f32) -> bool {
        self.frames.last().map_or(true, |last| time >= last.t)
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Pose at `time`; `None` when there is nothing to replay
    pub fn update(&mut self, time: f32) -> Option<GhostPose> {
        let last_index = self.frames.len().checked_sub(1)?;

        while self.cursor < last_index && self.frames[self.cursor + 1].t <= time {
            self.cursor += 1;
        }

        if self.cursor >= last_index {
            return Some(self.frames[last_index].into());
        }

        let a = self.frames[self.cursor];
        let b = self.frames[self.cursor + 1];
        let frac = if b.t == a.t {
            0.0
        } else {
            ((time - a.t) / (b.t - a.t)).clamp(0.0, 1.0)
        };

        let rotation_delta = normalize_angle(b.r - a.r);
        Some(GhostPose {
            x: a.x + (b.x - a.x) * frac,
            z: a.z + (b.z - a.z) * frac,
            rotation: a.r + rotation_delta * frac,
        })
    }
}

/// A completed run as persisted per map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GhostRun {
    /// Canonical finish time in seconds; absent for legacy frame-only data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_time: Option<f32>,
    pub frames: Vec<GhostFrame>,
}

impl GhostRun {
    pub fn new(finish_time: f32, frames: Vec<GhostFrame>) -> Self {
        Self {
            finish_time: Some(finish_time),
            frames,
        }
    }

    /// Finish time, falling back to the last recorded sample
    pub fn best_time(&self) -> Option<f32> {
        self.finish_time.or_else(|| self.frames.last().map(|f| f.t))
    }

    pub fn is_usable(&self) -> bool {
        !self.frames.is_empty()
    }
}

/// Accepts both the current object layout and legacy bare frame arrays
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredGhost {
    Run(GhostRun),
    Frames(Vec<GhostFrame>),
}

impl From<StoredGhost> for GhostRun {
    fn from(stored: StoredGhost) -> Self {
        match stored {
            StoredGhost::Run(run) => run,
            StoredGhost::Frames(frames) => GhostRun {
                finish_time: None,
                frames,
            },
        }
    }
}

/// Parse persisted ghost JSON
pub fn parse_ghost(json: &str) -> Result<GhostRun> {
    serde_json::from_str::<StoredGhost>(json)
        .map(GhostRun::from)
        .map_err(|e| SimError::Parse(format!("ghost data: {}", e)))
}

/// Keep-fastest retention: replace when nothing usable is stored or the new run is faster
pub fn should_replace(stored: Option<&GhostRun>, new_finish_time: f32) -> bool {
    match stored.and_then(GhostRun::best_time) {
        Some(existing) => new_finish_time < existing,
        None => true,
    }
}

/// Key-value persistence for ghost runs, keyed by map
#[allow(async_fn_in_trait)]
pub trait GhostStore {
    /// Stored run for the map; missing or unreadable data is `None`
    async fn get_ghost(&self, map_id: MapId) -> Option<GhostRun>;

    async fn save_ghost(&self, map_id: MapId, run: &GhostRun) -> Result<()>;
}

/// Offer a finished run to the store under the keep-fastest policy.
///
/// Returns whether the run was saved. The read and the write are separate
/// calls, so two sessions finishing the same map concurrently can race.
pub async fn offer_ghost<S: GhostStore>(store: &S, map_id: MapId, run: &GhostRun) -> Result<bool> {
    let Some(finish_time) = run.finish_time else {
        return Ok(false);
    };
    if !run.is_usable() {
        return Ok(false);
    }

    let existing = store.get_ghost(map_id).await;
    if !should_replace(existing.as_ref(), finish_time) {
        debug!(
            map = %map_id,
            finish_time,
            stored = existing.as_ref().and_then(GhostRun::best_time),
            "Keeping stored ghost"
        );
        return Ok(false);
    }

    store.save_ghost(map_id, run).await?;
    info!(map = %map_id, finish_time, frames = run.frames.len(), "Saved new ghost");
    Ok(true)
}

/// In-process store, shared across sessions
#[derive(Debug, Clone, Default)]
pub struct MemoryGhostStore {
    runs: Arc<RwLock<HashMap<MapId, GhostRun>>>,
}

impl MemoryGhostStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GhostStore for MemoryGhostStore {
    async fn get_ghost(&self, map_id: MapId) -> Option<GhostRun> {
        self.runs.read().await.get(&map_id).cloned()
    }

    async fn save_ghost(&self, map_id: MapId, run: &GhostRun) -> Result<()> {
        self.runs.write().await.insert(map_id, run.clone());
        Ok(())
    }
}

/// One JSON file per map under a directory
#[derive(Debug, Clone)]
pub struct FileGhostStore {
    ghost_dir: PathBuf,
}

impl FileGhostStore {
    pub fn new(ghost_dir: impl Into<PathBuf>) -> Self {
        Self {
            ghost_dir: ghost_dir.into(),
        }
    }

    pub fn path_for(&self, map_id: MapId) -> PathBuf {
        self.ghost_dir.join(format!("{}.json", map_id))
    }
}

impl GhostStore for FileGhostStore {
    async fn get_ghost(&self, map_id: MapId) -> Option<GhostRun> {
        let path = self.path_for(map_id);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read ghost {:?}: {}", path, e);
                return None;
            }
        };

        match parse_ghost(&contents) {
            Ok(run) => Some(run),
            Err(e) => {
                warn!("Ignoring malformed ghost {:?}: {}", path, e);
                None
            }
        }
    }

    async fn save_ghost(&self, map_id: MapId, run: &GhostRun) -> Result<()> {
        fs::create_dir_all(&self.ghost_dir).await?;
        let json = serde_json::to_string(run)
            .map_err(|e| SimError::GhostStore(format!("failed to encode ghost: {}", e)))?;
        fs::write(self.path_for(map_id), json).await?;
        Ok(())
    }
}
