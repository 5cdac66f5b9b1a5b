use crate::error::{Result, SimError};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use uuid::Uuid;

// --- Identifiers ---
pub type MapId = Uuid;
pub type CarId = u32;
pub type SessionId = Uuid;

/// Minimum number of checkpoints a playable map must define
pub const MIN_CHECKPOINTS: usize = 2;

// Obstacle dimensions used when the map leaves them out
const DEFAULT_OBSTACLE_W: f32 = 8.0;
const DEFAULT_OBSTACLE_H: f32 = 6.0;
const DEFAULT_OBSTACLE_D: f32 = 8.0;

// --- Map Record (as stored by the maps API) ---
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapRecord {
    pub id: MapId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub checkpoints: Vec<CheckpointSpec>,
    #[serde(default)]
    pub obstacles: Vec<ObstacleSpec>,
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
}

fn default_difficulty() -> u8 {
    1
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CheckpointSpec {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ObstacleSpec {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub z: f32,
    #[serde(default)]
    pub w: Option<f32>,
    #[serde(default)]
    pub h: Option<f32>,
    #[serde(default)]
    pub d: Option<f32>,
}

impl ObstacleSpec {
    /// Width, height and depth with missing or non-positive values defaulted
    pub fn dimensions(&self) -> (f32, f32, f32) {
        let pick = |v: Option<f32>, default: f32| v.filter(|v| *v > 0.0).unwrap_or(default);
        (
            pick(self.w, DEFAULT_OBSTACLE_W),
            pick(self.h, DEFAULT_OBSTACLE_H),
            pick(self.d, DEFAULT_OBSTACLE_D),
        )
    }
}

/// A map that passed boundary validation.
///
/// The simulation core only ever sees this type, so it can rely on a
/// non-degenerate checkpoint list.
#[derive(Debug, Clone)]
pub struct TrackMap {
    pub id: MapId,
    pub name: String,
    pub checkpoints: Vec<Vec3>,
    pub obstacles: Vec<ObstacleSpec>,
    pub difficulty: u8,
}

impl TryFrom<MapRecord> for TrackMap {
    type Error = SimError;

    fn try_from(record: MapRecord) -> Result<Self> {
        if record.checkpoints.len() < MIN_CHECKPOINTS {
            return Err(SimError::InvalidTrack(format!(
                "map {} has {} checkpoint(s), at least {} required",
                record.id,
                record.checkpoints.len(),
                MIN_CHECKPOINTS
            )));
        }

        let mut checkpoints = Vec::with_capacity(record.checkpoints.len());
        for (i, cp) in record.checkpoints.iter().enumerate() {
            let point = Vec3::new(cp.x, cp.y, cp.z);
            if !point.is_finite() {
                return Err(SimError::InvalidTrack(format!(
                    "checkpoint {} of map {} is not finite",
                    i, record.id
                )));
            }
            checkpoints.push(point);
        }

        let first = checkpoints[0];
        if checkpoints.iter().all(|p| p.distance_squared(first) < f32::EPSILON) {
            return Err(SimError::InvalidTrack(format!(
                "all checkpoints of map {} coincide",
                record.id
            )));
        }

        if let Some(bad) = record
            .obstacles
            .iter()
            .position(|o| !o.x.is_finite() || !o.z.is_finite())
        {
            return Err(SimError::InvalidTrack(format!(
                "obstacle {} of map {} is not finite",
                bad, record.id
            )));
        }

        Ok(Self {
            id: record.id,
            name: record.name,
            checkpoints,
            obstacles: record.obstacles,
            difficulty: record.difficulty,
        })
    }
}

impl TrackMap {
    /// Heading (radians) from checkpoint 0 toward checkpoint 1
    pub fn start_heading(&self) -> f32 {
        let dir = self.checkpoints[1] - self.checkpoints[0];
        dir.x.atan2(dir.z)
    }
}

// --- Car Stats (as stored by the cars API) ---
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarStats {
    pub id: CarId,
    pub name: String,
    #[serde(default)]
    pub model_path: Option<String>,
    /// Top speed in km/h
    pub max_speed: f32,
    /// 1-10 scale
    pub acceleration: f32,
    /// 1-10 scale
    pub handling: f32,
    /// 1-10 scale
    pub durability: f32,
}

impl Default for CarStats {
    fn default() -> Self {
        Self {
            id: 0,
            name: "Starter".to_string(),
            model_path: None,
            max_speed: 200.0,
            acceleration: 6.0,
            handling: 6.0,
            durability: 6.0,
        }
    }
}

// --- Race Mode ---
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize_repr, Deserialize_repr)]
pub enum RaceMode {
    #[default]
    Normal = 0,
    Bots = 1,
    Ghost = 2,
}

impl RaceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RaceMode::Normal => "normal",
            RaceMode::Bots => "bots",
            RaceMode::Ghost => "ghost",
        }
    }
}

impl std::str::FromStr for RaceMode {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "normal" | "solo" => Ok(RaceMode::Normal),
            "bots" => Ok(RaceMode::Bots),
            "ghost" => Ok(RaceMode::Ghost),
            other => Err(SimError::Parse(format!("unknown race mode '{}'", other))),
        }
    }
}

// --- Finish Report ---

/// Result handed to the leaderboard once the player crosses the line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceReport {
    pub map_id: MapId,
    pub finish_time_ms: u64,
    pub position: u8,
    pub car_id: CarId,
    pub mode: RaceMode,
}

/// Receives finish reports; gem rewards and win counters live behind it.
pub trait LeaderboardSink {
    fn submit(&mut self, report: &RaceReport) -> Result<()>;
}

/// Keeps submitted reports in memory
#[derive(Debug, Default)]
pub struct MemoryLeaderboard {
    pub reports: Vec<RaceReport>,
}

impl LeaderboardSink for MemoryLeaderboard {
    fn submit(&mut self, report: &RaceReport) -> Result<()> {
        self.reports.push(report.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(checkpoints: Vec<CheckpointSpec>) -> MapRecord {
        MapRecord {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            description: String::new(),
            checkpoints,
            obstacles: vec![],
            difficulty: 1,
        }
    }

    fn cp(x: f32, z: f32) -> CheckpointSpec {
        CheckpointSpec { x, y: 0.0, z }
    }

    #[test]
    fn test_track_map_requires_two_checkpoints() {
        let err = TrackMap::try_from(record(vec![cp(0.0, 0.0)])).unwrap_err();
        assert!(matches!(err, SimError::InvalidTrack(_)));

        let ok = TrackMap::try_from(record(vec![cp(0.0, 0.0), cp(0.0, 100.0)]));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_track_map_rejects_non_finite() {
        let err = TrackMap::try_from(record(vec![cp(0.0, 0.0), cp(f32::NAN, 100.0)]));
        assert!(err.is_err());
    }

    #[test]
    fn test_track_map_rejects_coincident_checkpoints() {
        let err = TrackMap::try_from(record(vec![cp(5.0, 5.0), cp(5.0, 5.0)]));
        assert!(err.is_err());
    }

    #[test]
    fn test_start_heading_points_at_second_checkpoint() {
        let map = TrackMap::try_from(record(vec![cp(0.0, 0.0), cp(100.0, 0.0)])).unwrap();
        assert!((map.start_heading() - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_obstacle_dimension_defaults() {
        let obstacle = ObstacleSpec {
            x: 1.0,
            z: 2.0,
            w: None,
            h: Some(-3.0),
            d: Some(12.0),
        };
        assert_eq!(obstacle.dimensions(), (8.0, 6.0, 12.0));
    }

    #[test]
    fn test_map_record_from_json() {
        let json = r#"{
            "id": "5b1c2a3e-8d55-4a55-9c7e-0f1a2b3c4d5e",
            "name": "Harbour",
            "checkpoints": [{"x": 0, "y": 0, "z": 0}, {"x": 0, "z": 200}],
            "obstacles": [{"x": 10, "z": 50, "w": 4}]
        }"#;
        let record: MapRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.checkpoints.len(), 2);
        assert_eq!(record.difficulty, 1);
        assert_eq!(record.obstacles[0].dimensions(), (4.0, 6.0, 8.0));
    }

    #[test]
    fn test_race_mode_parse() {
        assert_eq!("bots".parse::<RaceMode>().unwrap(), RaceMode::Bots);
        assert_eq!("Ghost".parse::<RaceMode>().unwrap(), RaceMode::Ghost);
        assert!("party".parse::<RaceMode>().is_err());
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = RaceReport {
            map_id: Uuid::nil(),
            finish_time_ms: 61200,
            position: 2,
            car_id: 7,
            mode: RaceMode::Bots,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"finishTimeMs\":61200"));
        assert!(json.contains("\"mode\":1"));
    }
}
