//! Bot drivers for the `bots` race mode.
//!
//! A bot owns the same [`CarPhysics`] as the player and produces the same
//! two input axes. Navigation works on a dense polyline of waypoints derived
//! from the checkpoints:
//! 1. Find the closest waypoint in a small window ahead of the cursor
//! 2. Steer toward a waypoint a few indices further on, plus a lateral offset
//! 3. Ease off the throttle in proportion to the heading error
//!
//! Difficulty is a scalar in [0.4, 0.9] that scales the car envelope. Bots
//! do not collide with anything; they only follow the road.

use crate::physics::{normalize_angle, CarPhysics, CarTuning};
use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Upper bound on bots per race
pub const MAX_BOTS: usize = 6;

pub const MIN_DIFFICULTY: f32 = 0.4;
pub const DIFFICULTY_SPREAD: f32 = 0.5;

const WAYPOINT_SPACING: f32 = 10.0;
const SEARCH_WINDOW: usize = 16;
const LOOKAHEAD: usize = 5;
const STEERING_GAIN: f32 = 4.5;
const WAYPOINT_CAPTURE_RADIUS: f32 = 12.0;
const CHECKPOINT_CAPTURE_RADIUS: f32 = 25.0;

/// Heading errors above these trim the throttle
const MODERATE_TURN: f32 = 0.3;
const SHARP_TURN: f32 = 0.6;

const STUCK_WINDOW_SECS: f32 = 3.0;
const STUCK_MIN_DISPLACEMENT: f32 = 2.0;

/// Lateral offset range per axis is [-SPREAD/2, SPREAD/2]
const OFFSET_SPREAD: f32 = 3.0;

const BOT_NAMES: [&str; MAX_BOTS] = [
    "Red Bull",
    "Blue Flash",
    "Gold Rush",
    "Purple Rain",
    "Cyan Storm",
    "Orange Fury",
];

const BOT_MODELS: [&str; MAX_BOTS] = [
    "/models/bmw_m4.glb",
    "/models/lamborghini_huracan.glb",
    "/models/mercedes_amg_one.glb",
    "/models/mercedes_amg_gt_black_series.glb",
    "/models/porsche_gt3_rs.glb",
    "/models/bmw_m4.glb",
];

const BOT_COLORS: [u32; MAX_BOTS] = [0xff2222, 0x2222ff, 0xffff22, 0xff22ff, 0x22ffff, 0xff8800];

/// Static identity of a bot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotProfile {
    pub name: String,
    pub difficulty: f32,
    pub model_path: String,
    /// RGB colour of the fallback mesh if the model fails to load
    pub fallback_color: u32,
}

impl BotProfile {
    pub fn new(index: usize, difficulty: f32) -> Self {
        let slot = index % MAX_BOTS;
        Self {
            name: BOT_NAMES[slot].to_string(),
            difficulty: difficulty.clamp(MIN_DIFFICULTY, MIN_DIFFICULTY + DIFFICULTY_SPREAD),
            model_path: BOT_MODELS[slot].to_string(),
            fallback_color: BOT_COLORS[slot],
        }
    }

    /// Car envelope for this bot's difficulty
    pub fn tuning(&self) -> CarTuning {
        let d = self.difficulty;
        CarTuning {
            max_speed_kmh: 180.0 + d * 100.0,
            acceleration_power: 55.0 + d * 30.0,
            brake_power: 80.0 + d * 30.0,
            handling: 2.4 + d * 0.6,
            friction: 0.985,
            ..CarTuning::default()
        }
    }
}

/// Up to [`MAX_BOTS`] profiles with random difficulty
pub fn generate_bot_roster<R: Rng>(count: usize, rng: &mut R) -> Vec<BotProfile> {
    (0..count.min(MAX_BOTS))
        .map(|i| BotProfile::new(i, MIN_DIFFICULTY + rng.gen::<f32>() * DIFFICULTY_SPREAD))
        .collect()
}

/// Grid slot for bot `index`: staggered left/right and back from the start
pub fn spawn_position(start: Vec3, index: usize) -> Vec3 {
    let row = (index + 1) as f32;
    let side = if index % 2 == 0 { 1.0 } else { -1.0 };
    Vec3::new(start.x + row * 5.0 * side, start.y, start.z - row * 3.0)
}

/// Dense polyline through all checkpoints, closed back onto checkpoint 0
pub fn build_waypoints(checkpoints: &[Vec3]) -> Vec<Vec3> {
    let n = checkpoints.len();
    let mut waypoints = Vec::new();

    for i in 0..n {
        let from = checkpoints[i];
        let to = checkpoints[(i + 1) % n];
        let dx = to.x - from.x;
        let dz = to.z - from.z;
        let dist = (dx * dx + dz * dz).sqrt();
        let steps = ((dist / WAYPOINT_SPACING).floor() as usize).max(1);

        for s in 0..steps {
            let t = s as f32 / steps as f32;
            waypoints.push(Vec3::new(from.x + dx * t, 0.0, from.z + dz * t));
        }
    }

    if let Some(first) = checkpoints.first() {
        waypoints.push(*first);
    }
    waypoints
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BotState {
    Racing,
    Finished { finish_time: f32 },
}

/// Something worth reporting from a bot tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BotEvent {
    CheckpointCaptured(usize),
    Finished { finish_time: f32 },
}

#[derive(Debug, Clone)]
pub struct BotDriver {
    pub profile: BotProfile,
    pub physics: CarPhysics,
    state: BotState,
    checkpoints: Vec<Vec3>,
    waypoints: Vec<Vec3>,
    waypoint_cursor: usize,
    /// Next checkpoint to capture, counted over the lap; index is `% len`
    target_checkpoint: usize,
    offset: Vec2,
    stuck_timer: f32,
    last_position: Vec3,
    rng: StdRng,
}

impl BotDriver {
    pub fn new(
        profile: BotProfile,
        checkpoints: &[Vec3],
        start_position: Vec3,
        start_rotation: f32,
        seed: u64,
    ) -> Self {
        let mut physics = CarPhysics::new(profile.tuning());
        physics.place(start_position, start_rotation);

        let mut rng = StdRng::seed_from_u64(seed);
        let offset = roll_offset(&mut rng);

        Self {
            profile,
            last_position: physics.position,
            physics,
            state: BotState::Racing,
            checkpoints: checkpoints.to_vec(),
            waypoints: build_waypoints(checkpoints),
            waypoint_cursor: 0,
            target_checkpoint: 1,
            offset,
            stuck_timer: 0.0,
            rng,
        }
    }

    pub fn state(&self) -> BotState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, BotState::Finished { .. })
    }

    pub fn finish_time(&self) -> Option<f32> {
        match self.state {
            BotState::Finished { finish_time } => Some(finish_time),
            BotState::Racing => None,
        }
    }

    pub fn target_checkpoint(&self) -> usize {
        self.target_checkpoint
    }

    /// Checkpoints captured so far, on the same scale as the player's counter
    pub fn checkpoints_passed(&self) -> usize {
        self.target_checkpoint - 1
    }

    pub fn waypoints(&self) -> &[Vec3] {
        &self.waypoints
    }

    /// Advance the bot by `dt`; finished bots hold their last pose
    pub fn update(&mut self, dt: f32, race_time: f32) -> Option<BotEvent> {
        if self.is_finished() || self.waypoints.is_empty() {
            return None;
        }

        let (best_index, best_dist) = self.closest_waypoint();

        let target = self.waypoints[(best_index + LOOKAHEAD) % self.waypoints.len()];
        let dx = target.x + self.offset.x - self.physics.position.x;
        let dz = target.z + self.offset.y - self.physics.position.z;

        let target_angle = dx.atan2(dz);
        let angle_diff = normalize_angle(target_angle - self.physics.rotation);

        // Positive error means the target lies toward increasing yaw, which
        // the car model reaches with a negative turn axis.
        let turn = (-angle_diff * STEERING_GAIN).clamp(-1.0, 1.0);

        let abs_error = angle_diff.abs();
        let forward = if abs_error > SHARP_TURN {
            0.5
        } else if abs_error > MODERATE_TURN {
            0.75
        } else {
            1.0
        };

        self.physics.set_input(forward, turn);
        self.physics.update(dt);

        if best_dist < WAYPOINT_CAPTURE_RADIUS {
            self.waypoint_cursor = (best_index + 1) % self.waypoints.len();
        }

        self.check_stuck(dt, turn);

        self.check_checkpoint(race_time)
    }

    fn closest_waypoint(&self) -> (usize, f32) {
        let total = self.waypoints.len();
        let position = self.physics.position;
        let mut best = (self.waypoint_cursor % total, f32::INFINITY);

        for w in 0..total.min(SEARCH_WINDOW) {
            let index = (self.waypoint_cursor + w) % total;
            let wp = self.waypoints[index];
            let d = Vec2::new(wp.x - position.x, wp.z - position.z).length();
            if d < best.1 {
                best = (index, d);
            }
        }
        best
    }

    fn check_stuck(&mut self, dt: f32, turn: f32) {
        self.stuck_timer += dt;
        if self.stuck_timer <= STUCK_WINDOW_SECS {
            return;
        }

        if self.physics.position.distance(self.last_position) < STUCK_MIN_DISPLACEMENT {
            tracing::trace!(bot = %self.profile.name, "Bot stuck, reversing");
            self.physics.set_input(-1.0, -0.5 * turn);
            self.physics.update(dt);
        }
        self.stuck_timer = 0.0;
        self.last_position = self.physics.position;
    }

    fn check_checkpoint(&mut self, race_time: f32) -> Option<BotEvent> {
        let n = self.checkpoints.len();
        if n == 0 {
            return None;
        }

        let index = self.target_checkpoint % n;
        let cp = self.checkpoints[index];
        let dist = Vec2::new(cp.x - self.physics.position.x, cp.z - self.physics.position.z).length();
        if dist >= CHECKPOINT_CAPTURE_RADIUS {
            return None;
        }

        self.target_checkpoint += 1;
        self.offset = roll_offset(&mut self.rng);

        if self.target_checkpoint > n {
            self.state = BotState::Finished {
                finish_time: race_time,
            };
            Some(BotEvent::Finished {
                finish_time: race_time,
            })
        } else {
            Some(BotEvent::CheckpointCaptured(index))
        }
    }
}

fn roll_offset<R: Rng>(rng: &mut R) -> Vec2 {
    Vec2::new(
        (rng.gen::<f32>() - 0.5) * OFFSET_SPREAD,
        (rng.gen::<f32>() - 0.5) * OFFSET_SPREAD,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn square(size: f32) -> Vec<Vec3> {
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, size),
            Vec3::new(size, 0.0, size),
            Vec3::new(size, 0.0, 0.0),
        ]
    }

    #[test]
    fn test_waypoint_density() {
        let waypoints = build_waypoints(&square(100.0));
        // 4 segments of 10 steps, plus the closing checkpoint
        assert_eq!(waypoints.len(), 41);
        assert_eq!(waypoints[0], Vec3::ZERO);
        assert_eq!(waypoints[10], Vec3::new(0.0, 0.0, 100.0));
        assert_eq!(*waypoints.last().unwrap(), Vec3::ZERO);
        assert!(waypoints.iter().all(|w| w.y == 0.0));
    }

    #[test]
    fn test_short_segment_gets_one_step() {
        let waypoints = build_waypoints(&[Vec3::ZERO, Vec3::new(0.0, 0.0, 4.0)]);
        assert_eq!(waypoints.len(), 3);
    }

    #[test]
    fn test_roster() {
        let mut rng = StdRng::seed_from_u64(9);
        let roster = generate_bot_roster(10, &mut rng);

        assert_eq!(roster.len(), MAX_BOTS);
        assert_eq!(roster[0].name, "Red Bull");
        assert_eq!(roster[5].name, "Orange Fury");
        assert_eq!(roster[1].model_path, "/models/lamborghini_huracan.glb");
        assert_eq!(roster[2].fallback_color, 0xffff22);
        assert!(roster
            .iter()
            .all(|p| (MIN_DIFFICULTY..=MIN_DIFFICULTY + DIFFICULTY_SPREAD).contains(&p.difficulty)));
    }

    #[test]
    fn test_difficulty_scales_tuning() {
        let tuning = BotProfile::new(0, 0.5).tuning();
        assert!((tuning.max_speed_kmh - 230.0).abs() < 1e-4);
        assert!((tuning.acceleration_power - 70.0).abs() < 1e-4);
        assert!((tuning.brake_power - 95.0).abs() < 1e-4);
        assert!((tuning.handling - 2.7).abs() < 1e-4);
        assert_eq!(tuning.friction, 0.985);
    }

    #[test]
    fn test_spawn_grid() {
        let start = Vec3::new(0.0, 0.5, 0.0);
        assert_eq!(spawn_position(start, 0), Vec3::new(5.0, 0.5, -3.0));
        assert_eq!(spawn_position(start, 1), Vec3::new(-10.0, 0.5, -6.0));
        assert_eq!(spawn_position(start, 2), Vec3::new(15.0, 0.5, -9.0));
    }

    #[test]
    fn test_steers_toward_target() {
        let checkpoints = vec![Vec3::ZERO, Vec3::new(200.0, 0.0, 0.0)];
        let mut bot = BotDriver::new(BotProfile::new(0, 0.6), &checkpoints, Vec3::ZERO, 0.0, 1);

        bot.update(DT, DT);

        // Target is at +X, i.e. yaw +PI/2 from a car facing +Z
        assert!(bot.physics.rotation > 0.0);
        assert!(bot.physics.turn_input() < 0.0);
    }

    #[test]
    fn test_drives_to_next_checkpoint() {
        let checkpoints = vec![Vec3::ZERO, Vec3::new(0.0, 0.0, 400.0)];
        let mut bot = BotDriver::new(BotProfile::new(0, 0.9), &checkpoints, Vec3::ZERO, 0.0, 2);

        let mut captured = None;
        let mut t = 0.0;
        for _ in 0..(20 * 60) {
            t += DT;
            if let Some(BotEvent::CheckpointCaptured(i)) = bot.update(DT, t) {
                captured = Some(i);
                break;
            }
        }

        assert_eq!(captured, Some(1));
        assert_eq!(bot.checkpoints_passed(), 1);
        assert!(bot.physics.position.z > 350.0);
    }

    #[test]
    fn test_finishes_on_return_to_start() {
        let checkpoints = vec![Vec3::ZERO, Vec3::new(0.0, 0.0, 400.0)];
        let mut bot = BotDriver::new(BotProfile::new(0, 0.9), &checkpoints, Vec3::ZERO, 0.0, 2);
        // Already past checkpoint 1 and sitting on the line
        bot.target_checkpoint = 2;

        let event = bot.update(DT, 42.0);
        assert_eq!(event, Some(BotEvent::Finished { finish_time: 42.0 }));
        assert!(bot.is_finished());

        let pose = bot.physics.position;
        assert_eq!(bot.update(DT, 43.0), None);
        assert_eq!(bot.physics.position, pose);
        assert_eq!(bot.finish_time(), Some(42.0));
    }

    #[test]
    fn test_stuck_recovery_reverses() {
        let checkpoints = vec![Vec3::ZERO, Vec3::new(0.0, 0.0, 400.0)];
        let mut bot = BotDriver::new(BotProfile::new(0, 0.5), &checkpoints, Vec3::ZERO, 0.0, 3);
        bot.target_checkpoint = 1;
        // Pretend three seconds passed with no displacement
        bot.stuck_timer = STUCK_WINDOW_SECS;
        bot.last_position = bot.physics.position;

        bot.update(DT, 3.0);

        assert_eq!(bot.stuck_timer, 0.0);
        // Recovery input is reverse at full brake
        assert!(bot.physics.acceleration.z < 0.0);
    }

    #[test]
    fn test_waypoint_cursor_only_moves_forward() {
        let checkpoints = square(100.0);
        let mut bot = BotDriver::new(BotProfile::new(0, 0.9), &checkpoints, Vec3::ZERO, 0.0, 4);
        let total = bot.waypoints().len();

        let mut t = 0.0;
        let mut previous = bot.waypoint_cursor;
        for _ in 0..(60 * 60) {
            t += DT;
            bot.update(DT, t);

            let cursor = bot.waypoint_cursor;
            let step = (cursor + total - previous) % total;
            assert!(step <= SEARCH_WINDOW, "cursor jumped {} -> {}", previous, cursor);
            previous = cursor;

            if bot.is_finished() {
                break;
            }
        }

        assert!(bot.is_finished());
        assert_eq!(bot.checkpoints_passed(), 4);
    }
}
