//! Race session: the per-frame pipeline and its state machine.
//!
//! `Countdown -> Running -> Finished`. Every call to [`RaceSession::tick`]
//! runs the same fixed order: input, player physics, ghost sampling,
//! collisions, zones, checkpoints, bots, ghost playback, camera.
//!
//! The session owns everything it creates. Dropping it releases the world,
//! the bots and the ghost state; only the shared model cache outlives it.

use crate::assets::Renderable;
use crate::bot_driver::{generate_bot_roster, spawn_position, BotDriver, BotEvent, MAX_BOTS};
use crate::camera::ChaseCamera;
use crate::data::{CarStats, RaceMode, RaceReport, SessionId, TrackMap, MIN_CHECKPOINTS};
use crate::error::{Result, SimError};
use crate::ghost::{GhostPose, GhostRecorder, GhostReplayer, GhostRun};
use crate::input::InputState;
use crate::physics::{resolve_static_collisions, CarPhysics, CarTuning};
use crate::world::World;
use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_repr::{Deserialize_repr, Serialize_repr};
use tracing::{debug, info};
use uuid::Uuid;

pub const CHECKPOINT_CAPTURE_RADIUS: f32 = 18.0;

pub const COUNTDOWN_LIGHTS: u8 = 5;

/// Minimum speed to take off from a ramp (km/h)
const RAMP_MIN_SPEED_KMH: f32 = 40.0;
const RAMP_LAUNCH_VELOCITY: f32 = 12.0;

/// Forward acceleration on a boost pad (units/s²)
const BOOST_ACCELERATION: f32 = 30.0;
/// Upper bound on the velocity a boost pad adds in one tick
const BOOST_MAX_DELTA_PER_TICK: f32 = 1.0;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
pub enum SessionState {
    Countdown = 0,
    Running = 1,
    Finished = 2,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub mode: RaceMode,
    /// Clamped to [`MAX_BOTS`]; only used in bot mode
    pub bot_count: usize,
    pub countdown_seconds: f32,
    pub max_dt: f32,
    /// Seeds scenery and bots
    pub seed: u64,
    /// Previously stored run; only used in ghost mode
    pub ghost: Option<GhostRun>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            mode: RaceMode::Normal,
            bot_count: 4,
            countdown_seconds: 5.0,
            max_dt: 0.05,
            seed: 0,
            ghost: None,
        }
    }
}

/// Notable things that happened during one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RaceEvent {
    RaceStarted,
    CheckpointCaptured { index: usize, race_time: f32 },
    Collision { impact_speed: f32, damage: f32 },
    Launched,
    Finished { race_time: f32, position: u8 },
    BotFinished { bot: usize, race_time: f32 },
}

/// Render-facing pose of one car
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CarPose {
    pub position: Vec3,
    pub rotation: f32,
    pub speed_kmh: f32,
    pub condition: f32,
}

impl From<&CarPhysics> for CarPose {
    fn from(car: &CarPhysics) -> Self {
        Self {
            position: car.position,
            rotation: car.rotation,
            speed_kmh: car.speed_kmh(),
            condition: car.condition,
        }
    }
}

pub struct RaceSession {
    pub id: SessionId,
    map: TrackMap,
    world: World,
    car: CarStats,
    mode: RaceMode,
    pub player: CarPhysics,
    state: SessionState,
    countdown_total: f32,
    countdown_remaining: f32,
    countdown_lights: u8,
    race_time: f32,
    current_checkpoint: usize,
    final_position: Option<u8>,
    max_dt: f32,
    bots: Vec<BotDriver>,
    bot_renderables: Vec<Option<Renderable>>,
    player_renderable: Option<Renderable>,
    ghost_recorder: GhostRecorder,
    ghost_replayer: Option<GhostReplayer>,
    ghost_pose: Option<GhostPose>,
    camera: ChaseCamera,
    pending_report: Option<RaceReport>,
}

impl RaceSession {
    pub fn new(map: TrackMap, car: CarStats, options: SessionOptions) -> Result<Self> {
        if map.checkpoints.len() < MIN_CHECKPOINTS {
            return Err(SimError::InvalidTrack(format!(
                "map {} has {} checkpoint(s)",
                map.id,
                map.checkpoints.len()
            )));
        }

        let world = World::build(&map, options.seed);

        let start = map.checkpoints[0];
        let heading = map.start_heading();
        let mut player = CarPhysics::new(CarTuning::from_stats(&car));
        player.place(start, heading);

        let bots = if options.mode == RaceMode::Bots {
            let mut rng = StdRng::seed_from_u64(options.seed);
            generate_bot_roster(options.bot_count.min(MAX_BOTS), &mut rng)
                .into_iter()
                .enumerate()
                .map(|(i, profile)| {
                    BotDriver::new(
                        profile,
                        &map.checkpoints,
                        spawn_position(start, i),
                        heading,
                        options.seed.wrapping_add(i as u64 + 1),
                    )
                })
                .collect()
        } else {
            Vec::new()
        };

        let ghost_replayer = match (options.mode, options.ghost) {
            (RaceMode::Ghost, Some(run)) if run.is_usable() => Some(GhostReplayer::new(run.frames)),
            _ => None,
        };

        let mut camera = ChaseCamera::default();
        camera.snap(player.position, player.rotation);

        let countdown_total = options.countdown_seconds.max(0.0);
        let session = Self {
            id: Uuid::new_v4(),
            bot_renderables: vec![None; bots.len()],
            map,
            world,
            car,
            mode: options.mode,
            player,
            state: SessionState::Countdown,
            countdown_total,
            countdown_remaining: countdown_total,
            countdown_lights: 0,
            race_time: 0.0,
            current_checkpoint: 0,
            final_position: None,
            max_dt: options.max_dt.max(0.0),
            bots,
            player_renderable: None,
            ghost_recorder: GhostRecorder::new(),
            ghost_replayer,
            ghost_pose: None,
            camera,
            pending_report: None,
        };

        info!(
            session = %session.id,
            map = %session.map.id,
            mode = session.mode.as_str(),
            bots = session.bots.len(),
            ghost = session.ghost_replayer.is_some(),
            "Race session created"
        );

        Ok(session)
    }

    /// Advance the session by one frame
    pub fn tick(&mut self, dt: f32, mut input: InputState) -> Vec<RaceEvent> {
        let dt = if dt.is_finite() { dt.clamp(0.0, self.max_dt) } else { 0.0 };
        input.clamp();
        let mut events = Vec::new();

        match self.state {
            SessionState::Countdown => self.tick_countdown(dt, &mut events),
            SessionState::Running | SessionState::Finished => self.tick_running(dt, input, &mut events),
        }

        events
    }

    fn tick_countdown(&mut self, dt: f32, events: &mut Vec<RaceEvent>) {
        self.countdown_remaining -= dt;
        // One light per fifth of the countdown, whatever its length
        let elapsed = self.countdown_total - self.countdown_remaining;
        let light_span = self.countdown_total / COUNTDOWN_LIGHTS as f32;
        let lit = if light_span > 0.0 {
            (elapsed / light_span).floor() as i64 + 1
        } else {
            COUNTDOWN_LIGHTS as i64
        };
        self.countdown_lights = lit.clamp(0, COUNTDOWN_LIGHTS as i64) as u8;

        if self.countdown_remaining <= 0.0 {
            self.state = SessionState::Running;
            self.countdown_lights = 0;
            events.push(RaceEvent::RaceStarted);
            debug!(session = %self.id, "Countdown finished");
        }

        // Input is ignored but the car still settles
        self.player.set_input(0.0, 0.0);
        self.player.update(dt);
        self.camera.snap(self.player.position, self.player.rotation);
    }

    fn tick_running(&mut self, dt: f32, input: InputState, events: &mut Vec<RaceEvent>) {
        let finished = self.state == SessionState::Finished;

        if !finished {
            self.race_time += dt;
        }

        self.player.set_input(input.forward, input.turn);
        self.player.update(dt);

        if !finished {
            self.ghost_recorder.record(
                self.player.position.x,
                self.player.position.z,
                self.player.rotation,
                self.race_time,
                dt,
            );
        }

        let outcome = resolve_static_collisions(&mut self.player, self.world.collision_boxes());
        if outcome.contacts > 0 && outcome.max_impact_speed > 0.0 {
            events.push(RaceEvent::Collision {
                impact_speed: outcome.max_impact_speed,
                damage: outcome.damage,
            });
        }

        self.apply_zones(dt, events);

        if !finished {
            self.check_checkpoint(events);
        }

        let race_time = self.race_time;
        for (i, bot) in self.bots.iter_mut().enumerate() {
            match bot.update(dt, race_time) {
                Some(BotEvent::Finished { finish_time }) => {
                    debug!(bot = %bot.profile.name, finish_time, "Bot finished");
                    events.push(RaceEvent::BotFinished {
                        bot: i,
                        race_time: finish_time,
                    });
                }
                Some(BotEvent::CheckpointCaptured(index)) => {
                    tracing::trace!(bot = %bot.profile.name, index, "Bot captured checkpoint");
                }
                None => {}
            }
        }

        if let Some(replayer) = self.ghost_replayer.as_mut() {
            self.ghost_pose = replayer.update(self.race_time);
        }

        self.camera.follow(self.player.position, self.player.rotation);
    }

    fn apply_zones(&mut self, dt: f32, events: &mut Vec<RaceEvent>) {
        if self.player.grounded && self.player.speed_kmh() > RAMP_MIN_SPEED_KMH {
            let position = self.player.position;
            if self.world.ramps().any(|ramp| ramp.contains(position)) {
                self.player.launch(RAMP_LAUNCH_VELOCITY);
                events.push(RaceEvent::Launched);
            }
        }

        let boost_delta = (BOOST_ACCELERATION * dt).min(BOOST_MAX_DELTA_PER_TICK);
        let position = self.player.position;
        let pads = self.world.boosts().filter(|pad| pad.contains(position)).count();
        for _ in 0..pads {
            let forward = self.player.forward();
            self.player.velocity += forward * boost_delta;
        }
    }

    fn check_checkpoint(&mut self, events: &mut Vec<RaceEvent>) {
        let n = self.map.checkpoints.len();
        let target_index = (self.current_checkpoint + 1) % n;
        let target = self.map.checkpoints[target_index];
        let dist = Vec2::new(self.player.position.x - target.x, self.player.position.z - target.z).length();
        if dist >= CHECKPOINT_CAPTURE_RADIUS {
            return;
        }

        self.current_checkpoint += 1;
        self.world.mark_gate_passed(target_index);
        events.push(RaceEvent::CheckpointCaptured {
            index: target_index,
            race_time: self.race_time,
        });
        debug!(
            session = %self.id,
            index = target_index,
            passed = self.current_checkpoint,
            race_time = self.race_time,
            "Checkpoint captured"
        );

        if self.current_checkpoint >= n {
            self.finish(events);
        }
    }

    fn finish(&mut self, events: &mut Vec<RaceEvent>) {
        // Bots finishing later in this same tick are behind
        let position = self.live_position();
        self.final_position = Some(position);
        self.state = SessionState::Finished;

        let report = RaceReport {
            map_id: self.map.id,
            finish_time_ms: (self.race_time * 1000.0).round() as u64,
            position: if self.mode == RaceMode::Bots { position } else { 1 },
            car_id: self.car.id,
            mode: self.mode,
        };
        info!(
            session = %self.id,
            finish_time_ms = report.finish_time_ms,
            position = report.position,
            condition = self.player.condition,
            "Race finished"
        );
        events.push(RaceEvent::Finished {
            race_time: self.race_time,
            position: report.position,
        });
        self.pending_report = Some(report);
    }

    fn live_position(&self) -> u8 {
        if self.mode != RaceMode::Bots {
            return 1;
        }
        let ahead = self
            .bots
            .iter()
            .filter(|bot| bot.is_finished() || bot.checkpoints_passed() > self.current_checkpoint)
            .count();
        (1 + ahead).min(u8::MAX as usize) as u8
    }

    /// Ordinal position of the player; frozen once finished
    pub fn player_position(&self) -> u8 {
        self.final_position.unwrap_or_else(|| self.live_position())
    }

    /// Finish report, handed out exactly once
    pub fn take_report(&mut self) -> Option<RaceReport> {
        self.pending_report.take()
    }

    /// The recorded run, if the race was completed
    pub fn ghost_run(&self) -> Option<GhostRun> {
        if self.state != SessionState::Finished {
            return None;
        }
        Some(GhostRun::new(self.race_time, self.ghost_recorder.frames().to_vec()))
    }

    pub fn attach_player_renderable(&mut self, renderable: Renderable) {
        self.player_renderable = Some(renderable);
    }

    /// Attach a visual to a bot once its model resolves; the bot races either way
    pub fn attach_bot_renderable(&mut self, bot: usize, renderable: Renderable) -> bool {
        match self.bot_renderables.get_mut(bot) {
            Some(slot) => {
                *slot = Some(renderable);
                true
            }
            None => false,
        }
    }

    pub fn bot_renderable(&self, bot: usize) -> Option<&Renderable> {
        self.bot_renderables.get(bot).and_then(Option::as_ref)
    }

    pub fn player_renderable(&self) -> Option<&Renderable> {
        self.player_renderable.as_ref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == SessionState::Finished
    }

    pub fn countdown_lights(&self) -> u8 {
        self.countdown_lights
    }

    pub fn race_time(&self) -> f32 {
        self.race_time
    }

    pub fn current_checkpoint(&self) -> usize {
        self.current_checkpoint
    }

    /// Checkpoint the player is heading for
    pub fn next_checkpoint(&self) -> Vec3 {
        self.map.checkpoints[(self.current_checkpoint + 1) % self.map.checkpoints.len()]
    }

    pub fn mode(&self) -> RaceMode {
        self.mode
    }

    pub fn map(&self) -> &TrackMap {
        &self.map
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn bots(&self) -> &[BotDriver] {
        &self.bots
    }

    pub fn ghost_pose(&self) -> Option<GhostPose> {
        self.ghost_pose
    }

    pub fn has_ghost(&self) -> bool {
        self.ghost_replayer.is_some()
    }

    pub fn camera(&self) -> &ChaseCamera {
        &self.camera
    }

    pub fn player_pose(&self) -> CarPose {
        CarPose::from(&self.player)
    }

    pub fn bot_poses(&self) -> Vec<CarPose> {
        self.bots.iter().map(|bot| CarPose::from(&bot.physics)).collect()
    }

    #[cfg(test)]
    fn set_current_checkpoint(&mut self, value: usize) {
        self.current_checkpoint = value;
    }
}
