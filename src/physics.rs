//! Kinematic car model for the race simulation
//!
//! This module implements the arcade vehicle model shared by the player and
//! the bots:
//! - Yaw-only orientation with speed-scaled steering authority
//! - Frame-rate independent exponential friction
//! - Forward-projected speed with a hard top-speed clamp
//! - Independent projectile physics on the vertical axis for ramps
//! - Condition (damage) tracking and static AABB collision resolution

use crate::data::CarStats;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Vertical acceleration while airborne (units/s²)
pub const GRAVITY: f32 = -25.0;

/// Height at which a grounded car's center rests
pub const GROUND_HEIGHT: f32 = 0.5;

/// Conversion factor between km/h and units/s
pub const KMH_PER_MPS: f32 = 3.6;

/// Speed at which steering reaches full authority (units/s)
const FULL_STEER_SPEED: f32 = 30.0;

/// Fraction of steering available at standstill
const MIN_STEER_FACTOR: f32 = 0.15;

/// Friction is expressed per 60 Hz frame
const FRICTION_REFERENCE_HZ: f32 = 60.0;

/// Extra separation applied when pushing a car out of a box
const COLLISION_SKIN: f32 = 0.1;

/// Velocity into an obstacle is reflected by this factor
const COLLISION_RESTITUTION: f32 = 1.3;

/// Impact speed below which collisions cause no damage
const MIN_DAMAGE_IMPACT: f32 = 5.0;

/// Damage dealt per unit of impact speed
const DAMAGE_PER_IMPACT_SPEED: f32 = 0.5;

/// Push vectors shorter than this use the fallback axis
const MIN_PUSH_LENGTH: f32 = 0.001;

/// Per-car tunables, derived once from the car's base stats
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarTuning {
    pub max_speed_kmh: f32,
    pub acceleration_power: f32,
    pub brake_power: f32,
    pub friction: f32,
    pub handling: f32,
    pub damage_threshold: f32,
}

impl Default for CarTuning {
    fn default() -> Self {
        Self {
            max_speed_kmh: 200.0,
            acceleration_power: 60.0,
            brake_power: 80.0,
            friction: 0.98,
            handling: 2.2,
            damage_threshold: 5.0,
        }
    }
}

impl CarTuning {
    /// Map 1-10 stats onto the physics envelope.
    ///
    /// Stats that are zero or negative leave the corresponding default in place.
    /// Brake power always follows acceleration power.
    pub fn from_stats(stats: &CarStats) -> Self {
        let mut tuning = Self::default();

        if stats.max_speed > 0.0 {
            tuning.max_speed_kmh = stats.max_speed;
        }
        if stats.acceleration > 0.0 {
            tuning.acceleration_power = 30.0 + stats.acceleration * 7.0;
        }
        if stats.handling > 0.0 {
            tuning.handling = 1.0 + stats.handling * 0.18;
        }
        if stats.durability > 0.0 {
            tuning.damage_threshold = 3.0 + stats.durability * 0.7;
        }
        tuning.brake_power = tuning.acceleration_power * 1.4;

        tuning
    }

    /// Top speed in units/s
    pub fn max_speed_mps(&self) -> f32 {
        self.max_speed_kmh / KMH_PER_MPS
    }
}

/// Unit vector the car points along for a given yaw
pub fn forward_basis(rotation: f32) -> Vec3 {
    Vec3::new(rotation.sin(), 0.0, rotation.cos())
}

/// Normalize an angle into (-PI, PI]
pub fn normalize_angle(angle: f32) -> f32 {
    let mut a = angle % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a <= -PI {
        a += 2.0 * PI;
    }
    a
}

/// Dynamic state of one car (player or bot)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarPhysics {
    pub position: Vec3,
    pub velocity: Vec3,
    pub acceleration: Vec3,
    /// Yaw in radians; 0 faces +Z
    pub rotation: f32,
    /// Velocity projected on the forward basis (units/s, signed)
    pub speed: f32,
    /// 0-100
    pub condition: f32,
    pub radius: f32,
    pub y_velocity: f32,
    pub grounded: bool,
    pub tuning: CarTuning,
    turn_input: f32,
}

impl Default for CarPhysics {
    fn default() -> Self {
        Self::new(CarTuning::default())
    }
}

impl CarPhysics {
    pub fn new(tuning: CarTuning) -> Self {
        Self {
            position: Vec3::new(0.0, GROUND_HEIGHT, 0.0),
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            rotation: 0.0,
            speed: 0.0,
            condition: 100.0,
            radius: 3.5,
            y_velocity: 0.0,
            grounded: true,
            tuning,
            turn_input: 0.0,
        }
    }

    /// Place the car on the ground at `position` facing `rotation`
    pub fn place(&mut self, position: Vec3, rotation: f32) {
        self.position = Vec3::new(position.x, GROUND_HEIGHT, position.z);
        self.rotation = rotation;
    }

    /// Latch the input axes; the acceleration direction is fixed at call time.
    pub fn set_input(&mut self, forward: f32, turn: f32) {
        let power = if forward > 0.0 {
            self.tuning.acceleration_power
        } else {
            self.tuning.brake_power
        };
        self.acceleration = forward_basis(self.rotation) * forward * power;
        self.turn_input = turn;
    }

    pub fn turn_input(&self) -> f32 {
        self.turn_input
    }

    /// Advance the car by `dt` seconds
    pub fn update(&mut self, dt: f32) {
        // 1. Steering, scaled by speed and mirrored when reversing
        let speed_factor =
            (self.speed.abs() / FULL_STEER_SPEED).min(1.0) * (1.0 - MIN_STEER_FACTOR) + MIN_STEER_FACTOR;
        let turn_dir = if self.speed >= 0.0 { 1.0 } else { -1.0 };
        self.rotation -= self.turn_input * self.tuning.handling * dt * speed_factor * turn_dir;

        // 2. Friction then acceleration
        let friction_factor = self.tuning.friction.powf(dt * FRICTION_REFERENCE_HZ);
        self.velocity *= friction_factor;
        self.velocity += self.acceleration * dt;

        // 3. Speed is the forward projection, so sliding does not inflate it
        self.speed = self.velocity.dot(forward_basis(self.rotation));

        // 4. Top speed clamp
        let max_speed = self.tuning.max_speed_mps();
        if self.speed.abs() > max_speed {
            self.velocity = self.velocity.normalize_or_zero() * max_speed;
            self.speed = max_speed.copysign(self.speed);
        }

        // 5. Integrate position
        self.position += self.velocity * dt;

        // 6. Vertical axis
        if self.grounded {
            self.position.y = GROUND_HEIGHT;
        } else {
            self.y_velocity += GRAVITY * dt;
            self.position.y += self.y_velocity * dt;
            if self.position.y <= GROUND_HEIGHT {
                self.position.y = GROUND_HEIGHT;
                self.y_velocity = 0.0;
                self.grounded = true;
            }
        }
    }

    /// Vertical impulse; ignored while airborne
    pub fn launch(&mut self, up_velocity: f32) {
        if self.grounded {
            self.y_velocity = up_velocity;
            self.grounded = false;
        }
    }

    pub fn take_damage(&mut self, amount: f32) {
        self.condition = (self.condition - amount).max(0.0);
    }

    pub fn take_default_damage(&mut self) {
        self.take_damage(self.tuning.damage_threshold);
    }

    pub fn speed_kmh(&self) -> f32 {
        self.speed.abs() * KMH_PER_MPS
    }

    pub fn forward(&self) -> Vec3 {
        forward_basis(self.rotation)
    }

    pub fn reset(&mut self) {
        let tuning = self.tuning;
        *self = Self::new(tuning);
    }
}

/// Axis-aligned bounding box used for static collision volumes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size.abs() * 0.5;
        Self::new(center - half, center + half)
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        point.clamp(self.min, self.max)
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

/// What happened during one collision pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CollisionOutcome {
    pub contacts: u32,
    /// Largest speed cancelled against a box this pass
    pub max_impact_speed: f32,
    pub damage: f32,
}

/// Push the car out of every overlapping box and cancel velocity into it
pub fn resolve_static_collisions(car: &mut CarPhysics, boxes: &[Aabb]) -> CollisionOutcome {
    let mut outcome = CollisionOutcome::default();

    for aabb in boxes {
        let mut closest = aabb.closest_point(car.position);
        closest.y = car.position.y;

        let dist = car.position.distance(closest);
        if dist >= car.radius {
            continue;
        }

        let mut push_dir = car.position - closest;
        if push_dir.length() < MIN_PUSH_LENGTH {
            push_dir = Vec3::Z;
        }
        let push_dir = push_dir.normalize();

        car.position += push_dir * (car.radius - dist + COLLISION_SKIN);
        outcome.contacts += 1;

        let dot = car.velocity.dot(push_dir);
        if dot < 0.0 {
            car.velocity += push_dir * (-dot * COLLISION_RESTITUTION);
            let impact = dot.abs();
            outcome.max_impact_speed = outcome.max_impact_speed.max(impact);
            if impact > MIN_DAMAGE_IMPACT {
                let damage = impact * DAMAGE_PER_IMPACT_SPEED;
                car.take_damage(damage);
                outcome.damage += damage;
            }
        }
    }

    outcome
}
