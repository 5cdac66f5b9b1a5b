//! Third-person chase camera that follows the player

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Camera offset in the car's local frame: above and behind
pub const CHASE_OFFSET: Vec3 = Vec3::new(0.0, 7.0, -18.0);

/// Height above the car the camera aims at
pub const LOOK_HEIGHT: f32 = 1.5;

/// Per-tick lerp factor of the look-at target
pub const LOOK_SMOOTHING: f32 = 0.2;

/// Third-person chase camera.
///
/// The eye position is rigidly attached to the car with no lag. Only the
/// look-at point is smoothed, which hides per-frame jitter without letting
/// the car drift off-center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChaseCamera {
    pub position: Vec3,
    pub look_target: Vec3,
}

impl Default for ChaseCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 10.0, -20.0),
            look_target: Vec3::ZERO,
        }
    }
}

/// Eye position for a car at `car_position` with yaw `rotation`
pub fn chase_position(car_position: Vec3, rotation: f32) -> Vec3 {
    let (sin, cos) = rotation.sin_cos();
    Vec3::new(
        car_position.x + CHASE_OFFSET.z * sin + CHASE_OFFSET.x * cos,
        car_position.y + CHASE_OFFSET.y,
        car_position.z + CHASE_OFFSET.z * cos - CHASE_OFFSET.x * sin,
    )
}

impl ChaseCamera {
    /// Jump straight to the car with no smoothing
    pub fn snap(&mut self, car_position: Vec3, rotation: f32) {
        self.position = chase_position(car_position, rotation);
        self.look_target = car_position + Vec3::Y * LOOK_HEIGHT;
    }

    pub fn follow(&mut self, car_position: Vec3, rotation: f32) {
        self.position = chase_position(car_position, rotation);
        let target = car_position + Vec3::Y * LOOK_HEIGHT;
        self.look_target = self.look_target.lerp(target, LOOK_SMOOTHING);
    }
}
