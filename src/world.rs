//! Static world geometry derived from a map
//!
//! Everything here is built once per session and never mutated afterwards,
//! apart from the `passed` flag on checkpoint gates.

use crate::data::TrackMap;
use crate::physics::Aabb;
use crate::procgen::{generate_scenery, Scenery};
use crate::track_mesh::{TrackMesh, TrackMeshGenerator};
use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

pub const ROAD_WIDTH: f32 = 24.0;

pub const RAMP_RADIUS: f32 = 8.0;
pub const BOOST_RADIUS: f32 = 7.0;

/// Segments longer than this get a ramp at their midpoint
const RAMP_MIN_SEGMENT: f32 = 150.0;
/// Segments longer than this get a boost pad halfway
const BOOST_MIN_SEGMENT: f32 = 60.0;
/// Segments longer than this get a second boost pad at a quarter
const EXTRA_BOOST_MIN_SEGMENT: f32 = 120.0;

/// Gate box dimensions (width across the road, height, thickness)
pub const GATE_SIZE: Vec3 = Vec3::new(26.0, 8.0, 1.5);

const DEGENERATE_SEGMENT_SQ: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoadSegment {
    pub from: Vec3,
    pub to: Vec3,
}

impl RoadSegment {
    pub fn new(from: Vec3, to: Vec3) -> Self {
        Self { from, to }
    }

    pub fn length_2d(&self) -> f32 {
        let dx = self.to.x - self.from.x;
        let dz = self.to.z - self.from.z;
        (dx * dx + dz * dz).sqrt()
    }

    /// Yaw of the segment direction (0 faces +Z)
    pub fn heading(&self) -> f32 {
        (self.to.x - self.from.x).atan2(self.to.z - self.from.z)
    }

    /// Ground-plane point at fraction `t` along the segment
    pub fn point_at(&self, t: f32) -> Vec2 {
        Vec2::new(
            self.from.x + (self.to.x - self.from.x) * t,
            self.from.z + (self.to.z - self.from.z) * t,
        )
    }
}

/// Cyclic segments: one per consecutive checkpoint pair plus the closing one
pub fn build_road_segments(checkpoints: &[Vec3]) -> Vec<RoadSegment> {
    if checkpoints.len() < 2 {
        return Vec::new();
    }
    (0..checkpoints.len())
        .map(|i| RoadSegment::new(checkpoints[i], checkpoints[(i + 1) % checkpoints.len()]))
        .collect()
}

/// Distance in the x/z plane from a point to a segment
pub fn dist_to_segment_2d(px: f32, pz: f32, a: Vec3, b: Vec3) -> f32 {
    let abx = b.x - a.x;
    let abz = b.z - a.z;
    let ab2 = abx * abx + abz * abz;
    if ab2 < DEGENERATE_SEGMENT_SQ {
        let dx = px - a.x;
        let dz = pz - a.z;
        return (dx * dx + dz * dz).sqrt();
    }

    let t = (((px - a.x) * abx + (pz - a.z) * abz) / ab2).clamp(0.0, 1.0);
    let dx = px - (a.x + abx * t);
    let dz = pz - (a.z + abz * t);
    (dx * dx + dz * dz).sqrt()
}

pub fn is_near_road(segments: &[RoadSegment], x: f32, z: f32, threshold: f32) -> bool {
    segments
        .iter()
        .any(|seg| dist_to_segment_2d(x, z, seg.from, seg.to) < threshold)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneKind {
    Ramp,
    Boost,
}

/// Circular trigger area on the ground plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub kind: ZoneKind,
    /// (x, z)
    pub center: Vec2,
    pub radius: f32,
    /// Road direction at the zone, for orienting the visual
    pub heading: f32,
}

impl Zone {
    pub fn contains(&self, position: Vec3) -> bool {
        Vec2::new(position.x, position.z).distance(self.center) < self.radius
    }
}

/// Zones placed along the road by segment length
pub fn build_zones(segments: &[RoadSegment]) -> Vec<Zone> {
    let mut zones = Vec::new();

    for seg in segments {
        let length = seg.length_2d();
        let heading = seg.heading();
        let mut place = |kind: ZoneKind, t: f32, radius: f32| {
            zones.push(Zone {
                kind,
                center: seg.point_at(t),
                radius,
                heading,
            });
        };

        if length > RAMP_MIN_SEGMENT {
            place(ZoneKind::Ramp, 0.5, RAMP_RADIUS);
        }
        if length > BOOST_MIN_SEGMENT {
            place(ZoneKind::Boost, 0.5, BOOST_RADIUS);
        }
        if length > EXTRA_BOOST_MIN_SEGMENT {
            place(ZoneKind::Boost, 0.25, BOOST_RADIUS);
        }
    }

    zones
}

/// Render data for a checkpoint gate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckpointGate {
    pub index: usize,
    pub position: Vec3,
    pub size: Vec3,
    pub yaw: f32,
    pub is_start: bool,
    pub passed: bool,
}

fn build_gates(checkpoints: &[Vec3]) -> Vec<CheckpointGate> {
    let n = checkpoints.len();
    checkpoints
        .iter()
        .enumerate()
        .map(|(i, cp)| {
            let next = checkpoints[(i + 1) % n];
            CheckpointGate {
                index: i,
                position: Vec3::new(cp.x, GATE_SIZE.y / 2.0, cp.z),
                size: GATE_SIZE,
                yaw: (next.x - cp.x).atan2(next.z - cp.z),
                is_start: i == 0,
                passed: false,
            }
        })
        .collect()
}

/// Obstacle box centred at (x, h/2, z)
fn obstacle_boxes(map: &TrackMap) -> Vec<Aabb> {
    map.obstacles
        .iter()
        .map(|obs| {
            let (w, h, d) = obs.dimensions();
            Aabb::from_center_size(Vec3::new(obs.x, h / 2.0, obs.z), Vec3::new(w, h, d))
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    pub segments: Vec<RoadSegment>,
    pub road_mesh: TrackMesh,
    pub obstacle_boxes: Vec<Aabb>,
    pub scenery: Scenery,
    pub zones: Vec<Zone>,
    pub gates: Vec<CheckpointGate>,
    collision_boxes: Vec<Aabb>,
}

impl World {
    /// Build the full world for a validated map; scenery is seeded
    pub fn build(map: &TrackMap, seed: u64) -> Self {
        let segments = build_road_segments(&map.checkpoints);
        let road_mesh = TrackMeshGenerator::generate_road(&segments, ROAD_WIDTH);
        let obstacle_boxes = obstacle_boxes(map);

        let mut rng = StdRng::seed_from_u64(seed);
        let scenery = generate_scenery(&segments, &mut rng);

        let zones = build_zones(&segments);
        let gates = build_gates(&map.checkpoints);

        let collision_boxes = scenery
            .buildings
            .iter()
            .map(|b| b.collision)
            .chain(obstacle_boxes.iter().copied())
            .collect();

        tracing::debug!(
            map = %map.id,
            segments = segments.len(),
            buildings = scenery.buildings.len(),
            obstacles = obstacle_boxes.len(),
            zones = zones.len(),
            "World built"
        );

        Self {
            segments,
            road_mesh,
            obstacle_boxes,
            scenery,
            zones,
            gates,
            collision_boxes,
        }
    }

    /// Buildings followed by map obstacles
    pub fn collision_boxes(&self) -> &[Aabb] {
        &self.collision_boxes
    }

    pub fn is_near_road(&self, x: f32, z: f32, threshold: f32) -> bool {
        is_near_road(&self.segments, x, z, threshold)
    }

    pub fn ramps(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter().filter(|z| z.kind == ZoneKind::Ramp)
    }

    pub fn boosts(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter().filter(|z| z.kind == ZoneKind::Boost)
    }

    pub fn mark_gate_passed(&mut self, index: usize) {
        if let Some(gate) = self.gates.get_mut(index) {
            gate.passed = true;
        }
    }
}
