/// Buildings, trees and streetlights placed around the road network
use crate::physics::Aabb;
use crate::world::{is_near_road, RoadSegment};
use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

const BUILDING_ATTEMPTS: usize = 80;
const BUILDING_AREA_HALF_EXTENT: f32 = 800.0;
const BUILDING_ROAD_CLEARANCE: f32 = 35.0;

const TREE_ATTEMPTS: usize = 80;
const TREE_RING_MIN: f32 = 50.0;
const TREE_RING_MAX: f32 = 400.0;
const TREE_ROAD_CLEARANCE: f32 = 20.0;

const STREETLIGHT_SPACING: f32 = 60.0;
const STREETLIGHT_LATERAL_OFFSET: f32 = 14.0;
const STREETLIGHT_POLE_HEIGHT: f32 = 6.0;

/// Each stepped floor shrinks the footprint by this factor
const STEP_SHRINK: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingShape {
    Stepped,
    LShaped,
    Tower,
    Box,
}

/// One primitive of a building, in world space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BuildingPart {
    Block {
        center: Vec3,
        size: Vec3,
    },
    Cylinder {
        center: Vec3,
        radius_top: f32,
        radius_bottom: f32,
        height: f32,
    },
    /// Upper hemisphere sitting on `base`
    Dome { base: Vec3, radius: f32 },
}

impl BuildingPart {
    pub fn bounds(&self) -> Aabb {
        match *self {
            BuildingPart::Block { center, size } => Aabb::from_center_size(center, size),
            BuildingPart::Cylinder {
                center,
                radius_top,
                radius_bottom,
                height,
            } => {
                let r = radius_top.max(radius_bottom);
                Aabb::from_center_size(center, Vec3::new(r * 2.0, height, r * 2.0))
            }
            BuildingPart::Dome { base, radius } => Aabb::new(
                Vec3::new(base.x - radius, base.y, base.z - radius),
                Vec3::new(base.x + radius, base.y + radius, base.z + radius),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    /// Ground anchor (x, 0, z)
    pub position: Vec3,
    pub shape: BuildingShape,
    pub parts: Vec<BuildingPart>,
    /// Bounds of all parts
    pub collision: Aabb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrownKind {
    Cone,
    Sphere,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub position: Vec3,
    pub crown: CrownKind,
    pub crown_size: f32,
    pub crown_height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Streetlight {
    pub position: Vec3,
    pub height: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenery {
    pub buildings: Vec<Building>,
    pub trees: Vec<Tree>,
    pub streetlights: Vec<Streetlight>,
}

fn range<R: Rng>(rng: &mut R, min: f32, max: f32) -> f32 {
    rng.gen::<f32>() * (max - min) + min
}

/// Generate all decoration for the given road network
pub fn generate_scenery<R: Rng>(segments: &[RoadSegment], rng: &mut R) -> Scenery {
    Scenery {
        buildings: place_buildings(segments, rng),
        trees: place_trees(segments, rng),
        streetlights: place_streetlights(segments),
    }
}

fn place_buildings<R: Rng>(segments: &[RoadSegment], rng: &mut R) -> Vec<Building> {
    let mut buildings = Vec::new();

    for _ in 0..BUILDING_ATTEMPTS {
        let w = range(rng, 10.0, 30.0);
        let h = range(rng, 15.0, 60.0);
        let d = range(rng, 10.0, 30.0);
        let x = range(rng, -BUILDING_AREA_HALF_EXTENT, BUILDING_AREA_HALF_EXTENT);
        let z = range(rng, -BUILDING_AREA_HALF_EXTENT, BUILDING_AREA_HALF_EXTENT);

        if is_near_road(segments, x, z, BUILDING_ROAD_CLEARANCE) {
            continue;
        }

        let origin = Vec3::new(x, 0.0, z);
        let roll: f32 = rng.gen();
        let (shape, parts) = if roll < 0.3 {
            (BuildingShape::Stepped, stepped_parts(rng, origin, w, h, d))
        } else if roll < 0.55 {
            (BuildingShape::LShaped, l_shaped_parts(rng, origin, w, h, d))
        } else if roll < 0.75 {
            (BuildingShape::Tower, tower_parts(origin, w, h))
        } else {
            (BuildingShape::Box, box_parts(rng, origin, w, h, d))
        };

        let collision = parts
            .iter()
            .map(BuildingPart::bounds)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_else(|| Aabb::from_center_size(origin, Vec3::ZERO));

        buildings.push(Building {
            position: origin,
            shape,
            parts,
            collision,
        });
    }

    buildings
}

fn stepped_parts<R: Rng>(rng: &mut R, origin: Vec3, w: f32, h: f32, d: f32) -> Vec<BuildingPart> {
    let floors = range(rng, 2.0, 4.0).floor().max(1.0) as usize;
    let floor_height = h / floors as f32;
    let (mut cw, mut cd, mut cy) = (w, d, 0.0);

    let mut parts = Vec::with_capacity(floors);
    for _ in 0..floors {
        parts.push(BuildingPart::Block {
            center: origin + Vec3::new(0.0, cy + floor_height / 2.0, 0.0),
            size: Vec3::new(cw, floor_height, cd),
        });
        cy += floor_height;
        cw *= STEP_SHRINK;
        cd *= STEP_SHRINK;
    }
    parts
}

fn l_shaped_parts<R: Rng>(rng: &mut R, origin: Vec3, w: f32, h: f32, d: f32) -> Vec<BuildingPart> {
    let wing_height = h * range(rng, 0.5, 0.8);
    vec![
        BuildingPart::Block {
            center: origin + Vec3::new(0.0, h / 2.0, d * 0.25),
            size: Vec3::new(w, h, d * 0.5),
        },
        BuildingPart::Block {
            center: origin + Vec3::new(w * 0.25, wing_height / 2.0, 0.0),
            size: Vec3::new(w * 0.5, wing_height, d),
        },
    ]
}

fn tower_parts(origin: Vec3, w: f32, h: f32) -> Vec<BuildingPart> {
    vec![
        BuildingPart::Cylinder {
            center: origin + Vec3::new(0.0, h / 2.0, 0.0),
            radius_top: w * 0.4,
            radius_bottom: w * 0.45,
            height: h,
        },
        BuildingPart::Dome {
            base: origin + Vec3::new(0.0, h, 0.0),
            radius: w * 0.42,
        },
    ]
}

fn box_parts<R: Rng>(rng: &mut R, origin: Vec3, w: f32, h: f32, d: f32) -> Vec<BuildingPart> {
    let mut parts = vec![BuildingPart::Block {
        center: origin + Vec3::new(0.0, h / 2.0, 0.0),
        size: Vec3::new(w, h, d),
    }];

    // Rooftop unit on roughly half of them
    if rng.gen::<f32>() > 0.5 {
        parts.push(BuildingPart::Block {
            center: origin + Vec3::new(0.0, h + h * 0.05, 0.0),
            size: Vec3::new(w * 0.3, h * 0.1, d * 0.3),
        });
    }
    parts
}

fn place_trees<R: Rng>(segments: &[RoadSegment], rng: &mut R) -> Vec<Tree> {
    let mut trees = Vec::new();

    for _ in 0..TREE_ATTEMPTS {
        let angle = rng.gen::<f32>() * std::f32::consts::TAU;
        let dist = range(rng, TREE_RING_MIN, TREE_RING_MAX);
        let x = angle.cos() * dist;
        let z = angle.sin() * dist;

        if is_near_road(segments, x, z, TREE_ROAD_CLEARANCE) {
            continue;
        }

        let crown = if rng.gen::<f32>() > 0.5 {
            CrownKind::Cone
        } else {
            CrownKind::Sphere
        };
        let crown_size = range(rng, 2.0, 4.0);
        let crown_height = match crown {
            CrownKind::Cone => 5.5,
            CrownKind::Sphere => 5.0,
        } + range(rng, 0.0, 1.0);

        trees.push(Tree {
            position: Vec3::new(x, 0.0, z),
            crown,
            crown_size,
            crown_height,
        });
    }

    trees
}

fn place_streetlights(segments: &[RoadSegment]) -> Vec<Streetlight> {
    let mut lights = Vec::new();

    for seg in segments {
        let length = seg.length_2d();
        let count = (length / STREETLIGHT_SPACING).floor() as usize;
        if count < 2 {
            continue;
        }

        let dx = seg.to.x - seg.from.x;
        let dz = seg.to.z - seg.from.z;
        let perp_x = -dz / length;
        let perp_z = dx / length;

        for j in 1..count {
            let t = j as f32 / count as f32;
            let side = if j % 2 == 0 { 1.0 } else { -1.0 };
            let base = seg.point_at(t);
            lights.push(Streetlight {
                position: Vec3::new(
                    base.x + perp_x * side * STREETLIGHT_LATERAL_OFFSET,
                    0.0,
                    base.y + perp_z * side * STREETLIGHT_LATERAL_OFFSET,
                ),
                height: STREETLIGHT_POLE_HEIGHT,
            });
        }
    }

    lights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{build_road_segments, dist_to_segment_2d};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn loop_segments() -> Vec<RoadSegment> {
        build_road_segments(&[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 300.0),
            Vec3::new(300.0, 0.0, 300.0),
            Vec3::new(300.0, 0.0, 0.0),
        ])
    }

    #[test]
    fn test_buildings_keep_clear_of_road() {
        let segments = loop_segments();
        let mut rng = StdRng::seed_from_u64(11);
        let scenery = generate_scenery(&segments, &mut rng);

        assert!(scenery.buildings.len() <= BUILDING_ATTEMPTS);
        for b in &scenery.buildings {
            let nearest = segments
                .iter()
                .map(|s| dist_to_segment_2d(b.position.x, b.position.z, s.from, s.to))
                .fold(f32::MAX, f32::min);
            assert!(nearest >= BUILDING_ROAD_CLEARANCE);
            assert!(!b.parts.is_empty());
            assert_eq!(b.collision.min.y, 0.0);
        }
    }

    #[test]
    fn test_trees_on_ring() {
        let segments = loop_segments();
        let mut rng = StdRng::seed_from_u64(3);
        let scenery = generate_scenery(&segments, &mut rng);

        assert!(scenery.trees.len() <= TREE_ATTEMPTS);
        for tree in &scenery.trees {
            let r = Vec3::new(tree.position.x, 0.0, tree.position.z).length();
            assert!(r >= TREE_RING_MIN - 1e-3 && r <= TREE_RING_MAX + 1e-3);
            assert!(!is_near_road(&segments, tree.position.x, tree.position.z, TREE_ROAD_CLEARANCE));
        }
    }

    #[test]
    fn test_streetlights_alternate_sides() {
        let segments = vec![RoadSegment::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 300.0))];
        let lights = place_streetlights(&segments);

        // floor(300 / 60) = 5, so j = 1..4
        assert_eq!(lights.len(), 4);
        assert!((lights[0].position.x - 14.0).abs() < 1e-4);
        assert!((lights[1].position.x + 14.0).abs() < 1e-4);
        assert!((lights[0].position.z - 60.0).abs() < 1e-3);
    }

    #[test]
    fn test_tower_bounds_include_dome() {
        let parts = tower_parts(Vec3::new(100.0, 0.0, 100.0), 20.0, 40.0);
        let bounds = parts
            .iter()
            .map(BuildingPart::bounds)
            .reduce(|a, b| a.union(&b))
            .unwrap();
        assert!((bounds.max.y - (40.0 + 8.4)).abs() < 1e-3);
        assert!((bounds.max.x - 109.0).abs() < 1e-3);
    }

    #[test]
    fn test_scenery_is_seeded() {
        let segments = loop_segments();
        let a = generate_scenery(&segments, &mut StdRng::seed_from_u64(5));
        let b = generate_scenery(&segments, &mut StdRng::seed_from_u64(5));
        assert_eq!(a, b);
    }
}
