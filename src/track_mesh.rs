use crate::world::RoadSegment;
use serde::{Deserialize, Serialize};

/// Height of the road surface above the ground plane
pub const ROAD_SURFACE_Y: f32 = 0.05;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackMesh {
    pub vertices: Vec<Vertex3D>,
    pub indices: Vec<u32>,
    pub normals: Vec<Normal3D>,
    pub uvs: Vec<UV>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normal3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UV {
    pub u: f32,
    pub v: f32,
}

impl Vertex3D {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl Normal3D {
    pub const UP: Normal3D = Normal3D {
        x: 0.0,
        y: 1.0,
        z: 0.0,
    };
}

impl TrackMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

pub struct TrackMeshGenerator;

impl TrackMeshGenerator {
    /// Build a flat ribbon of `road_width` along the segments.
    ///
    /// Each segment contributes its own quad so corners overlap instead of
    /// being mitred. The v coordinate accumulates segment length divided by
    /// the road width, so the asphalt texture tiles at a constant scale.
    pub fn generate_road(segments: &[RoadSegment], road_width: f32) -> TrackMesh {
        let mut mesh = TrackMesh::default();
        if road_width <= 0.0 {
            return mesh;
        }

        let half_width = road_width / 2.0;
        let mut v_offset = 0.0;

        for segment in segments {
            let length = segment.length_2d();
            if length < 0.001 {
                continue;
            }

            let dir_x = (segment.to.x - segment.from.x) / length;
            let dir_z = (segment.to.z - segment.from.z) / length;
            let perp_x = -dir_z;
            let perp_z = dir_x;

            let v_length = length / road_width;
            let base = mesh.vertices.len() as u32;

            // a: from-left, b: from-right, c: to-right, d: to-left
            let corners = [
                (segment.from.x - perp_x * half_width, segment.from.z - perp_z * half_width, 0.0, v_offset),
                (segment.from.x + perp_x * half_width, segment.from.z + perp_z * half_width, 1.0, v_offset),
                (segment.to.x + perp_x * half_width, segment.to.z + perp_z * half_width, 1.0, v_offset + v_length),
                (segment.to.x - perp_x * half_width, segment.to.z - perp_z * half_width, 0.0, v_offset + v_length),
            ];

            for (x, z, u, v) in corners {
                mesh.vertices.push(Vertex3D::new(x, ROAD_SURFACE_Y, z));
                mesh.normals.push(Normal3D::UP);
                mesh.uvs.push(UV { u, v });
            }

            mesh.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
            v_offset += v_length;
        }

        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn square_loop() -> Vec<RoadSegment> {
        let pts = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 240.0),
            Vec3::new(240.0, 0.0, 240.0),
            Vec3::new(240.0, 0.0, 0.0),
        ];
        (0..pts.len())
            .map(|i| RoadSegment::new(pts[i], pts[(i + 1) % pts.len()]))
            .collect()
    }

    #[test]
    fn test_road_mesh_layout() {
        let mesh = TrackMeshGenerator::generate_road(&square_loop(), 24.0);

        assert_eq!(mesh.vertices.len(), 16);
        assert_eq!(mesh.triangle_count(), 8);
        assert_eq!(mesh.normals.len(), mesh.vertices.len());
        assert_eq!(mesh.uvs.len(), mesh.vertices.len());
        assert!(mesh.vertices.iter().all(|v| v.y == ROAD_SURFACE_Y));
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
    }

    #[test]
    fn test_road_mesh_width() {
        let mesh = TrackMeshGenerator::generate_road(&square_loop()[..1], 24.0);
        // First segment runs along +Z, so the ribbon spans x in [-12, 12]
        let xs: Vec<f32> = mesh.vertices.iter().map(|v| v.x).collect();
        assert!(xs.iter().any(|x| (x + 12.0).abs() < 1e-4));
        assert!(xs.iter().any(|x| (x - 12.0).abs() < 1e-4));
    }

    #[test]
    fn test_uv_accumulates_along_loop() {
        let mesh = TrackMeshGenerator::generate_road(&square_loop(), 24.0);
        let last_v = mesh.uvs.last().map(|uv| uv.v).unwrap_or(0.0);
        // 4 segments of 240 units at width 24
        assert!((last_v - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_degenerate_segments_skipped() {
        let p = Vec3::new(5.0, 0.0, 5.0);
        let mesh = TrackMeshGenerator::generate_road(&[RoadSegment::new(p, p)], 24.0);
        assert!(mesh.is_empty());
    }
}
