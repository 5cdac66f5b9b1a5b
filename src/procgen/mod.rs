//! Procedural scenery for race worlds
//!
//! Decoration is seeded so a map always looks the same for a given seed.
//! Buildings contribute collision volumes; trees and streetlights are
//! render-only.

pub mod scenery;

pub use scenery::{
    generate_scenery, Building, BuildingPart, BuildingShape, CrownKind, Scenery, Streetlight, Tree,
};
