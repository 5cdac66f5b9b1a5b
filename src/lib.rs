pub mod assets;
pub mod bot_driver;
pub mod camera;
pub mod car_loader;
pub mod config;
pub mod data;
pub mod error;
pub mod ghost;
pub mod input;
pub mod map_loader;
pub mod physics;
pub mod procgen;
pub mod race_session;
pub mod track_mesh;
pub mod world;
