pub mod constants;
pub mod engine;
pub mod pathfinding;
pub mod rng;
pub mod score_store;
pub mod server_protocol;
pub mod server_utils;
pub mod types;
pub mod world;
