//! Projects bundled with the engine.

use crate::models::ModelRegistry;

pub mod pingpong;

/// Register every bundled project with `registry`.
pub fn register_all(registry: &mut ModelRegistry) {
    pingpong::register(registry);
}
