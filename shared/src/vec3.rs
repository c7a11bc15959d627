use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// 3-component vector as it appears on the wire: `{x, y, z}`.
///
/// Poses are opaque to the sync layer; nothing here does math on them, they
/// are relayed exactly as reported by clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}
