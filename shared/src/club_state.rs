use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// Authoritative record of the club-wide lighting and audio settings.
///
/// Exactly one instance lives on the server, owned by the relay actor. Every
/// connected client keeps a mirror that is overwritten by `vjControl` and
/// `audioSync` echoes, so the struct itself carries no interior mutability.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct ClubState {
    pub lights_active: bool,
    pub lasers_active: bool,
    pub led_wall_active: bool,
    pub strobes_active: bool,
    pub mirror_ball_active: bool,
    pub spotlight_speed: f64,
    pub spotlight_mode: u32,
    pub spotlight_pattern: u32,
    pub spot_color_index: u32,
    pub mirror_ball_color_index: u32,
    pub audio_url: Option<String>,
    pub audio_time: f64,
    pub audio_playing: bool,
}

impl Default for ClubState {
    fn default() -> Self {
        Self {
            lights_active: true,
            lasers_active: true,
            led_wall_active: true,
            strobes_active: false,
            mirror_ball_active: true,
            spotlight_speed: 1.0,
            spotlight_mode: 0,
            spotlight_pattern: 0,
            spot_color_index: 0,
            mirror_ball_color_index: 0,
            audio_url: None,
            audio_time: 0.0,
            audio_playing: false,
        }
    }
}

impl ClubState {
    /// Apply a single `vjControl` mutation.
    ///
    /// Only the pre-declared lighting keys below are writable this way; the
    /// audio fields go through [`ClubState::apply_audio_sync`]. Returns `true`
    /// when a field was actually written. Unknown keys and values of the
    /// wrong JSON type leave the record untouched.
    pub fn apply_control(&mut self, control: &str, value: &Value) -> bool {
        match control {
            "lightsActive" => set_bool(&mut self.lights_active, value),
            "lasersActive" => set_bool(&mut self.lasers_active, value),
            "ledWallActive" => set_bool(&mut self.led_wall_active, value),
            "strobesActive" => set_bool(&mut self.strobes_active, value),
            "mirrorBallActive" => set_bool(&mut self.mirror_ball_active, value),
            "spotlightSpeed" => set_f64(&mut self.spotlight_speed, value),
            "spotlightMode" => set_u32(&mut self.spotlight_mode, value),
            "spotlightPattern" => set_u32(&mut self.spotlight_pattern, value),
            "spotColorIndex" => set_u32(&mut self.spot_color_index, value),
            "mirrorBallColorIndex" => set_u32(&mut self.mirror_ball_color_index, value),
            _ => false,
        }
    }

    /// Overwrite the three audio fields from an `audioSync` message.
    pub fn apply_audio_sync(&mut self, url: Option<String>, time: f64, playing: bool) {
        self.audio_url = url;
        self.audio_time = time;
        self.audio_playing = playing;
    }
}

fn set_bool(field: &mut bool, value: &Value) -> bool {
    match value.as_bool() {
        Some(v) => {
            *field = v;
            true
        }
        None => false,
    }
}

fn set_f64(field: &mut f64, value: &Value) -> bool {
    match value.as_f64() {
        Some(v) if v.is_finite() => {
            *field = v;
            true
        }
        _ => false,
    }
}

fn set_u32(field: &mut u32, value: &Value) -> bool {
    match value.as_u64() {
        Some(v) if v <= u32::MAX as u64 => {
            *field = v as u32;
            true
        }
        _ => false,
    }
}
