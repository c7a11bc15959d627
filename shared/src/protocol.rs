use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::club_state::ClubState;
use crate::vec3::Vec3;

// Messages are exchanged as one complete JSON object per WebSocket text
// frame, discriminated by a `type` field. Both directions are closed sum
// types: a frame with an unrecognized `type` fails to decode and is dropped
// by the receiver, never silently partially handled.

// === Server -> Client ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(tag = "type")]
pub enum ServerMsg {
    #[serde(rename = "welcome")]
    Welcome(WelcomeMsg),
    #[serde(rename = "playerJoined")]
    PlayerJoined(PlayerJoinedMsg),
    #[serde(rename = "playerLeft")]
    PlayerLeft(PlayerLeftMsg),
    #[serde(rename = "playerPosition")]
    PlayerPosition(PlayerPositionMsg),
    #[serde(rename = "playerUpdate")]
    PlayerUpdate(PlayerUpdateMsg),
    #[serde(rename = "vjControl")]
    VjControl(VjControlMsg),
    #[serde(rename = "audioSync")]
    AudioSync(AudioSyncMsg),
    #[serde(rename = "chat")]
    Chat(ChatMsg),
}

/// Catch-up state sent once to each new connection: its assigned id, the
/// full club state, and a snapshot of every other connected player.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct WelcomeMsg {
    pub player_id: u32,
    pub club_state: ClubState,
    pub players: Vec<PlayerWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
pub struct PlayerJoinedMsg {
    pub player: PlayerWire,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct PlayerLeftMsg {
    pub player_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct PlayerPositionMsg {
    pub player_id: u32,
    pub position: Vec3,
    pub rotation: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_position: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_hand_position: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_hand_position: Option<Vec3>,
    #[serde(rename = "isVR", default)]
    pub is_vr: bool,
}

/// Attribute change for an existing player (currently only the username).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdateMsg {
    pub player_id: u32,
    pub username: String,
}

/// Echo of a VJ console action. `player_id` is absent when the server itself
/// originates the change.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct VjControlMsg {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<u32>,
    pub control: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct AudioSyncMsg {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<u32>,
    pub audio_url: Option<String>,
    pub audio_time: f64,
    pub audio_playing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct ChatMsg {
    pub player_id: u32,
    pub username: String,
    pub message: String,
    /// Unix milliseconds, stamped by the server.
    pub timestamp: u64,
}

/// Public snapshot of one connected player, as carried in `welcome.players`
/// and `playerJoined.player`. The VR tracking vectors are present only while
/// the player is in VR mode.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct PlayerWire {
    pub id: u32,
    pub username: String,
    pub position: Vec3,
    pub rotation: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_position: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_hand_position: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_hand_position: Option<Vec3>,
    #[serde(rename = "isVR", default)]
    pub is_vr: bool,
}

// === Client -> Server ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(tag = "type")]
pub enum ClientMsg {
    #[serde(rename = "setUsername")]
    SetUsername { username: String },
    #[serde(rename = "positionUpdate")]
    PositionUpdate(PositionUpdateMsg),
    #[serde(rename = "vjControl")]
    VjControl { control: String, value: Value },
    #[serde(rename = "audioSync")]
    AudioSync(AudioSyncRequest),
    #[serde(rename = "chat")]
    Chat { message: String },
}

/// Client-reported pose. Sent at most every 50 ms per connection.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct PositionUpdateMsg {
    pub position: Vec3,
    pub rotation: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_position: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_hand_position: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_hand_position: Option<Vec3>,
    #[serde(rename = "isVR", default)]
    pub is_vr: bool,
}

/// Client-originated audio sync; the relay stamps the sender id before
/// echoing it as an [`AudioSyncMsg`].
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct AudioSyncRequest {
    pub audio_url: Option<String>,
    pub audio_time: f64,
    pub audio_playing: bool,
}
