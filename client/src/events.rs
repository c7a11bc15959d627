use vrclub_shared::club_state::ClubState;
use vrclub_shared::protocol::{AudioSyncMsg, ChatMsg, PlayerPositionMsg, PlayerWire, VjControlMsg};

/// One change to another player, covering both pose relays and attribute
/// updates. Consumers that only care about avatars can treat both variants
/// as "something about this player moved or changed".
#[derive(Debug, Clone)]
pub enum PlayerDelta {
    Pose(PlayerPositionMsg),
    Username { player_id: u32, username: String },
}

impl PlayerDelta {
    pub fn player_id(&self) -> u32 {
        match self {
            PlayerDelta::Pose(pose) => pose.player_id,
            PlayerDelta::Username { player_id, .. } => *player_id,
        }
    }
}

/// Hooks invoked by [`NetworkManager::poll`](crate::NetworkManager::poll)
/// as decoded server messages are drained.
///
/// Every method has a no-op default, so a collaborator implements only the
/// hooks it cares about; everything else is silently ignored.
#[allow(unused_variables)]
pub trait ClubEvents {
    /// The welcome snapshot arrived: our assigned id, the authoritative club
    /// state, and every other player already in the room.
    fn on_connect(&mut self, player_id: u32, club_state: &ClubState, players: &[PlayerWire]) {}

    /// The connection dropped. The manager keeps retrying in the background.
    fn on_disconnect(&mut self) {}

    fn on_player_joined(&mut self, player: &PlayerWire) {}

    fn on_player_left(&mut self, player_id: u32) {}

    fn on_player_update(&mut self, delta: &PlayerDelta) {}

    fn on_vj_control(&mut self, msg: &VjControlMsg) {}

    fn on_audio_sync(&mut self, msg: &AudioSyncMsg) {}

    fn on_chat(&mut self, msg: &ChatMsg) {}
}
