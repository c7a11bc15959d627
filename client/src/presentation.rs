use serde_json::Value;
use vrclub_shared::club_state::ClubState;
use vrclub_shared::protocol::{AudioSyncMsg, PlayerWire, VjControlMsg};

use crate::events::{ClubEvents, PlayerDelta};

/// Avatar presentation capability, implemented by the rendering layer.
/// One visual representation per remote player; mesh building and rigging
/// are entirely the implementor's business.
pub trait AvatarPresenter {
    fn create_avatar(&mut self, player: &PlayerWire);
    fn update_avatar(&mut self, delta: &PlayerDelta);
    fn remove_avatar(&mut self, player_id: u32);
}

/// Club visual state capability: lighting rig toggles and audio playback.
pub trait ClubVisuals {
    /// Replace the whole lighting/audio state at once (welcome snapshot).
    fn apply_state(&mut self, state: &ClubState);
    fn apply_control(&mut self, control: &str, value: &Value);
    fn apply_audio(&mut self, url: Option<&str>, time: f64, playing: bool);
}

/// Glue between the network manager and the two presentation capabilities:
/// roster events drive the avatar presenter, VJ and audio events drive the
/// visuals. Chat is left to whoever wants it.
pub struct PresentationBridge<A, V> {
    pub avatars: A,
    pub visuals: V,
}

impl<A, V> PresentationBridge<A, V> {
    pub fn new(avatars: A, visuals: V) -> Self {
        Self { avatars, visuals }
    }
}

impl<A: AvatarPresenter, V: ClubVisuals> ClubEvents for PresentationBridge<A, V> {
    fn on_connect(&mut self, _player_id: u32, club_state: &ClubState, players: &[PlayerWire]) {
        self.visuals.apply_state(club_state);
        for player in players {
            self.avatars.create_avatar(player);
        }
    }

    fn on_player_joined(&mut self, player: &PlayerWire) {
        self.avatars.create_avatar(player);
    }

    fn on_player_left(&mut self, player_id: u32) {
        self.avatars.remove_avatar(player_id);
    }

    fn on_player_update(&mut self, delta: &PlayerDelta) {
        self.avatars.update_avatar(delta);
    }

    fn on_vj_control(&mut self, msg: &VjControlMsg) {
        self.visuals.apply_control(&msg.control, &msg.value);
    }

    fn on_audio_sync(&mut self, msg: &AudioSyncMsg) {
        self.visuals
            .apply_audio(msg.audio_url.as_deref(), msg.audio_time, msg.audio_playing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vrclub_shared::protocol::PlayerPositionMsg;
    use vrclub_shared::vec3::Vec3;

    #[derive(Default)]
    struct FakeAvatars {
        created: Vec<u32>,
        updated: Vec<u32>,
        removed: Vec<u32>,
    }

    impl AvatarPresenter for FakeAvatars {
        fn create_avatar(&mut self, player: &PlayerWire) {
            self.created.push(player.id);
        }
        fn update_avatar(&mut self, delta: &PlayerDelta) {
            self.updated.push(delta.player_id());
        }
        fn remove_avatar(&mut self, player_id: u32) {
            self.removed.push(player_id);
        }
    }

    #[derive(Default)]
    struct FakeVisuals {
        snapshots: u32,
        controls: Vec<String>,
        audio_urls: Vec<Option<String>>,
    }

    impl ClubVisuals for FakeVisuals {
        fn apply_state(&mut self, _state: &ClubState) {
            self.snapshots += 1;
        }
        fn apply_control(&mut self, control: &str, _value: &Value) {
            self.controls.push(control.to_string());
        }
        fn apply_audio(&mut self, url: Option<&str>, _time: f64, _playing: bool) {
            self.audio_urls.push(url.map(str::to_owned));
        }
    }

    fn wire_player(id: u32) -> PlayerWire {
        PlayerWire {
            id,
            username: format!("Player{id}"),
            position: Vec3::default(),
            rotation: Vec3::default(),
            head_position: None,
            left_hand_position: None,
            right_hand_position: None,
            is_vr: false,
        }
    }

    #[test]
    fn connect_applies_state_and_creates_existing_avatars() {
        let mut bridge = PresentationBridge::new(FakeAvatars::default(), FakeVisuals::default());
        bridge.on_connect(7, &ClubState::default(), &[wire_player(1), wire_player(2)]);

        assert_eq!(bridge.visuals.snapshots, 1);
        assert_eq!(bridge.avatars.created, vec![1, 2]);
    }

    #[test]
    fn roster_events_drive_the_presenter() {
        let mut bridge = PresentationBridge::new(FakeAvatars::default(), FakeVisuals::default());

        bridge.on_player_joined(&wire_player(4));
        bridge.on_player_update(&PlayerDelta::Pose(PlayerPositionMsg {
            player_id: 4,
            position: Vec3::new(1.0, 0.0, 0.0),
            rotation: Vec3::default(),
            head_position: None,
            left_hand_position: None,
            right_hand_position: None,
            is_vr: true,
        }));
        bridge.on_player_left(4);

        assert_eq!(bridge.avatars.created, vec![4]);
        assert_eq!(bridge.avatars.updated, vec![4]);
        assert_eq!(bridge.avatars.removed, vec![4]);
    }

    #[test]
    fn vj_and_audio_events_drive_the_visuals() {
        let mut bridge = PresentationBridge::new(FakeAvatars::default(), FakeVisuals::default());

        bridge.on_vj_control(&VjControlMsg {
            player_id: Some(1),
            control: "mirrorBallActive".into(),
            value: json!(false),
        });
        bridge.on_audio_sync(&AudioSyncMsg {
            player_id: Some(1),
            audio_url: Some("https://dj.example/set.mp3".into()),
            audio_time: 0.0,
            audio_playing: true,
        });

        assert_eq!(bridge.visuals.controls, vec!["mirrorBallActive"]);
        assert_eq!(
            bridge.visuals.audio_urls,
            vec![Some("https://dj.example/set.mp3".to_string())]
        );
    }
}
