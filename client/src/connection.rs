use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use vrclub_shared::club_state::ClubState;
use vrclub_shared::protocol::{
    AudioSyncRequest, ClientMsg, PositionUpdateMsg, ServerMsg,
};

use crate::events::{ClubEvents, PlayerDelta};
use crate::throttle::SendThrottle;

/// Minimum spacing between outgoing `positionUpdate` messages (20 Hz).
pub const POSITION_SEND_INTERVAL: Duration = Duration::from_millis(50);

const RECONNECT_BASE_DELAY: Duration = Duration::from_millis(1000);
const RECONNECT_MAX_DELAY: Duration = Duration::from_millis(30_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

/// Events surfaced by the network thread to the game-loop side.
#[derive(Debug, Clone)]
pub enum NetEvent {
    Connected,
    Disconnected,
    Message(ServerMsg),
}

type CmdSender = tokio::sync::mpsc::UnboundedSender<ClientMsg>;

/// Owns the one outbound connection for this client.
///
/// The socket itself lives on a dedicated background thread with its own
/// tokio runtime; this struct is the single-threaded handle the render loop
/// talks to. Call [`NetworkManager::poll`] once per frame to drain incoming
/// messages into a [`ClubEvents`] handler, and the `send_*` helpers to push
/// traffic out. All sends are fire-and-forget and become no-ops while the
/// connection is down.
pub struct NetworkManager {
    state: ConnectionState,
    player_id: Option<u32>,
    username: String,
    club_state: ClubState,
    position_throttle: SendThrottle,
    event_rx: Receiver<NetEvent>,
    cmd_tx: CmdSender,
}

impl NetworkManager {
    /// Start connecting to `url`. The returned manager is usable
    /// immediately; it reports `Connecting` until the handshake finishes and
    /// keeps retrying with capped exponential backoff after any failure.
    pub fn connect(url: impl Into<String>, username: impl Into<String>) -> Self {
        let (event_tx, event_rx) = mpsc::channel::<NetEvent>();
        let cmd_tx = spawn_network_thread(url.into(), event_tx);
        Self::from_parts(event_rx, cmd_tx, username.into())
    }

    fn from_parts(event_rx: Receiver<NetEvent>, cmd_tx: CmdSender, username: String) -> Self {
        Self {
            state: ConnectionState::Connecting,
            player_id: None,
            username,
            club_state: ClubState::default(),
            position_throttle: SendThrottle::new(POSITION_SEND_INTERVAL),
            event_rx,
            cmd_tx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Our server-assigned id, known once the welcome arrives.
    pub fn player_id(&self) -> Option<u32> {
        self.player_id
    }

    /// Local mirror of the authoritative club state, kept in step by
    /// `vjControl` and `audioSync` echoes.
    pub fn club_state(&self) -> &ClubState {
        &self.club_state
    }

    /// Drain pending network events and dispatch them into `handler`.
    /// Intended to be called once per render frame.
    pub fn poll<H: ClubEvents>(&mut self, handler: &mut H) {
        while let Ok(event) = self.event_rx.try_recv() {
            self.apply_event(event, handler);
        }
    }

    fn apply_event<H: ClubEvents>(&mut self, event: NetEvent, handler: &mut H) {
        match event {
            NetEvent::Connected => {
                self.state = ConnectionState::Connected;
                let _ = self.cmd_tx.send(ClientMsg::SetUsername {
                    username: self.username.clone(),
                });
            }
            NetEvent::Disconnected => {
                let was_connected = self.state == ConnectionState::Connected;
                self.state = ConnectionState::Disconnected;
                self.player_id = None;
                if was_connected {
                    handler.on_disconnect();
                }
            }
            NetEvent::Message(msg) => match msg {
                ServerMsg::Welcome(welcome) => {
                    self.player_id = Some(welcome.player_id);
                    self.club_state = welcome.club_state.clone();
                    handler.on_connect(welcome.player_id, &welcome.club_state, &welcome.players);
                }
                ServerMsg::PlayerJoined(joined) => handler.on_player_joined(&joined.player),
                ServerMsg::PlayerLeft(left) => handler.on_player_left(left.player_id),
                ServerMsg::PlayerPosition(pose) => {
                    handler.on_player_update(&PlayerDelta::Pose(pose));
                }
                ServerMsg::PlayerUpdate(update) => {
                    handler.on_player_update(&PlayerDelta::Username {
                        player_id: update.player_id,
                        username: update.username,
                    });
                }
                ServerMsg::VjControl(control) => {
                    self.club_state
                        .apply_control(&control.control, &control.value);
                    handler.on_vj_control(&control);
                }
                ServerMsg::AudioSync(sync) => {
                    self.club_state.apply_audio_sync(
                        sync.audio_url.clone(),
                        sync.audio_time,
                        sync.audio_playing,
                    );
                    handler.on_audio_sync(&sync);
                }
                ServerMsg::Chat(chat) => handler.on_chat(&chat),
            },
        }
    }

    /// Rename ourselves, locally and on the server.
    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = username.into();
        if self.is_connected() {
            let _ = self.cmd_tx.send(ClientMsg::SetUsername {
                username: self.username.clone(),
            });
        }
    }

    /// Offer the current pose for sending. Called every render frame; at
    /// most one message per 50 ms actually goes out, the rest are dropped
    /// (not queued; the next accepted call carries a fresher pose anyway).
    /// Returns `true` when a message was handed to the transport.
    pub fn send_position_update(&mut self, update: PositionUpdateMsg) -> bool {
        if !self.is_connected() {
            return false;
        }
        if !self.position_throttle.try_acquire() {
            return false;
        }
        self.cmd_tx.send(ClientMsg::PositionUpdate(update)).is_ok()
    }

    pub fn send_vj_control(&self, control: impl Into<String>, value: serde_json::Value) {
        if self.is_connected() {
            let _ = self.cmd_tx.send(ClientMsg::VjControl {
                control: control.into(),
                value,
            });
        }
    }

    pub fn send_audio_sync(&self, audio_url: Option<String>, audio_time: f64, audio_playing: bool) {
        if self.is_connected() {
            let _ = self.cmd_tx.send(ClientMsg::AudioSync(AudioSyncRequest {
                audio_url,
                audio_time,
                audio_playing,
            }));
        }
    }

    pub fn send_chat(&self, message: impl Into<String>) {
        if self.is_connected() {
            let _ = self.cmd_tx.send(ClientMsg::Chat {
                message: message.into(),
            });
        }
    }
}

/// Background thread owning the WebSocket. Reconnects forever with capped
/// exponential backoff; exits once the manager side is dropped.
fn spawn_network_thread(url: String, event_tx: Sender<NetEvent>) -> CmdSender {
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    let (cmd_tx, mut cmd_rx) = tokio::sync::mpsc::unbounded_channel::<ClientMsg>();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_io()
            .enable_time()
            .build()
            .expect("failed to build tokio runtime");

        rt.block_on(async move {
            let mut reconnect_delay = RECONNECT_BASE_DELAY;

            loop {
                let (ws_stream, _) = match tokio_tungstenite::connect_async(url.as_str()).await {
                    Ok(x) => x,
                    Err(err) => {
                        tracing::debug!("connect to {} failed: {}", url, err);
                        if event_tx.send(NetEvent::Disconnected).is_err() {
                            return;
                        }
                        tokio::time::sleep(reconnect_delay).await;
                        reconnect_delay = reconnect_delay.mul_f32(1.5).min(RECONNECT_MAX_DELAY);
                        continue;
                    }
                };

                reconnect_delay = RECONNECT_BASE_DELAY;
                if event_tx.send(NetEvent::Connected).is_err() {
                    return;
                }

                let (mut write, mut read) = ws_stream.split();

                loop {
                    tokio::select! {
                        biased;

                        Some(cmd) = cmd_rx.recv() => {
                            if let Ok(text) = serde_json::to_string(&cmd) {
                                if write.send(Message::Text(text.into())).await.is_err() {
                                    break;
                                }
                            }
                        }

                        msg = read.next() => {
                            match msg {
                                Some(Ok(Message::Text(txt))) => {
                                    match serde_json::from_str::<ServerMsg>(&txt) {
                                        Ok(server_msg) => {
                                            if event_tx.send(NetEvent::Message(server_msg)).is_err() {
                                                return;
                                            }
                                        }
                                        Err(err) => {
                                            tracing::debug!("dropping undecodable server message: {}", err);
                                        }
                                    }
                                }
                                Some(Ok(Message::Close(_))) | None => break,
                                Some(Ok(_)) => {}
                                Some(Err(err)) => {
                                    tracing::debug!("transport error: {}", err);
                                    break;
                                }
                            }
                        }
                    }
                }

                if event_tx.send(NetEvent::Disconnected).is_err() {
                    return;
                }
                tokio::time::sleep(reconnect_delay).await;
                reconnect_delay = reconnect_delay.mul_f32(1.5).min(RECONNECT_MAX_DELAY);
            }
        });
    });

    cmd_tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vrclub_shared::protocol::{
        AudioSyncMsg, ChatMsg, PlayerJoinedMsg, PlayerLeftMsg, PlayerPositionMsg, PlayerUpdateMsg,
        PlayerWire, VjControlMsg, WelcomeMsg,
    };
    use vrclub_shared::vec3::Vec3;

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

    fn pose_msg() -> PositionUpdateMsg {
        PositionUpdateMsg {
            position: Vec3::new(1.0, 0.0, 2.0),
            rotation: Vec3::default(),
            head_position: None,
            left_hand_position: None,
            right_hand_position: None,
            is_vr: false,
        }
    }

    /// Manager wired to test channels instead of a live socket.
    fn test_manager() -> (
        NetworkManager,
        mpsc::Sender<NetEvent>,
        tokio::sync::mpsc::UnboundedReceiver<ClientMsg>,
    ) {
        let (event_tx, event_rx) = mpsc::channel();
        let (cmd_tx, cmd_rx) = tokio::sync::mpsc::unbounded_channel();
        let manager = NetworkManager::from_parts(event_rx, cmd_tx, "Neon".to_string());
        (manager, event_tx, cmd_rx)
    }

    #[derive(Default)]
    struct Recorder {
        connects: Vec<u32>,
        disconnects: u32,
        joined: Vec<u32>,
        left: Vec<u32>,
        updates: Vec<u32>,
        vj: Vec<String>,
        chats: Vec<String>,
        audio: Vec<Option<String>>,
    }

    impl ClubEvents for Recorder {
        fn on_connect(&mut self, player_id: u32, _club_state: &ClubState, players: &[PlayerWire]) {
            self.connects.push(player_id);
            self.joined.extend(players.iter().map(|p| p.id));
        }
        fn on_disconnect(&mut self) {
            self.disconnects += 1;
        }
        fn on_player_joined(&mut self, player: &PlayerWire) {
            self.joined.push(player.id);
        }
        fn on_player_left(&mut self, player_id: u32) {
            self.left.push(player_id);
        }
        fn on_player_update(&mut self, delta: &PlayerDelta) {
            self.updates.push(delta.player_id());
        }
        fn on_vj_control(&mut self, msg: &VjControlMsg) {
            self.vj.push(msg.control.clone());
        }
        fn on_audio_sync(&mut self, msg: &AudioSyncMsg) {
            self.audio.push(msg.audio_url.clone());
        }
        fn on_chat(&mut self, msg: &ChatMsg) {
            self.chats.push(msg.message.clone());
        }
    }

    #[test]
    fn connected_event_sends_set_username() {
        let (mut manager, event_tx, mut cmd_rx) = test_manager();
        let mut recorder = Recorder::default();

        event_tx.send(NetEvent::Connected).unwrap();
        manager.poll(&mut recorder);

        assert!(manager.is_connected());
        match cmd_rx.try_recv() {
            Ok(ClientMsg::SetUsername { username }) => assert_eq!(username, "Neon"),
            other => panic!("Expected SetUsername, got {other:?}"),
        }
    }

    #[test]
    fn welcome_sets_id_mirrors_state_and_fires_on_connect() {
        let (mut manager, event_tx, _cmd_rx) = test_manager();
        let mut recorder = Recorder::default();

        let mut club_state = ClubState::default();
        club_state.lights_active = false;
        event_tx
            .send(NetEvent::Message(ServerMsg::Welcome(WelcomeMsg {
                player_id: 7,
                club_state,
                players: vec![wire_player(1), wire_player(3)],
            })))
            .unwrap();
        manager.poll(&mut recorder);

        assert_eq!(manager.player_id(), Some(7));
        assert!(!manager.club_state().lights_active);
        assert_eq!(recorder.connects, vec![7]);
        assert_eq!(recorder.joined, vec![1, 3]);
    }

    #[test]
    fn vj_control_echo_updates_the_mirror_and_fires_hook() {
        let (mut manager, event_tx, _cmd_rx) = test_manager();
        let mut recorder = Recorder::default();

        event_tx
            .send(NetEvent::Message(ServerMsg::VjControl(VjControlMsg {
                player_id: Some(2),
                control: "strobesActive".into(),
                value: json!(true),
            })))
            .unwrap();
        manager.poll(&mut recorder);

        assert!(manager.club_state().strobes_active);
        assert_eq!(recorder.vj, vec!["strobesActive"]);
    }

    #[test]
    fn audio_sync_echo_updates_the_mirror() {
        let (mut manager, event_tx, _cmd_rx) = test_manager();
        let mut recorder = Recorder::default();

        event_tx
            .send(NetEvent::Message(ServerMsg::AudioSync(AudioSyncMsg {
                player_id: Some(2),
                audio_url: Some("https://dj.example/set.mp3".into()),
                audio_time: 3.0,
                audio_playing: true,
            })))
            .unwrap();
        manager.poll(&mut recorder);

        assert!(manager.club_state().audio_playing);
        assert_eq!(
            manager.club_state().audio_url.as_deref(),
            Some("https://dj.example/set.mp3")
        );
        assert_eq!(recorder.audio.len(), 1);
    }

    #[test]
    fn pose_and_attribute_messages_share_the_update_hook() {
        let (mut manager, event_tx, _cmd_rx) = test_manager();
        let mut recorder = Recorder::default();

        event_tx
            .send(NetEvent::Message(ServerMsg::PlayerPosition(
                PlayerPositionMsg {
                    player_id: 5,
                    position: Vec3::new(1.0, 0.0, 0.0),
                    rotation: Vec3::default(),
                    head_position: None,
                    left_hand_position: None,
                    right_hand_position: None,
                    is_vr: false,
                },
            )))
            .unwrap();
        event_tx
            .send(NetEvent::Message(ServerMsg::PlayerUpdate(PlayerUpdateMsg {
                player_id: 5,
                username: "Alice".into(),
            })))
            .unwrap();
        manager.poll(&mut recorder);

        assert_eq!(recorder.updates, vec![5, 5]);
    }

    #[test]
    fn join_and_left_hooks_fire() {
        let (mut manager, event_tx, _cmd_rx) = test_manager();
        let mut recorder = Recorder::default();

        event_tx
            .send(NetEvent::Message(ServerMsg::PlayerJoined(PlayerJoinedMsg {
                player: wire_player(9),
            })))
            .unwrap();
        event_tx
            .send(NetEvent::Message(ServerMsg::PlayerLeft(PlayerLeftMsg {
                player_id: 9,
            })))
            .unwrap();
        manager.poll(&mut recorder);

        assert_eq!(recorder.joined, vec![9]);
        assert_eq!(recorder.left, vec![9]);
    }

    #[test]
    fn disconnect_clears_id_and_fires_hook_only_after_a_connection() {
        let (mut manager, event_tx, _cmd_rx) = test_manager();
        let mut recorder = Recorder::default();

        // A failed first connect attempt does not count as a loss.
        event_tx.send(NetEvent::Disconnected).unwrap();
        manager.poll(&mut recorder);
        assert_eq!(recorder.disconnects, 0);
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        event_tx.send(NetEvent::Connected).unwrap();
        event_tx
            .send(NetEvent::Message(ServerMsg::Welcome(WelcomeMsg {
                player_id: 4,
                club_state: ClubState::default(),
                players: vec![],
            })))
            .unwrap();
        event_tx.send(NetEvent::Disconnected).unwrap();
        manager.poll(&mut recorder);

        assert_eq!(recorder.disconnects, 1);
        assert_eq!(manager.player_id(), None);
    }

    #[test]
    fn sends_are_noops_while_disconnected() {
        let (mut manager, _event_tx, mut cmd_rx) = test_manager();

        assert!(!manager.send_position_update(pose_msg()));
        manager.send_chat("anyone here?");
        manager.send_vj_control("lightsActive", json!(false));
        manager.send_audio_sync(None, 0.0, false);

        assert!(cmd_rx.try_recv().is_err(), "nothing may reach the wire");
    }

    #[test]
    fn position_updates_are_throttled_to_one_per_window() {
        let (mut manager, event_tx, mut cmd_rx) = test_manager();
        let mut recorder = Recorder::default();

        event_tx.send(NetEvent::Connected).unwrap();
        manager.poll(&mut recorder);
        let _ = cmd_rx.try_recv(); // the setUsername handshake

        assert!(manager.send_position_update(pose_msg()));
        assert!(!manager.send_position_update(pose_msg()));
        assert!(!manager.send_position_update(pose_msg()));

        assert!(matches!(
            cmd_rx.try_recv(),
            Ok(ClientMsg::PositionUpdate(_))
        ));
        assert!(
            cmd_rx.try_recv().is_err(),
            "exactly one wire message for back-to-back calls"
        );
    }

    #[test]
    fn unthrottled_helpers_send_immediately_when_connected() {
        let (mut manager, event_tx, mut cmd_rx) = test_manager();
        let mut recorder = Recorder::default();

        event_tx.send(NetEvent::Connected).unwrap();
        manager.poll(&mut recorder);
        let _ = cmd_rx.try_recv(); // setUsername

        manager.send_vj_control("lasersActive", json!(false));
        manager.send_chat("drop incoming");
        manager.send_audio_sync(Some("https://dj.example/b2b.mp3".into()), 1.5, true);

        assert!(matches!(cmd_rx.try_recv(), Ok(ClientMsg::VjControl { .. })));
        assert!(matches!(cmd_rx.try_recv(), Ok(ClientMsg::Chat { .. })));
        assert!(matches!(cmd_rx.try_recv(), Ok(ClientMsg::AudioSync(_))));
    }

    #[test]
    fn set_username_while_connected_reaches_the_wire() {
        let (mut manager, event_tx, mut cmd_rx) = test_manager();
        let mut recorder = Recorder::default();

        event_tx.send(NetEvent::Connected).unwrap();
        manager.poll(&mut recorder);
        let _ = cmd_rx.try_recv(); // initial setUsername

        manager.set_username("Laser Queen");
        match cmd_rx.try_recv() {
            Ok(ClientMsg::SetUsername { username }) => assert_eq!(username, "Laser Queen"),
            other => panic!("Expected SetUsername, got {other:?}"),
        }
    }
}
