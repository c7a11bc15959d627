use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{broadcast, mpsc, oneshot};

use vrclub_shared::protocol::{
    AudioSyncMsg, ChatMsg, ClientMsg, PlayerJoinedMsg, PlayerLeftMsg, PlayerPositionMsg,
    PlayerUpdateMsg, ServerMsg, VjControlMsg, WelcomeMsg,
};

use crate::registry::SessionRegistry;

/// Commands from connection handlers to the relay actor.
pub enum RelayCommand {
    Join {
        response: oneshot::Sender<JoinAccept>,
    },
    Leave {
        id: u32,
    },
    Inbound {
        id: u32,
        msg: ClientMsg,
    },
}

/// Reply to a successful [`RelayCommand::Join`]. The broadcast subscription
/// is created in the same actor step as the welcome snapshot, so the stream
/// starts exactly where `welcome.players` leaves off: a join or leave can
/// never show up both in the snapshot and as a replayed broadcast.
pub struct JoinAccept {
    pub id: u32,
    pub welcome: WelcomeMsg,
    pub broadcast_rx: broadcast::Receiver<RelayBroadcast>,
}

/// Who a fanned-out message is addressed to. Filtering happens in each
/// connection task, not in the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Except(u32),
}

/// One message fanned out to the connection tasks.
#[derive(Debug, Clone)]
pub struct RelayBroadcast {
    pub scope: Scope,
    pub msg: ServerMsg,
}

/// Run the relay actor. Owns the session registry and the club state; every
/// registry or state mutation happens here, one command at a time, so
/// handlers never observe a partial update.
///
/// Fan-out is best-effort at-most-once: a send into the broadcast channel
/// never blocks, and a subscriber that lagged or closed simply misses the
/// message.
pub async fn run_relay(
    mut cmd_rx: mpsc::Receiver<RelayCommand>,
    broadcast_tx: broadcast::Sender<RelayBroadcast>,
) {
    let mut registry = SessionRegistry::new();

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            RelayCommand::Join { response } => {
                let id = registry.add_session();
                let accept = JoinAccept {
                    id,
                    welcome: WelcomeMsg {
                        player_id: id,
                        club_state: registry.club_state.clone(),
                        players: registry.snapshot_others(id),
                    },
                    broadcast_rx: broadcast_tx.subscribe(),
                };
                if response.send(accept).is_err() {
                    // Handler hung up before the welcome could be delivered.
                    registry.remove_session(id);
                    continue;
                }
                if let Some(player) = registry.get(id).map(|s| s.to_wire()) {
                    let _ = broadcast_tx.send(RelayBroadcast {
                        scope: Scope::Except(id),
                        msg: ServerMsg::PlayerJoined(PlayerJoinedMsg { player }),
                    });
                }
                tracing::info!("Player {} joined ({} connected)", id, registry.len());
            }
            RelayCommand::Leave { id } => {
                if registry.remove_session(id) {
                    let _ = broadcast_tx.send(RelayBroadcast {
                        scope: Scope::All,
                        msg: ServerMsg::PlayerLeft(PlayerLeftMsg { player_id: id }),
                    });
                    tracing::info!("Player {} left ({} connected)", id, registry.len());
                }
            }
            RelayCommand::Inbound { id, msg } => {
                handle_message(&mut registry, &broadcast_tx, id, msg);
            }
        }
    }

    tracing::info!("Relay loop ended");
}

/// Route one decoded client message. Messages from a session that has
/// already been removed are dropped.
fn handle_message(
    registry: &mut SessionRegistry,
    broadcast_tx: &broadcast::Sender<RelayBroadcast>,
    id: u32,
    msg: ClientMsg,
) {
    match msg {
        ClientMsg::SetUsername { username } => {
            if registry.set_username(id, username.clone()) {
                let _ = broadcast_tx.send(RelayBroadcast {
                    scope: Scope::All,
                    msg: ServerMsg::PlayerUpdate(PlayerUpdateMsg {
                        player_id: id,
                        username,
                    }),
                });
            }
        }
        ClientMsg::PositionUpdate(update) => {
            if registry.apply_position(id, &update) {
                let _ = broadcast_tx.send(RelayBroadcast {
                    scope: Scope::Except(id),
                    msg: ServerMsg::PlayerPosition(PlayerPositionMsg {
                        player_id: id,
                        position: update.position,
                        rotation: update.rotation,
                        head_position: update.head_position,
                        left_hand_position: update.left_hand_position,
                        right_hand_position: update.right_hand_position,
                        is_vr: update.is_vr,
                    }),
                });
            }
        }
        ClientMsg::VjControl { control, value } => {
            // Unknown keys are never persisted but the echo still goes out
            // as-is, sender included, so every VJ console stays in step.
            if !registry.club_state.apply_control(&control, &value) {
                tracing::debug!("Player {} sent unpersisted vjControl key {:?}", id, control);
            }
            let _ = broadcast_tx.send(RelayBroadcast {
                scope: Scope::All,
                msg: ServerMsg::VjControl(VjControlMsg {
                    player_id: Some(id),
                    control,
                    value,
                }),
            });
        }
        ClientMsg::AudioSync(sync) => {
            registry.club_state.apply_audio_sync(
                sync.audio_url.clone(),
                sync.audio_time,
                sync.audio_playing,
            );
            let _ = broadcast_tx.send(RelayBroadcast {
                scope: Scope::All,
                msg: ServerMsg::AudioSync(AudioSyncMsg {
                    player_id: Some(id),
                    audio_url: sync.audio_url,
                    audio_time: sync.audio_time,
                    audio_playing: sync.audio_playing,
                }),
            });
        }
        ClientMsg::Chat { message } => {
            let Some(username) = registry.username_of(id).map(str::to_owned) else {
                return;
            };
            let _ = broadcast_tx.send(RelayBroadcast {
                scope: Scope::All,
                msg: ServerMsg::Chat(ChatMsg {
                    player_id: id,
                    username,
                    message,
                    timestamp: unix_millis(),
                }),
            });
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
