use std::collections::HashMap;
use std::time::Instant;

use vrclub_shared::club_state::ClubState;
use vrclub_shared::protocol::{PlayerWire, PositionUpdateMsg};
use vrclub_shared::vec3::Vec3;

/// Server-side record of one connected client.
///
/// The WebSocket task exclusively owns the transport half of the session;
/// this record holds the attributes other clients can see. It is created when
/// the connection is accepted and destroyed when the connection closes, so a
/// session and its connection always die together.
#[derive(Debug, Clone)]
pub struct PlayerSession {
    pub id: u32,
    pub username: String,
    pub position: Vec3,
    pub rotation: Vec3,
    pub head_position: Option<Vec3>,
    pub left_hand_position: Option<Vec3>,
    pub right_hand_position: Option<Vec3>,
    pub is_vr: bool,
    pub connected_at: Instant,
}

impl PlayerSession {
    fn new(id: u32) -> Self {
        Self {
            id,
            username: format!("Player{id}"),
            position: Vec3::default(),
            rotation: Vec3::default(),
            head_position: None,
            left_hand_position: None,
            right_hand_position: None,
            is_vr: false,
            connected_at: Instant::now(),
        }
    }

    pub fn to_wire(&self) -> PlayerWire {
        PlayerWire {
            id: self.id,
            username: self.username.clone(),
            position: self.position,
            rotation: self.rotation,
            head_position: self.head_position,
            left_hand_position: self.left_hand_position,
            right_hand_position: self.right_hand_position,
            is_vr: self.is_vr,
        }
    }
}

/// Authoritative session map plus the club state, owned by the relay actor.
/// All mutation happens on the actor task, one command at a time.
pub struct SessionRegistry {
    sessions: HashMap<u32, PlayerSession>,
    pub club_state: ClubState,
    next_session_id: u32,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            club_state: ClubState::default(),
            next_session_id: 1,
        }
    }

    /// Insert a fresh session and return its id. Ids are monotonically
    /// assigned for the lifetime of the process and never reused.
    pub fn add_session(&mut self) -> u32 {
        let id = self.next_session_id;
        self.next_session_id += 1;
        self.sessions.insert(id, PlayerSession::new(id));
        id
    }

    /// Remove a session. Returns `false` if it was already gone, which lets
    /// callers guarantee exactly-one `playerLeft` per session.
    pub fn remove_session(&mut self, id: u32) -> bool {
        self.sessions.remove(&id).is_some()
    }

    pub fn set_username(&mut self, id: u32, username: String) -> bool {
        match self.sessions.get_mut(&id) {
            Some(session) => {
                session.username = username;
                true
            }
            None => false,
        }
    }

    /// Overwrite the session's pose from a `positionUpdate`. The tracking
    /// vectors are replaced wholesale so that leaving VR clears them.
    pub fn apply_position(&mut self, id: u32, update: &PositionUpdateMsg) -> bool {
        match self.sessions.get_mut(&id) {
            Some(session) => {
                session.position = update.position;
                session.rotation = update.rotation;
                session.head_position = update.head_position;
                session.left_hand_position = update.left_hand_position;
                session.right_hand_position = update.right_hand_position;
                session.is_vr = update.is_vr;
                true
            }
            None => false,
        }
    }

    pub fn username_of(&self, id: u32) -> Option<&str> {
        self.sessions.get(&id).map(|s| s.username.as_str())
    }

    pub fn get(&self, id: u32) -> Option<&PlayerSession> {
        self.sessions.get(&id)
    }

    /// Public snapshot of every session except `exclude`, for the `welcome`
    /// catch-up message.
    pub fn snapshot_others(&self, exclude: u32) -> Vec<PlayerWire> {
        self.sessions
            .values()
            .filter(|s| s.id != exclude)
            .map(PlayerSession::to_wire)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
