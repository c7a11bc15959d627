//! Types shared between the club server and its clients.
//!
//! Everything here is part of the wire contract: the JSON protocol, the
//! authoritative [`club_state::ClubState`] record, and the small vector type
//! poses are reported in. TypeScript bindings for the browser front-end are
//! exported via ts-rs.

pub mod club_state;
pub mod protocol;
pub mod vec3;
