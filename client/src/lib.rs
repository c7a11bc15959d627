//! Client-side network manager for the club.
//!
//! Owns one outbound WebSocket connection on a background thread, throttles
//! outgoing pose traffic, and dispatches decoded server messages to the
//! presentation layer through the [`ClubEvents`] hooks. Nothing in here
//! renders anything; avatars and lighting are driven by collaborators behind
//! the [`presentation`] traits.

pub mod connection;
pub mod events;
pub mod presentation;
pub mod throttle;

pub use connection::{ConnectionState, NetworkManager};
pub use events::{ClubEvents, PlayerDelta};
pub use presentation::{AvatarPresenter, ClubVisuals, PresentationBridge};
