//! # ivm-protocol
//!
//! Wire types shared by the real-time gateway and its collaborators:
//! the JSON event envelope, client/server control frames, roles and
//! room names, and the domain event catalogue.

pub mod client;
pub mod entities;
pub mod envelope;
pub mod events;
pub mod ids;
pub mod rooms;

pub use client::{ClientMessage, ClientMessageError};
pub use entities::{Company, Investment, Investor, InvestorActivity, User};
pub use envelope::{now_timestamp, Envelope, ServerMessage};
pub use events::{Audience, EventKind};
pub use ids::EntityId;
pub use rooms::{Role, RoomId};

/// Default heartbeat interval in seconds.
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Text sent in the `connection` frame on accept.
pub const CONNECTED_MESSAGE: &str = "Connected to real-time updates";

/// Text sent in the `error` frame for undecodable client frames.
pub const INVALID_MESSAGE_FORMAT: &str = "Invalid message format";
