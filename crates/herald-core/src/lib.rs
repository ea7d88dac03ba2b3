//! Orchestration core for herald.
//!
//! This crate holds the pieces the rest of the system is wired from:
//! - typed chat/user/group identifiers and the abstract [`Update`] event
//! - the [`Transport`] seam the core sends and forwards through
//! - the [`RoutingTable`] binding each broadcast group to its initiator
//! - per-initiator conversation [`SessionState`]
//! - the [`ReplyRouter`] that forwards group replies back to initiators
//!
//! Nothing here touches the network; the transport crate produces `Update`s
//! and implements `Transport`.

mod error;
mod reply;
mod routing;
mod session;
mod transport;
mod types;

pub use error::{AlreadyClaimed, SendError};
pub use reply::ReplyRouter;
pub use routing::RoutingTable;
pub use session::{SessionState, SessionStore};
pub use transport::Transport;
pub use types::{ChatId, ChatInfo, ChatKind, GroupKey, GroupRef, ReplyTo, Update, UserId};
