//! Wire protocol spoken with the speech backend
//!
//! Every frame body is a JSON object with a `type` discriminator.

mod inbound;
mod outbound;

pub use inbound::{DecodeError, InboundMessage, TurnAnnouncement};
pub use outbound::{AudioAnchors, OutboundMessage};
