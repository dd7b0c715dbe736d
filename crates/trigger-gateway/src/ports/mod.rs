//! Ports layer for the trigger gateway.
//!
//! - Inbound (driving): `TriggerApi`, called by the HTTP routes
//! - Outbound (driven): the privileged operation, secret sources, time

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
