//! Push channel: connection lifecycle, reconnect policy and the wire event type.

mod channel;
mod machine;
mod types;
mod ws;

pub use channel::{ChannelEvent, PushConnection, PushConnector, RealtimeChannel};
pub use machine::{ChannelMachine, ChannelState, CloseDecision, ReconnectPolicy};
pub use types::PushEvent;
pub use ws::WsConnector;

#[cfg(test)]
pub(crate) use channel::scripted;
