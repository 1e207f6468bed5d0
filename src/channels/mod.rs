pub mod traits;

pub use traits::{Handler, Identity, Message, MessageKind, Presence, PresenceStatus};
