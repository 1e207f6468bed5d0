pub mod api;
pub mod backend;
pub mod cache;
pub mod directory;
pub mod error;
pub mod kind;
pub mod normalize;
pub mod room;

pub use backend::SlackBackend;
pub use directory::{ChannelInfo, Directory};
pub use error::{SlackError, SlackResult};
pub use kind::{ChannelKind, RoomRef};
pub use room::{Room, RoomArgs};
