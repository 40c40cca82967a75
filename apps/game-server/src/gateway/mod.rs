pub mod events;
pub mod room;
pub mod server;
pub mod session;
pub mod subscriber;

pub use events::{EventKind, MoveMessage};
pub use room::{Room, RoomError, RoomSettings};
pub use subscriber::{Subscriber, SubscriberSummary};
