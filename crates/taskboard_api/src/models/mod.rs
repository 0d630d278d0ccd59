mod item;
mod push;
mod status;
mod timeline;
mod user;

pub use item::{Item, ItemId};
pub use push::{PushKind, PushMessage};
pub use status::Status;
pub use timeline::TimelineEvent;
pub use user::{AuthSession, UserProfile};
