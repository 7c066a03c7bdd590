// Public API
pub use models::{MessageProjection, MessageSender, ReplyPreview, RoomRecord};
pub use repository::{ChatStore, InMemoryChatStore, PostgresChatStore};

// Internal modules
mod models;
mod repository;
