pub mod care;
pub mod chat;
pub mod identification;

pub use care::{CareCacheEntry, CareGuide};
pub use chat::{ChatMessage, Sender};
pub use identification::Identification;
