pub mod care;
pub mod chat;
pub mod history;
pub mod identify;
