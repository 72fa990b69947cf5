pub mod chat;
pub mod reminder;
