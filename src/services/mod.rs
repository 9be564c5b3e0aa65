pub mod bookmark;
pub mod message_store;
