pub mod chat;
pub mod chat_message;
pub mod lead;
pub mod order;
pub mod order_item;
