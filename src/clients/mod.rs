pub mod chat;
pub mod email;

pub use chat::create_chat_client;
pub use email::create_email_client;
