pub mod app;
pub mod config;
pub mod conversation_log;
pub mod error;
pub mod formatter;
pub mod llm;
pub mod order_status;
pub mod orders;
pub mod phone;
pub mod pia_client;
pub mod prompting;
pub mod session_store;
pub mod types;
pub mod whatsapp;
