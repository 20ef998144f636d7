// src/api/handlers/mod.rs
pub mod billing_handler;
pub mod page_handler;
pub mod system_handler;
pub mod usage_handler;
pub mod webhook_handler;
