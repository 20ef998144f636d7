// src/service/mod.rs
pub mod billing_service;
pub mod usage_service;
pub mod webhook_service;
