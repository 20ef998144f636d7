// src/repository/mod.rs
pub mod billing_customer_repository;
pub mod payment_repository;
pub mod subscription_repository;
pub mod usage_record_repository;
pub mod webhook_event_repository;
