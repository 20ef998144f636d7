// src/domain/mod.rs
pub mod billing_customer_model;
pub mod payment_model;
pub mod plan;
pub mod provider_event;
pub mod provider_objects;
pub mod subscription_model;
pub mod subscription_tier;
pub mod usage_record_model;
pub mod webhook_event_model;
