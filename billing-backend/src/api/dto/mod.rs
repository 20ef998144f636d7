// src/api/dto/mod.rs
pub mod billing_dto;
pub mod common;
pub mod usage_dto;

// Re-export common response types
pub use common::{ApiResponse, PaginatedResponse, PaginationMeta};
