// src/lib.rs
pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod logging;
pub mod middleware;
pub mod pages;
pub mod repository;
pub mod service;
pub mod utils;

// Re-export commonly used types
pub use api::dto::common::ApiResponse;
pub use api::{build_router, AppState};
