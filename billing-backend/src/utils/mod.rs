// src/utils/mod.rs

pub mod error_helper;
pub mod jwt;
pub mod validation;
pub mod webhook_signature;
