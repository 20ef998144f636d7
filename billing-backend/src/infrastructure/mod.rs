// src/infrastructure/mod.rs
pub mod mock_gateway;
pub mod payment_gateway;
pub mod stripe_gateway;
