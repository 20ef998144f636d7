// tests/integration/mod.rs

mod billing_tests;
mod pages_tests;
mod webhook_tests;
