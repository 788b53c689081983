//! Owner-facing services

pub mod secret_service;

pub use secret_service::SecretService;
