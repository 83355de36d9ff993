// Domain module - Shared configuration model and error types
pub mod config;
pub mod error;
