// Core utilities shared by every engine module

pub mod config;
pub mod error;
pub mod math;

pub use config::RuntimeConfig;
