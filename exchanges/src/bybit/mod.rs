pub mod auth;
pub mod client;
pub mod mappers;
pub mod types;

pub use client::{BybitClient, BybitConfig};
