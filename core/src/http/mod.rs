pub mod auth;
pub mod client;
pub mod errors;

pub use auth::*;
pub use client::*;
pub use errors::*;
pub use reqwest;
