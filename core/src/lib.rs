pub mod config;
pub mod http;
pub mod logger;
pub mod symbol;
pub mod traits;
pub mod types;

pub use logger::*;
pub use symbol::{is_perpetual_swap, normalize_symbol};
pub use traits::*;
pub use types::*;
