mod bearer;
mod config;
mod error;
mod pdn_connection;
mod rate_limiter;

pub use bearer::*;
pub use config::*;
pub use error::*;
pub use pdn_connection::*;
pub use rate_limiter::*;
