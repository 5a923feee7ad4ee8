pub mod auth;
pub mod commands;
pub mod context;
pub mod error;
pub mod models;
pub mod modules;
pub mod picker;
pub mod uploads;
pub mod utils;
pub mod workspace;

#[cfg(test)]
mod test_support;

pub use context::{AppContext, Backends, Capabilities};
pub use error::{AppError, AppResult};
