pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod files;
pub mod history;
pub mod models;
pub mod presentation;
pub mod session;

pub use api::{ApiClient, CurrencyApi};
pub use error::ClientError;
