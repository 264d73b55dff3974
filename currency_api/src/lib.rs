mod routes;
mod storage;
mod validation;

pub mod app;
pub mod classifier;
pub mod config;
pub mod detection;
pub mod error;
pub mod prediction;
pub mod server;
pub mod store;
pub mod telemetry;

pub use app::start_app;
pub use storage::FileStorage;
