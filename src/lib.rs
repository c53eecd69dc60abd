pub mod api;
pub mod config;
pub mod dispatch;
pub mod dispatcher;
pub mod error;
pub mod monitor;
pub mod registry;

pub use config::DispatcherConfig;
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, Result};
