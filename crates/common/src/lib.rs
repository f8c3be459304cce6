//! Shared types for the nodewarden operator: error taxonomy, on-disk
//! layouts for the two workload mechanisms, the chain override registry
//! and logging setup.

pub mod chains;
pub mod error;
pub mod layout;
pub mod logging;
pub mod sys;

pub use error::{
    ConfigurationError, DataMigrationError, InstallError, RpcError, ServiceError, WardenError,
};
