//! Database bootstrap, models and shared queries

pub mod init;
pub mod migrations;
pub mod models;
pub mod settings;
pub mod users;

pub use init::*;
pub use migrations::*;
pub use models::*;
pub use settings::*;
pub use users::*;
