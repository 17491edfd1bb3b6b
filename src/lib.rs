pub mod address;
pub mod compose;
pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod transmit;

pub use compose::{
    ComposeAction, ComposeContext, ComposeController, ComposeFields, ComposeRequest,
    ComposeShell, Notice, SavedSession,
};
pub use config::ComposeConfig;
pub use error::{ComposeError, Result};
pub use store::{MailStore, SqliteStore};
pub use transmit::{OutboxHandle, Transmitter};
