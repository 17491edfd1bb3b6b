pub mod flags;
mod handle;
mod queries;
mod schema;

pub use flags::SourceType;
pub use handle::{MailStore, SqliteStore};
