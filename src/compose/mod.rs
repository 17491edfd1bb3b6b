//! Draft composition: the controller, its background loads, and the
//! process-wide save/send lane.

pub mod action;
pub mod attachments;
pub mod controller;
pub mod draft;
pub mod load;
pub mod queue;
mod save;
pub mod share;
pub mod shell;
mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use action::{infer_action, reply_recipients, ComposeAction, Recipients};
pub use attachments::{reconcile, AttachmentSet};
pub use controller::{ComposeContext, ComposeController, ComposeRequest, SavedSession};
pub use draft::{Draft, SourceMessage};
pub use load::{load_attachments, load_message, LoadTarget, LoadedMessage};
pub use queue::{SaveQueue, SaveTask, SaveTaskId};
pub use share::{ShareContent, ShareKind, ShareRequest, SharedFile};
pub use shell::{ComposeFields, ComposeShell, Notice};
