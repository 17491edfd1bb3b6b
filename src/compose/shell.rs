//! The UI side of a composition session, as seen from the controller.

use crate::address::Address;
use crate::models::Attachment;

use super::ComposeAction;

/// Editable field values exactly as the user sees them. Recipient fields are
/// free text; they are parsed on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeFields {
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub subject: String,
    pub body: String,
}

impl ComposeFields {
    pub fn to_addresses(&self) -> Vec<Address> {
        Address::parse(&self.to)
    }

    pub fn cc_addresses(&self) -> Vec<Address> {
        Address::parse(&self.cc)
    }

    pub fn bcc_addresses(&self) -> Vec<Address> {
        Address::parse(&self.bcc)
    }

    pub fn recipient_count(&self) -> usize {
        self.to_addresses().len() + self.cc_addresses().len() + self.bcc_addresses().len()
    }

    pub fn has_cc_or_bcc(&self) -> bool {
        !self.cc.trim().is_empty() || !self.bcc.trim().is_empty()
    }

    pub fn set_recipients(&mut self, to: &[Address], cc: &[Address], bcc: &[Address]) {
        self.to = Address::join(to);
        self.cc = Address::join(cc);
        self.bcc = Address::join(bcc);
    }
}

/// Advisory messages shown to the user (toasts).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Saved,
    /// Sending may wait on background download of attachments.
    SendDelayed,
    AttachmentTooLarge,
    Discarded,
    LoadFailed,
    SaveFailed,
    InvalidAddress,
    NoRecipients,
}

/// Implemented by the UI layer. Field values are pulled when needed, never
/// pushed. Calls may arrive from the save lane thread, so implementations
/// must be thread-safe and must not call back into the controller.
pub trait ComposeShell: Send + Sync {
    fn read_fields(&self) -> ComposeFields;
    fn write_fields(&self, fields: &ComposeFields);
    /// Enables or disables the explicit save action.
    fn needs_saving_changed(&self, needs_saving: bool);
    fn notify(&self, notice: Notice);
    fn show_quoted_text(&self, shown: bool, included: bool);
    fn show_cc_bcc(&self);
    /// The session is done (sent, discarded, or failed to load).
    fn close(&self);

    fn attachments_changed(&self, _attachments: &[Attachment]) {}
    fn action_changed(&self, _action: ComposeAction) {}
}
