//! The active attachment set of a draft and its reconciliation against the
//! source message's attachments.

use std::collections::{HashMap, HashSet};

use crate::error::{ComposeError, Result};
use crate::models::{Attachment, AttachmentId, MessageId};
use crate::store::flags::ATTACHMENT_FLAG_SMART_FORWARD;

/// Attachments the user currently wants on the draft.
///
/// Removing an attachment that is already persisted against the owning
/// draft queues its record for deletion; the caller drains that queue with
/// [`AttachmentSet::take_orphaned`].
#[derive(Debug, Clone, Default)]
pub struct AttachmentSet {
    items: Vec<Attachment>,
    owner: Option<MessageId>,
    orphaned: Vec<AttachmentId>,
}

impl AttachmentSet {
    pub fn items(&self) -> &[Attachment] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut [Attachment] {
        &mut self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The draft the persisted attachments belong to.
    pub fn owner(&self) -> Option<MessageId> {
        self.owner
    }

    pub(crate) fn bind(&mut self, owner: Option<MessageId>) {
        self.owner = owner;
    }

    /// Add after checking the upload limit. Oversized attachments are never
    /// part of the set.
    pub fn add(&mut self, attachment: Attachment, limit: u64) -> Result<()> {
        if attachment.size > limit {
            return Err(ComposeError::AttachmentTooLarge {
                filename: attachment.filename,
                size: attachment.size,
                limit,
            });
        }
        self.items.push(attachment);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Option<Attachment> {
        if index >= self.items.len() {
            return None;
        }
        let removed = self.items.remove(index);
        self.orphan(&removed);
        Some(removed)
    }

    pub fn take_orphaned(&mut self) -> Vec<AttachmentId> {
        std::mem::take(&mut self.orphaned)
    }

    fn orphan(&mut self, attachment: &Attachment) {
        if let Some(id) = attachment.id {
            if self.owner.is_some() && attachment.message_id == self.owner {
                self.orphaned.push(id);
            }
        }
    }
}

/// Bring the source message's attachments into (`include`) or out of the
/// active set. Filename is the only identity; two different files with the
/// same name are treated as one.
///
/// Included attachments are tagged smart-forward. Returns whether the set
/// changed.
pub fn reconcile(active: &mut AttachmentSet, source: &[Attachment], include: bool) -> bool {
    let mut changed = false;
    if include {
        let mut present: HashMap<String, usize> = active
            .items
            .iter()
            .enumerate()
            .map(|(i, a)| (a.filename.clone(), i))
            .collect();
        for attachment in source {
            if present.contains_key(&attachment.filename) {
                continue;
            }
            let mut inherited = attachment.clone();
            inherited.flags |= ATTACHMENT_FLAG_SMART_FORWARD;
            present.insert(inherited.filename.clone(), active.items.len());
            active.items.push(inherited);
            changed = true;
        }
    } else {
        let source_names: HashSet<&str> = source.iter().map(|a| a.filename.as_str()).collect();
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut active.items)
            .into_iter()
            .partition(|a| source_names.contains(a.filename.as_str()));
        active.items = kept;
        for attachment in &removed {
            active.orphan(attachment);
        }
        changed = !removed.is_empty();
    }
    changed
}
