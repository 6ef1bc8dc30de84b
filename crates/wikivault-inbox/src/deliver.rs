//! Sharing access records with contacts.

use wikivault_access::{AccessFile, ShareLevel};
use wikivault_core::RevisionId;
use wikivault_keyring::{AccessFileId, Contact, KeyringError, RootKeyring};
use wikivault_store::RevisionStore;

use crate::entry::InboxEntry;
use crate::error::{InboxError, Result};

/// One entry uploaded to a contact's inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub contact: String,
    /// Page name of the shared record.
    pub page_name: String,
    pub inbox_page: String,
    pub revision: RevisionId,
}

/// Result of a share.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareReport {
    pub deliveries: Vec<Delivery>,
}

impl ShareReport {
    pub fn delivered_count(&self) -> usize {
        self.deliveries.len()
    }
}

/// Upload `file`, exported at `level`, to `contact`'s inbox.
pub fn deliver<S: RevisionStore + ?Sized>(
    store: &S,
    sender: &str,
    contact: &Contact,
    file: &AccessFile,
    level: ShareLevel,
) -> Result<Delivery> {
    let page = &contact.inbox.target.page_name;
    let sealed = InboxEntry::new(sender, file, level).seal(&contact.inbox)?;
    let revision = store.upload(page, &sealed)?;

    tracing::debug!(
        contact = %contact.nickname,
        page = %file.page_name,
        inbox = %page,
        revision = %revision,
        ?level,
        "delivered access record"
    );
    Ok(Delivery {
        contact: contact.nickname.clone(),
        page_name: file.page_name.clone(),
        inbox_page: page.clone(),
        revision,
    })
}

/// Share each of `files` with each of `contacts` at `level`.
///
/// Every contact must be known before anything is delivered. Each shared
/// record gains the recipients in its contact list, at `level` or the
/// higher level they already held.
pub fn share_with_contacts<S: RevisionStore + ?Sized>(
    store: &S,
    root: &mut RootKeyring,
    files: &[AccessFileId],
    contacts: &[&str],
    level: ShareLevel,
) -> Result<ShareReport> {
    let recipients = contacts
        .iter()
        .map(|nickname| {
            root.contacts()
                .contact(nickname)
                .cloned()
                .ok_or_else(|| InboxError::UnknownContact(nickname.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    let sender = root.name().to_string();
    let mut report = ShareReport::default();

    for &id in files {
        let file = root
            .access_file(id)
            .cloned()
            .ok_or_else(|| KeyringError::MissingReference(format!("access file {:?}", id)))?;

        for contact in &recipients {
            report
                .deliveries
                .push(deliver(store, &sender, contact, &file, level)?);
        }

        let stale: Vec<_> = recipients
            .iter()
            .filter(|c| file.contact_level(&c.nickname).map_or(true, |held| held < level))
            .collect();
        if !stale.is_empty() {
            if let Some(record) = root.access_file_mut(id) {
                for contact in stale {
                    record.add_contact(
                        contact.nickname.clone(),
                        Some(contact.inbox.target.server_link.clone()),
                        level,
                    );
                }
            }
        }
    }

    tracing::info!(
        files = files.len(),
        contacts = recipients.len(),
        deliveries = report.delivered_count(),
        "shared access records"
    );
    Ok(report)
}
