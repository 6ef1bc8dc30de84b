//! Contacts and the mailboxes used to exchange access records.
//!
//! A [`Contact`] is a peer we can deliver to: we hold a write-only copy of
//! their mailbox. An [`OwnContact`] is a mailbox we created for one peer to
//! deliver to us; we hold its secret and remember how far we have read it.

use serde::{Deserialize, Serialize};

use wikivault_core::RevisionId;

use crate::reference::InboxReference;

/// A peer's mailbox we can deliver to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub nickname: String,
    pub inbox: InboxReference,
}

/// A mailbox we own, handed to one peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnContact {
    /// The peer expected to deliver here.
    pub nickname: String,
    pub inbox: InboxReference,

    /// Newest mailbox revision already processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<RevisionId>,
}

impl OwnContact {
    /// Move the read position forward. Never moves it back.
    pub fn advance(&mut self, rev: RevisionId) -> bool {
        match self.last_seen {
            Some(seen) if seen >= rev => false,
            _ => {
                self.last_seen = Some(rev);
                true
            }
        }
    }
}

/// Contacts of a root keyring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactManager {
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub own_contacts: Vec<OwnContact>,
}

impl ContactManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the contact named `contact.nickname`.
    ///
    /// A secret key on an incoming invitation is dropped; we only ever need
    /// to deliver to a peer's mailbox.
    pub fn add_contact(&mut self, mut contact: Contact) {
        contact.inbox = contact.inbox.to_write_only();
        match self.contacts.iter_mut().find(|c| c.nickname == contact.nickname) {
            Some(existing) => *existing = contact,
            None => self.contacts.push(contact),
        }
    }

    pub fn contact(&self, nickname: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.nickname == nickname)
    }

    pub fn remove_contact(&mut self, nickname: &str) -> Option<Contact> {
        let index = self.contacts.iter().position(|c| c.nickname == nickname)?;
        Some(self.contacts.remove(index))
    }

    /// Create a mailbox for `peer` to deliver to.
    ///
    /// Returns the invitation to hand to the peer: a write-only contact
    /// named `owner_name`, which the peer adds with
    /// [`ContactManager::add_contact`]. Calling again for the same peer
    /// returns the existing mailbox's invitation.
    pub fn create_own_contact(&mut self, peer: &str, owner_name: &str, server_link: &str) -> Contact {
        let inbox = match self.own_contact(peer) {
            Some(existing) => existing.inbox.clone(),
            None => {
                let inbox = InboxReference::generate(owner_name, server_link);
                tracing::info!(peer, page = %inbox.target.page_name, "created inbox");
                self.own_contacts.push(OwnContact {
                    nickname: peer.to_string(),
                    inbox: inbox.clone(),
                    last_seen: None,
                });
                inbox
            }
        };

        Contact {
            nickname: owner_name.to_string(),
            inbox: inbox.to_write_only(),
        }
    }

    pub fn own_contact(&self, nickname: &str) -> Option<&OwnContact> {
        self.own_contacts.iter().find(|c| c.nickname == nickname)
    }

    pub fn own_contact_mut(&mut self, nickname: &str) -> Option<&mut OwnContact> {
        self.own_contacts.iter_mut().find(|c| c.nickname == nickname)
    }

    /// Union with another copy by nickname, keeping local entries and the
    /// further read position.
    pub fn absorb(&mut self, other: &ContactManager) -> bool {
        let mut changed = false;
        for contact in &other.contacts {
            if self.contact(&contact.nickname).is_none() {
                self.contacts.push(contact.clone());
                changed = true;
            }
        }
        for own in &other.own_contacts {
            match self.own_contact_mut(&own.nickname) {
                Some(local) if local.inbox.public_key == own.inbox.public_key => {
                    if let Some(seen) = own.last_seen {
                        changed |= local.advance(seen);
                    }
                }
                Some(_) => tracing::warn!(
                    peer = %own.nickname,
                    "conflicting inbox for peer; keeping local"
                ),
                None => {
                    self.own_contacts.push(own.clone());
                    changed = true;
                }
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::AccessLevel;

    #[test]
    fn test_invitation_is_write_only() {
        let mut alice = ContactManager::new();
        let invitation = alice.create_own_contact("bob", "alice", "S");

        assert_eq!(invitation.nickname, "alice");
        assert_eq!(invitation.inbox.access, AccessLevel::WriteOnly);
        assert!(invitation.inbox.secret_key.is_none());

        let own = alice.own_contact("bob").unwrap();
        assert!(own.inbox.can_read());
        assert_eq!(own.inbox.public_key, invitation.inbox.public_key);
        assert_eq!(own.last_seen, None);
    }

    #[test]
    fn test_create_own_contact_is_stable() {
        let mut alice = ContactManager::new();
        let first = alice.create_own_contact("bob", "alice", "S");
        let second = alice.create_own_contact("bob", "alice", "S");

        assert_eq!(first, second);
        assert_eq!(alice.own_contacts.len(), 1);
    }

    #[test]
    fn test_add_contact_strips_secret() {
        let mut bob = ContactManager::new();
        let inbox = InboxReference::generate("alice", "S");
        bob.add_contact(Contact {
            nickname: "alice".into(),
            inbox,
        });

        let alice = bob.contact("alice").unwrap();
        assert!(alice.inbox.secret_key.is_none());
        assert!(bob.remove_contact("alice").is_some());
        assert!(bob.contact("alice").is_none());
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut alice = ContactManager::new();
        alice.create_own_contact("bob", "alice", "S");
        let own = alice.own_contact_mut("bob").unwrap();

        assert!(own.advance(RevisionId(5)));
        assert!(!own.advance(RevisionId(3)));
        assert_eq!(own.last_seen, Some(RevisionId(5)));
    }

    #[test]
    fn test_absorb_keeps_further_position() {
        let mut local = ContactManager::new();
        local.create_own_contact("bob", "alice", "S");
        let mut other = local.clone();
        other.own_contact_mut("bob").unwrap().advance(RevisionId(9));
        other.create_own_contact("carol", "alice", "S");

        assert!(local.absorb(&other));
        assert_eq!(local.own_contact("bob").unwrap().last_seen, Some(RevisionId(9)));
        assert!(local.own_contact("carol").is_some());
        assert!(!local.absorb(&other));
    }
}
