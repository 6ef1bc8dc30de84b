//! Persisted form of a keyring tree.
//!
//! A tree is written as one JSON document. Nested keyrings are embedded in
//! the entry of the record that backs them. A record reachable through more
//! than one entry is written in full the first time (tagged with a
//! `nodeId`) and as a `linkTo` that id afterwards, which also covers cycles.
//! Change and export flags are not persisted.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use wikivault_access::AccessFile;
use wikivault_core::SymmetricKey;

use crate::contact::ContactManager;
use crate::error::{KeyringError, Result};
use crate::graph::{AccessFileId, Keyring, KeyringGraph, KeyringId};
use crate::reference::{AccessFileReference, InboxReference, PageTarget, SymmetricReference};
use crate::root::RootKeyring;

/// A persisted keyring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyringDocument {
    pub name: String,

    #[serde(default)]
    pub symmetric_references: Vec<Reference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbox_reference_to_self: Option<Reference>,

    /// Root only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_manager: Option<ContactManager>,

    /// Root only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mounted_dir_mapping: Option<BTreeMap<String, String>>,
}

/// A persisted reference of any kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Reference {
    Symmetric(SymmetricDocument),
    AccessFile(AccessFileReferenceDocument),
    Inbox(InboxReference),
}

/// A persisted keyring entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymmetricDocument {
    pub name: String,
    pub page_name: String,
    pub server_link: String,
    pub symm_key: SymmetricKey,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_to: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_file: Option<AccessFile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_file_reference: Option<Box<Reference>>,
}

/// A persisted link from a record to the keyring it backs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessFileReferenceDocument {
    pub page_name: String,
    pub server_link: String,
    pub keyring: Box<KeyringDocument>,
}

fn malformed(reason: impl Into<String>) -> KeyringError {
    KeyringError::MalformedDocument(reason.into())
}

// ─────────────────────────────────────────────────────────────────────────────
// Writing
// ─────────────────────────────────────────────────────────────────────────────

struct Writer<'a> {
    graph: &'a KeyringGraph,
    nodes: HashMap<AccessFileId, u32>,
}

impl Writer<'_> {
    fn keyring(&mut self, id: KeyringId) -> KeyringDocument {
        let Some(keyring) = self.graph.keyring(id) else {
            tracing::warn!(keyring = ?id, "dangling keyring handle; writing empty keyring");
            return KeyringDocument {
                name: String::new(),
                symmetric_references: Vec::new(),
                inbox_reference_to_self: None,
                contact_manager: None,
                mounted_dir_mapping: None,
            };
        };

        let mut references = Vec::with_capacity(keyring.children.len());
        for child in &keyring.children {
            match self.entry(child) {
                Some(doc) => references.push(Reference::Symmetric(doc)),
                None => tracing::warn!(
                    keyring = %keyring.name,
                    child = %child.name,
                    "dangling access file handle; entry not written"
                ),
            }
        }

        KeyringDocument {
            name: keyring.name.clone(),
            symmetric_references: references,
            inbox_reference_to_self: keyring.inbox.clone().map(Reference::Inbox),
            contact_manager: None,
            mounted_dir_mapping: None,
        }
    }

    fn entry(&mut self, child: &SymmetricReference) -> Option<SymmetricDocument> {
        let mut doc = SymmetricDocument {
            name: child.name.clone(),
            page_name: child.target.page_name.clone(),
            server_link: child.target.server_link.clone(),
            symm_key: child.symm_key.clone(),
            node_id: None,
            link_to: None,
            access_file: None,
            access_file_reference: None,
        };

        if let Some(node) = self.nodes.get(&child.access_file) {
            doc.link_to = Some(*node);
            return Some(doc);
        }

        let file = self.graph.file(child.access_file)?;
        let node = self.nodes.len() as u32;
        self.nodes.insert(child.access_file, node);

        doc.node_id = Some(node);
        doc.access_file = Some(file.file.clone());
        doc.access_file_reference = file.backing.as_ref().map(|backing| {
            Box::new(Reference::AccessFile(AccessFileReferenceDocument {
                page_name: backing.target.page_name.clone(),
                server_link: backing.target.server_link.clone(),
                keyring: Box::new(self.keyring(backing.keyring)),
            }))
        });
        Some(doc)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reading
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Reader {
    graph: KeyringGraph,
    nodes: HashMap<u32, AccessFileId>,
}

impl Reader {
    fn keyring(&mut self, doc: &KeyringDocument) -> Result<KeyringId> {
        let inbox = match &doc.inbox_reference_to_self {
            None => None,
            Some(Reference::Inbox(inbox)) => Some(inbox.clone()),
            Some(_) => {
                return Err(malformed(format!(
                    "keyring {:?}: inboxReferenceToSelf is not an inbox reference",
                    doc.name
                )))
            }
        };
        let id = self.graph.insert_keyring(Keyring::new(doc.name.clone(), inbox));

        for reference in &doc.symmetric_references {
            let Reference::Symmetric(entry) = reference else {
                return Err(malformed(format!(
                    "keyring {:?}: children must be symmetric references",
                    doc.name
                )));
            };
            let file = self.entry(&doc.name, entry)?;

            let keyring = self
                .graph
                .keyring_mut(id)
                .ok_or_else(|| malformed("keyring vanished while reading"))?;
            if keyring.child(&entry.name).is_some() {
                return Err(malformed(format!(
                    "keyring {:?}: duplicate entry {:?}",
                    doc.name, entry.name
                )));
            }
            keyring.children.push(SymmetricReference {
                name: entry.name.clone(),
                target: PageTarget::new(entry.page_name.clone(), entry.server_link.clone()),
                symm_key: entry.symm_key.clone(),
                access_file: file,
                checked: false,
            });
        }
        Ok(id)
    }

    fn entry(&mut self, keyring: &str, entry: &SymmetricDocument) -> Result<AccessFileId> {
        if let Some(link) = entry.link_to {
            return self.nodes.get(&link).copied().ok_or_else(|| {
                malformed(format!(
                    "keyring {:?}: entry {:?} links to unknown node {}",
                    keyring, entry.name, link
                ))
            });
        }

        let (Some(node), Some(record)) = (entry.node_id, entry.access_file.as_ref()) else {
            return Err(malformed(format!(
                "keyring {:?}: entry {:?} has neither a record nor a link",
                keyring, entry.name
            )));
        };
        record
            .validate_structure()
            .map_err(|e| malformed(e.to_string()))?;

        let file = self.graph.insert_file(record.clone());
        if self.nodes.insert(node, file).is_some() {
            return Err(malformed(format!("node {} defined twice", node)));
        }

        match entry.access_file_reference.as_deref() {
            None => {}
            Some(Reference::AccessFile(backing)) => {
                let nested = self.keyring(&backing.keyring)?;
                if let Some(target) = self.graph.file_mut(file) {
                    target.backing = Some(AccessFileReference {
                        target: PageTarget::new(backing.page_name.clone(), backing.server_link.clone()),
                        keyring: nested,
                    });
                }
            }
            Some(_) => {
                return Err(malformed(format!(
                    "keyring {:?}: entry {:?} has a non access-file backing reference",
                    keyring, entry.name
                )))
            }
        }
        Ok(file)
    }
}

impl RootKeyring {
    /// The persisted form of this tree.
    pub fn to_document(&self) -> KeyringDocument {
        let mut writer = Writer {
            graph: &self.graph,
            nodes: HashMap::new(),
        };
        let mut doc = writer.keyring(self.root);
        doc.contact_manager = Some(self.contacts.clone());
        doc.mounted_dir_mapping = Some(self.mounted_dirs.clone());
        doc
    }

    /// Rebuild a tree from its persisted form.
    pub fn from_document(doc: &KeyringDocument) -> Result<Self> {
        let mut reader = Reader::default();
        let root = reader.keyring(doc)?;

        let mut graph = reader.graph;
        graph.recompute_parents(root);
        graph.clear_changed();

        Ok(RootKeyring::from_parts(
            graph,
            root,
            doc.mounted_dir_mapping.clone().unwrap_or_default(),
            doc.contact_manager.clone().unwrap_or_default(),
        ))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let doc: KeyringDocument = serde_json::from_str(json)?;
        Self::from_document(&doc)
    }
}
