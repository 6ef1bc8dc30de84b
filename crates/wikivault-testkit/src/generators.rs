//! Proptest generators for property-based testing.

use proptest::prelude::*;

use wikivault_access::AccessFile;
use wikivault_core::{Keypair, RevisionId};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a revision id.
pub fn revision_id() -> impl Strategy<Value = RevisionId> {
    (0u64..100_000).prop_map(RevisionId)
}

/// Generate a keyring entry name.
pub fn entry_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_.-]{0,15}".prop_map(String::from)
}

/// Generate a page name.
pub fn page_name() -> impl Strategy<Value = String> {
    "[A-Z][A-Za-z0-9]{0,15}".prop_map(String::from)
}

/// Up to `max` strictly increasing revocation points.
pub fn revocation_points(max: usize) -> impl Strategy<Value = Vec<RevisionId>> {
    prop::collection::btree_set(1u64..10_000, 0..=max)
        .prop_map(|points| points.into_iter().map(RevisionId).collect())
}

/// An owned record revoked at each of `points` in order, with every new
/// generation used right after the revocation that created it.
///
/// `points` must be strictly increasing.
pub fn access_file_with_history(owner: &Keypair, points: &[RevisionId]) -> AccessFile {
    let mut file = AccessFile::with_owner(owner, "plan.txt", "S", "Plan");
    for point in points {
        file.revoke(*point).expect("owner revokes");
        file.record_use(RevisionId(point.0 + 1));
    }
    file
}

/// An owned record with a random revocation history.
pub fn access_file_history() -> impl Strategy<Value = AccessFile> {
    (keypair(), revocation_points(6))
        .prop_map(|(owner, points)| access_file_with_history(&owner, &points))
}
