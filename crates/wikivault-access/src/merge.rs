//! Merging independently evolved copies of one AccessFile.
//!
//! Key lists are combined as a set keyed by generation public key: the union
//! is sorted by public key, runs of the same key collapse into one entry, and
//! the result is re-sorted chronologically. The outcome does not depend on
//! which side is local, and merging the same copy twice changes nothing.

use std::cmp::Ordering;

use wikivault_core::{RevisionEnd, RevisionId};

use crate::access_file::AccessFile;
use crate::error::{AccessError, Result};
use crate::key::AccessFileKey;

/// Total order over optional key bytes: `None` first, then shorter before
/// longer, then byte-wise.
pub fn compare_key_bytes(a: Option<&[u8]>, b: Option<&[u8]>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
    }
}

/// Refuse to merge two records that only share a page name.
pub fn check_identity(local: &AccessFile, incoming: &AccessFile) -> Result<()> {
    let mismatch = |field| AccessError::IdentityMismatch {
        page_name: local.page_name.clone(),
        field,
    };

    if local.filename != incoming.filename {
        return Err(mismatch("filename"));
    }
    if local.server_link != incoming.server_link {
        return Err(mismatch("serverLink"));
    }
    if local.page_name != incoming.page_name {
        return Err(mismatch("pageName"));
    }
    if let (Some(a), Some(b)) = (&local.owner_public_key, &incoming.owner_public_key) {
        if a != b {
            return Err(mismatch("ownerPublicKey"));
        }
    }
    if let (Some(a), Some(b)) = (&local.owner_private_key, &incoming.owner_private_key) {
        if a != b {
            return Err(mismatch("ownerPrivateKey"));
        }
    }

    // A private key on one side must belong to the public key on the other.
    let public = local.owner_public_key.or(incoming.owner_public_key);
    let private = local
        .owner_private_key
        .as_ref()
        .or(incoming.owner_private_key.as_ref());
    if let (Some(public), Some(private)) = (public, private) {
        if private.public_key() != public {
            return Err(mismatch("ownerPrivateKey"));
        }
    }

    Ok(())
}

/// Union two key lists, collapsing copies of the same generation.
pub fn merge_key_lists(a: &[AccessFileKey], b: &[AccessFileKey]) -> Vec<AccessFileKey> {
    let mut union: Vec<AccessFileKey> = a.iter().chain(b.iter()).cloned().collect();
    union.sort_by(|x, y| {
        compare_key_bytes(Some(x.public_key.as_ref()), Some(y.public_key.as_ref()))
    });

    let mut collapsed: Vec<AccessFileKey> = Vec::with_capacity(union.len());
    for key in union {
        match collapsed.last_mut() {
            Some(last) if last.public_key == key.public_key => last.absorb(&key),
            _ => collapsed.push(key),
        }
    }

    // Stable: generations with equal starts stay in public-key order.
    collapsed.sort_by(|x, y| x.revision_start.cmp(&y.revision_start));
    end_before_successor(&mut collapsed);
    collapsed
}

/// Make every used generation end before the next used one starts.
///
/// Copies that revoked independently can each stretch a shared generation
/// past the point where the other copy's successor took over. The later
/// generation wins the overlap. Expects `keys` sorted by start.
fn end_before_successor(keys: &mut [AccessFileKey]) {
    for i in 1..keys.len() {
        let Some(next_start) = keys[i].revision_start.id() else {
            continue;
        };
        let prev = &mut keys[i - 1];
        let Some(prev_start) = prev.revision_start.id() else {
            continue;
        };
        if next_start <= prev_start {
            continue;
        }
        let overlaps = match prev.revision_end {
            RevisionEnd::Unbounded => true,
            RevisionEnd::At(end) => end >= next_start,
        };
        if overlaps {
            prev.revision_end = RevisionEnd::At(RevisionId(next_start.0 - 1));
        }
    }
}

/// Merge `incoming` into `local`.
///
/// Aborts without touching `local` on an identity mismatch or if `incoming`
/// fails signature verification. Returns whether `local` changed.
pub fn merge_access_files(local: &mut AccessFile, incoming: &AccessFile) -> Result<bool> {
    check_identity(local, incoming)?;
    if !incoming.verify_keys() {
        tracing::warn!(page = %incoming.page_name, "refusing merge: incoming keys do not verify");
        return Err(AccessError::SignatureVerification {
            page_name: incoming.page_name.clone(),
        });
    }

    let mut changed = false;

    if local.owner_public_key.is_none() && incoming.owner_public_key.is_some() {
        local.owner_public_key = incoming.owner_public_key;
        changed = true;
    }
    if local.owner_private_key.is_none() && incoming.owner_private_key.is_some() {
        local.owner_private_key = incoming.owner_private_key.clone();
        changed = true;
    }

    for contact in &incoming.contact_list {
        changed |= local.add_contact(
            contact.nickname.clone(),
            contact.server_link.clone(),
            contact.level,
        );
    }

    let merged = merge_key_lists(&local.key_list, &incoming.key_list);
    if merged != local.key_list {
        local.key_list = merged;
        changed = true;
    }

    let active = local.key_list.iter().filter(|k| k.is_active()).count();
    if active > 1 {
        tracing::warn!(
            page = %local.page_name,
            active,
            "merge left several active generations; latest wins"
        );
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_file::ShareLevel;
    use proptest::prelude::*;
    use wikivault_core::{Keypair, RevisionEnd, RevisionId, RevisionStart};

    fn base() -> AccessFile {
        AccessFile::new("notes.txt", "S", "P1")
    }

    #[test]
    fn test_compare_key_bytes_total_order() {
        let short: &[u8] = &[9];
        let long: &[u8] = &[0, 0];
        let low: &[u8] = &[1, 2];
        let high: &[u8] = &[1, 3];

        assert_eq!(compare_key_bytes(None, None), Ordering::Equal);
        assert_eq!(compare_key_bytes(None, Some(short)), Ordering::Less);
        assert_eq!(compare_key_bytes(Some(short), None), Ordering::Greater);
        assert_eq!(compare_key_bytes(Some(short), Some(long)), Ordering::Less);
        assert_eq!(compare_key_bytes(Some(low), Some(high)), Ordering::Less);
        assert_eq!(compare_key_bytes(Some(low), Some(low)), Ordering::Equal);
    }

    #[test]
    fn test_merge_retired_generation_from_remote() {
        let a = base();
        let mut a_prime = a.clone();
        a_prime.revoke(RevisionId(50)).unwrap();

        let mut merged = a.clone();
        assert!(merge_access_files(&mut merged, &a_prime).unwrap());
        assert_eq!(merged.key_list.len(), 2);
        assert_eq!(merged.key_list[0].revision_end, RevisionEnd::At(RevisionId(50)));
        assert_eq!(merged.key_list[1].revision_start, RevisionStart::Unset);

        let snapshot = merged.key_list.clone();
        assert!(!merge_access_files(&mut merged, &a_prime).unwrap());
        assert_eq!(merged.key_list, snapshot);
    }

    #[test]
    fn test_merge_with_self_is_noop() {
        let mut a = base();
        a.revoke(RevisionId(5)).unwrap();
        let copy = a.clone();

        assert!(!merge_access_files(&mut a, &copy).unwrap());
        assert_eq!(a, copy);
    }

    #[test]
    fn test_different_owner_refuses_merge() {
        let mut a = base();
        let b = AccessFile::with_owner(&Keypair::generate(), "notes.txt", "S", "P1");
        let before = a.clone();

        let err = merge_access_files(&mut a, &b).unwrap_err();
        assert!(matches!(
            err,
            AccessError::IdentityMismatch { field: "ownerPublicKey", .. }
        ));
        assert_eq!(a, before);
    }

    #[test]
    fn test_different_filename_refuses_merge() {
        let mut a = base();
        let mut b = a.clone();
        b.filename = "other.txt".into();

        assert!(matches!(
            merge_access_files(&mut a, &b),
            Err(AccessError::IdentityMismatch { field: "filename", .. })
        ));
    }

    #[test]
    fn test_tampered_incoming_refuses_merge() {
        let mut a = base();
        let mut b = a.clone();
        b.revoke(RevisionId(9)).unwrap();
        b.key_list[1].public_key = Keypair::generate().public_key();
        let before = a.clone();

        assert!(matches!(
            merge_access_files(&mut a, &b),
            Err(AccessError::SignatureVerification { .. })
        ));
        assert_eq!(a, before);
    }

    #[test]
    fn test_read_only_copy_learns_owner_key() {
        let owner_copy = base();
        let mut reader = owner_copy.export_for(ShareLevel::Read);

        assert!(merge_access_files(&mut reader, &owner_copy).unwrap());
        assert!(reader.is_owned());
        assert!(reader.key_list[0].private_key.is_some());
        assert!(reader.verify_keys());
    }

    #[test]
    fn test_write_access_survives_merge_with_read_only() {
        let mut owner_copy = base();
        owner_copy.revoke(RevisionId(3)).unwrap();
        let reader = owner_copy.export_for(ShareLevel::Read);

        assert!(!merge_access_files(&mut owner_copy, &reader).unwrap());
        assert!(owner_copy.key_list.iter().all(|k| k.private_key.is_some()));
    }

    #[test]
    fn test_contact_lists_union() {
        let mut a = base();
        a.add_contact("carol", None, ShareLevel::Read);
        let mut b = a.clone();
        b.add_contact("dave", Some("https://elsewhere".into()), ShareLevel::Write);

        assert!(merge_access_files(&mut a, &b).unwrap());
        let names: Vec<_> = a.contact_list.iter().map(|c| c.nickname.as_str()).collect();
        assert_eq!(names, vec!["carol", "dave"]);
        assert_eq!(a.contact_level("dave"), Some(ShareLevel::Write));

        let mut c = a.clone();
        c.add_contact("carol", None, ShareLevel::Write);
        assert!(merge_access_files(&mut a, &c).unwrap());
        assert_eq!(a.contact_level("carol"), Some(ShareLevel::Write));
    }

    #[test]
    fn test_divergent_revocations_merge_to_valid_ranges() {
        let origin = base();
        let mut a = origin.clone();
        a.revoke(RevisionId(50)).unwrap();
        a.record_use(RevisionId(51));
        let mut b = origin;
        b.revoke(RevisionId(60)).unwrap();

        let mut ab = a.clone();
        merge_access_files(&mut ab, &b).unwrap();
        let mut ba = b.clone();
        merge_access_files(&mut ba, &a).unwrap();
        assert_eq!(ab.key_list, ba.key_list);

        assert_eq!(ab.key_list.len(), 3);
        assert_eq!(ab.key_list[0].revision_end, RevisionEnd::At(RevisionId(50)));
        assert_eq!(ab.key_list[1].revision_start, RevisionStart::At(RevisionId(51)));
        assert!(ab.validate_structure().is_ok());
        assert_eq!(ab.lookup_by_revision(RevisionId(51)).unwrap().public_key, a.key_list[1].public_key);
        assert_eq!(ab.lookup_by_revision(RevisionId(50)).unwrap().public_key, a.key_list[0].public_key);

        assert!(!merge_access_files(&mut ab, &b).unwrap());
    }

    #[test]
    fn test_used_generations_from_both_sides_do_not_overlap() {
        let origin = base();
        let mut a = origin.clone();
        a.revoke(RevisionId(10)).unwrap();
        a.record_use(RevisionId(11));
        let mut b = origin;
        b.revoke(RevisionId(20)).unwrap();
        b.record_use(RevisionId(21));

        merge_access_files(&mut a, &b).unwrap();
        assert!(a.validate_structure().is_ok());
        assert_eq!(a.key_list[1].revision_end, RevisionEnd::At(RevisionId(20)));
        assert_eq!(a.active_key().unwrap().revision_start, RevisionStart::At(RevisionId(21)));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Property tests
    // ─────────────────────────────────────────────────────────────────────

    #[derive(Debug, Clone)]
    enum Op {
        Revoke(u8),
        Write(u8),
        Strip,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u8..20).prop_map(Op::Revoke),
            (1u8..20).prop_map(Op::Write),
            Just(Op::Strip),
        ]
    }

    fn evolve(mut af: AccessFile, ops: &[Op]) -> AccessFile {
        let mut rev = 0u64;
        for op in ops {
            match op {
                Op::Revoke(step) => {
                    rev += u64::from(*step);
                    let _ = af.revoke(RevisionId(rev));
                }
                Op::Write(step) => {
                    rev += u64::from(*step);
                    af.record_use(RevisionId(rev));
                }
                Op::Strip => af = af.export_for(ShareLevel::Read),
            }
        }
        af
    }

    /// Like [`evolve`], but revisions start at `offset` and advance in even
    /// steps, so two copies with different offsets never share a revision.
    fn evolve_disjoint(mut af: AccessFile, ops: &[Op], offset: u64) -> AccessFile {
        let mut rev = offset;
        for op in ops {
            match op {
                Op::Revoke(step) => {
                    rev += 2 * u64::from(*step);
                    let _ = af.revoke(RevisionId(rev));
                }
                Op::Write(step) => {
                    rev += 2 * u64::from(*step);
                    af.record_use(RevisionId(rev));
                }
                Op::Strip => af = af.export_for(ShareLevel::Read),
            }
        }
        af
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_merge_output_validates(
            left in prop::collection::vec(op_strategy(), 0..6),
            right in prop::collection::vec(op_strategy(), 0..6),
        ) {
            let origin = base();
            let a = evolve_disjoint(origin.clone(), &left, 0);
            let b = evolve_disjoint(origin, &right, 1);

            let mut merged = a.clone();
            merge_access_files(&mut merged, &b).unwrap();
            prop_assert!(merged.validate_structure().is_ok());
        }

        #[test]
        fn prop_merge_commutes(
            left in prop::collection::vec(op_strategy(), 0..6),
            right in prop::collection::vec(op_strategy(), 0..6),
        ) {
            let origin = base();
            let a = evolve(origin.clone(), &left);
            let b = evolve(origin, &right);

            let mut ab = a.clone();
            merge_access_files(&mut ab, &b).unwrap();
            let mut ba = b.clone();
            merge_access_files(&mut ba, &a).unwrap();

            prop_assert_eq!(&ab.key_list, &ba.key_list);
            prop_assert_eq!(ab.owner_private_key.is_some(), ba.owner_private_key.is_some());
        }

        #[test]
        fn prop_merge_idempotent(
            left in prop::collection::vec(op_strategy(), 0..6),
            right in prop::collection::vec(op_strategy(), 0..6),
        ) {
            let origin = base();
            let a = evolve(origin.clone(), &left);
            let b = evolve(origin, &right);

            let mut merged = a.clone();
            merge_access_files(&mut merged, &b).unwrap();
            let once = merged.clone();

            prop_assert!(!merge_access_files(&mut merged, &b).unwrap());
            prop_assert!(!merge_access_files(&mut merged, &a).unwrap());
            prop_assert_eq!(merged, once);
        }

        #[test]
        fn prop_merged_keys_unique_and_sorted(
            left in prop::collection::vec(op_strategy(), 0..6),
            right in prop::collection::vec(op_strategy(), 0..6),
        ) {
            let origin = base();
            let mut a = evolve(origin.clone(), &left);
            let b = evolve(origin, &right);
            merge_access_files(&mut a, &b).unwrap();

            for pair in a.key_list.windows(2) {
                prop_assert!(pair[0].revision_start <= pair[1].revision_start);
            }
            let mut keys: Vec<_> = a.key_list.iter().map(|k| k.public_key).collect();
            let total = keys.len();
            keys.sort_by(|x, y| x.as_bytes().cmp(y.as_bytes()));
            keys.dedup();
            prop_assert_eq!(keys.len(), total);
        }
    }
}
