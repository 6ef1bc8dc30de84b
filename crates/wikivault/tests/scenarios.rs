//! End-to-end scenarios for access records and their revocation.

use wikivault::access::{merge_access_files, AccessError};
use wikivault::core::Keypair;
use wikivault::{AccessFile, RevisionEnd, RevisionId, RevisionStart, RevokeOutcome, ShareLevel};
use wikivault_testkit::{SharingPair, SERVER};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn fresh_access_file_verifies() {
    let file = AccessFile::new("plan.txt", SERVER, "P1");
    assert!(file.verify_keys());
}

#[test]
fn replaced_public_key_fails_verification() {
    let mut file = AccessFile::new("plan.txt", SERVER, "P1");
    file.revoke(RevisionId(10)).unwrap();
    file.key_list[1].public_key = Keypair::generate().public_key();
    assert!(!file.verify_keys());
}

#[test]
fn revoke_at_fifty() {
    let mut af = AccessFile::new("plan.txt", SERVER, "P1");
    let outcome = af.revoke(RevisionId(50)).unwrap();

    assert_eq!(outcome, RevokeOutcome::Revoked { retired_at: RevisionId(50) });
    assert_eq!(af.key_list.len(), 2);
    assert_eq!(af.key_list[0].revision_end, RevisionEnd::At(RevisionId(50)));
    assert_eq!(af.key_list[1].revision_start, RevisionStart::Unset);

    let json = serde_json::to_value(&af).unwrap();
    assert_eq!(json["keyList"][0]["revisionEnd"], "50");
    assert_eq!(json["keyList"][1]["revisionStart"], "-1");
    assert_eq!(json["keyList"][1]["revisionEnd"], "-1");
}

#[test]
fn revoke_of_unused_generation_is_noop() {
    let mut af = AccessFile::new("plan.txt", SERVER, "P1");
    af.revoke(RevisionId(50)).unwrap();

    assert_eq!(af.revoke(RevisionId(60)).unwrap(), RevokeOutcome::NoOp);
    assert_eq!(af.key_list.len(), 2);
    assert_eq!(af.key_list[0].revision_end, RevisionEnd::At(RevisionId(50)));
}

#[test]
fn lookup_by_revision_after_revocations() {
    let mut af = AccessFile::new("plan.txt", SERVER, "P1");
    af.revoke(RevisionId(50)).unwrap();
    af.record_use(RevisionId(51));
    af.revoke(RevisionId(80)).unwrap();

    let gen0 = af.key_list[0].public_key;
    let gen1 = af.key_list[1].public_key;
    assert_eq!(af.lookup_by_revision(RevisionId(0)).unwrap().public_key, gen0);
    assert_eq!(af.lookup_by_revision(RevisionId(50)).unwrap().public_key, gen0);
    assert_eq!(af.lookup_by_revision(RevisionId(51)).unwrap().public_key, gen1);
    assert_eq!(af.lookup_by_revision(RevisionId(80)).unwrap().public_key, gen1);
    // The newest generation has not been used yet.
    assert!(af.lookup_by_revision(RevisionId(81)).is_none());
}

#[test]
fn merge_with_revoked_copy_twice() {
    init_tracing();
    let a = AccessFile::new("plan.txt", SERVER, "P1");
    let mut a_prime = a.clone();
    a_prime.revoke(RevisionId(50)).unwrap();

    let mut merged = a.clone();
    assert!(merge_access_files(&mut merged, &a_prime).unwrap());
    assert_eq!(merged.key_list.len(), 2);
    assert_eq!(merged.key_list[0].revision_end, RevisionEnd::At(RevisionId(50)));

    assert!(!merge_access_files(&mut merged, &a_prime).unwrap());
    assert_eq!(merged.key_list, a_prime.key_list);
}

#[test]
fn merge_refuses_different_owner() {
    let mut a = AccessFile::new("plan.txt", SERVER, "P1");
    let b = AccessFile::new("plan.txt", SERVER, "P1");
    let before = a.clone();

    let err = merge_access_files(&mut a, &b).unwrap_err();
    assert!(matches!(err, AccessError::IdentityMismatch { ref page_name, .. } if page_name == "P1"));
    assert_eq!(a, before);
}

#[test]
fn read_only_share_of_two_generations() {
    init_tracing();
    let mut pair = SharingPair::new();
    let af = pair.alice.add_new_file("plan.txt", "/", SERVER, "P1").unwrap();
    pair.alice.revoke(af, RevisionId(50)).unwrap();

    pair.alice
        .share_with_contacts(&[af], &["bob"], ShareLevel::Read)
        .unwrap();
    let report = pair.bob_receive();
    assert_eq!(report.added.len(), 1);
    assert!(report.rejected.is_empty());

    let imported = pair.bob.access_file(report.added[0]).unwrap();
    assert_eq!(imported.key_list.len(), 2);
    assert!(imported.key_list.iter().all(|k| k.private_key.is_none()));
    assert!(imported.owner_private_key.is_none());
    assert!(imported.verify_keys());
}
