//! Sharing, re-delivery and contact revocation between independent keyrings.

use wikivault::store::RevisionStore;
use wikivault::{RevisionStart, RevokeOutcome, ShareLevel};
use wikivault_testkit::{SharingPair, TestManager, SERVER};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Adds carol as a third party who can receive from alice.
fn add_carol(pair: &mut SharingPair) -> TestManager {
    let mut carol = pair.fixture.manager("carol");
    let invitation = carol.create_own_contact("alice").unwrap();
    pair.alice.add_contact(invitation).unwrap();
    carol
}

fn carol_receive(carol: &mut TestManager) -> wikivault::InboxReport {
    let root = carol.root().root_id();
    carol
        .update_keyring_with_new_inbox_page_entries("alice", root)
        .unwrap()
}

#[test]
fn recipient_reads_shared_content() {
    init_tracing();
    let mut pair = SharingPair::new();
    let file = pair.alice.add_new_file("plan.txt", "/", SERVER, "Plan").unwrap();
    let rev = pair.alice.write_content(file, b"first draft").unwrap();

    pair.alice
        .share_with_contacts(&[file], &["bob"], ShareLevel::Read)
        .unwrap();
    let report = pair.bob_receive();

    let bob_file = report.added[0];
    assert_eq!(pair.bob.read_content(bob_file, rev).unwrap(), b"first draft");
    assert!(pair.bob.write_content(bob_file, b"edit").is_err());
}

#[test]
fn write_share_lets_recipient_edit() {
    let mut pair = SharingPair::new();
    let file = pair.alice.add_new_file("plan.txt", "/", SERVER, "Plan").unwrap();
    pair.alice
        .share_with_contacts(&[file], &["bob"], ShareLevel::Write)
        .unwrap();
    let bob_file = pair.bob_receive().added[0];

    let rev = pair.bob.write_content(bob_file, b"bob was here").unwrap();
    assert_eq!(pair.alice.read_content(file, rev).unwrap(), b"bob was here");
}

#[test]
fn redelivery_is_idempotent() {
    let mut pair = SharingPair::new();
    let file = pair.alice.add_new_file("plan.txt", "/", SERVER, "Plan").unwrap();
    for _ in 0..3 {
        pair.alice
            .share_with_contacts(&[file], &["bob"], ShareLevel::Read)
            .unwrap();
    }

    let report = pair.bob_receive();
    assert_eq!(report.added.len(), 1);
    assert_eq!(report.unchanged, 2);
    assert_eq!(pair.bob.root().all_access_files().len(), 1);
}

#[test]
fn sharing_goes_both_ways() {
    let mut pair = SharingPair::new();
    let file = pair.bob.add_new_file("notes.txt", "/", SERVER, "Notes").unwrap();
    pair.bob
        .share_with_contacts(&[file], &["alice"], ShareLevel::Read)
        .unwrap();

    let report = pair.alice_receive();
    assert_eq!(report.added.len(), 1);
    let root = pair.alice.root().root_id();
    assert!(pair.alice.get_access_file("notes.txt", root).is_some());
}

#[test]
fn revoked_contact_cannot_read_new_content() {
    init_tracing();
    let mut pair = SharingPair::new();
    let mut carol = add_carol(&mut pair);

    let file = pair.alice.add_new_file("plan.txt", "/", SERVER, "Plan").unwrap();
    let r1 = pair.alice.write_content(file, b"v1").unwrap();
    pair.alice
        .share_with_contacts(&[file], &["bob", "carol"], ShareLevel::Read)
        .unwrap();
    let bob_file = pair.bob_receive().added[0];
    let carol_file = carol_receive(&mut carol).added[0];

    let report = pair.alice.revoke_contact(file, "carol", r1).unwrap();
    assert_eq!(report.delivered_count(), 1);
    assert_eq!(report.deliveries[0].contact, "bob");
    let record = pair.alice.access_file(file).unwrap();
    assert_eq!(record.contact_list.len(), 1);

    let r2 = pair.alice.write_content(file, b"v2").unwrap();
    assert_eq!(
        pair.alice.access_file(file).unwrap().key_list[1].revision_start,
        RevisionStart::At(r2)
    );

    let report = pair.bob_receive();
    assert!(report.rejected.is_empty());
    assert_eq!(pair.bob.access_file(bob_file).unwrap().key_list.len(), 2);
    assert_eq!(pair.bob.read_content(bob_file, r1).unwrap(), b"v1");
    assert_eq!(pair.bob.read_content(bob_file, r2).unwrap(), b"v2");

    assert_eq!(carol_receive(&mut carol).processed(), 0);
    assert_eq!(carol.read_content(carol_file, r1).unwrap(), b"v1");
    assert!(carol.read_content(carol_file, r2).is_err());
}

#[test]
fn revoked_contact_loses_unused_generation() {
    let mut pair = SharingPair::new();
    let mut carol = add_carol(&mut pair);

    let file = pair.alice.add_new_file("plan.txt", "/", SERVER, "Plan").unwrap();
    let r1 = pair.alice.write_content(file, b"v1").unwrap();
    assert_eq!(
        pair.alice.revoke(file, r1).unwrap(),
        RevokeOutcome::Revoked { retired_at: r1 }
    );
    // Both contacts now hold a generation nothing has been written with.
    pair.alice
        .share_with_contacts(&[file], &["bob", "carol"], ShareLevel::Read)
        .unwrap();
    let bob_file = pair.bob_receive().added[0];
    let carol_file = carol_receive(&mut carol).added[0];

    pair.alice.revoke_contact(file, "carol", r1).unwrap();
    let r2 = pair.alice.write_content(file, b"v2").unwrap();

    pair.bob_receive();
    assert_eq!(pair.bob.read_content(bob_file, r2).unwrap(), b"v2");
    assert!(pair.bob.access_file(bob_file).unwrap().validate_structure().is_ok());

    // Even treating her copy of that generation as the one used for r2,
    // carol cannot open it.
    let mut held = carol.access_file(carol_file).unwrap().clone();
    held.record_use(r2);
    let sealed = carol.store().revision("Plan", r2).unwrap().unwrap();
    assert!(held.open_content(r2, &sealed.content).is_err());
    assert!(carol.read_content(carol_file, r2).is_err());
}

#[test]
fn failed_revocation_keeps_sharing_list() {
    let mut pair = SharingPair::new();
    let file = pair.alice.add_new_file("plan.txt", "/", SERVER, "Plan").unwrap();
    let r1 = pair.alice.write_content(file, b"v1").unwrap();
    pair.alice
        .share_with_contacts(&[file], &["bob"], ShareLevel::Read)
        .unwrap();
    let bob_file = pair.bob_receive().added[0];

    // Bob passes his read-only copy back to alice, then tries to revoke her.
    pair.bob
        .share_with_contacts(&[bob_file], &["alice"], ShareLevel::Read)
        .unwrap();
    assert!(pair.bob.revoke_contact(bob_file, "alice", r1).is_err());

    let record = pair.bob.access_file(bob_file).unwrap();
    assert_eq!(record.contact_list.len(), 1);
    assert_eq!(record.contact_list[0].nickname, "alice");
    assert_eq!(record.key_list.len(), 1);
}

#[test]
fn write_contact_keeps_write_access_after_rotation() {
    let mut pair = SharingPair::new();
    let mut carol = add_carol(&mut pair);

    let file = pair.alice.add_new_file("plan.txt", "/", SERVER, "Plan").unwrap();
    let r1 = pair.alice.write_content(file, b"v1").unwrap();
    pair.alice
        .share_with_contacts(&[file], &["bob"], ShareLevel::Write)
        .unwrap();
    pair.alice
        .share_with_contacts(&[file], &["carol"], ShareLevel::Read)
        .unwrap();
    let bob_file = pair.bob_receive().added[0];
    carol_receive(&mut carol);

    pair.alice.revoke_contact(file, "carol", r1).unwrap();
    pair.alice.write_content(file, b"v2").unwrap();
    assert_eq!(
        pair.alice.access_file(file).unwrap().contact_level("bob"),
        Some(ShareLevel::Write)
    );

    assert!(pair.bob_receive().rejected.is_empty());
    let r3 = pair.bob.write_content(bob_file, b"bob after rotation").unwrap();
    assert_eq!(pair.alice.read_content(file, r3).unwrap(), b"bob after rotation");
}

#[test]
fn inbox_position_survives_reload() {
    let mut pair = SharingPair::new();
    let file = pair.alice.add_new_file("plan.txt", "/", SERVER, "Plan").unwrap();
    pair.alice
        .share_with_contacts(&[file], &["bob"], ShareLevel::Read)
        .unwrap();
    pair.bob_receive();
    pair.bob.save().unwrap();

    let mut bob = pair.fixture.reopen("bob");
    let root = bob.root().root_id();
    let report = bob
        .update_keyring_with_new_inbox_page_entries("alice", root)
        .unwrap();
    assert_eq!(report.processed(), 0);
}
