//! Transcript ring: snapshot ingest, bounds, deterministic compaction.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use voxbrain_core::protocol::{Role, Utterance};
use voxbrain_core::transcript::TranscriptRing;

fn utt(role: Role, content: &str) -> Utterance {
    Utterance {
        role,
        content: content.into(),
    }
}

#[test]
fn snapshot_suffix_is_appended_once() {
    let mut ring = TranscriptRing::new(16, 4096);

    let snap1 = vec![utt(Role::Agent, "hello"), utt(Role::User, "hi")];
    ring.ingest_snapshot(&snap1, 10);
    assert_eq!(ring.len(), 2);

    // Re-delivering the same snapshot must not duplicate.
    ring.ingest_snapshot(&snap1, 20);
    assert_eq!(ring.len(), 2);

    let mut snap2 = snap1.clone();
    snap2.push(utt(Role::User, "one more thing"));
    ring.ingest_snapshot(&snap2, 30);
    assert_eq!(ring.len(), 3);
}

#[test]
fn stale_shorter_snapshot_ignored() {
    let mut ring = TranscriptRing::new(16, 4096);
    let snap = vec![
        utt(Role::Agent, "a"),
        utt(Role::User, "b"),
        utt(Role::Agent, "c"),
    ];
    ring.ingest_snapshot(&snap, 10);
    ring.ingest_snapshot(&snap[..1].to_vec(), 20);
    assert_eq!(ring.len(), 3);
}

#[test]
fn same_length_snapshot_revises_last_utterance() {
    let mut ring = TranscriptRing::new(16, 4096);
    ring.ingest_snapshot(&[utt(Role::User, "I need to resched")], 10);
    ring.ingest_snapshot(&[utt(Role::User, "I need to reschedule")], 20);

    let view = ring.view();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].text, "I need to reschedule");
}

#[test]
fn utterance_bound_triggers_compaction() {
    let mut ring = TranscriptRing::new(6, 100_000);

    let mut snap = Vec::new();
    for i in 0..10 {
        snap.push(utt(Role::User, &format!("line {i}")));
        ring.ingest_snapshot(&snap, i as u64);
    }

    assert!(ring.len() <= 6);
    assert!(ring.compactions() > 0);

    let view = ring.view();
    let summary = view.summary.unwrap();
    assert!(summary.contains("user: line 0"));
    // Tail stays verbatim.
    assert_eq!(view.items.last().unwrap().text, "line 9");
}

#[test]
fn compaction_is_deterministic() {
    let build = || {
        let mut ring = TranscriptRing::new(4, 64);
        let mut snap = Vec::new();
        for i in 0..12 {
            snap.push(utt(
                if i % 2 == 0 { Role::Agent } else { Role::User },
                &format!("utterance number {i}"),
            ));
            ring.ingest_snapshot(&snap, i as u64);
        }
        ring.view()
    };

    let a = build();
    let b = build();
    assert_eq!(a.summary, b.summary);
    assert_eq!(a.items, b.items);
}

#[test]
fn summary_minimizes_phone_numbers() {
    let mut ring = TranscriptRing::new(4, 32);
    let mut snap = Vec::new();
    snap.push(utt(Role::User, "my number is 5551234567 thanks"));
    for i in 0..6 {
        snap.push(utt(Role::Agent, &format!("noted {i}")));
        ring.ingest_snapshot(&snap, i as u64);
    }

    let summary = ring.view().summary.unwrap();
    assert!(summary.contains("...4567"), "summary was: {summary}");
    assert!(!summary.contains("5551234567"));
}
