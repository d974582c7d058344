// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn entry(uuid: &str, text: &str) -> ConversationEntry {
    ConversationEntry::user(
        "s1",
        uuid.to_string(),
        None,
        "2026-01-30T08:00:00.000Z".to_string(),
        text,
    )
}

#[test]
fn create_replaces_existing_overlay() {
    let store = VirtualConversationStore::new();
    let pid = ProjectId::new("-p");
    let sid = SessionId::new("s1");

    store.create(pid.clone(), sid.clone(), vec![entry("u1", "old")]);
    store.create(pid, sid.clone(), vec![entry("u2", "new")]);

    let entries = store.get_for_session(&sid).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].uuid.as_deref(), Some("u2"));
}

#[test]
fn append_creates_overlay_when_absent() {
    let store = VirtualConversationStore::new();
    let sid = SessionId::new("s1");
    store.append(ProjectId::new("-p"), sid.clone(), entry("u1", "hi"));
    store.append(ProjectId::new("-p"), sid.clone(), entry("u2", "again"));
    assert_eq!(store.get_for_session(&sid).unwrap().len(), 2);
}

#[test]
fn get_for_project_filters_by_project() {
    let store = VirtualConversationStore::new();
    store.create(ProjectId::new("-a"), SessionId::new("s1"), vec![entry("u1", "x")]);
    store.create(ProjectId::new("-b"), SessionId::new("s2"), vec![entry("u2", "y")]);

    let overlays = store.get_for_project(&ProjectId::new("-a"));
    assert_eq!(overlays.len(), 1);
    assert_eq!(overlays[0].0, SessionId::new("s1"));
}

#[test]
fn delete_removes_overlay() {
    let store = VirtualConversationStore::new();
    let sid = SessionId::new("s1");
    store.create(ProjectId::new("-p"), sid.clone(), vec![entry("u1", "x")]);
    store.delete(&sid);
    assert!(store.get_for_session(&sid).is_none());
}

#[test]
fn missing_session_reads_as_none() {
    let store = VirtualConversationStore::new();
    assert!(store.get_for_session(&SessionId::new("nope")).is_none());
}
