// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::ids::UserId;

fn user() -> UserId {
    UserId::new("bob").unwrap()
}

#[tokio::test]
async fn subscriber_receives_published_events() {
    let bus = TerminalBus::default();
    let u = user();
    let mut rx = bus.subscribe(&u);
    bus.publish(&u, BusEvent::Output("hello".into()));
    match rx.recv().await.unwrap() {
        BusEvent::Output(s) => assert_eq!(s, "hello"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn publish_with_no_subscribers_does_not_panic() {
    let bus = TerminalBus::default();
    bus.publish(&user(), BusEvent::System("no one listening".into()));
}

#[tokio::test]
async fn each_user_gets_an_independent_channel() {
    let bus = TerminalBus::default();
    let alice = UserId::new("alice").unwrap();
    let bob = user();
    let mut alice_rx = bus.subscribe(&alice);
    let mut bob_rx = bus.subscribe(&bob);
    bus.publish(&alice, BusEvent::Output("for alice".into()));
    assert!(matches!(alice_rx.recv().await.unwrap(), BusEvent::Output(s) if s == "for alice"));
    assert!(bob_rx.try_recv().is_err());
}
