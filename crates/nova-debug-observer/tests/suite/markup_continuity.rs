use nova_debug_observer::replay::{ReplayHost, ScriptedFrame};
use nova_debug_observer::{
    Breakpoint, ChildValue, LifecycleEvent, MarkerStore, ObserverConfig, SessionEventRouter,
    SessionState, SourcePosition, UiPanel, ValueId, ValueMarkup,
};

use super::started_router;

fn pause_in(router: &mut SessionEventRouter, host: &ReplayHost, frame: ScriptedFrame) {
    host.set_frame(frame);
    router.dispatch(LifecycleEvent::SessionPaused);
    router.drain_pending();
}

#[test]
fn markup_follows_values_into_another_method() {
    let (mut router, host) = started_router(Vec::new());
    let markers = host.marker_store();

    pause_in(
        &mut router,
        &host,
        ScriptedFrame::new("foo", "Main.java", 4)
            .with_children(vec![ChildValue::new(1, "a"), ChildValue::new(2, "b")]),
    );
    assert_eq!(host.rebuild_count(), 0);

    markers.mark(ValueId(1), ValueMarkup::new("x"));

    pause_in(&mut router, &host, ScriptedFrame::new("bar", "Main.java", 11));
    assert_eq!(markers.assert_calls(), vec![ValueId(1)]);
    assert_eq!(markers.get(ValueId(1)), Some(ValueMarkup::new("x")));
    assert_eq!(markers.get(ValueId(2)), None);
    assert_eq!(
        host.rebuilds(),
        vec![vec![UiPanel::Variables, UiPanel::Watches]]
    );

    pause_in(&mut router, &host, ScriptedFrame::new("bar", "Main.java", 12));
    assert_eq!(host.rebuild_count(), 1);
}

#[test]
fn one_rebuild_per_distinct_method_transition() {
    let (mut router, host) = started_router(Vec::new());

    for (method, line) in [
        ("foo", 1),
        ("foo", 2),
        ("bar", 10),
        ("bar", 11),
        ("bar", 12),
        ("foo", 3),
        ("baz", 20),
    ] {
        pause_in(&mut router, &host, ScriptedFrame::new(method, "Main.java", line));
    }

    assert_eq!(host.rebuild_count(), 3);
}

#[test]
fn watches_in_variables_only_rebuilds_the_variables_panel() {
    let host = ReplayHost::new();
    let config = ObserverConfig {
        watches_in_variables: true,
        ..ObserverConfig::default()
    };
    let mut router = SessionEventRouter::new(config, Box::new(Vec::<Breakpoint>::new()));
    router.dispatch(LifecycleEvent::ProcessStarted(Box::new(host.clone())));

    pause_in(&mut router, &host, ScriptedFrame::new("foo", "Main.java", 1));
    pause_in(&mut router, &host, ScriptedFrame::new("bar", "Main.java", 2));

    assert_eq!(host.rebuilds(), vec![vec![UiPanel::Variables]]);
}

#[test]
fn superseded_children_are_not_observed() {
    let (mut router, host) = started_router(Vec::new());
    let markers = host.marker_store();

    let slow = ScriptedFrame::new("foo", "Main.java", 1)
        .with_children(vec![ChildValue::new(9, "late")])
        .deferred();
    pause_in(&mut router, &host, slow.clone());

    // A step lands in the same method before the first frame's children arrive.
    let fast = ScriptedFrame::new("foo", "Main.java", 2)
        .with_children(vec![ChildValue::new(3, "c")]);
    pause_in(&mut router, &host, fast);

    // The first computation was cancelled by the second pause.
    assert_eq!(slow.deliver_pending(), 0);
    router.drain_pending();

    let engine = router.continuity().expect("session is active");
    assert!(!engine.is_observed(ValueId(9)));
    assert!(engine.is_observed(ValueId(3)));

    markers.mark(ValueId(9), ValueMarkup::new("never seen"));
    markers.mark(ValueId(3), ValueMarkup::new("seen"));
    pause_in(&mut router, &host, ScriptedFrame::new("bar", "Main.java", 30));
    assert_eq!(markers.assert_calls(), vec![ValueId(3)]);
}

#[test]
fn stale_batches_are_dropped_even_if_the_host_ignores_cancellation() {
    let (mut router, host) = started_router(Vec::new());

    let slow = ScriptedFrame::new("foo", "Main.java", 1)
        .with_children(vec![ChildValue::new(9, "late")])
        .deferred();
    host.set_frame(slow.clone());
    router.dispatch(LifecycleEvent::SessionPaused);

    // Deliver into the inbox before the next pause is processed, but drain
    // only afterwards.
    assert_eq!(slow.deliver_pending(), 1);
    host.set_frame(ScriptedFrame::new("foo", "Main.java", 2));
    router.dispatch(LifecycleEvent::SessionPaused);
    router.drain_pending();

    let engine = router.continuity().expect("session is active");
    assert!(!engine.is_observed(ValueId(9)));
}

#[test]
fn evaluation_failures_keep_previous_observations() {
    let (mut router, host) = started_router(Vec::new());
    let markers = host.marker_store();

    pause_in(
        &mut router,
        &host,
        ScriptedFrame::new("foo", "Main.java", 1).with_children(vec![ChildValue::new(1, "a")]),
    );
    pause_in(
        &mut router,
        &host,
        ScriptedFrame::new("foo", "Main.java", 2).with_error("cannot evaluate toString()"),
    );

    markers.mark(ValueId(1), ValueMarkup::new("kept"));
    pause_in(&mut router, &host, ScriptedFrame::new("bar", "Main.java", 3));

    assert_eq!(markers.assert_calls(), vec![ValueId(1)]);
    assert_eq!(host.rebuild_count(), 1);
}

#[test]
fn unresolved_pause_does_not_count_as_a_method_transition() {
    let (mut router, host) = started_router(Vec::new());

    pause_in(&mut router, &host, ScriptedFrame::new("foo", "Main.java", 1));
    pause_in(&mut router, &host, ScriptedFrame::native("arraycopy"));
    pause_in(&mut router, &host, ScriptedFrame::new("foo", "Main.java", 2));

    assert_eq!(host.rebuild_count(), 0);
    assert_eq!(
        router.continuity().and_then(|engine| engine.last_method()),
        Some("foo")
    );
}

#[test]
fn session_stop_resets_continuity() {
    let (mut router, host) = started_router(Vec::new());
    pause_in(
        &mut router,
        &host,
        ScriptedFrame::new("foo", "Main.java", 1).with_children(vec![ChildValue::new(1, "a")]),
    );
    router.dispatch(LifecycleEvent::SessionStopped);

    let next = ReplayHost::new();
    router.dispatch(LifecycleEvent::ProcessStarted(Box::new(next.clone())));
    next.marker_store().mark(ValueId(1), ValueMarkup::new("x"));

    pause_in(&mut router, &next, ScriptedFrame::new("bar", "Main.java", 5));
    assert_eq!(next.rebuild_count(), 0);
    let engine = router.continuity().expect("session is active");
    assert!(!engine.is_observed(ValueId(1)));
}

#[test]
fn passive_lifecycle_events_leave_session_state_alone() {
    let (mut router, host) = started_router(vec![Breakpoint::line(1, "Main.java", 4)]);
    let markers = host.marker_store();
    let at_four = SourcePosition::new("Main.java", 4);

    pause_in(
        &mut router,
        &host,
        ScriptedFrame::new("foo", "Main.java", 4).with_children(vec![ChildValue::new(1, "a")]),
    );
    markers.mark(ValueId(1), ValueMarkup::new("x"));

    for event in [
        LifecycleEvent::SettingsChanged,
        LifecycleEvent::StackFrameChanged,
        LifecycleEvent::BeforeSessionResume,
        LifecycleEvent::ProcessStopped,
    ] {
        router.dispatch(event);
    }
    router.drain_pending();

    assert_eq!(router.state(), SessionState::Paused);
    assert_eq!(router.hit_counts().get(&at_four), Some(&1));
    assert_eq!(router.hit_counts().len(), 1);
    let engine = router.continuity().expect("session is active");
    assert!(engine.is_observed(ValueId(1)));
    assert_eq!(engine.observed_len(), 1);
    assert_eq!(engine.last_method(), Some("foo"));
    assert_eq!(host.rebuild_count(), 0);
    assert!(markers.assert_calls().is_empty());
    assert_eq!(markers.get(ValueId(1)), Some(ValueMarkup::new("x")));
}
