use std::collections::HashMap;

use nova_debug_observer::replay::{ReplayHost, ScriptedFrame, SharedBreakpoints};
use nova_debug_observer::{
    Breakpoint, BreakpointEvent, LifecycleEvent, ObserverConfig, SessionEventRouter,
    SessionState, SourcePosition,
};

use super::started_router;

fn pause_at(router: &mut SessionEventRouter, host: &ReplayHost, method: &str, line: u32) {
    host.set_frame(ScriptedFrame::new(method, "Main.java", line));
    router.dispatch(LifecycleEvent::SessionPaused);
    router.drain_pending();
    router.dispatch(LifecycleEvent::SessionResumed);
}

fn at(line: u32) -> SourcePosition {
    SourcePosition::new("Main.java", line)
}

#[test]
fn pauses_are_counted_per_breakpoint_and_cleared_on_stop() {
    let (mut router, host) = started_router(vec![
        Breakpoint::line(1, "Main.java", 10),
        Breakpoint::line(2, "Main.java", 20),
    ]);

    pause_at(&mut router, &host, "main", 10);
    pause_at(&mut router, &host, "main", 10);
    pause_at(&mut router, &host, "main", 20);

    let expected: HashMap<_, _> = [(at(10), 2), (at(20), 1)].into_iter().collect();
    assert_eq!(router.hit_counts(), expected);

    router.dispatch(LifecycleEvent::SessionStopped);
    assert_eq!(router.state(), SessionState::Stopped);
    assert!(router.hit_counts().is_empty());
}

#[test]
fn hit_count_equals_number_of_stops_at_the_line() {
    let (mut router, host) = started_router(vec![Breakpoint::line(1, "Main.java", 7)]);

    let lines = [7, 8, 7, 9, 7, 7, 8];
    for line in lines {
        pause_at(&mut router, &host, "loop", line);
    }

    let stops_at_seven = lines.iter().filter(|line| **line == 7).count() as u32;
    assert_eq!(
        router.registry().and_then(|reg| reg.hit_count(&at(7))),
        Some(stops_at_seven)
    );
    assert_eq!(router.registry().and_then(|reg| reg.hit_count(&at(8))), None);
}

#[test]
fn breakpoint_crud_during_a_session() {
    let (mut router, host) = started_router(Vec::new());
    let bp = Breakpoint::line(5, "Main.java", 12);

    router.dispatch(BreakpointEvent::Added(bp.clone()));
    pause_at(&mut router, &host, "main", 12);
    pause_at(&mut router, &host, "main", 12);
    assert_eq!(router.hit_counts().get(&at(12)), Some(&2));

    router.dispatch(BreakpointEvent::Removed(bp.clone()));
    assert!(router.hit_counts().is_empty());

    router.dispatch(BreakpointEvent::Added(bp.clone()));
    assert_eq!(router.hit_counts().get(&at(12)), Some(&0));

    router.dispatch(BreakpointEvent::Changed(Breakpoint::line(5, "Main.java", 14)));
    let expected: HashMap<_, _> = [(at(14), 0)].into_iter().collect();
    assert_eq!(router.hit_counts(), expected);

    router.dispatch(BreakpointEvent::Added(Breakpoint::exception(6)));
    assert_eq!(router.hit_counts().len(), 1);
}

#[test]
fn unresolved_frames_do_not_count_or_corrupt_state() {
    let (mut router, host) = started_router(vec![Breakpoint::line(1, "Main.java", 3)]);
    pause_at(&mut router, &host, "main", 3);

    host.set_frame(ScriptedFrame::native("arraycopy"));
    router.dispatch(LifecycleEvent::SessionPaused);
    router.drain_pending();
    assert_eq!(router.state(), SessionState::Paused);

    host.clear_frame();
    router.dispatch(LifecycleEvent::SessionPaused);

    assert_eq!(router.hit_counts().get(&at(3)), Some(&1));

    pause_at(&mut router, &host, "main", 3);
    assert_eq!(router.hit_counts().get(&at(3)), Some(&2));
}

#[test]
fn state_does_not_leak_into_the_next_session() {
    let breakpoints = SharedBreakpoints::new(vec![Breakpoint::line(1, "Main.java", 3)]);
    let mut router =
        SessionEventRouter::new(ObserverConfig::default(), Box::new(breakpoints.clone()));

    let first = ReplayHost::new();
    router.dispatch(LifecycleEvent::ProcessStarted(Box::new(first.clone())));
    pause_at(&mut router, &first, "main", 3);
    router.dispatch(LifecycleEvent::SessionStopped);

    // Defined between sessions; only visible through the start-of-session scan.
    let added = BreakpointEvent::Added(Breakpoint::line(2, "Main.java", 9));
    breakpoints.apply(&added);
    router.dispatch(added);
    assert!(router.registry().is_none());

    let second = ReplayHost::new();
    router.dispatch(LifecycleEvent::ProcessStarted(Box::new(second.clone())));
    let expected: HashMap<_, _> = [(at(3), 0), (at(9), 0)].into_iter().collect();
    assert_eq!(router.hit_counts(), expected);
    assert_eq!(
        router.continuity().and_then(|engine| engine.last_method()),
        None
    );
}
