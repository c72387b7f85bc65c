mod hit_counts;
mod markup_continuity;

use nova_debug_observer::replay::ReplayHost;
use nova_debug_observer::{Breakpoint, LifecycleEvent, ObserverConfig, SessionEventRouter};

/// A router over `breakpoints` with a started session on a fresh host.
pub(crate) fn started_router(breakpoints: Vec<Breakpoint>) -> (SessionEventRouter, ReplayHost) {
    let host = ReplayHost::new();
    let mut router = SessionEventRouter::new(ObserverConfig::default(), Box::new(breakpoints));
    router.dispatch(LifecycleEvent::ProcessStarted(Box::new(host.clone())));
    (router, host)
}
