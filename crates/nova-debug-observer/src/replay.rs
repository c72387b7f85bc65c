//! Scripted host for replaying recorded debug sessions.
//!
//! [`ReplayHost`] and [`ScriptedFrame`] implement the host capability traits
//! over in-memory state; [`replay`] drives a [`SessionEventRouter`] through a
//! JSON [`Trace`] and summarises what the observer saw.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::breakpoints::{Breakpoint, SourcePosition};
use crate::config::ObserverConfig;
use crate::events::{BreakpointEvent, LifecycleEvent};
use crate::frame::{ChildValue, ChildrenSink, FrameCapabilities};
use crate::host::{BreakpointManager, DebugSession, UiPanel};
use crate::markers::{MarkerStore, SharedMarkerStore, ValueId, ValueMarkup};
use crate::router::SessionEventRouter;

/// A frame with fixed answers.
///
/// Children are delivered immediately unless the frame is [deferred], in
/// which case sinks are parked until [`ScriptedFrame::deliver_pending`].
///
/// [deferred]: ScriptedFrame::deferred
#[derive(Clone, Debug, Default)]
pub struct ScriptedFrame {
    method: Option<String>,
    position: Option<SourcePosition>,
    children: Vec<ChildValue>,
    error: Option<String>,
    deferred: bool,
    pending: Arc<Mutex<Vec<ChildrenSink>>>,
}

impl ScriptedFrame {
    pub fn new(method: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            method: Some(method.into()),
            position: Some(SourcePosition::new(file, line)),
            ..Self::default()
        }
    }

    /// A frame without source information, like a native method.
    pub fn native(method: impl Into<String>) -> Self {
        Self {
            method: Some(method.into()),
            ..Self::default()
        }
    }

    pub fn with_children(mut self, children: Vec<ChildValue>) -> Self {
        self.children = children;
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    /// Completes every parked children computation. Returns how many were
    /// still wanted by the observer.
    pub fn deliver_pending(&self) -> usize {
        let sinks: Vec<_> = self.pending.lock().drain(..).collect();
        sinks.iter().filter(|sink| self.deliver(sink)).count()
    }

    fn deliver(&self, sink: &ChildrenSink) -> bool {
        match &self.error {
            Some(message) => sink.set_error_message(message.clone()),
            None => sink.add_children(self.children.clone(), true),
        }
    }
}

impl FrameCapabilities for ScriptedFrame {
    fn method_name(&self) -> Option<String> {
        self.method.clone()
    }

    fn source_position(&self) -> Option<SourcePosition> {
        self.position.clone()
    }

    fn compute_children(&self, sink: ChildrenSink) {
        if self.deferred {
            self.pending.lock().push(sink);
        } else {
            self.deliver(&sink);
        }
    }
}

#[derive(Default)]
struct HostState {
    frame: Option<Arc<dyn FrameCapabilities>>,
    rebuilds: Vec<Vec<UiPanel>>,
}

/// In-memory debug session. Clones share state, so a test can keep a handle
/// after giving one to the router.
#[derive(Clone, Default)]
pub struct ReplayHost {
    state: Arc<Mutex<HostState>>,
    markers: SharedMarkerStore,
}

impl ReplayHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_frame(&self, frame: impl FrameCapabilities + 'static) {
        self.state.lock().frame = Some(Arc::new(frame));
    }

    pub fn clear_frame(&self) {
        self.state.lock().frame = None;
    }

    pub fn marker_store(&self) -> SharedMarkerStore {
        self.markers.clone()
    }

    pub fn rebuilds(&self) -> Vec<Vec<UiPanel>> {
        self.state.lock().rebuilds.clone()
    }

    pub fn rebuild_count(&self) -> usize {
        self.state.lock().rebuilds.len()
    }
}

impl DebugSession for ReplayHost {
    fn current_frame(&mut self) -> Option<Arc<dyn FrameCapabilities>> {
        self.state.lock().frame.clone()
    }

    fn markers(&mut self) -> &mut dyn MarkerStore {
        &mut self.markers
    }

    fn rebuild_panels(&mut self, panels: &[UiPanel]) {
        self.state.lock().rebuilds.push(panels.to_vec());
    }
}

/// Breakpoint manager whose contents can change while a router owns it.
#[derive(Clone, Debug, Default)]
pub struct SharedBreakpoints {
    inner: Arc<Mutex<Vec<Breakpoint>>>,
}

impl SharedBreakpoints {
    pub fn new(breakpoints: Vec<Breakpoint>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(breakpoints)),
        }
    }

    pub fn apply(&self, event: &BreakpointEvent) {
        let mut all = self.inner.lock();
        match event {
            BreakpointEvent::Added(bp) => all.push(bp.clone()),
            BreakpointEvent::Removed(bp) => all.retain(|existing| existing.id != bp.id),
            BreakpointEvent::Changed(bp) => {
                if let Some(existing) = all.iter_mut().find(|existing| existing.id == bp.id) {
                    *existing = bp.clone();
                }
            }
        }
    }
}

impl BreakpointManager for SharedBreakpoints {
    fn all_breakpoints(&self) -> Vec<Breakpoint> {
        self.inner.lock().clone()
    }
}

/// A recorded debug session.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    /// Breakpoints defined before the first event.
    #[serde(default)]
    pub breakpoints: Vec<Breakpoint>,
    pub events: Vec<TraceEvent>,
}

impl Trace {
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum TraceEvent {
    ProcessStarted,
    ProcessStopped,
    /// The session suspended. A missing method or position models a frame
    /// that cannot be resolved.
    #[serde(rename_all = "camelCase")]
    Paused {
        #[serde(default)]
        method: Option<String>,
        #[serde(default)]
        file: Option<String>,
        #[serde(default)]
        line: Option<u32>,
        #[serde(default)]
        children: Vec<ChildValue>,
        #[serde(default)]
        error: Option<String>,
    },
    Resumed,
    StackFrameChanged,
    BeforeSessionResume,
    SettingsChanged,
    Stopped,
    BreakpointAdded { breakpoint: Breakpoint },
    BreakpointRemoved { breakpoint: Breakpoint },
    BreakpointChanged { breakpoint: Breakpoint },
    /// The user labels a value in the current session.
    MarkValue { value: ValueId, markup: ValueMarkup },
    UnmarkValue { value: ValueId },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HitCountEntry {
    pub file: String,
    pub line: u32,
    pub hits: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    /// Hit counts right before the session ended, sorted by position.
    pub hit_counts: Vec<HitCountEntry>,
    pub panel_rebuilds: usize,
    pub reapplied_markup: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub sessions: Vec<SessionReport>,
}

struct LiveSession {
    host: ReplayHost,
}

impl LiveSession {
    fn report(&self, router: &SessionEventRouter) -> SessionReport {
        let mut hit_counts: Vec<_> = router
            .hit_counts()
            .into_iter()
            .map(|(position, hits)| HitCountEntry {
                file: position.file,
                line: position.line,
                hits,
            })
            .collect();
        hit_counts.sort_by(|a, b| (&a.file, a.line).cmp(&(&b.file, b.line)));
        SessionReport {
            hit_counts,
            panel_rebuilds: self.host.rebuild_count(),
            reapplied_markup: self.host.marker_store().assert_calls().len(),
        }
    }
}

/// Replays `trace` against a fresh router and reports one entry per session.
pub fn replay(trace: &Trace, config: &ObserverConfig) -> ReplayReport {
    let breakpoints = SharedBreakpoints::new(trace.breakpoints.clone());
    let mut router = SessionEventRouter::new(config.clone(), Box::new(breakpoints.clone()));
    let mut live: Option<LiveSession> = None;
    let mut report = ReplayReport::default();

    for event in &trace.events {
        match event {
            TraceEvent::ProcessStarted => {
                if let Some(previous) = live.take() {
                    report.sessions.push(previous.report(&router));
                }
                let host = ReplayHost::new();
                router.dispatch(LifecycleEvent::ProcessStarted(Box::new(host.clone())));
                live = Some(LiveSession { host });
            }
            TraceEvent::ProcessStopped => router.dispatch(LifecycleEvent::ProcessStopped),
            TraceEvent::Paused {
                method,
                file,
                line,
                children,
                error,
            } => {
                if let Some(session) = &live {
                    let mut frame = ScriptedFrame {
                        method: method.clone(),
                        position: file
                            .as_ref()
                            .zip(*line)
                            .map(|(file, line)| SourcePosition::new(file.clone(), line)),
                        ..ScriptedFrame::default()
                    }
                    .with_children(children.clone());
                    if let Some(message) = error {
                        frame = frame.with_error(message.clone());
                    }
                    session.host.set_frame(frame);
                }
                router.dispatch(LifecycleEvent::SessionPaused);
            }
            TraceEvent::Resumed => router.dispatch(LifecycleEvent::SessionResumed),
            TraceEvent::StackFrameChanged => router.dispatch(LifecycleEvent::StackFrameChanged),
            TraceEvent::BeforeSessionResume => {
                router.dispatch(LifecycleEvent::BeforeSessionResume)
            }
            TraceEvent::SettingsChanged => router.dispatch(LifecycleEvent::SettingsChanged),
            TraceEvent::Stopped => {
                if let Some(session) = live.take() {
                    report.sessions.push(session.report(&router));
                }
                router.dispatch(LifecycleEvent::SessionStopped);
            }
            TraceEvent::BreakpointAdded { breakpoint } => {
                apply_breakpoint(&mut router, &breakpoints, BreakpointEvent::Added(breakpoint.clone()))
            }
            TraceEvent::BreakpointRemoved { breakpoint } => apply_breakpoint(
                &mut router,
                &breakpoints,
                BreakpointEvent::Removed(breakpoint.clone()),
            ),
            TraceEvent::BreakpointChanged { breakpoint } => apply_breakpoint(
                &mut router,
                &breakpoints,
                BreakpointEvent::Changed(breakpoint.clone()),
            ),
            TraceEvent::MarkValue { value, markup } => {
                if let Some(session) = &live {
                    session.host.marker_store().mark(*value, markup.clone());
                }
            }
            TraceEvent::UnmarkValue { value } => {
                if let Some(session) = &live {
                    session.host.marker_store().unmark(*value);
                }
            }
        }
        router.drain_pending();
    }

    if let Some(session) = live.take() {
        report.sessions.push(session.report(&router));
    }
    report
}

fn apply_breakpoint(
    router: &mut SessionEventRouter,
    breakpoints: &SharedBreakpoints,
    event: BreakpointEvent,
) {
    breakpoints.apply(&event);
    router.dispatch(event);
}
