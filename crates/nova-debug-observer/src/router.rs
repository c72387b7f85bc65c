use std::collections::HashMap;

use tokio::sync::mpsc::{
    unbounded_channel, UnboundedReceiver, UnboundedSender, WeakUnboundedSender,
};
use tokio_util::sync::CancellationToken;

use crate::breakpoints::{BreakpointRegistry, SourcePosition};
use crate::config::ObserverConfig;
use crate::continuity::{Generation, Reconciliation, ValueMarkContinuityEngine};
use crate::error::{ObserverError, ObserverResult};
use crate::events::{BreakpointEvent, ChildrenMessage, LifecycleEvent, ObserverEvent};
use crate::frame::StackFrameResolver;
use crate::host::{BreakpointManager, DebugSession};

/// Lifecycle of the observed debug session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Started,
    Paused,
    Resumed,
    Stopped,
}

/// Cloneable sender the host uses to post events to a [`SessionEventRouter`].
///
/// While [`SessionEventRouter::run`] is going, the live handles are what keeps
/// the inbox open.
#[derive(Clone, Debug)]
pub struct ObserverHandle {
    tx: Option<UnboundedSender<ObserverEvent>>,
}

impl ObserverHandle {
    pub fn send(&self, event: impl Into<ObserverEvent>) -> ObserverResult<()> {
        let Some(tx) = &self.tx else {
            return Err(ObserverError::InboxClosed);
        };
        tx.send(event.into())
            .map_err(|_| ObserverError::InboxClosed)
    }
}

/// State that lives exactly as long as one debug session.
struct ObservedSession {
    session: Box<dyn DebugSession>,
    registry: BreakpointRegistry,
    continuity: ValueMarkContinuityEngine,
    resolver: StackFrameResolver,
}

/// Dispatches host events to the breakpoint registry and the continuity engine.
///
/// Events are processed one at a time, either directly through
/// [`SessionEventRouter::dispatch`] or from the inbox via
/// [`SessionEventRouter::run`] / [`SessionEventRouter::drain_pending`].
/// Children computed by the host re-enter through the same inbox, so no state
/// is ever touched concurrently.
pub struct SessionEventRouter {
    config: ObserverConfig,
    breakpoints: Box<dyn BreakpointManager>,
    state: SessionState,
    active: Option<ObservedSession>,
    generation: Generation,
    /// Held outside of [`SessionEventRouter::run`] so synchronous use never
    /// sees a closed inbox.
    own_tx: Option<UnboundedSender<ObserverEvent>>,
    /// Given to children sinks, which must not keep the inbox open.
    weak_tx: WeakUnboundedSender<ObserverEvent>,
    rx: UnboundedReceiver<ObserverEvent>,
}

impl SessionEventRouter {
    pub fn new(config: ObserverConfig, breakpoints: Box<dyn BreakpointManager>) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            config,
            breakpoints,
            state: SessionState::NoSession,
            active: None,
            generation: Generation::default(),
            weak_tx: tx.downgrade(),
            own_tx: Some(tx),
            rx,
        }
    }

    pub fn handle(&self) -> ObserverHandle {
        ObserverHandle {
            tx: self.own_tx.clone().or_else(|| self.weak_tx.upgrade()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    /// Breakpoints of the live session, if any.
    pub fn registry(&self) -> Option<&BreakpointRegistry> {
        self.active.as_ref().map(|active| &active.registry)
    }

    pub fn continuity(&self) -> Option<&ValueMarkContinuityEngine> {
        self.active.as_ref().map(|active| &active.continuity)
    }

    /// Hit counts of the live session; empty without one.
    pub fn hit_counts(&self) -> HashMap<SourcePosition, u32> {
        self.registry()
            .map(BreakpointRegistry::snapshot)
            .unwrap_or_default()
    }

    /// Processes events from the inbox until `shutdown` is cancelled or every
    /// [`ObserverHandle`] has been dropped, then returns the router.
    ///
    /// Children sinks do not count as handles, so children reported after the
    /// last handle is gone are dropped. Events still queued when the loop ends
    /// are processed before returning, and the returned router has an open
    /// inbox again.
    pub async fn run(mut self, shutdown: CancellationToken) -> Self {
        self.own_tx = None;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = self.rx.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => break,
                },
            }
        }
        self.drain_pending();
        self.reopen_inbox();
        self
    }

    fn reopen_inbox(&mut self) {
        if let Some(tx) = self.weak_tx.upgrade() {
            self.own_tx = Some(tx);
            return;
        }
        tracing::debug!(target: "nova.observer", "every observer handle was dropped; opening a new inbox");
        let (tx, rx) = unbounded_channel();
        self.weak_tx = tx.downgrade();
        self.own_tx = Some(tx);
        self.rx = rx;
    }

    /// Processes everything already queued in the inbox.
    pub fn drain_pending(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.dispatch(event);
            processed += 1;
        }
        processed
    }

    pub fn dispatch(&mut self, event: impl Into<ObserverEvent>) {
        match event.into() {
            ObserverEvent::Lifecycle(event) => self.on_lifecycle(event),
            ObserverEvent::Breakpoint(event) => self.on_breakpoint(event),
            ObserverEvent::Children {
                generation,
                message,
            } => self.on_children(generation, message),
        }
    }

    fn on_lifecycle(&mut self, event: LifecycleEvent) {
        tracing::debug!(target: "nova.observer", event = event.name(), state = ?self.state, "session event");
        match event {
            LifecycleEvent::ProcessStarted(session) => self.start_session(session),
            LifecycleEvent::SessionPaused => self.on_paused(),
            LifecycleEvent::SessionResumed => {
                if self.active.is_some() {
                    self.state = SessionState::Resumed;
                }
            }
            LifecycleEvent::SessionStopped => self.stop_session(),
            LifecycleEvent::SettingsChanged => {
                if let Some(active) = self.active.as_mut() {
                    active.continuity.on_settings_changed(active.session.as_mut());
                }
            }
            LifecycleEvent::ProcessStopped
            | LifecycleEvent::StackFrameChanged
            | LifecycleEvent::BeforeSessionResume => {}
        }
    }

    fn start_session(&mut self, session: Box<dyn DebugSession>) {
        if self.active.is_some() {
            tracing::warn!(
                target: "nova.observer",
                "process started while a session is still active; discarding its state"
            );
            self.stop_session();
        }

        let mut registry = BreakpointRegistry::new();
        for bp in self.breakpoints.all_breakpoints() {
            registry.add(bp);
        }
        tracing::info!(target: "nova.observer", breakpoints = registry.len(), "debug session started");

        self.active = Some(ObservedSession {
            session,
            registry,
            continuity: ValueMarkContinuityEngine::new(self.config.watches_in_variables),
            resolver: StackFrameResolver::new(),
        });
        self.state = SessionState::Started;
    }

    fn stop_session(&mut self) {
        let Some(mut active) = self.active.take() else {
            tracing::debug!(target: "nova.observer", "session stopped without an active session");
            return;
        };
        active.resolver.cancel_inflight();
        active.registry.clear();
        active.continuity.on_session_stop();
        self.state = SessionState::Stopped;
        tracing::info!(target: "nova.observer", "debug session stopped");
    }

    fn on_paused(&mut self) {
        let Some(active) = self.active.as_mut() else {
            tracing::debug!(target: "nova.observer", "pause without an active session");
            return;
        };
        self.state = SessionState::Paused;

        self.generation = self.generation.next();
        let generation = self.generation;
        active.continuity.begin_cycle(generation);

        let frame = match active
            .resolver
            .resolve(active.session.as_mut(), generation, &self.weak_tx)
        {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(target: "nova.observer", generation = %generation, error = %err, "skipping pause");
                return;
            }
        };

        active.registry.record_stop(&frame.position);
        match active
            .continuity
            .on_pause(&frame.method, active.session.as_mut())
        {
            Reconciliation::Reapplied { reapplied } => {
                tracing::debug!(target: "nova.observer", method = %frame.method, reapplied, "markup reconciled")
            }
            Reconciliation::FirstPause | Reconciliation::SameMethod => {}
        }
    }

    fn on_breakpoint(&mut self, event: BreakpointEvent) {
        let Some(active) = self.active.as_mut() else {
            tracing::debug!(
                target: "nova.observer",
                event = ?event,
                "breakpoint event without an active session; it will be picked up on session start"
            );
            return;
        };
        match event {
            BreakpointEvent::Added(bp) => active.registry.add(bp),
            BreakpointEvent::Removed(bp) => active.registry.remove(&bp),
            BreakpointEvent::Changed(bp) => active.registry.update(bp),
        }
    }

    fn on_children(&mut self, generation: Generation, message: ChildrenMessage) {
        let Some(active) = self.active.as_mut() else {
            tracing::debug!(target: "nova.observer", generation = %generation, "children arrived after the session ended");
            return;
        };
        match message {
            ChildrenMessage::Batch { values, last } => {
                active
                    .continuity
                    .on_children_computed(generation, &values, last);
            }
            ChildrenMessage::TooManyChildren { remaining } => {
                tracing::debug!(target: "nova.observer", generation = %generation, remaining, "frame has too many children");
            }
            ChildrenMessage::Error(message) => {
                let err = ObserverError::EvaluationFailure(message);
                tracing::warn!(target: "nova.observer", generation = %generation, error = %err, "children computation failed");
            }
        }
    }
}
