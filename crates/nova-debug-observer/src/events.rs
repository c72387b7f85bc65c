use std::fmt;

use crate::breakpoints::Breakpoint;
use crate::continuity::Generation;
use crate::frame::ChildValue;
use crate::host::DebugSession;

/// Session lifecycle notifications from the host.
pub enum LifecycleEvent {
    /// A debuggee process started; carries the session the observer attaches to.
    ProcessStarted(Box<dyn DebugSession>),
    ProcessStopped,
    SessionPaused,
    SessionResumed,
    SessionStopped,
    StackFrameChanged,
    BeforeSessionResume,
    SettingsChanged,
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::ProcessStarted(_) => "processStarted",
            LifecycleEvent::ProcessStopped => "processStopped",
            LifecycleEvent::SessionPaused => "sessionPaused",
            LifecycleEvent::SessionResumed => "sessionResumed",
            LifecycleEvent::SessionStopped => "sessionStopped",
            LifecycleEvent::StackFrameChanged => "stackFrameChanged",
            LifecycleEvent::BeforeSessionResume => "beforeSessionResume",
            LifecycleEvent::SettingsChanged => "settingsChanged",
        }
    }
}

impl fmt::Debug for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BreakpointEvent {
    Added(Breakpoint),
    Removed(Breakpoint),
    Changed(Breakpoint),
}

/// Output of an in-flight children computation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChildrenMessage {
    Batch { values: Vec<ChildValue>, last: bool },
    TooManyChildren { remaining: usize },
    Error(String),
}

#[derive(Debug)]
pub enum ObserverEvent {
    Lifecycle(LifecycleEvent),
    Breakpoint(BreakpointEvent),
    Children {
        generation: Generation,
        message: ChildrenMessage,
    },
}

impl From<LifecycleEvent> for ObserverEvent {
    fn from(event: LifecycleEvent) -> Self {
        ObserverEvent::Lifecycle(event)
    }
}

impl From<BreakpointEvent> for ObserverEvent {
    fn from(event: BreakpointEvent) -> Self {
        ObserverEvent::Breakpoint(event)
    }
}
