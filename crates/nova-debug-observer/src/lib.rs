//! Nova debugger session observer.
//!
//! This crate listens to a debug session's events and keeps two pieces of
//! session-scoped state consistent across pause/resume cycles:
//! - a registry of line breakpoints with a hit counter per breakpoint, and
//! - the user-assigned markup (labels) of inspected values, which is
//!   re-asserted whenever execution moves into a different method and the
//!   host rebuilds its variables tree.
//!
//! The host debugger is modelled by the capability traits in [`host`],
//! [`frame`] and [`markers`]. Everything is driven through a
//! [`router::SessionEventRouter`], which processes events serially.

pub mod breakpoints;
pub mod config;
pub mod continuity;
pub mod error;
pub mod events;
pub mod frame;
pub mod host;
pub mod markers;
pub mod replay;
pub mod router;

pub use crate::breakpoints::{
    Breakpoint, BreakpointId, BreakpointKind, BreakpointRegistry, HitCountLedger, SourcePosition,
};
pub use crate::config::{init_tracing, ConfigError, LoggingConfig, ObserverConfig};
pub use crate::continuity::{Generation, Reconciliation, ValueMarkContinuityEngine};
pub use crate::error::{ObserverError, ObserverResult};
pub use crate::events::{BreakpointEvent, ChildrenMessage, LifecycleEvent, ObserverEvent};
pub use crate::frame::{
    ChildValue, ChildrenSink, FrameCapabilities, ResolvedFrame, StackFrameResolver,
};
pub use crate::host::{BreakpointManager, DebugSession, UiPanel};
pub use crate::markers::{
    InMemoryMarkerStore, MarkerStore, MarkupColor, SharedMarkerStore, ValueId, ValueMarkup,
};
pub use crate::router::{ObserverHandle, SessionEventRouter, SessionState};
