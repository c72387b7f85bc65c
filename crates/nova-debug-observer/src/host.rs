use std::sync::Arc;

use crate::breakpoints::Breakpoint;
use crate::frame::FrameCapabilities;
use crate::markers::MarkerStore;

/// Panels of the host's debugger UI that the observer may ask to rebuild.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UiPanel {
    Variables,
    Watches,
}

/// The slice of a live debug session the observer needs.
///
/// Implemented by whichever concrete session type the host provides.
pub trait DebugSession: Send {
    /// Frame the session is currently suspended in, if any.
    fn current_frame(&mut self) -> Option<Arc<dyn FrameCapabilities>>;

    /// The session's live marker store.
    fn markers(&mut self) -> &mut dyn MarkerStore;

    /// Recreate the given panels from the current frame.
    fn rebuild_panels(&mut self, panels: &[UiPanel]);
}

/// Read access to the host's breakpoint manager.
pub trait BreakpointManager: Send {
    /// All breakpoints currently defined in the host, of every kind.
    fn all_breakpoints(&self) -> Vec<Breakpoint>;
}

impl BreakpointManager for Vec<Breakpoint> {
    fn all_breakpoints(&self) -> Vec<Breakpoint> {
        self.clone()
    }
}
