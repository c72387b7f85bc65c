use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::WeakUnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::breakpoints::SourcePosition;
use crate::continuity::Generation;
use crate::error::{ObserverError, ObserverResult};
use crate::events::{ChildrenMessage, ObserverEvent};
use crate::host::DebugSession;
use crate::markers::ValueId;

/// A child value of a stack frame as reported by the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildValue {
    pub id: ValueId,
    pub name: String,
}

impl ChildValue {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: ValueId(id),
            name: name.into(),
        }
    }
}

/// What the observer needs from one stack frame.
///
/// Each frame variant of the host (JVM frames, native frames, synthetic
/// frames, ...) implements this; variants that cannot answer return `None`.
pub trait FrameCapabilities: Send + Sync {
    fn method_name(&self) -> Option<String>;

    fn source_position(&self) -> Option<SourcePosition>;

    /// Starts computing the frame's children.
    ///
    /// Must not block. Results are streamed through `sink`, from any thread and
    /// at any later time, until a batch with `last = true` or an error has been
    /// reported.
    fn compute_children(&self, sink: ChildrenSink);
}

/// Receives children computed for one pause cycle.
///
/// Everything pushed into the sink is tagged with the cycle's generation and
/// delivered through the router's inbox, so results that arrive after a newer
/// pause are recognised as stale. When a newer pause supersedes the cycle the
/// sink is cancelled and further output is dropped.
///
/// The sink only holds a weak reference to the inbox; output produced after
/// the router stopped listening is dropped.
#[derive(Clone, Debug)]
pub struct ChildrenSink {
    generation: Generation,
    inbox: WeakUnboundedSender<ObserverEvent>,
    cancel: CancellationToken,
}

impl ChildrenSink {
    pub(crate) fn new(
        generation: Generation,
        inbox: WeakUnboundedSender<ObserverEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            generation,
            inbox,
            cancel,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Returns `false` once the computation has been superseded and the
    /// host should stop producing children.
    pub fn add_children(&self, values: Vec<ChildValue>, last: bool) -> bool {
        self.send(ChildrenMessage::Batch { values, last })
    }

    pub fn too_many_children(&self, remaining: usize) -> bool {
        self.send(ChildrenMessage::TooManyChildren { remaining })
    }

    pub fn set_error_message(&self, message: impl Into<String>) -> bool {
        self.send(ChildrenMessage::Error(message.into()))
    }

    pub fn is_obsolete(&self) -> bool {
        self.cancel.is_cancelled()
            || self.inbox.upgrade().is_none_or(|inbox| inbox.is_closed())
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn send(&self, message: ChildrenMessage) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let Some(inbox) = self.inbox.upgrade() else {
            return false;
        };
        inbox
            .send(ObserverEvent::Children {
                generation: self.generation,
                message,
            })
            .is_ok()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedFrame {
    pub method: String,
    pub position: SourcePosition,
}

pub fn resolve_frame(frame: &dyn FrameCapabilities) -> ObserverResult<ResolvedFrame> {
    let position = frame
        .source_position()
        .ok_or_else(|| ObserverError::unresolved("frame has no source position"))?;
    let method = frame
        .method_name()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ObserverError::unresolved("frame has no enclosing method"))?;
    Ok(ResolvedFrame { method, position })
}

/// Resolves the paused frame and keeps track of the in-flight children
/// computation.
#[derive(Debug, Default)]
pub struct StackFrameResolver {
    inflight: Option<CancellationToken>,
}

impl StackFrameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the session's current frame and starts computing its children
    /// for `generation`. Any computation from an earlier cycle is cancelled
    /// first, even when resolution fails.
    pub fn resolve(
        &mut self,
        session: &mut dyn DebugSession,
        generation: Generation,
        inbox: &WeakUnboundedSender<ObserverEvent>,
    ) -> ObserverResult<ResolvedFrame> {
        self.cancel_inflight();

        let frame = session
            .current_frame()
            .ok_or_else(|| ObserverError::unresolved("session has no current stack frame"))?;
        let resolved = resolve_frame(frame.as_ref())?;
        tracing::debug!(
            target: "nova.observer",
            method = %resolved.method,
            position = %resolved.position,
            generation = %generation,
            "resolved paused frame"
        );

        let token = CancellationToken::new();
        self.inflight = Some(token.clone());
        frame.compute_children(ChildrenSink::new(generation, inbox.clone(), token));

        Ok(resolved)
    }

    pub fn cancel_inflight(&mut self) {
        if let Some(token) = self.inflight.take() {
            token.cancel();
        }
    }

    pub fn has_inflight(&self) -> bool {
        self.inflight
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }
}
