use std::collections::HashSet;
use std::fmt;

use crate::frame::ChildValue;
use crate::host::{DebugSession, UiPanel};
use crate::markers::ValueId;

/// Sequence number of a pause resolution cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Outcome of [`ValueMarkContinuityEngine::on_pause`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reconciliation {
    /// First pause of the session; nothing to carry over yet.
    FirstPause,
    SameMethod,
    /// Execution moved to another method: markup of `reapplied` observed values
    /// was re-asserted and the panels were rebuilt.
    Reapplied { reapplied: usize },
}

/// Keeps value labels visible when the host rebuilds its variables tree for
/// a new method.
///
/// Tree nodes of a previous frame are never reused by the host, so the engine
/// remembers every value identity seen in the session and, on a method change,
/// re-asserts whatever markup the host's store holds for them.
#[derive(Debug)]
pub struct ValueMarkContinuityEngine {
    last_method: Option<String>,
    observed: HashSet<ValueId>,
    generation: Generation,
    watches_in_variables: bool,
}

impl ValueMarkContinuityEngine {
    pub fn new(watches_in_variables: bool) -> Self {
        Self {
            last_method: None,
            observed: HashSet::new(),
            generation: Generation::default(),
            watches_in_variables,
        }
    }

    /// Makes `generation` the only one whose children are accepted.
    pub fn begin_cycle(&mut self, generation: Generation) {
        self.generation = generation;
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Merges a batch of children into the observed set.
    ///
    /// Returns `false` when the batch belongs to a superseded cycle and was
    /// discarded.
    pub fn on_children_computed(
        &mut self,
        generation: Generation,
        batch: &[ChildValue],
        is_last: bool,
    ) -> bool {
        if generation != self.generation {
            tracing::debug!(
                target: "nova.observer",
                stale = %generation,
                current = %self.generation,
                values = batch.len(),
                "discarding children from a superseded pause"
            );
            return false;
        }

        let mut added = 0usize;
        for child in batch {
            if self.observed.insert(child.id) {
                added += 1;
                tracing::trace!(target: "nova.observer", value = %child.id, name = %child.name, "observed value");
            }
        }
        tracing::debug!(
            target: "nova.observer",
            generation = %generation,
            added,
            observed = self.observed.len(),
            last = is_last,
            "children computed"
        );
        true
    }

    pub fn on_pause(
        &mut self,
        current_method: &str,
        session: &mut dyn DebugSession,
    ) -> Reconciliation {
        let Some(last_method) = self.last_method.as_deref() else {
            self.last_method = Some(current_method.to_string());
            return Reconciliation::FirstPause;
        };
        if last_method == current_method {
            return Reconciliation::SameMethod;
        }

        tracing::debug!(
            target: "nova.observer",
            from = %last_method,
            to = %current_method,
            observed = self.observed.len(),
            "method changed; reapplying markup"
        );

        let markers = session.markers();
        let mut reapplied = 0usize;
        for value in &self.observed {
            if let Some(markup) = markers.get(*value) {
                tracing::trace!(target: "nova.observer", value = %value, text = %markup.text, "reapplying markup");
                markers.assert(*value, markup);
                reapplied += 1;
            }
        }

        session.rebuild_panels(self.panels());
        self.last_method = Some(current_method.to_string());

        tracing::info!(
            target: "nova.observer",
            method = %current_method,
            reapplied,
            "rebuilt debugger panels"
        );
        Reconciliation::Reapplied { reapplied }
    }

    /// Logs the markers the session currently holds.
    pub fn on_settings_changed(&self, session: &mut dyn DebugSession) {
        let markers = session.markers().all();
        tracing::debug!(target: "nova.observer", markers = markers.len(), "marker store refreshed");
        for (value, markup) in &markers {
            tracing::trace!(target: "nova.observer", value = %value, text = %markup.text, "marked value");
        }
    }

    pub fn on_session_stop(&mut self) {
        self.observed.clear();
        self.last_method = None;
    }

    pub fn last_method(&self) -> Option<&str> {
        self.last_method.as_deref()
    }

    pub fn is_observed(&self, value: ValueId) -> bool {
        self.observed.contains(&value)
    }

    pub fn observed_len(&self) -> usize {
        self.observed.len()
    }

    fn panels(&self) -> &'static [UiPanel] {
        if self.watches_in_variables {
            &[UiPanel::Variables]
        } else {
            &[UiPanel::Variables, UiPanel::Watches]
        }
    }
}
