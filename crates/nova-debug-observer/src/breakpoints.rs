use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Host-assigned breakpoint identity.
///
/// Stable for the lifetime of the breakpoint in the host, including across
/// location changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BreakpointId(pub u64);

impl fmt::Display for BreakpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A `(file, line)` pair. Lines are 1-based.
///
/// Used both as the location of a stop and as the registry key of a
/// breakpoint, so equal line numbers in different files never collide.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourcePosition {
    pub file: String,
    pub line: u32,
}

impl SourcePosition {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BreakpointKind {
    #[default]
    Line,
    /// Suspends on thrown exceptions rather than at a source line. Never tracked.
    Exception,
}

impl BreakpointKind {
    pub fn is_tracked(self) -> bool {
        matches!(self, BreakpointKind::Line)
    }
}

/// A breakpoint as defined in the host.
///
/// Exception breakpoints carry no source line; their `position` is a
/// placeholder and is left out of the serialized form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BreakpointRepr", into = "BreakpointRepr")]
pub struct Breakpoint {
    pub id: BreakpointId,
    pub position: SourcePosition,
    pub kind: BreakpointKind,
}

#[derive(Serialize, Deserialize)]
struct BreakpointRepr {
    id: BreakpointId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
    #[serde(default)]
    kind: BreakpointKind,
}

impl TryFrom<BreakpointRepr> for Breakpoint {
    type Error = String;

    fn try_from(repr: BreakpointRepr) -> Result<Self, Self::Error> {
        match (repr.kind, repr.file, repr.line) {
            (BreakpointKind::Exception, _, _) => Ok(Breakpoint::exception(repr.id.0)),
            (BreakpointKind::Line, Some(file), Some(line)) => {
                Ok(Breakpoint::line(repr.id.0, file, line))
            }
            (BreakpointKind::Line, _, _) => Err(format!(
                "line breakpoint {} needs both `file` and `line`",
                repr.id
            )),
        }
    }
}

impl From<Breakpoint> for BreakpointRepr {
    fn from(bp: Breakpoint) -> Self {
        let (file, line) = match bp.kind {
            BreakpointKind::Line => (Some(bp.position.file), Some(bp.position.line)),
            BreakpointKind::Exception => (None, None),
        };
        BreakpointRepr {
            id: bp.id,
            file,
            line,
            kind: bp.kind,
        }
    }
}

impl Breakpoint {
    pub fn line(id: u64, file: impl Into<String>, line: u32) -> Self {
        Self {
            id: BreakpointId(id),
            position: SourcePosition::new(file, line),
            kind: BreakpointKind::Line,
        }
    }

    pub fn exception(id: u64) -> Self {
        Self {
            id: BreakpointId(id),
            position: SourcePosition::new("", 0),
            kind: BreakpointKind::Exception,
        }
    }
}

/// Per-breakpoint hit counters.
#[derive(Debug, Default)]
pub struct HitCountLedger {
    counts: HashMap<SourcePosition, u32>,
}

impl HitCountLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) counting for `key` at zero.
    pub fn reset(&mut self, key: &SourcePosition) {
        self.counts.insert(key.clone(), 0);
    }

    /// Starts counting for `key` unless a counter already exists.
    pub fn ensure(&mut self, key: &SourcePosition) {
        self.counts.entry(key.clone()).or_insert(0);
    }

    pub fn increment(&mut self, key: &SourcePosition) -> Option<u32> {
        let count = self.counts.get_mut(key)?;
        *count = count.saturating_add(1);
        Some(*count)
    }

    pub fn remove(&mut self, key: &SourcePosition) -> Option<u32> {
        self.counts.remove(key)
    }

    pub fn get(&self, key: &SourcePosition) -> Option<u32> {
        self.counts.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SourcePosition, u32)> + '_ {
        self.counts.iter().map(|(key, count)| (key, *count))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

/// Breakpoints tracked for one debug session, keyed by source position.
///
/// A hit counter exists for a key exactly when a breakpoint is registered under
/// that key. Exception breakpoints are dropped on the way in.
#[derive(Debug, Default)]
pub struct BreakpointRegistry {
    breakpoints: HashMap<SourcePosition, Breakpoint>,
    /// Last key each host breakpoint was registered under.
    locations: HashMap<BreakpointId, SourcePosition>,
    hits: HitCountLedger,
}

impl BreakpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `bp` at its current position with a zeroed hit count.
    ///
    /// A different breakpoint already registered at the same position is
    /// replaced (last write wins).
    pub fn add(&mut self, bp: Breakpoint) {
        if !bp.kind.is_tracked() {
            tracing::trace!(target: "nova.observer", id = %bp.id, "ignoring exception breakpoint");
            return;
        }

        let id = bp.id;
        let key = bp.position.clone();

        if let Some(previous) = self.locations.insert(id, key.clone()) {
            if previous != key {
                self.evict(&previous, id);
            }
        }

        if let Some(replaced) = self.breakpoints.insert(key.clone(), bp) {
            if replaced.id != id {
                tracing::debug!(
                    target: "nova.observer",
                    position = %key,
                    replaced = %replaced.id,
                    id = %id,
                    "breakpoint replaced an existing breakpoint at the same position"
                );
                self.locations.remove(&replaced.id);
            }
        }

        self.hits.reset(&key);
        tracing::debug!(
            target: "nova.observer",
            id = %id,
            position = %key,
            total = self.breakpoints.len(),
            "breakpoint added"
        );
    }

    /// Drops the breakpoint registered at `bp`'s position together with its
    /// hit count, plus whatever `bp`'s identity was last registered under.
    pub fn remove(&mut self, bp: &Breakpoint) {
        if !bp.kind.is_tracked() {
            return;
        }

        if let Some(previous) = self.locations.remove(&bp.id) {
            if previous != bp.position {
                self.evict(&previous, bp.id);
            }
        }

        if let Some(removed) = self.breakpoints.remove(&bp.position) {
            self.hits.remove(&bp.position);
            if removed.id != bp.id {
                self.locations.remove(&removed.id);
            }
        }

        tracing::debug!(
            target: "nova.observer",
            id = %bp.id,
            position = %bp.position,
            total = self.breakpoints.len(),
            "breakpoint removed"
        );
    }

    /// Applies a host-side change to `bp`.
    ///
    /// If the breakpoint moved, the entry under its old position is removed and
    /// the breakpoint is re-added with a fresh hit count. Otherwise only the
    /// metadata is refreshed.
    pub fn update(&mut self, bp: Breakpoint) {
        if !bp.kind.is_tracked() {
            return;
        }

        match self.locations.get(&bp.id).cloned() {
            Some(previous) if previous == bp.position => {
                let key = bp.position.clone();
                self.breakpoints.insert(key.clone(), bp);
                self.hits.ensure(&key);
                tracing::debug!(target: "nova.observer", position = %key, "breakpoint changed");
            }
            Some(previous) => {
                tracing::debug!(
                    target: "nova.observer",
                    id = %bp.id,
                    from = %previous,
                    to = %bp.position,
                    "breakpoint moved"
                );
                self.evict(&previous, bp.id);
                self.locations.remove(&bp.id);
                self.add(bp);
            }
            None => self.add(bp),
        }
    }

    /// Counts a stop at `position`. Returns the new hit count when a
    /// breakpoint is registered there.
    pub fn record_stop(&mut self, position: &SourcePosition) -> Option<u32> {
        if !self.breakpoints.contains_key(position) {
            return None;
        }
        let count = self.hits.increment(position);
        if let Some(count) = count {
            tracing::info!(target: "nova.observer", position = %position, hits = count, "breakpoint hit");
        }
        count
    }

    pub fn hit_count(&self, key: &SourcePosition) -> Option<u32> {
        self.hits.get(key)
    }

    /// `(position, hit count)` for every registered breakpoint, in no
    /// particular order.
    pub fn snapshot(&self) -> HashMap<SourcePosition, u32> {
        self.hits
            .iter()
            .map(|(key, count)| (key.clone(), count))
            .collect()
    }

    pub fn get(&self, key: &SourcePosition) -> Option<&Breakpoint> {
        self.breakpoints.get(key)
    }

    pub fn contains(&self, key: &SourcePosition) -> bool {
        self.breakpoints.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    pub fn clear(&mut self) {
        self.breakpoints.clear();
        self.locations.clear();
        self.hits.clear();
    }

    /// Removes the entry at `key` only if it still belongs to `id`.
    fn evict(&mut self, key: &SourcePosition, id: BreakpointId) {
        if self.breakpoints.get(key).is_some_and(|bp| bp.id == id) {
            self.breakpoints.remove(key);
            self.hits.remove(key);
        }
    }
}
