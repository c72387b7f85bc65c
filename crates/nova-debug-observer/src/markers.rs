use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Stable identity of a runtime value.
///
/// Issued by the host and unchanged across rebuilds of the variables tree,
/// unlike the tree nodes themselves. Two handles are the same value iff their
/// ids are equal; the displayed content plays no part.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueId(pub u64);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

/// A user-assigned label on a value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueMarkup {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<MarkupColor>,
}

impl ValueMarkup {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tooltip: None,
            color: None,
        }
    }
}

/// The host's persistent value-label store.
///
/// Lives as long as the debug session. The observer only reads entries and
/// re-asserts existing ones; it never invents labels.
pub trait MarkerStore: Send {
    fn get(&self, value: ValueId) -> Option<ValueMarkup>;

    /// Marks `value` with `markup`, making it visible in freshly built trees.
    fn assert(&mut self, value: ValueId, markup: ValueMarkup);

    fn all(&self) -> Vec<(ValueId, ValueMarkup)>;
}

/// Deterministic in-memory marker store.
#[derive(Debug, Default)]
pub struct InMemoryMarkerStore {
    markers: HashMap<ValueId, ValueMarkup>,
    /// Every `assert` call, in order.
    pub assert_calls: Vec<ValueId>,
}

impl InMemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unmark(&mut self, value: ValueId) -> Option<ValueMarkup> {
        self.markers.remove(&value)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

impl MarkerStore for InMemoryMarkerStore {
    fn get(&self, value: ValueId) -> Option<ValueMarkup> {
        self.markers.get(&value).cloned()
    }

    fn assert(&mut self, value: ValueId, markup: ValueMarkup) {
        self.assert_calls.push(value);
        self.markers.insert(value, markup);
    }

    fn all(&self) -> Vec<(ValueId, ValueMarkup)> {
        let mut all: Vec<_> = self
            .markers
            .iter()
            .map(|(id, markup)| (*id, markup.clone()))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }
}

/// Cloneable handle to an [`InMemoryMarkerStore`].
///
/// Lets a host hand the store to the observer while still labelling values
/// itself (the user marking a value in the UI).
#[derive(Clone, Debug, Default)]
pub struct SharedMarkerStore {
    inner: Arc<Mutex<InMemoryMarkerStore>>,
}

impl SharedMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self, value: ValueId, markup: ValueMarkup) {
        self.inner.lock().markers.insert(value, markup);
    }

    pub fn unmark(&self, value: ValueId) -> Option<ValueMarkup> {
        self.inner.lock().unmark(value)
    }

    pub fn assert_calls(&self) -> Vec<ValueId> {
        self.inner.lock().assert_calls.clone()
    }
}

impl MarkerStore for SharedMarkerStore {
    fn get(&self, value: ValueId) -> Option<ValueMarkup> {
        self.inner.lock().get(value)
    }

    fn assert(&mut self, value: ValueId, markup: ValueMarkup) {
        self.inner.lock().assert(value, markup);
    }

    fn all(&self) -> Vec<(ValueId, ValueMarkup)> {
        self.inner.lock().all()
    }
}
