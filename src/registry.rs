use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

/// Process-wide mapping from a data source name to its connection handle
///
/// Constructed once and shared behind an `Arc`. One mutex guards every
/// operation.
#[derive(Debug)]
pub struct ConnectionRegistry<H> {
    handles: Mutex<HashMap<String, H>>,
}

impl<H> Default for ConnectionRegistry<H> {
    fn default() -> Self {
        ConnectionRegistry {
            handles: Mutex::new(HashMap::new()),
        }
    }
}

impl<H: Clone> ConnectionRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handle` under `name`, replacing any previous handle
    pub fn register(&self, name: impl Into<String>, handle: H) {
        let name = name.into();
        debug!(%name, "registering connection");
        self.handles.lock().insert(name, handle);
    }

    /// Removes `name`; removing an unknown name is a no-op
    pub fn deregister(&self, name: &str) -> Option<H> {
        self.handles.lock().remove(name)
    }

    pub fn lookup(&self, name: &str) -> Option<H> {
        self.handles.lock().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handles.lock().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.handles.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }

    pub fn clear(&self) {
        self.handles.lock().clear();
    }
}
