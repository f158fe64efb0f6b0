//! Lifecycle observer registration.

use crate::core::{DialObserver, ErrorKind};

/// Notification delivered to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialEvent {
    /// Link up.
    Connected,
    /// Link torn down.
    Disconnected,
    /// Link failed.
    Error(ErrorKind),
}

/// Handle returned by [`ObserverRegistry::attach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Registered lifecycle observers, notified in attach order.
#[derive(Default)]
pub struct ObserverRegistry {
    next_id: u64,
    observers: Vec<(ObserverId, Box<dyn DialObserver>)>,
}

impl ObserverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer.
    pub fn attach(&mut self, observer: Box<dyn DialObserver>) -> ObserverId {
        self.next_id += 1;
        let id = ObserverId(self.next_id);
        self.observers.push((id, observer));
        id
    }

    /// Remove an observer. Returns it if it was registered.
    pub fn detach(&mut self, id: ObserverId) -> Option<Box<dyn DialObserver>> {
        let index = self
            .observers
            .iter()
            .position(|(registered, _)| *registered == id)?;
        Some(self.observers.remove(index).1)
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Check if no observers are registered.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver `event` to every observer.
    pub fn notify(&mut self, event: DialEvent) {
        for (_, observer) in &mut self.observers {
            match event {
                DialEvent::Connected => observer.connected(),
                DialEvent::Disconnected => observer.disconnected(),
                DialEvent::Error(kind) => observer.error(kind),
            }
        }
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.observers.len())
            .finish()
    }
}
