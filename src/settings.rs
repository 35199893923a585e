//! Settings source for the engine's enabled flag.
//!
//! The temporal engine observes a single boolean. To keep the per-frame
//! path free of repeated settings lookups, the engine registers a listener
//! once at initialize time and caches the flag; the provider pushes
//! changes instead of being polled.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// Listener invoked when the enabled flag changes.
pub type EnabledListener = Box<dyn Fn(bool) + Send + Sync>;

/// Handle for a registered listener, used to unregister at dispose time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Provider of the "temporal enabled" flag.
///
/// Supports both a pull (`temporal_enabled`) and a push (subscribe once,
/// unsubscribe at dispose) interface.
pub trait SettingsSource: Send + Sync {
    /// Current value of the enabled flag.
    fn temporal_enabled(&self) -> bool;

    /// Register a listener for flag changes. The listener is not invoked
    /// with the current value, only on subsequent changes.
    fn subscribe(&self, listener: EnabledListener) -> SubscriptionId;

    /// Remove a previously registered listener. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Settings source backed by an atomic flag, for hosts without a
/// configuration store and for tests.
pub struct StaticSettings {
    enabled: AtomicBool,
    listeners: Mutex<Vec<(SubscriptionId, EnabledListener)>>,
    next_id: AtomicU64,
}

impl StaticSettings {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Flip the flag and notify listeners on an actual change.
    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::SeqCst);
        if previous == enabled {
            return;
        }
        let listeners = self.listeners.lock().expect("settings listener lock");
        for (_, listener) in listeners.iter() {
            listener(enabled);
        }
    }
}

impl SettingsSource for StaticSettings {
    fn temporal_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn subscribe(&self, listener: EnabledListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .lock()
            .expect("settings listener lock")
            .push((id, listener));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners
            .lock()
            .expect("settings listener lock")
            .retain(|(listener_id, _)| *listener_id != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    #[test]
    fn test_pull_reflects_current_value() {
        let settings = StaticSettings::new(true);
        assert!(settings.temporal_enabled());
        settings.set_enabled(false);
        assert!(!settings.temporal_enabled());
    }

    #[test]
    fn test_push_notifies_on_change_only() {
        let settings = StaticSettings::new(false);
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        settings.subscribe(Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        settings.set_enabled(false); // no change, no callback
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        settings.set_enabled(true);
        settings.set_enabled(false);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let settings = StaticSettings::new(false);
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        let id = settings.subscribe(Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        settings.unsubscribe(id);
        settings.set_enabled(true);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // Unsubscribing twice is harmless.
        settings.unsubscribe(id);
    }
}
