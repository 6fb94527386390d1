//! Process-wide queue of user-visible errors.
//!
//! The pipeline appends, an external presenter drains. Records keep their
//! arrival order and are never deduplicated. The queue is unbounded unless a
//! `max_records` bound is configured, in which case the oldest record is
//! dropped to make room.

use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::auth::AuthStatus;
use crate::models::ErrorRecord;

pub struct ErrorSurface {
    records: Mutex<VecDeque<ErrorRecord>>,
    max_records: Option<usize>,
}

impl ErrorSurface {
    pub fn new(max_records: Option<usize>) -> Self {
        ErrorSurface {
            records: Mutex::new(VecDeque::new()),
            max_records,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Appends a record, evicting the oldest one when the bound is reached.
    /// Returns false when the bound is zero and nothing was queued.
    pub fn push(&self, record: ErrorRecord) -> bool {
        let mut records = self.records.lock().expect("error surface mutex poisoned");
        if let Some(max) = self.max_records {
            if max == 0 {
                return false;
            }
            while records.len() >= max {
                if let Some(evicted) = records.pop_front() {
                    warn!("Error surface full; dropping '{}'", evicted.message);
                }
            }
        }
        debug!(origin = %record.origin, "Queued error: {}", record.message);
        records.push_back(record);
        true
    }

    /// Appends a record unless a token refresh is pending.
    /// Returns whether the record was queued.
    pub fn push_unless_refreshing(&self, record: ErrorRecord, status: AuthStatus) -> bool {
        if status.is_refresh_pending() {
            debug!(
                origin = %record.origin,
                status = %status,
                "Dropping error during token refresh: {}",
                record.message
            );
            return false;
        }
        self.push(record)
    }

    /// Removes and returns every queued record, oldest first.
    pub fn drain(&self) -> Vec<ErrorRecord> {
        self.records
            .lock()
            .expect("error surface mutex poisoned")
            .drain(..)
            .collect()
    }

    /// Copies the queued records without removing them.
    pub fn snapshot(&self) -> Vec<ErrorRecord> {
        self.records
            .lock()
            .expect("error surface mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("error surface mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .expect("error surface mutex poisoned")
            .clear();
    }
}

impl Default for ErrorSurface {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ErrorOrigin;

    #[test]
    fn test_push_and_drain_keep_order() {
        let surface = ErrorSurface::unbounded();
        surface.push(ErrorRecord::graphql("first"));
        surface.push(ErrorRecord::network("second"));
        surface.push(ErrorRecord::graphql("first"));

        let drained = surface.drain();
        let messages: Vec<_> = drained.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["first", "[Network error]: second", "first"]
        );
        assert_eq!(drained[1].origin, ErrorOrigin::Network);
        assert!(surface.is_empty());
    }

    #[test]
    fn test_bound_evicts_oldest() {
        let surface = ErrorSurface::new(Some(2));
        surface.push(ErrorRecord::graphql("a"));
        surface.push(ErrorRecord::graphql("b"));
        surface.push(ErrorRecord::graphql("c"));
        let messages: Vec<_> = surface.snapshot().into_iter().map(|r| r.message).collect();
        assert_eq!(messages, vec!["b", "c"]);
    }

    #[test]
    fn test_zero_bound_keeps_nothing() {
        let surface = ErrorSurface::new(Some(0));
        assert!(!surface.push(ErrorRecord::graphql("a")));
        assert!(!surface.push_unless_refreshing(
            ErrorRecord::graphql("b"),
            AuthStatus::Authenticated
        ));
        assert!(surface.is_empty());
    }

    #[test]
    fn test_suppressed_while_refresh_pending() {
        let surface = ErrorSurface::unbounded();
        assert!(!surface.push_unless_refreshing(
            ErrorRecord::graphql("stale"),
            AuthStatus::RefreshRequested
        ));
        assert!(!surface.push_unless_refreshing(
            ErrorRecord::network("stale"),
            AuthStatus::Refreshing
        ));
        assert!(surface.is_empty());

        for status in [
            AuthStatus::Unauthenticated,
            AuthStatus::Authenticating,
            AuthStatus::Authenticated,
            AuthStatus::Done,
        ] {
            assert!(surface.push_unless_refreshing(ErrorRecord::graphql("shown"), status));
        }
        assert_eq!(surface.len(), 4);
    }

    #[test]
    fn test_clear() {
        let surface = ErrorSurface::unbounded();
        surface.push(ErrorRecord::graphql("a"));
        surface.clear();
        assert!(surface.drain().is_empty());
    }
}
