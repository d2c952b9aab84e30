//! In-process instrumentation.
//!
//! Recording is synchronous and never blocks: counters are atomics and the
//! event buffer is only written when its lock is free. Events that cannot
//! be buffered are counted in `dropped_events`.

use crate::config::DispatchMode;
use parking_lot::Mutex;
use serde::Serialize;
use sizhen_common::{CoordinationStatus, DiagnosisType};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MetricEvent {
    Coordination {
        coordination_id: String,
        mode: DispatchMode,
        status: CoordinationStatus,
        modalities: Vec<DiagnosisType>,
        duration_ms: u64,
    },
    Adapter {
        modality: DiagnosisType,
        success: bool,
        attempts: u32,
        duration_ms: u64,
    },
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub coordinations: u64,
    pub completed: u64,
    pub failed: u64,
    pub no_services: u64,
    pub adapter_successes: u64,
    pub adapter_failures: u64,
    pub dropped_events: u64,
}

#[derive(Debug)]
pub struct CoordinationMetrics {
    coordinations: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    no_services: AtomicU64,
    adapter_successes: AtomicU64,
    adapter_failures: AtomicU64,
    dropped_events: AtomicU64,
    events: Mutex<VecDeque<MetricEvent>>,
    capacity: usize,
}

impl Default for CoordinationMetrics {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl CoordinationMetrics {
    pub fn new(capacity: usize) -> Self {
        Self {
            coordinations: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            no_services: AtomicU64::new(0),
            adapter_successes: AtomicU64::new(0),
            adapter_failures: AtomicU64::new(0),
            dropped_events: AtomicU64::new(0),
            events: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_EVENT_CAPACITY))),
            capacity,
        }
    }

    pub fn record_coordination(
        &self,
        coordination_id: &str,
        mode: DispatchMode,
        status: CoordinationStatus,
        modalities: &[DiagnosisType],
        duration: Duration,
    ) {
        self.coordinations.fetch_add(1, Ordering::Relaxed);
        match status {
            CoordinationStatus::Completed => self.completed.fetch_add(1, Ordering::Relaxed),
            CoordinationStatus::Failed => self.failed.fetch_add(1, Ordering::Relaxed),
        };

        self.push(MetricEvent::Coordination {
            coordination_id: coordination_id.to_string(),
            mode,
            status,
            modalities: modalities.to_vec(),
            duration_ms: duration.as_millis() as u64,
        });
    }

    /// Count a request that selected no modality.
    pub fn record_no_services(&self) {
        self.coordinations.fetch_add(1, Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.no_services.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_adapter(
        &self,
        modality: DiagnosisType,
        success: bool,
        attempts: u32,
        duration: Duration,
    ) {
        let counter = if success {
            &self.adapter_successes
        } else {
            &self.adapter_failures
        };
        counter.fetch_add(1, Ordering::Relaxed);

        self.push(MetricEvent::Adapter {
            modality,
            success,
            attempts,
            duration_ms: duration.as_millis() as u64,
        });
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            coordinations: self.coordinations.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            no_services: self.no_services.load(Ordering::Relaxed),
            adapter_successes: self.adapter_successes.load(Ordering::Relaxed),
            adapter_failures: self.adapter_failures.load(Ordering::Relaxed),
            dropped_events: self.dropped_events.load(Ordering::Relaxed),
        }
    }

    /// Take every buffered event, oldest first.
    pub fn drain_events(&self) -> Vec<MetricEvent> {
        self.events.lock().drain(..).collect()
    }

    fn push(&self, event: MetricEvent) {
        if self.capacity == 0 {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let Some(mut events) = self.events.try_lock() else {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
            return;
        };

        if events.len() >= self.capacity {
            events.pop_front();
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
        events.push_back(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_track_outcomes() {
        let metrics = CoordinationMetrics::default();
        metrics.record_adapter(DiagnosisType::Looking, true, 1, Duration::from_millis(5));
        metrics.record_adapter(DiagnosisType::Palpation, false, 3, Duration::from_millis(9));
        metrics.record_coordination(
            "c1",
            DispatchMode::Parallel,
            CoordinationStatus::Completed,
            &[DiagnosisType::Looking],
            Duration::from_millis(20),
        );
        metrics.record_no_services();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.coordinations, 2);
        assert_eq!(snapshot.completed, 2);
        assert_eq!(snapshot.no_services, 1);
        assert_eq!(snapshot.adapter_successes, 1);
        assert_eq!(snapshot.adapter_failures, 1);
        assert_eq!(snapshot.dropped_events, 0);

        let events = metrics.drain_events();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[1],
            MetricEvent::Adapter { attempts: 3, success: false, .. }
        ));
        assert!(metrics.drain_events().is_empty());
    }

    #[test]
    fn full_buffer_drops_oldest() {
        let metrics = CoordinationMetrics::new(2);
        for attempts in 1..=3 {
            metrics.record_adapter(DiagnosisType::Inquiry, true, attempts, Duration::ZERO);
        }

        let events = metrics.drain_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], MetricEvent::Adapter { attempts: 2, .. }));
        assert_eq!(metrics.snapshot().dropped_events, 1);
    }

    #[test]
    fn contended_buffer_never_blocks() {
        let metrics = CoordinationMetrics::default();
        let _guard = metrics.events.lock();
        metrics.record_adapter(DiagnosisType::Listening, true, 1, Duration::ZERO);
        assert_eq!(metrics.snapshot().dropped_events, 1);
        assert_eq!(metrics.snapshot().adapter_successes, 1);
    }
}
