//! Bounded priority buffer for write-intents.

use crate::config::schema::{BufferConfig, PriorityTier};
use crate::observability::metrics;
use crate::sink::{PersistenceSink, WriteRecord};
use serde::Serialize;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
// Runtime clock, so paused-clock tests exercise retention.
use tokio::time::Instant;
use uuid::Uuid;

/// A buffered write-intent, owned by the buffer until synced or discarded.
#[derive(Debug, Clone)]
pub struct BufferedAction {
    pub id: Uuid,
    pub record: WriteRecord,
    /// Replay priority, derived from the originating event's severity.
    pub priority: PriorityTier,
    pub enqueued_at: Instant,
    pub retries: u32,
}

/// Result of one drain pass.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DrainReport {
    pub synced: usize,
    pub failed: usize,
    /// True when another drain held the gate and this pass did nothing.
    pub skipped: bool,
}

/// Aggregate counters for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct BufferStats {
    pub depth: usize,
    pub capacity: usize,
    pub by_priority: [usize; 4],
    pub evicted_total: u64,
    pub discarded_retry_total: u64,
    pub discarded_age_total: u64,
}

/// Durable fallback buffer.
///
/// Enqueue never blocks and never fails: at capacity the oldest entry of
/// the lowest present priority is evicted. A critical entry is never
/// evicted while a lower-priority entry remains.
///
/// The interior mutex guards in-memory bookkeeping only; drain performs
/// sink I/O with the lock released and re-acquires it to apply outcomes.
pub struct FallbackBuffer {
    config: BufferConfig,
    entries: Mutex<Vec<BufferedAction>>,
    /// Serializes drain passes without blocking enqueue.
    drain_gate: tokio::sync::Mutex<()>,
    evicted: AtomicU64,
    discarded_retry: AtomicU64,
    discarded_age: AtomicU64,
}

impl FallbackBuffer {
    pub fn new(config: BufferConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(Vec::new()),
            drain_gate: tokio::sync::Mutex::new(()),
            evicted: AtomicU64::new(0),
            discarded_retry: AtomicU64::new(0),
            discarded_age: AtomicU64::new(0),
        }
    }

    /// Queue a write-intent. Always succeeds; may evict.
    pub fn enqueue(&self, record: WriteRecord, severity: PriorityTier) -> Uuid {
        let action = BufferedAction {
            id: Uuid::new_v4(),
            record,
            priority: severity,
            enqueued_at: Instant::now(),
            retries: 0,
        };
        let id = action.id;

        let depth = {
            let mut entries = self.lock_entries();
            entries.push(action);
            while entries.len() > self.config.capacity {
                self.evict_locked(&mut entries);
            }
            entries.len()
        };
        metrics::record_buffer_depth(depth);
        id
    }

    /// Evict the oldest entry of the lowest priority present.
    fn evict_locked(&self, entries: &mut Vec<BufferedAction>) {
        let Some(lowest) = entries.iter().map(|a| a.priority).min() else {
            return;
        };
        let victim_idx = entries
            .iter()
            .enumerate()
            .filter(|(_, a)| a.priority == lowest)
            .min_by_key(|(_, a)| a.enqueued_at)
            .map(|(i, _)| i);
        let Some(idx) = victim_idx else { return };
        let victim = entries.remove(idx);

        self.evicted.fetch_add(1, Ordering::Relaxed);
        metrics::record_buffer_discard("evicted");
        if victim.priority == PriorityTier::Critical {
            // Only criticals remained; losing one is a data-loss event.
            tracing::error!(
                action_id = %victim.id,
                kind = %victim.record.kind,
                "Buffer over capacity with only critical entries, evicting oldest (data loss)"
            );
        } else {
            tracing::warn!(
                action_id = %victim.id,
                kind = %victim.record.kind,
                priority = victim.priority.as_str(),
                "Buffer over capacity, evicting oldest low-priority entry"
            );
        }
    }

    /// Replay buffered actions against the sink.
    ///
    /// Processes entries highest-priority-first, oldest-first within a
    /// tier. Never runs concurrently with another drain of this buffer.
    pub async fn drain(&self, sink: &dyn PersistenceSink) -> DrainReport {
        let Ok(_guard) = self.drain_gate.try_lock() else {
            return DrainReport {
                skipped: true,
                ..Default::default()
            };
        };

        // Bookkeeping phase: discard aged entries, snapshot replay order.
        let candidates: Vec<BufferedAction> = {
            let mut entries = self.lock_entries();
            let retention = self.config.retention();
            entries.retain(|a| {
                if a.enqueued_at.elapsed() > retention {
                    self.discarded_age.fetch_add(1, Ordering::Relaxed);
                    metrics::record_buffer_discard("age");
                    tracing::warn!(
                        action_id = %a.id,
                        kind = %a.record.kind,
                        priority = a.priority.as_str(),
                        "Discarding buffered action past retention window"
                    );
                    false
                } else {
                    true
                }
            });
            let mut snapshot = entries.clone();
            snapshot.sort_by_key(|a| (Reverse(a.priority), a.enqueued_at));
            snapshot
        };

        // I/O phase: no internal lock held across sink calls.
        let mut synced_ids = Vec::new();
        let mut failed_ids = Vec::new();
        for action in &candidates {
            match sink.persist(&action.record).await {
                Ok(()) => synced_ids.push(action.id),
                Err(err) => {
                    tracing::warn!(
                        action_id = %action.id,
                        kind = %action.record.kind,
                        error = %err,
                        "Buffered action replay failed"
                    );
                    failed_ids.push(action.id);
                }
            }
        }

        // Apply phase: remove synced, bump retries, discard exhausted.
        let depth = {
            let mut entries = self.lock_entries();
            entries.retain(|a| !synced_ids.contains(&a.id));
            for action in entries.iter_mut() {
                if failed_ids.contains(&action.id) {
                    action.retries += 1;
                }
            }
            let max_retries = self.config.max_retries;
            entries.retain(|a| {
                if a.retries > max_retries {
                    self.discarded_retry.fetch_add(1, Ordering::Relaxed);
                    metrics::record_buffer_discard("retries");
                    tracing::warn!(
                        action_id = %a.id,
                        kind = %a.record.kind,
                        retries = a.retries,
                        "Discarding buffered action after exhausting replay attempts"
                    );
                    false
                } else {
                    true
                }
            });
            entries.len()
        };
        metrics::record_buffer_depth(depth);

        DrainReport {
            synced: synced_ids.len(),
            failed: failed_ids.len(),
            skipped: false,
        }
    }

    pub fn depth(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn stats(&self) -> BufferStats {
        let entries = self.lock_entries();
        let mut by_priority = [0usize; 4];
        for action in entries.iter() {
            let slot = match action.priority {
                PriorityTier::Critical => 0,
                PriorityTier::High => 1,
                PriorityTier::Medium => 2,
                PriorityTier::Low => 3,
            };
            by_priority[slot] += 1;
        }
        BufferStats {
            depth: entries.len(),
            capacity: self.config.capacity,
            by_priority,
            evicted_total: self.evicted.load(Ordering::Relaxed),
            discarded_retry_total: self.discarded_retry.load(Ordering::Relaxed),
            discarded_age_total: self.discarded_age.load(Ordering::Relaxed),
        }
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, Vec<BufferedAction>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
