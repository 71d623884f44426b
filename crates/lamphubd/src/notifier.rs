//! Device-state change notifier.
//!
//! Keeps the snapshot last pushed to operator observers and decides what a
//! new notification must carry.
//!
//! # Diff rules
//!
//! - A full update sends every device and replaces the last snapshot.
//! - An incremental update includes new or changed devices (colors compared
//!   case-insensitively) and a removal entry (offline/0/"off") for every
//!   device that disappeared. Nothing is sent if that set is empty.
//!   Otherwise every unchanged device is appended, so observers always see
//!   the complete device set.

use std::sync::Arc;

use async_trait::async_trait;
use lamphub_core::DeviceRecord;
use lamphub_protocol::ObserverMessage;
use tokio::sync::Mutex;
use tracing::debug;

use crate::events::{HubEvent, StateChangeListener};
use crate::observers::ObserverSet;
use crate::registry::{DeviceSnapshot, Registry};

/// What a call to [`ChangeNotifier::notify`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Nothing changed since the last notification
    Skipped,

    /// A `device_update` carrying `devices` entries was fanned out
    Sent {
        devices: usize,
        delivered: usize,
        pruned: usize,
    },
}

/// Pushes `device_update` messages to operator observers.
pub struct ChangeNotifier {
    registry: Registry,
    observers: Arc<ObserverSet>,
    last_broadcast: Mutex<DeviceSnapshot>,
}

impl ChangeNotifier {
    pub fn new(registry: Registry, observers: Arc<ObserverSet>) -> Self {
        Self {
            registry,
            observers,
            last_broadcast: Mutex::new(DeviceSnapshot::new()),
        }
    }

    /// Diffs `snapshot` against the last broadcast and fans out the batch.
    ///
    /// The diff lock is held until fan-out finishes, so notifications never
    /// interleave.
    pub async fn notify(&self, snapshot: &DeviceSnapshot, full_update: bool) -> NotifyOutcome {
        let mut last = self.last_broadcast.lock().await;
        self.notify_locked(&mut last, snapshot, full_update).await
    }

    /// Takes a fresh registry snapshot and notifies.
    ///
    /// The diff lock is taken before the snapshot so two concurrent calls
    /// observe snapshots in the order they broadcast them.
    pub async fn notify_current(&self, full_update: bool) -> NotifyOutcome {
        let mut last = self.last_broadcast.lock().await;
        let snapshot = self.registry.snapshot().await;
        self.notify_locked(&mut last, &snapshot, full_update).await
    }

    async fn notify_locked(
        &self,
        last: &mut DeviceSnapshot,
        snapshot: &DeviceSnapshot,
        full_update: bool,
    ) -> NotifyOutcome {
        let batch = if full_update {
            *last = snapshot.clone();
            snapshot.values().cloned().collect()
        } else {
            match incremental_batch(last, snapshot) {
                Some(batch) => batch,
                None => {
                    debug!("No device changes, notification skipped");
                    return NotifyOutcome::Skipped;
                }
            }
        };

        let devices = batch.len();
        let report = self
            .observers
            .broadcast(&ObserverMessage::device_update(batch))
            .await;

        debug!(
            full_update,
            devices,
            delivered = report.delivered,
            pruned = report.pruned,
            "Device update sent"
        );

        NotifyOutcome::Sent {
            devices,
            delivered: report.delivered,
            pruned: report.pruned,
        }
    }
}

#[async_trait]
impl StateChangeListener for ChangeNotifier {
    fn name(&self) -> &'static str {
        "change_notifier"
    }

    async fn on_event(&self, event: &HubEvent) {
        if matches!(event, HubEvent::DevicesChanged) {
            self.notify_current(false).await;
        }
    }
}

/// Computes an incremental batch and advances `last` to match `current`.
///
/// Returns `None` when nothing changed.
fn incremental_batch(
    last: &mut DeviceSnapshot,
    current: &DeviceSnapshot,
) -> Option<Vec<DeviceRecord>> {
    let mut changed = Vec::new();
    let mut unchanged = Vec::new();

    for (name, record) in current {
        match last.get(name) {
            Some(previous) if previous.same_observable_state(record) => {
                unchanged.push(record.clone());
            }
            _ => {
                changed.push(record.clone());
                last.insert(name.clone(), record.clone());
            }
        }
    }

    let removed: Vec<_> = last
        .keys()
        .filter(|name| !current.contains_key(*name))
        .cloned()
        .collect();
    for name in removed {
        last.remove(&name);
        changed.push(DeviceRecord::removed(name));
    }

    if changed.is_empty() {
        return None;
    }

    changed.extend(unchanged);
    Some(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lamphub_core::{DeviceName, DeviceStatus};

    fn record(name: &str, brightness: i64, color: &str) -> DeviceRecord {
        DeviceRecord {
            name: DeviceName::new(name),
            status: DeviceStatus::Offline,
            brightness,
            color: color.to_string(),
        }
    }

    fn snapshot(records: &[DeviceRecord]) -> DeviceSnapshot {
        records
            .iter()
            .map(|r| (r.name.clone(), r.clone()))
            .collect()
    }

    fn notifier() -> (ChangeNotifier, Arc<ObserverSet>) {
        let observers = Arc::new(ObserverSet::new("operator", 16));
        (
            ChangeNotifier::new(Registry::new(), observers.clone()),
            observers,
        )
    }

    #[test]
    fn test_new_device_is_a_change() {
        let mut last = DeviceSnapshot::new();
        let current = snapshot(&[record("B1", 0, "off")]);

        let batch = incremental_batch(&mut last, &current).unwrap();
        assert_eq!(batch, vec![record("B1", 0, "off")]);
        assert_eq!(last, current);
    }

    #[test]
    fn test_changed_first_then_unchanged() {
        let mut last = snapshot(&[record("A", 1, "red"), record("B", 2, "red")]);
        let current = snapshot(&[record("A", 1, "red"), record("B", 3, "red")]);

        let batch = incremental_batch(&mut last, &current).unwrap();
        let names: Vec<_> = batch.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn test_color_case_is_ignored() {
        let mut last = snapshot(&[record("A", 80, "Blue")]);
        let current = snapshot(&[record("A", 80, "blue")]);
        assert!(incremental_batch(&mut last, &current).is_none());
    }

    #[test]
    fn test_removal_entry() {
        let mut last = snapshot(&[record("A", 80, "Blue"), record("B", 1, "red")]);
        let current = snapshot(&[record("B", 1, "red")]);

        let batch = incremental_batch(&mut last, &current).unwrap();
        assert_eq!(batch, vec![record("A", 0, "off"), record("B", 1, "red")]);
        assert!(!last.contains_key(&DeviceName::new("A")));
    }

    #[tokio::test]
    async fn test_second_identical_notify_sends_nothing() {
        let (notifier, observers) = notifier();
        let (_, mut rx) = observers.add().await;
        let current = snapshot(&[record("B1", 300, "B1")]);

        assert!(matches!(
            notifier.notify(&current, false).await,
            NotifyOutcome::Sent { devices: 1, .. }
        ));
        assert_eq!(notifier.notify(&current, false).await, NotifyOutcome::Skipped);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_update_replaces_snapshot() {
        let (notifier, observers) = notifier();
        let (_, mut rx) = observers.add().await;

        notifier
            .notify(&snapshot(&[record("A", 1, "red")]), false)
            .await;
        let current = snapshot(&[record("B", 2, "green")]);
        assert!(matches!(
            notifier.notify(&current, true).await,
            NotifyOutcome::Sent { devices: 1, .. }
        ));

        // "A" was forgotten by the full update, so no removal entry follows.
        assert_eq!(notifier.notify(&current, false).await, NotifyOutcome::Skipped);

        let _ = rx.try_recv();
        let full = rx.try_recv().unwrap();
        let json: serde_json::Value = serde_json::from_str(&full).unwrap();
        assert_eq!(json["data"].as_array().map(Vec::len), Some(1));
        assert_eq!(json["data"][0]["device_name"], "B");
    }

    #[tokio::test]
    async fn test_full_update_sends_even_when_empty() {
        let (notifier, observers) = notifier();
        let (_, mut rx) = observers.add().await;

        assert!(matches!(
            notifier.notify(&DeviceSnapshot::new(), true).await,
            NotifyOutcome::Sent { devices: 0, delivered: 1, .. }
        ));
        let json: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"type": "device_update", "data": []}));
    }
}
