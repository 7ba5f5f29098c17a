//! Host notification sink that keeps what it is sent

use eff_core::{AudioObjectId, HostNotifier, PropertyAddress, PropertySelector};
use log::debug;
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub object_id: AudioObjectId,
    pub addresses: Vec<PropertyAddress>,
}

/// Records every property-changed notification, in arrival order
#[derive(Debug, Default)]
pub struct RecordingHost {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.notifications.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of notifications for `selector` on `object_id`
    pub fn count_for(&self, object_id: AudioObjectId, selector: PropertySelector) -> usize {
        self.notifications
            .lock()
            .iter()
            .filter(|n| n.object_id == object_id)
            .filter(|n| n.addresses.iter().any(|a| a.selector == selector))
            .count()
    }

    pub fn clear(&self) {
        self.notifications.lock().clear();
    }
}

impl HostNotifier for RecordingHost {
    fn properties_changed(&self, object_id: AudioObjectId, addresses: &[PropertyAddress]) {
        debug!(
            "RecordingHost: {} properties changed on object {object_id}",
            addresses.len()
        );
        self.notifications.lock().push(Notification {
            object_id,
            addresses: addresses.to_vec(),
        });
    }
}
