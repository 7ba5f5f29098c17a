//! Interfaces the task queue calls into
//!
//! Implementations live outside the queue. The `_rt` methods are invoked on the
//! real-time worker and must not block, allocate, or take locks; the `_non_rt`
//! methods run on the non-real-time worker and may do all of those.

use std::sync::Arc;

use crate::{AudioObjectId, ClientId, ClientResult, PropertyAddress};

/// Double-buffered client maps whose prepared shadow copy is swapped in by the
/// real-time worker
pub trait ShadowMaps: Send + Sync {
    /// Make the prepared shadow maps the live maps.
    ///
    /// Called only on the real-time worker.
    fn swap_in_shadow_maps_rt(&self);
}

/// Per-client IO participation
pub trait ClientIo: Send + Sync {
    /// Mark the client as doing IO.
    ///
    /// Returns `true` if this started IO on the device (first client to start).
    fn start_io_non_rt(&self, client_id: ClientId) -> ClientResult<bool>;

    /// Mark the client as no longer doing IO.
    ///
    /// Returns `true` if this stopped IO on the device (last client to stop).
    fn stop_io_non_rt(&self, client_id: ClientId) -> ClientResult<bool>;
}

/// Sink for property-changed notifications sent to the hosting audio server
pub trait HostNotifier: Send + Sync {
    fn properties_changed(&self, object_id: AudioObjectId, addresses: &[PropertyAddress]);
}

/// Something that can get prepared shadow maps swapped in on the real-time
/// side, blocking until the swap has happened
pub trait ShadowMapSwapper {
    fn swap_shadow_maps(&self, maps: Arc<dyn ShadowMaps>);
}
