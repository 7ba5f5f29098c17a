//! Client registry
//!
//! The authoritative client list and IO bookkeeping live behind a mutex and
//! are only touched off the real-time path. The real-time side reads one of
//! two [`ClientMap`] copies, chosen by an atomic index that only the
//! real-time worker flips.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use eff_core::{ClientError, ClientId, ClientIo, ClientResult, ShadowMapSwapper, ShadowMaps};
use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::client::{Client, ClientMap};

#[derive(Debug, Default)]
struct RegistryState {
    clients: BTreeMap<ClientId, Client>,
    doing_io: BTreeSet<ClientId>,
}

#[derive(Debug, Default)]
pub struct ClientRegistry {
    state: Mutex<RegistryState>,
    maps: [RwLock<ClientMap>; 2],
    /// Index of the live map in `maps`
    live: AtomicUsize,
    running: AtomicBool,
    swaps: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a client and make it visible to the real-time side.
    ///
    /// Blocks until `swapper` has swapped the updated maps in.
    pub fn add_client(
        self: &Arc<Self>,
        client: Client,
        swapper: &dyn ShadowMapSwapper,
    ) -> ClientResult<()> {
        let client_id = client.client_id;
        let mut state = self.state.lock();

        if state.clients.contains_key(&client_id) {
            return Err(ClientError::DuplicateClient(client_id));
        }

        debug!("ClientRegistry::add_client: adding client {client_id} (pid {})", client.process_id);

        self.update_maps(swapper, |map| {
            map.insert(client.clone());
        });
        state.clients.insert(client_id, client);

        Ok(())
    }

    /// Unregister a client, dropping it from IO if it was doing IO.
    pub fn remove_client(
        self: &Arc<Self>,
        client_id: ClientId,
        swapper: &dyn ShadowMapSwapper,
    ) -> ClientResult<Client> {
        let mut state = self.state.lock();

        let Some(client) = state.clients.remove(&client_id) else {
            return Err(ClientError::InvalidClient(client_id));
        };

        if state.doing_io.remove(&client_id) && state.doing_io.is_empty() {
            debug!("ClientRegistry::remove_client: last IO client {client_id} removed");
            self.running.store(false, Ordering::Release);
        }

        self.update_maps(swapper, |map| {
            map.remove(client_id);
        });

        Ok(client)
    }

    /// Edit the shadow map, swap it in, then bring the new shadow up to date.
    ///
    /// Callers hold the state lock, which serialises updates.
    fn update_maps(self: &Arc<Self>, swapper: &dyn ShadowMapSwapper, edit: impl Fn(&mut ClientMap)) {
        let shadow = 1 - self.live.load(Ordering::Acquire);
        edit(&mut self.maps[shadow].write());

        let maps: Arc<dyn ShadowMaps> = self.clone();
        swapper.swap_shadow_maps(maps);

        let shadow = 1 - self.live.load(Ordering::Acquire);
        edit(&mut self.maps[shadow].write());
    }

    /// Read the live map without blocking.
    ///
    /// Returns `None` in the short window where a non-real-time update holds
    /// the map this call picked.
    pub fn with_live_map_rt<R>(&self, f: impl FnOnce(&ClientMap) -> R) -> Option<R> {
        let live = self.live.load(Ordering::Acquire);
        self.maps[live].try_read().map(|map| f(&map))
    }

    pub fn client(&self, client_id: ClientId) -> Option<Client> {
        self.state.lock().clients.get(&client_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clients_doing_io(&self) -> Vec<ClientId> {
        self.state.lock().doing_io.iter().copied().collect()
    }

    /// Whether any client is doing IO
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of shadow-map swaps performed so far
    pub fn swap_count(&self) -> u64 {
        self.swaps.load(Ordering::Relaxed)
    }
}

impl ShadowMaps for ClientRegistry {
    fn swap_in_shadow_maps_rt(&self) {
        self.live.fetch_xor(1, Ordering::AcqRel);
        self.swaps.fetch_add(1, Ordering::Relaxed);
    }
}

impl ClientIo for ClientRegistry {
    fn start_io_non_rt(&self, client_id: ClientId) -> ClientResult<bool> {
        let mut state = self.state.lock();

        if !state.clients.contains_key(&client_id) {
            return Err(ClientError::InvalidClient(client_id));
        }

        let was_idle = state.doing_io.is_empty();
        let started = state.doing_io.insert(client_id) && was_idle;

        if started {
            debug!("ClientRegistry: client {client_id} started IO on the device");
            self.running.store(true, Ordering::Release);
        }

        Ok(started)
    }

    fn stop_io_non_rt(&self, client_id: ClientId) -> ClientResult<bool> {
        let mut state = self.state.lock();

        if !state.clients.contains_key(&client_id) {
            return Err(ClientError::InvalidClient(client_id));
        }

        let stopped = state.doing_io.remove(&client_id) && state.doing_io.is_empty();

        if stopped {
            debug!("ClientRegistry: client {client_id} stopped IO on the device");
            self.running.store(false, Ordering::Release);
        }

        Ok(stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Swaps in place, as if the real-time worker ran the task immediately
    struct InlineSwapper;

    impl ShadowMapSwapper for InlineSwapper {
        fn swap_shadow_maps(&self, maps: Arc<dyn ShadowMaps>) {
            maps.swap_in_shadow_maps_rt();
        }
    }

    #[test]
    fn test_added_client_reaches_both_maps() {
        let registry = ClientRegistry::new();
        registry
            .add_client(Client::new(ClientId(1), 100), &InlineSwapper)
            .unwrap();

        assert_eq!(registry.swap_count(), 1);
        assert_eq!(registry.with_live_map_rt(|m| m.len()), Some(1));
        for map in &registry.maps {
            assert!(map.read().contains(ClientId(1)));
        }
    }

    #[test]
    fn test_duplicate_and_unknown_clients() {
        let registry = ClientRegistry::new();
        registry
            .add_client(Client::new(ClientId(1), 100), &InlineSwapper)
            .unwrap();

        assert_eq!(
            registry.add_client(Client::new(ClientId(1), 101), &InlineSwapper),
            Err(ClientError::DuplicateClient(ClientId(1)))
        );
        assert_eq!(
            registry.remove_client(ClientId(2), &InlineSwapper),
            Err(ClientError::InvalidClient(ClientId(2)))
        );
        // Rejected calls never swap
        assert_eq!(registry.swap_count(), 1);
    }

    #[test]
    fn test_io_transitions() {
        let registry = ClientRegistry::new();
        for id in [1, 2] {
            registry
                .add_client(Client::new(ClientId(id), 100 + id as i32), &InlineSwapper)
                .unwrap();
        }

        assert_eq!(registry.start_io_non_rt(ClientId(1)), Ok(true));
        assert!(registry.is_running());
        // Device already running
        assert_eq!(registry.start_io_non_rt(ClientId(2)), Ok(false));
        assert_eq!(registry.start_io_non_rt(ClientId(2)), Ok(false));
        assert_eq!(registry.clients_doing_io(), vec![ClientId(1), ClientId(2)]);

        assert_eq!(registry.stop_io_non_rt(ClientId(1)), Ok(false));
        assert_eq!(registry.stop_io_non_rt(ClientId(2)), Ok(true));
        assert!(!registry.is_running());
        // Not doing IO any more
        assert_eq!(registry.stop_io_non_rt(ClientId(2)), Ok(false));

        assert_eq!(
            registry.start_io_non_rt(ClientId(9)),
            Err(ClientError::InvalidClient(ClientId(9)))
        );
    }

    #[test]
    fn test_removing_last_io_client_idles_device() {
        let registry = ClientRegistry::new();
        registry
            .add_client(Client::new(ClientId(5), 500), &InlineSwapper)
            .unwrap();
        assert_eq!(registry.start_io_non_rt(ClientId(5)), Ok(true));

        let removed = registry.remove_client(ClientId(5), &InlineSwapper).unwrap();
        assert_eq!(removed.process_id, 500);
        assert!(!registry.is_running());
        assert!(registry.is_empty());
        assert_eq!(registry.with_live_map_rt(|m| m.is_empty()), Some(true));

        // A task still queued for the removed client now fails
        assert_eq!(
            registry.stop_io_non_rt(ClientId(5)),
            Err(ClientError::InvalidClient(ClientId(5)))
        );
    }

    #[test]
    fn test_live_map_read_fails_fast_while_locked() {
        let registry = ClientRegistry::new();
        let live = registry.live.load(Ordering::Acquire);

        let _writer = registry.maps[live].write();
        assert_eq!(registry.with_live_map_rt(|m| m.len()), None);
    }
}
