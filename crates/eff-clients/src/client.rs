//! Client records and the map the real-time side reads

use std::collections::BTreeMap;

use eff_core::ClientId;
use serde::{Deserialize, Serialize};

/// A host process talking to the driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub client_id: ClientId,
    pub process_id: i32,
    /// Application bundle identifier, when the host knows it
    pub bundle_id: Option<String>,
}

impl Client {
    pub fn new(client_id: ClientId, process_id: i32) -> Self {
        Self {
            client_id,
            process_id,
            bundle_id: None,
        }
    }

    pub fn with_bundle_id(mut self, bundle_id: impl Into<String>) -> Self {
        self.bundle_id = Some(bundle_id.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientMap {
    clients: BTreeMap<ClientId, Client>,
}

impl ClientMap {
    pub fn get(&self, client_id: ClientId) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    pub fn contains(&self, client_id: ClientId) -> bool {
        self.clients.contains_key(&client_id)
    }

    /// First client belonging to `process_id`
    pub fn find_by_process(&self, process_id: i32) -> Option<&Client> {
        self.clients.values().find(|c| c.process_id == process_id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }

    pub(crate) fn insert(&mut self, client: Client) -> Option<Client> {
        self.clients.insert(client.client_id, client)
    }

    pub(crate) fn remove(&mut self, client_id: ClientId) -> Option<Client> {
        self.clients.remove(&client_id)
    }
}
