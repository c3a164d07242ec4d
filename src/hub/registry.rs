// src/hub/registry.rs

//! The concurrency-safe store of currently connected remote operators.
//!
//! A single lock serializes every operation so that the duplicate-IP check
//! and the insert are one atomic step, and no caller ever observes a torn
//! roster. Iteration order is admission order.

use crate::core::errors::RelayError;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::net::IpAddr;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque connection identity of a remote operator.
pub type ClientId = Uuid;

/// One connected remote operator. The `sender` feeds the connection's
/// writer task; a closed sender means the transport is no longer available.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    pub id: ClientId,
    pub nickname: String,
    pub ip: IpAddr,
    sender: mpsc::UnboundedSender<String>,
}

impl RemoteClient {
    pub fn is_available(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Best-effort text send. Returns whether the frame was handed to the
    /// writer task; failures are the caller's to ignore.
    pub fn send(&self, message: impl Into<String>) -> bool {
        self.is_available() && self.sender.send(message.into()).is_ok()
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    clients: IndexMap<ClientId, RemoteClient>,
    /// Monotonic admission counter; default nicknames derive from it so
    /// they stay unique even under concurrent admission. The original
    /// derived them from the roster size, which races.
    admissions: u64,
}

/// Mapping of connection identity to client state, with IP uniqueness
/// enforced at registration.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    inner: Mutex<RegistryInner>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a new client, assigning it a fresh id and a `User_<n>`
    /// nickname. Rejects the registration if `ip` already has a client,
    /// atomically with the insert.
    pub fn register(
        &self,
        ip: IpAddr,
        sender: mpsc::UnboundedSender<String>,
    ) -> Result<RemoteClient, RelayError> {
        let mut inner = self.inner.lock();
        if inner.clients.values().any(|c| c.ip == ip) {
            return Err(RelayError::DuplicateIp(ip));
        }
        inner.admissions += 1;
        let client = RemoteClient {
            id: Uuid::new_v4(),
            nickname: format!("User_{}", inner.admissions),
            ip,
            sender,
        };
        inner.clients.insert(client.id, client.clone());
        Ok(client)
    }

    /// Removes a client, returning its final state. Idempotent.
    pub fn unregister(&self, id: ClientId) -> Option<RemoteClient> {
        // shift_remove keeps the admission order of the remaining clients.
        self.inner.lock().clients.shift_remove(&id)
    }

    /// Replaces a client's nickname, returning the old one. Renames are
    /// not collision-checked; duplicate nicknames resolve by admission
    /// order in `lookup_by_nickname`.
    pub fn rename(&self, id: ClientId, new_nickname: &str) -> Option<String> {
        let mut inner = self.inner.lock();
        let client = inner.clients.get_mut(&id)?;
        Some(std::mem::replace(
            &mut client.nickname,
            new_nickname.to_string(),
        ))
    }

    /// The current nickname of a registered client.
    pub fn nickname_of(&self, id: ClientId) -> Option<String> {
        self.inner.lock().clients.get(&id).map(|c| c.nickname.clone())
    }

    /// The first client (in admission order) with the given nickname.
    pub fn lookup_by_nickname(&self, nickname: &str) -> Option<RemoteClient> {
        self.inner
            .lock()
            .clients
            .values()
            .find(|c| c.nickname == nickname)
            .cloned()
    }

    /// A consistent snapshot of all nicknames, in admission order.
    pub fn snapshot_nicknames(&self) -> Vec<String> {
        self.inner
            .lock()
            .clients
            .values()
            .map(|c| c.nickname.clone())
            .collect()
    }

    /// A consistent snapshot of all clients, in admission order.
    pub fn snapshot_clients(&self) -> Vec<RemoteClient> {
        self.inner.lock().clients.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
