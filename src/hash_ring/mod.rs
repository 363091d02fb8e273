//! Consistent hash ring.
//!
//! # Data Flow
//! ```text
//! Server topology (config / runtime)
//!     → add_server / remove_server (mutate ring, reassign keys)
//! Request key (client id)
//!     → hashing.rs (ring position)
//!     → target_for (smallest position >= hash, wrapping)
//!     → backend id
//! ```
//!
//! # Design Decisions
//! - One position per server (no virtual nodes); collisions at a
//!   position form an insertion-ordered list and lookups take the
//!   last-added entry
//! - Adding or removing a server touches only the keys whose target
//!   actually changes; everything else keeps its assignment
//! - Mutations take `&mut self`; callers that share the ring across
//!   threads wrap it in an `RwLock` so topology changes serialize
//!   against lookups

pub mod hashing;

use std::collections::{BTreeMap, HashMap};

use crate::error::GatewayError;
use hashing::HashingStrategy;

/// A modular hash space mapping keys onto servers with bounded
/// disruption when the server set changes.
pub struct HashRing {
    hashing: Box<dyn HashingStrategy>,
    /// Ring position → server ids at that exact position, insertion
    /// order preserved.
    ring: BTreeMap<u64, Vec<String>>,
    /// Server id → its single ring position.
    server_positions: HashMap<String, u64>,
    /// Key → its computed hash.
    key_hashes: HashMap<String, u64>,
    /// Key → currently assigned server id.
    assignments: HashMap<String, String>,
}

impl HashRing {
    pub fn new(hashing: Box<dyn HashingStrategy>) -> Self {
        Self {
            hashing,
            ring: BTreeMap::new(),
            server_positions: HashMap::new(),
            key_hashes: HashMap::new(),
            assignments: HashMap::new(),
        }
    }

    /// Place a server on the ring and pull over the keys that now hash
    /// to it. Returns the number of keys reassigned.
    pub fn add_server(&mut self, server_id: &str, seed: i64) -> usize {
        let position = self.hashing.position(server_id, seed);
        self.server_positions.insert(server_id.to_string(), position);
        self.ring.entry(position).or_default().push(server_id.to_string());

        let mut reassigned = Vec::new();
        for (key, &key_hash) in &self.key_hashes {
            let Ok((target, _)) = self.target_for(key_hash) else {
                continue;
            };
            if target == server_id && self.assignments.get(key).map(String::as_str) != Some(server_id)
            {
                reassigned.push(key.clone());
            }
        }

        for key in &reassigned {
            self.assignments.insert(key.clone(), server_id.to_string());
        }

        tracing::debug!(server = %server_id, position, reassigned = reassigned.len(), "Server added to ring");
        reassigned.len()
    }

    /// Take a server off the ring and move its keys to their next
    /// target. Returns the number of keys reassigned; removing an
    /// unknown server is a no-op returning 0.
    ///
    /// If the last server leaves while keys are still tracked, those
    /// keys lose their assignment entirely (counted as reassigned)
    /// rather than pointing at a server no longer on the ring.
    pub fn remove_server(&mut self, server_id: &str) -> usize {
        let Some(position) = self.server_positions.remove(server_id) else {
            return 0;
        };

        if let Some(ids) = self.ring.get_mut(&position) {
            ids.retain(|id| id != server_id);
            if ids.is_empty() {
                self.ring.remove(&position);
            }
        }

        let orphaned: Vec<String> = self
            .assignments
            .iter()
            .filter(|(_, assigned)| assigned.as_str() == server_id)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &orphaned {
            let key_hash = self.key_hashes[key];
            match self.target_for(key_hash) {
                Ok((new_target, _)) => {
                    self.assignments.insert(key.clone(), new_target);
                }
                Err(_) => {
                    self.assignments.remove(key);
                }
            }
        }

        tracing::debug!(server = %server_id, position, reassigned = orphaned.len(), "Server removed from ring");
        orphaned.len()
    }

    /// Hash a key, record it, and assign it to its target server.
    /// Returns the target's ring position.
    pub fn assign_key(&mut self, key: &str, seed: i64) -> Result<u64, GatewayError> {
        let key_hash = self.hashing.position(key, seed);
        self.key_hashes.insert(key.to_string(), key_hash);

        let (server_id, server_position) = self.target_for(key_hash)?;
        self.assignments.insert(key.to_string(), server_id);
        Ok(server_position)
    }

    /// Resolve the server responsible for a ring position: smallest
    /// occupied position >= `hash`, wrapping to the smallest occupied
    /// position overall. When several servers share the position, the
    /// most recently added one wins.
    pub fn target_for(&self, hash: u64) -> Result<(String, u64), GatewayError> {
        let (&position, ids) = self
            .ring
            .range(hash..)
            .next()
            .or_else(|| self.ring.iter().next())
            .ok_or(GatewayError::EmptyRing)?;

        let server_id = ids.last().ok_or(GatewayError::EmptyRing)?;
        Ok((server_id.clone(), position))
    }

    /// Read-only lookup: which server would serve this key right now.
    /// Records nothing, so concurrent callers only need shared access.
    pub fn server_for(&self, key: &str, seed: i64) -> Result<String, GatewayError> {
        let key_hash = self.hashing.position(key, seed);
        self.target_for(key_hash).map(|(server_id, _)| server_id)
    }

    /// The server a key was last assigned to, if any.
    pub fn assigned_server(&self, key: &str) -> Option<&str> {
        self.assignments.get(key).map(String::as_str)
    }

    /// Snapshot of the full key → server assignment map.
    pub fn assignments(&self) -> &HashMap<String, String> {
        &self.assignments
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl std::fmt::Debug for HashRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashRing")
            .field("ring", &self.ring)
            .field("assignments", &self.assignments)
            .finish()
    }
}
