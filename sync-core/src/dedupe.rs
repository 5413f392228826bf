//! Command dedupe cache for watchlink.
//!
//! This module provides a bounded recency cache of command ids with:
//! - At-most-once admission of a command id to the engine
//! - Memory of the ack issued for each id and the transports it went out on
//! - Least-recently-seen eviction once the capacity is reached
//!
//! The cache is used by sync-client's command router. Transports may redeliver
//! a command, and the same command may arrive over both transports.

use std::collections::{BTreeMap, HashMap};
use watchlink_sync_types::{CommandAck, CommandId, TransportId};

/// Default number of command ids remembered.
pub const DEFAULT_DEDUPE_CAPACITY: usize = 256;

/// Decision for one inbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// First sighting: forward to the engine.
    New,
    /// Seen before and already answered on this transport (or still in flight).
    Duplicate,
    /// Seen before on another transport: resend the recorded ack, do not
    /// forward to the engine.
    Replay(CommandAck),
}

#[derive(Debug, Clone)]
struct Entry {
    tick: u64,
    ack: Option<CommandAck>,
    acked_on: Vec<TransportId>,
}

/// Bounded LRU cache of recently seen command ids.
///
/// Commands flow through the cache in this order:
/// 1. `admit()` - decide whether the engine should see the command
/// 2. `record_ack()` - remember the outcome and the transport it was sent on
///
/// A replayed ack is recorded the same way so each transport gets at most one.
#[derive(Debug)]
pub struct CommandDedupe {
    capacity: usize,
    entries: HashMap<CommandId, Entry>,
    /// Recency order: tick -> id. The smallest tick is evicted first.
    order: BTreeMap<u64, CommandId>,
    clock: u64,
}

impl CommandDedupe {
    /// Create a cache remembering at most `capacity` ids (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: BTreeMap::new(),
            clock: 0,
        }
    }

    /// Decide what to do with a command arriving from `from`.
    ///
    /// Every call refreshes the recency of the id.
    pub fn admit(&mut self, command_id: &CommandId, from: TransportId) -> Admission {
        let tick = self.tick();

        if let Some(entry) = self.entries.get_mut(command_id) {
            self.order.remove(&entry.tick);
            entry.tick = tick;
            self.order.insert(tick, command_id.clone());

            return match &entry.ack {
                Some(ack) if !entry.acked_on.contains(&from) => Admission::Replay(ack.clone()),
                _ => Admission::Duplicate,
            };
        }

        self.evict_to(self.capacity - 1);
        self.entries.insert(
            command_id.clone(),
            Entry {
                tick,
                ack: None,
                acked_on: Vec::new(),
            },
        );
        self.order.insert(tick, command_id.clone());
        Admission::New
    }

    /// Record the ack sent for a command on one transport.
    ///
    /// Ignored if the id has already been evicted.
    pub fn record_ack(&mut self, ack: &CommandAck, on: TransportId) {
        if let Some(entry) = self.entries.get_mut(&ack.command_id) {
            if entry.ack.is_none() {
                entry.ack = Some(ack.clone());
            }
            if !entry.acked_on.contains(&on) {
                entry.acked_on.push(on);
            }
        }
    }

    /// Check if an id is currently remembered.
    pub fn contains(&self, command_id: &CommandId) -> bool {
        self.entries.contains_key(command_id)
    }

    /// Number of remembered ids.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of remembered ids.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Forget every id.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn evict_to(&mut self, max_len: usize) {
        while self.entries.len() > max_len {
            match self.order.pop_first() {
                Some((_, oldest)) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }
}

impl Default for CommandDedupe {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUPE_CAPACITY)
    }
}
