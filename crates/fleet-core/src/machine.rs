// SPDX-License-Identifier: MIT

//! Machine rows (§3): a worker host with a fixed set of execution slots.

use crate::define_str_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

define_str_id! {
    /// Unique identifier for a machine. Supplied by the caller (typically
    /// the machine's hostname or a configured fleet name), never generated.
    pub struct MachineId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineStatus {
    Online,
    Offline,
    Maintenance,
}

impl std::fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MachineStatus::Online => "online",
            MachineStatus::Offline => "offline",
            MachineStatus::Maintenance => "maintenance",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    pub machine_id: MachineId,
    pub hostname: String,
    /// A set of positive integers — no duplicates (§3 invariant). A
    /// `BTreeSet` both enforces uniqueness and gives the Slot Scheduler a
    /// cheap "lowest free slot" scan (§4.D).
    pub slots: BTreeSet<u32>,
    pub status: MachineStatus,
    pub last_heartbeat: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Machine {
    pub fn new(machine_id: MachineId, hostname: String, slots: BTreeSet<u32>, now: DateTime<Utc>) -> Self {
        Self {
            machine_id,
            hostname,
            slots,
            status: MachineStatus::Online,
            last_heartbeat: now,
            metadata: HashMap::new(),
        }
    }
}
