//! ActorRoster - Actor Factory output
//!
//! Explicitly owned list of every actor spawned for the scenario.

use serde::{Deserialize, Serialize};

/// CARLA actor handle type
pub type ActorId = u32;

/// Role an actor plays in the scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// Braked vehicle being overtaken
    LeadVehicle,
    /// Vehicle driven by the maneuver controller
    TrailVehicle,
    /// Camera sensor
    Camera,
}

/// One spawned actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// Actor handle
    pub actor_id: ActorId,

    /// Scenario role
    pub role: ActorRole,

    /// Config ID (e.g. "cam_1"), or the role name for vehicles
    pub name: String,

    /// CARLA type id of the spawned actor (e.g. "vehicle.audi.tt")
    pub type_id: String,
}

/// Runtime actor roster
///
/// Every actor is registered right after it is spawned, so the roster always
/// holds exactly the actors that exist. Teardown consumes the roster, which
/// makes destroying an actor twice through it impossible.
#[derive(Debug, Clone, Default)]
pub struct ActorRoster {
    entries: Vec<RosterEntry>,
}

impl ActorRoster {
    /// Create empty roster
    pub fn new() -> Self {
        Self::default()
    }

    /// Register actor
    pub fn register(
        &mut self,
        actor_id: ActorId,
        role: ActorRole,
        name: impl Into<String>,
        type_id: impl Into<String>,
    ) {
        self.entries.push(RosterEntry {
            actor_id,
            role,
            name: name.into(),
            type_id: type_id.into(),
        });
    }

    /// First actor with the given role
    pub fn find(&self, role: ActorRole) -> Option<ActorId> {
        self.entries
            .iter()
            .find(|e| e.role == role)
            .map(|e| e.actor_id)
    }

    /// Actor registered under the given name
    pub fn find_by_name(&self, name: &str) -> Option<ActorId> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.actor_id)
    }

    /// All actor handles in spawn order
    pub fn actor_ids(&self) -> Vec<ActorId> {
        self.entries.iter().map(|e| e.actor_id).collect()
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take entries for teardown: sensors first, then vehicles, each in reverse spawn order
    pub fn into_teardown_order(self) -> Vec<RosterEntry> {
        let (mut sensors, mut vehicles): (Vec<_>, Vec<_>) = self
            .entries
            .into_iter()
            .partition(|e| e.role == ActorRole::Camera);
        sensors.reverse();
        vehicles.reverse();
        sensors.extend(vehicles);
        sensors
    }
}
