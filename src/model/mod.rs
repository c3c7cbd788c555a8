pub mod parser;
pub mod template;

use serde::Serialize;

pub use parser::{load, parse_str};

/// Longest idle-state name accepted in a model file.
pub const MAX_STATE_NAME_LEN: usize = 15;

/// Clusters are lettered A to Z.
pub const MAX_CLUSTERS: usize = 26;

/// Upper bound on the P-state or C-state count a cluster header may declare.
pub const MAX_STATES_PER_CLUSTER: usize = 256;

/// Power coefficients for one frequency (P) state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PStateEnergy {
    pub speed_khz: u32,
    pub cluster_power: i64,
    pub core_power: i64,
}

/// Idle power coefficients for one idle (C) state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CStateEnergy {
    pub name: String,
    pub cluster_idle_power: i64,
    pub core_idle_power: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WakeupEnergy {
    pub cluster_wakeup_energy: i64,
    pub core_wakeup_energy: i64,
}

/// Which line interpretations are legal next for a cluster.
/// Ordered: a section marker requires at least `ClusterInfoParsed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ParseState {
    #[default]
    Unset,
    ClusterInfoParsed,
    ParsingFrequencyStates,
    ParsingIdleStates,
}

/// Energy model of a single cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterEnergyModel {
    pub number_cap_states: usize,
    pub number_c_states: usize,
    pub p_energy: Vec<PStateEnergy>,
    pub c_energy: Vec<CStateEnergy>,
    pub wakeup_energy: WakeupEnergy,
    pub state: ParseState,
}

impl ClusterEnergyModel {
    /// Exact-name match over this cluster's idle entries.
    pub fn find_cstate(&self, name: &str) -> Option<&CStateEnergy> {
        self.c_energy.iter().find(|c| c.name == name)
    }

    /// Exact-frequency match over this cluster's P-state entries.
    pub fn find_pstate(&self, speed_khz: u32) -> Option<&PStateEnergy> {
        self.p_energy.iter().find(|p| p.speed_khz == speed_khz)
    }
}

/// A fully parsed energy model, one entry per cluster ordinal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnergyModel {
    pub clusters: Vec<ClusterEnergyModel>,
}

impl EnergyModel {
    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    pub fn cluster(&self, ordinal: usize) -> Option<&ClusterEnergyModel> {
        self.clusters.get(ordinal)
    }

    /// Idle-state coefficients for `name` on cluster `ordinal`, if modelled.
    pub fn find_idle_energy(&self, ordinal: usize, name: &str) -> Option<&CStateEnergy> {
        self.cluster(ordinal)?.find_cstate(name)
    }

    /// P-state coefficients for `speed_khz` on cluster `ordinal`, if modelled.
    pub fn find_frequency_energy(&self, ordinal: usize, speed_khz: u32) -> Option<&PStateEnergy> {
        self.cluster(ordinal)?.find_pstate(speed_khz)
    }
}

/// Cluster letter used in model files and reports: ordinal 0 is 'A'.
pub fn cluster_letter(ordinal: usize) -> char {
    u8::try_from(ordinal)
        .ok()
        .and_then(|o| b'A'.checked_add(o))
        .map(char::from)
        .unwrap_or('?')
}
