use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Residency statistics for one idle state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CStateStats {
    pub name: String,
    /// Number of times the state was entered.
    pub hits: u64,
    /// Cumulative residency in microseconds.
    pub duration: f64,
}

/// Residency statistics for one frequency state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PStateStats {
    /// Frequency as reported by cpufreq, in Hz.
    pub freq_hz: u64,
    pub hits: u64,
    /// Cumulative residency in microseconds.
    pub duration: f64,
}

impl PStateStats {
    /// Frequency in the kHz units used by energy model files.
    pub fn freq_khz(&self) -> u32 {
        u32::try_from(self.freq_hz / 1000).unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cpu {
    pub id: u32,
    #[serde(default)]
    pub cstates: Vec<CStateStats>,
    #[serde(default)]
    pub pstates: Vec<PStateStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Core {
    pub id: u32,
    #[serde(default)]
    pub cpus: Vec<Cpu>,
}

/// A physical cluster with its cluster-level idle statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: u32,
    #[serde(default)]
    pub cstates: Vec<CStateStats>,
    #[serde(default)]
    pub cores: Vec<Core>,
}

impl Cluster {
    /// CPU whose state tables describe the cluster's shape: the last CPU of
    /// the last core.
    pub fn representative_cpu(&self) -> Option<&Cpu> {
        self.cores.last()?.cpus.last()
    }

    pub fn cpus(&self) -> impl Iterator<Item = &Cpu> {
        self.cores.iter().flat_map(|core| core.cpus.iter())
    }
}

/// Cluster → core → CPU hierarchy annotated with idle/frequency residency,
/// as captured by the trace collector. Cluster order is the order model
/// ordinals are matched against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub clusters: Vec<Cluster>,
}

impl Topology {
    pub fn from_json(content: &str, path: &Path) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::TopologyParse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    /// Load a trace snapshot written by the residency collector.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::TopologyRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&content, path)
    }
}
