use crate::error::{Error, Result};
use crate::model::{CStateEnergy, ClusterEnergyModel, EnergyModel, cluster_letter};
use crate::topology::{CStateStats, Cluster, Topology};
use serde::Serialize;
use std::collections::BTreeMap;

/// Wake-up energies in the model follow the scheduler's convention: scaled
/// by the wake-up tracking factor 47742, shifted left by 10, and normalised
/// to 1000 wake-ups per second. This brings them back to a single wake-up.
pub const WAKEUP_SCALE: f64 = 47742.0 / (1024.0 * 1000.0);

const US_PER_SEC: f64 = 1e6;

/// Names of the idle states whose entries stand in for wake-ups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalculatorOptions {
    /// Cluster wake-ups are counted as entries into this cluster state.
    pub cluster_wakeup_state: String,
    /// Core wake-ups are counted as entries into this CPU state.
    pub core_wakeup_state: String,
}

impl Default for CalculatorOptions {
    fn default() -> Self {
        Self {
            cluster_wakeup_state: "C1".to_string(),
            core_wakeup_state: "WFI".to_string(),
        }
    }
}

/// Capacitive, idle and wake-up energy, in seconds-weighted model units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EnergyBreakdown {
    pub cap: f64,
    pub idle: f64,
    pub wakeup: f64,
}

impl EnergyBreakdown {
    /// The energy index: sum of all three contributions.
    pub fn total(&self) -> f64 {
        self.cap + self.idle + self.wakeup
    }

    fn add(&mut self, other: &EnergyBreakdown) {
        self.cap += other.cap;
        self.idle += other.idle;
        self.wakeup += other.wakeup;
    }
}

/// Where a residency row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Origin {
    Cluster,
    Cpu(u32),
}

/// One step of the traversal, in the order it was taken.
/// `acc` fields carry the running accumulator after the step, before unit
/// conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BreakdownRow {
    IdleNoHits {
        origin: Origin,
        index: usize,
        name: String,
    },
    IdleNoModel {
        origin: Origin,
        index: usize,
        name: String,
        hits: u64,
        duration: f64,
    },
    Idle {
        origin: Origin,
        index: usize,
        name: String,
        hits: u64,
        duration: f64,
        power: i64,
        acc: f64,
    },
    Wakeup {
        origin: Origin,
        index: usize,
        name: String,
        hits: u64,
        energy: i64,
        acc: f64,
    },
    FreqNoHits {
        cpu: u32,
        index: usize,
        khz: u32,
    },
    FreqNoModel {
        cpu: u32,
        index: usize,
        khz: u32,
        hits: u64,
        duration: f64,
    },
    Freq {
        cpu: u32,
        index: usize,
        khz: u32,
        hits: u64,
        duration: f64,
        power: i64,
        acc: f64,
    },
    CapEstimate {
        pstate: usize,
        khz: u32,
        max_duration: f64,
        power: i64,
        acc: f64,
    },
}

impl BreakdownRow {
    /// Minimum verbosity at which the row is worth showing.
    pub fn verbosity(&self) -> u8 {
        match self {
            BreakdownRow::IdleNoHits { .. }
            | BreakdownRow::IdleNoModel { .. }
            | BreakdownRow::FreqNoHits { .. }
            | BreakdownRow::FreqNoModel { .. } => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterReport {
    pub letter: char,
    pub energy: EnergyBreakdown,
    #[serde(skip)]
    pub rows: Vec<BreakdownRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnergyReport {
    pub clusters: Vec<ClusterReport>,
    pub total: EnergyBreakdown,
}

/// Running sums for one cluster, before unit conversion.
/// Per-core idle energy is folded into the cluster idle sum; there is no
/// separate per-core total.
#[derive(Debug, Default)]
struct Accumulators {
    cap_us: f64,
    idle_us_incl_cores: f64,
    wakeup: f64,
}

/// Estimate the energy breakdown of every cluster in `topology` using the
/// coefficients in `model`. Topology clusters are matched to model clusters
/// by position.
pub fn calculate(
    model: &EnergyModel,
    topology: &Topology,
    opts: &CalculatorOptions,
) -> Result<EnergyReport> {
    if model.cluster_count() != topology.clusters.len() {
        return Err(Error::TopologyMismatch {
            model: model.cluster_count(),
            topology: topology.clusters.len(),
        });
    }

    let mut report = EnergyReport::default();
    let pairs = topology.clusters.iter().zip(&model.clusters);
    for (ordinal, (cluster, cluster_model)) in pairs.enumerate() {
        let cluster_report = calculate_cluster(ordinal, cluster, cluster_model, opts);
        report.total.add(&cluster_report.energy);
        report.clusters.push(cluster_report);
    }
    Ok(report)
}

fn calculate_cluster(
    ordinal: usize,
    cluster: &Cluster,
    model: &ClusterEnergyModel,
    opts: &CalculatorOptions,
) -> ClusterReport {
    let letter = cluster_letter(ordinal);
    let mut acc = Accumulators::default();
    let mut rows = Vec::new();

    // Cluster-level idle states. Cluster wake-ups are only derived here.
    for (index, c) in cluster.cstates.iter().enumerate() {
        let Some(cp) = lookup_idle(model, Origin::Cluster, index, c, &mut rows) else {
            continue;
        };

        if c.name == opts.cluster_wakeup_state {
            let energy = model.wakeup_energy.cluster_wakeup_energy;
            acc.wakeup += c.hits as f64 * energy as f64;
            rows.push(BreakdownRow::Wakeup {
                origin: Origin::Cluster,
                index,
                name: c.name.clone(),
                hits: c.hits,
                energy,
                acc: acc.wakeup,
            });
        }

        acc.idle_us_incl_cores += c.duration * cp.cluster_idle_power as f64;
        rows.push(BreakdownRow::Idle {
            origin: Origin::Cluster,
            index,
            name: c.name.clone(),
            hits: c.hits,
            duration: c.duration,
            power: cp.cluster_idle_power,
            acc: acc.idle_us_incl_cores,
        });
    }

    // No cluster P-state residency is collected, so the cluster's time at a
    // frequency is estimated as the longest any of its CPUs spent there.
    let mut max_core_duration: BTreeMap<u32, f64> = BTreeMap::new();

    for cpu in cluster.cpus() {
        let origin = Origin::Cpu(cpu.id);

        for (index, c) in cpu.cstates.iter().enumerate() {
            let Some(cp) = lookup_idle(model, origin, index, c, &mut rows) else {
                continue;
            };

            acc.idle_us_incl_cores += c.duration * cp.core_idle_power as f64;
            rows.push(BreakdownRow::Idle {
                origin,
                index,
                name: c.name.clone(),
                hits: c.hits,
                duration: c.duration,
                power: cp.core_idle_power,
                acc: acc.idle_us_incl_cores,
            });

            if c.name == opts.core_wakeup_state {
                let energy = model.wakeup_energy.core_wakeup_energy;
                acc.wakeup += c.hits as f64 * energy as f64;
                rows.push(BreakdownRow::Wakeup {
                    origin,
                    index,
                    name: c.name.clone(),
                    hits: c.hits,
                    energy,
                    acc: acc.wakeup,
                });
            }
        }

        for (index, p) in cpu.pstates.iter().enumerate() {
            let khz = p.freq_khz();
            if p.hits == 0 {
                log::trace!("cluster{} cpu{} P{}: no hits at {} kHz", letter, cpu.id, index, khz);
                rows.push(BreakdownRow::FreqNoHits {
                    cpu: cpu.id,
                    index,
                    khz,
                });
                continue;
            }
            let Some(pp) = model.find_pstate(khz) else {
                log::debug!(
                    "cluster{} cpu{} P{}: no energy model for {} kHz ({} hits, {} us)",
                    letter,
                    cpu.id,
                    index,
                    khz,
                    p.hits,
                    p.duration
                );
                rows.push(BreakdownRow::FreqNoModel {
                    cpu: cpu.id,
                    index,
                    khz,
                    hits: p.hits,
                    duration: p.duration,
                });
                continue;
            };

            let longest = max_core_duration.entry(khz).or_insert(0.0);
            *longest = longest.max(p.duration);

            acc.cap_us += p.duration * pp.core_power as f64;
            rows.push(BreakdownRow::Freq {
                cpu: cpu.id,
                index,
                khz,
                hits: p.hits,
                duration: p.duration,
                power: pp.core_power,
                acc: acc.cap_us,
            });
        }
    }

    let n = model.p_energy.len();
    for (i, pp) in model.p_energy.iter().enumerate() {
        let max_duration = max_core_duration.get(&pp.speed_khz).copied().unwrap_or(0.0);
        acc.cap_us += max_duration * pp.cluster_power as f64;
        rows.push(BreakdownRow::CapEstimate {
            pstate: n - i - 1,
            khz: pp.speed_khz,
            max_duration,
            power: pp.cluster_power,
            acc: acc.cap_us,
        });
    }

    // Convert once, after summation, so small terms are not lost.
    let energy = EnergyBreakdown {
        cap: acc.cap_us / US_PER_SEC,
        idle: acc.idle_us_incl_cores / US_PER_SEC,
        wakeup: acc.wakeup * WAKEUP_SCALE,
    };

    ClusterReport {
        letter,
        energy,
        rows,
    }
}

/// Skip zero-hit and unmodelled idle states, recording why.
fn lookup_idle<'m>(
    model: &'m ClusterEnergyModel,
    origin: Origin,
    index: usize,
    c: &CStateStats,
    rows: &mut Vec<BreakdownRow>,
) -> Option<&'m CStateEnergy> {
    if c.hits == 0 {
        log::trace!("{:?} C{}: no hits for [{}]", origin, index, c.name);
        rows.push(BreakdownRow::IdleNoHits {
            origin,
            index,
            name: c.name.clone(),
        });
        return None;
    }

    let found = model.find_cstate(&c.name);
    if found.is_none() {
        log::debug!(
            "{:?} C{}: no energy model for [{}] ({} hits, {} us)",
            origin,
            index,
            c.name,
            c.hits,
            c.duration
        );
        rows.push(BreakdownRow::IdleNoModel {
            origin,
            index,
            name: c.name.clone(),
            hits: c.hits,
            duration: c.duration,
        });
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PStateEnergy, ParseState, WakeupEnergy};
    use crate::topology::{Core, Cpu, PStateStats};

    fn c1(hits: u64, duration: f64) -> CStateStats {
        CStateStats {
            name: "C1".into(),
            hits,
            duration,
        }
    }

    fn single_cluster_model() -> EnergyModel {
        EnergyModel {
            clusters: vec![ClusterEnergyModel {
                number_cap_states: 1,
                number_c_states: 1,
                p_energy: vec![PStateEnergy {
                    speed_khz: 1000,
                    cluster_power: 20,
                    core_power: 8,
                }],
                c_energy: vec![CStateEnergy {
                    name: "C1".into(),
                    cluster_idle_power: 10,
                    core_idle_power: 5,
                }],
                wakeup_energy: WakeupEnergy {
                    cluster_wakeup_energy: 100,
                    core_wakeup_energy: 50,
                },
                state: ParseState::ParsingIdleStates,
            }],
        }
    }

    fn single_cluster_topology() -> Topology {
        Topology {
            clusters: vec![Cluster {
                id: 0,
                cstates: vec![c1(2, 1_000_000.0)],
                cores: vec![Core {
                    id: 0,
                    cpus: vec![Cpu {
                        id: 0,
                        cstates: vec![c1(2, 1_000_000.0)],
                        pstates: vec![PStateStats {
                            freq_hz: 1_000_000,
                            hits: 1,
                            duration: 500_000.0,
                        }],
                    }],
                }],
            }],
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_single_cluster_breakdown() {
        let report = calculate(
            &single_cluster_model(),
            &single_cluster_topology(),
            &CalculatorOptions::default(),
        )
        .unwrap();

        let energy = report.clusters[0].energy;
        assert_close(energy.idle, 15.0);
        assert_close(energy.cap, 14.0);
        assert_close(energy.wakeup, 200.0 * 47742.0 / 1_024_000.0);
        assert_close(energy.total(), 15.0 + 14.0 + 200.0 * WAKEUP_SCALE);
        assert_close(report.total.total(), energy.total());
        assert!((report.total.total() - 38.32).abs() < 0.01);
    }

    #[test]
    fn test_calculation_is_idempotent() {
        let model = single_cluster_model();
        let topo = single_cluster_topology();
        let opts = CalculatorOptions::default();
        let first = calculate(&model, &topo, &opts).unwrap();
        let second = calculate(&model, &topo, &opts).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cluster_count_mismatch() {
        let mut topo = single_cluster_topology();
        topo.clusters.push(Cluster::default());
        let err = calculate(&single_cluster_model(), &topo, &CalculatorOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::TopologyMismatch {
                model: 1,
                topology: 2
            }
        ));
    }

    #[test]
    fn test_empty_model_and_topology() {
        let report = calculate(
            &EnergyModel::default(),
            &Topology::default(),
            &CalculatorOptions::default(),
        )
        .unwrap();
        assert!(report.clusters.is_empty());
        assert_eq!(report.total.total(), 0.0);
    }

    #[test]
    fn test_unmodelled_states_contribute_nothing() {
        let mut topo = single_cluster_topology();
        let cpu = &mut topo.clusters[0].cores[0].cpus[0];
        cpu.cstates = vec![CStateStats {
            name: "C9".into(),
            hits: 4,
            duration: 123.0,
        }];
        cpu.pstates[0].freq_hz = 2_000_000;
        topo.clusters[0].cstates.clear();

        let report = calculate(&single_cluster_model(), &topo, &CalculatorOptions::default()).unwrap();
        let cluster = &report.clusters[0];
        assert_eq!(cluster.energy, EnergyBreakdown::default());
        assert!(cluster.rows.iter().any(|r| matches!(r, BreakdownRow::IdleNoModel { name, .. } if name == "C9")));
        assert!(cluster.rows.iter().any(|r| matches!(r, BreakdownRow::FreqNoModel { khz: 2000, .. })));
    }

    #[test]
    fn test_zero_hit_states_skipped() {
        let mut topo = single_cluster_topology();
        topo.clusters[0].cstates = vec![c1(0, 1_000_000.0)];
        let report = calculate(&single_cluster_model(), &topo, &CalculatorOptions::default()).unwrap();
        let energy = report.clusters[0].energy;
        assert_close(energy.idle, 5.0);
        assert_close(energy.wakeup, 0.0);
        assert_eq!(report.clusters[0].rows[0].verbosity(), 2);
    }

    #[test]
    fn test_core_wakeups_from_wfi() {
        let mut model = single_cluster_model();
        model.clusters[0].c_energy.push(CStateEnergy {
            name: "WFI".into(),
            cluster_idle_power: 0,
            core_idle_power: 0,
        });
        let mut topo = single_cluster_topology();
        topo.clusters[0].cstates.clear();
        topo.clusters[0].cores[0].cpus[0].cstates = vec![CStateStats {
            name: "WFI".into(),
            hits: 10,
            duration: 0.0,
        }];

        let report = calculate(&model, &topo, &CalculatorOptions::default()).unwrap();
        assert_close(report.clusters[0].energy.wakeup, 10.0 * 50.0 * WAKEUP_SCALE);
    }

    #[test]
    fn test_cluster_estimate_uses_longest_cpu() {
        let mut topo = single_cluster_topology();
        let mut second = topo.clusters[0].cores[0].cpus[0].clone();
        second.id = 1;
        second.cstates.clear();
        second.pstates[0].duration = 750_000.0;
        topo.clusters[0].cores.push(Core {
            id: 1,
            cpus: vec![second],
        });

        let report = calculate(&single_cluster_model(), &topo, &CalculatorOptions::default()).unwrap();
        // cores: (500000 + 750000) * 8, cluster: 750000 * 20
        assert_close(report.clusters[0].energy.cap, (10_000_000.0 + 15_000_000.0) / 1e6);
    }

    #[test]
    fn test_custom_wakeup_state_names() {
        let opts = CalculatorOptions {
            cluster_wakeup_state: "cluster-sleep".into(),
            core_wakeup_state: "C1".into(),
        };
        let report = calculate(&single_cluster_model(), &single_cluster_topology(), &opts).unwrap();
        // cluster C1 no longer counts, CPU C1 now counts as core wake-ups
        assert_close(report.clusters[0].energy.wakeup, 2.0 * 50.0 * WAKEUP_SCALE);
    }
}
