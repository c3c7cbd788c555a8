use super::{
    CStateEnergy, ClusterEnergyModel, EnergyModel, MAX_CLUSTERS, MAX_STATE_NAME_LEN,
    MAX_STATES_PER_CLUSTER, PStateEnergy, ParseState, WakeupEnergy, cluster_letter,
};
use crate::error::{Error, Result};
use std::path::Path;

/// Shape of a single model-file line, before any state checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    Blank,
    Comment,
    /// `clusters N`
    ClusterCount(usize),
    /// `clusterX: N cap states M C states`
    ClusterHeader {
        letter: char,
        cap_states: usize,
        c_states: usize,
    },
    /// `P-states:`
    PStates,
    /// `C-states:`
    CStates,
    /// `wakeup W1 W2`
    Wakeup(WakeupEnergy),
    /// Anything else; interpreted by the current section.
    Data(&'a str),
}

impl LineKind<'_> {
    /// Context label used in grammar errors raised for this line.
    fn context(&self) -> &'static str {
        match self {
            LineKind::ClusterCount(_) => "clusters",
            LineKind::ClusterHeader { .. } => "cluster header",
            LineKind::PStates => "P-states",
            LineKind::CStates => "C-states",
            LineKind::Wakeup(_) => "wakeup",
            LineKind::Blank | LineKind::Comment | LineKind::Data(_) => "state data",
        }
    }
}

/// Classify a raw line. Returns the context label and a detail message
/// when a recognised keyword carries malformed fields.
pub fn classify_line(line: &str) -> std::result::Result<LineKind<'_>, (&'static str, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(LineKind::Blank);
    }
    if trimmed.starts_with('#') {
        return Ok(LineKind::Comment);
    }

    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    let keyword = fields[0];

    if keyword == "clusters" {
        return match fields.as_slice() {
            [_, n] => n
                .parse()
                .map(LineKind::ClusterCount)
                .map_err(|_| ("clusters", format!("invalid cluster count '{}'", n))),
            _ => Err(("clusters", "expected 'clusters <N>'".to_string())),
        };
    }

    if let Some(rest) = keyword.strip_prefix("cluster") {
        return parse_cluster_header(rest, &fields[1..]);
    }

    match keyword.trim_end_matches(':') {
        "P-states" if fields.len() == 1 => return Ok(LineKind::PStates),
        "C-states" if fields.len() == 1 => return Ok(LineKind::CStates),
        "wakeup" => {
            return match fields.as_slice() {
                [_, cluster, core] => match (cluster.parse::<i64>(), core.parse::<i64>()) {
                    (Ok(cluster_wakeup_energy), Ok(core_wakeup_energy)) => {
                        Ok(LineKind::Wakeup(WakeupEnergy {
                            cluster_wakeup_energy,
                            core_wakeup_energy,
                        }))
                    }
                    _ => Err(("wakeup", format!("invalid wakeup energies '{}'", trimmed))),
                },
                _ => Err(("wakeup", "expected 'wakeup <cluster> <core>'".to_string())),
            };
        }
        _ => {}
    }

    Ok(LineKind::Data(trimmed))
}

fn parse_cluster_header<'a>(
    letter: &str,
    rest: &[&str],
) -> std::result::Result<LineKind<'a>, (&'static str, String)> {
    let malformed = || {
        (
            "cluster header",
            "expected 'clusterX: <N> cap states <M> C states'".to_string(),
        )
    };

    let letter = letter.strip_suffix(':').ok_or_else(malformed)?;
    let mut chars = letter.chars();
    let (Some(letter), None) = (chars.next(), chars.next()) else {
        return Err(malformed());
    };

    match rest {
        [cap, "cap", "states", c, "C", "states"] => {
            let cap_states = cap.parse().map_err(|_| malformed())?;
            let c_states = c.parse().map_err(|_| malformed())?;
            Ok(LineKind::ClusterHeader {
                letter,
                cap_states,
                c_states,
            })
        }
        _ => Err(malformed()),
    }
}

/// `<speed> <cluster power> <core power>`
pub fn parse_pstate_line(line: &str) -> Option<PStateEnergy> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [speed, cluster, core] = fields.as_slice() else {
        return None;
    };
    Some(PStateEnergy {
        speed_khz: speed.parse().ok()?,
        cluster_power: cluster.parse().ok()?,
        core_power: core.parse().ok()?,
    })
}

/// `<name> <cluster idle power> <core idle power>`
pub fn parse_cstate_line(line: &str) -> Option<CStateEnergy> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [name, cluster, core] = fields.as_slice() else {
        return None;
    };
    if name.len() > MAX_STATE_NAME_LEN {
        return None;
    }
    Some(CStateEnergy {
        name: name.to_string(),
        cluster_idle_power: cluster.parse().ok()?,
        core_idle_power: core.parse().ok()?,
    })
}

/// Per-cluster entry cursors. `*_filled` is the high-water mark used to
/// detect under-filled sections once the whole file has been read.
#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    pstate: usize,
    cstate: usize,
    pstates_filled: usize,
    cstates_filled: usize,
}

/// Line-driven builder for an [`EnergyModel`].
pub struct ModelParser<'p> {
    path: &'p Path,
    line: usize,
    declared_clusters: Option<usize>,
    clusters: Vec<ClusterEnergyModel>,
    cursors: Vec<Cursor>,
    current: Option<usize>,
}

impl<'p> ModelParser<'p> {
    pub fn new(path: &'p Path) -> Self {
        Self {
            path,
            line: 0,
            declared_clusters: None,
            clusters: Vec::new(),
            cursors: Vec::new(),
            current: None,
        }
    }

    fn error(
        &self,
        context: &'static str,
        cluster: Option<char>,
        detail: impl Into<String>,
    ) -> Error {
        Error::Grammar {
            context,
            cluster,
            path: self.path.to_path_buf(),
            line: (self.line > 0).then_some(self.line),
            detail: detail.into(),
        }
    }

    fn current_letter(&self) -> Option<char> {
        self.current.map(cluster_letter)
    }

    /// Feed the next line of the file.
    pub fn feed(&mut self, raw: &str) -> Result<()> {
        self.line += 1;
        let kind = classify_line(raw).map_err(|(context, detail)| {
            let cluster = self.current_letter();
            self.error(context, cluster, detail)
        })?;
        let context = kind.context();

        match kind {
            LineKind::Blank | LineKind::Comment => Ok(()),
            LineKind::ClusterCount(n) => self.declare_clusters(context, n),
            LineKind::ClusterHeader {
                letter,
                cap_states,
                c_states,
            } => self.begin_cluster(context, letter, cap_states, c_states),
            LineKind::PStates => self.enter_section(context, ParseState::ParsingFrequencyStates),
            LineKind::CStates => self.enter_section(context, ParseState::ParsingIdleStates),
            LineKind::Wakeup(wakeup) => {
                let idx = self
                    .current
                    .ok_or_else(|| self.error(context, None, "unknown cluster (wakeup)"))?;
                self.clusters[idx].wakeup_energy = wakeup;
                Ok(())
            }
            LineKind::Data(line) => self.data_line(context, line),
        }
    }

    fn declare_clusters(&mut self, context: &'static str, n: usize) -> Result<()> {
        if self.declared_clusters.is_some() {
            return Err(self.error(context, None, "number of clusters already specified"));
        }
        if n > MAX_CLUSTERS {
            return Err(self.error(
                context,
                None,
                format!("{} clusters declared, at most {} supported", n, MAX_CLUSTERS),
            ));
        }
        self.declared_clusters = Some(n);
        self.clusters = vec![ClusterEnergyModel::default(); n];
        self.cursors = vec![Cursor::default(); n];
        Ok(())
    }

    fn begin_cluster(
        &mut self,
        context: &'static str,
        letter: char,
        cap_states: usize,
        c_states: usize,
    ) -> Result<()> {
        let declared = self.declared_clusters.unwrap_or(0);
        let ordinal = (letter as u32)
            .checked_sub('A' as u32)
            .map(|o| o as usize)
            .filter(|&o| o < declared)
            .ok_or_else(|| self.error(context, Some(letter), "cluster out of range"))?;

        if self.clusters[ordinal].state != ParseState::Unset {
            return Err(self.error(
                context,
                Some(letter),
                "number of cap states already specified",
            ));
        }

        if cap_states > MAX_STATES_PER_CLUSTER || c_states > MAX_STATES_PER_CLUSTER {
            return Err(self.error(
                context,
                Some(letter),
                format!(
                    "{} cap states / {} C states declared, at most {} each supported",
                    cap_states, c_states, MAX_STATES_PER_CLUSTER
                ),
            ));
        }

        let cluster = &mut self.clusters[ordinal];
        cluster.number_cap_states = cap_states;
        cluster.number_c_states = c_states;
        cluster.p_energy = vec![PStateEnergy::default(); cap_states];
        cluster.c_energy = vec![CStateEnergy::default(); c_states];
        cluster.state = ParseState::ClusterInfoParsed;
        self.current = Some(ordinal);
        Ok(())
    }

    fn enter_section(&mut self, context: &'static str, section: ParseState) -> Result<()> {
        let what = match section {
            ParseState::ParsingFrequencyStates => "cap states",
            _ => "C states",
        };
        let idx = self
            .current
            .ok_or_else(|| self.error(context, None, format!("unknown cluster ({})", what)))?;
        if self.clusters[idx].state < ParseState::ClusterInfoParsed {
            return Err(self.error(
                context,
                Some(cluster_letter(idx)),
                format!("number of {} not specified", what),
            ));
        }

        let cursor = &mut self.cursors[idx];
        match section {
            ParseState::ParsingFrequencyStates => cursor.pstate = 0,
            _ => cursor.cstate = 0,
        }
        self.clusters[idx].state = section;
        Ok(())
    }

    fn data_line(&mut self, context: &'static str, line: &str) -> Result<()> {
        let idx = self
            .current
            .ok_or_else(|| self.error(context, None, "unknown cluster"))?;
        let letter = Some(cluster_letter(idx));

        let state = self.clusters[idx].state;
        match state {
            ParseState::ParsingFrequencyStates => {
                let entry = parse_pstate_line(line).ok_or_else(|| {
                    self.error(context, letter, "expected P state (speed cluster core)")
                })?;
                let cursor = self.cursors[idx].pstate;
                if cursor >= self.clusters[idx].number_cap_states {
                    return Err(self.error(context, letter, "too many cap states specified"));
                }
                let filled = self.cursors[idx].pstates_filled;
                let duplicate = self.clusters[idx].p_energy[..filled]
                    .iter()
                    .enumerate()
                    .any(|(i, p)| i != cursor && p.speed_khz == entry.speed_khz);
                if duplicate {
                    return Err(self.error(
                        context,
                        letter,
                        format!("cap state {} specified twice", entry.speed_khz),
                    ));
                }
                self.clusters[idx].p_energy[cursor] = entry;
                let c = &mut self.cursors[idx];
                c.pstate += 1;
                c.pstates_filled = c.pstates_filled.max(c.pstate);
                Ok(())
            }
            ParseState::ParsingIdleStates => {
                let entry = parse_cstate_line(line).ok_or_else(|| {
                    self.error(
                        context,
                        letter,
                        format!(
                            "expected C state (name cluster core, name at most {} bytes)",
                            MAX_STATE_NAME_LEN
                        ),
                    )
                })?;
                let cursor = self.cursors[idx].cstate;
                if cursor >= self.clusters[idx].number_c_states {
                    return Err(self.error(context, letter, "too many C states specified"));
                }
                let filled = self.cursors[idx].cstates_filled;
                let duplicate = self.clusters[idx].c_energy[..filled]
                    .iter()
                    .enumerate()
                    .any(|(i, c)| i != cursor && c.name == entry.name);
                if duplicate {
                    return Err(self.error(
                        context,
                        letter,
                        format!("C state {} specified twice", entry.name),
                    ));
                }
                self.clusters[idx].c_energy[cursor] = entry;
                let c = &mut self.cursors[idx];
                c.cstate += 1;
                c.cstates_filled = c.cstates_filled.max(c.cstate);
                Ok(())
            }
            ParseState::Unset | ParseState::ClusterInfoParsed => Err(self.error(
                context,
                letter,
                format!("unexpected line '{}' outside P-states/C-states section", line),
            )),
        }
    }

    /// Check end-of-file invariants and hand over the completed model.
    pub fn finish(mut self) -> Result<EnergyModel> {
        self.line = 0;
        const CONTEXT: &str = "energy model";

        if self.declared_clusters.is_none() {
            return Err(self.error(CONTEXT, None, "number of clusters not specified"));
        }

        for (idx, (cluster, cursor)) in self.clusters.iter().zip(&self.cursors).enumerate() {
            let letter = Some(cluster_letter(idx));
            if cluster.state == ParseState::Unset {
                return Err(self.error(CONTEXT, letter, "cluster not described"));
            }
            if cursor.pstates_filled < cluster.number_cap_states {
                return Err(self.error(
                    CONTEXT,
                    letter,
                    format!(
                        "only {} of {} cap states specified",
                        cursor.pstates_filled, cluster.number_cap_states
                    ),
                ));
            }
            if cursor.cstates_filled < cluster.number_c_states {
                return Err(self.error(
                    CONTEXT,
                    letter,
                    format!(
                        "only {} of {} C states specified",
                        cursor.cstates_filled, cluster.number_c_states
                    ),
                ));
            }
        }

        Ok(EnergyModel {
            clusters: self.clusters,
        })
    }
}

/// Parse model text. `path` is only used in error messages.
pub fn parse_str(content: &str, path: &Path) -> Result<EnergyModel> {
    let mut parser = ModelParser::new(path);
    for line in content.lines() {
        parser.feed(line)?;
    }
    parser.finish()
}

/// Read and parse a model file.
/// A missing file is reported as [`Error::ModelNotFound`] so the caller can
/// offer a template instead.
pub fn load(path: &Path) -> Result<EnergyModel> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::ModelNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(Error::ModelRead {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    let model = parse_str(&content, path)?;
    log::info!("parsed energy model file {}", path.display());
    Ok(model)
}
