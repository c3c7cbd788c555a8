use super::cluster_letter;
use crate::error::{Error, Result};
use crate::topology::Topology;
use std::path::Path;

/// Render a blank model skeleton matching the shape of `topology`.
/// Coefficients are left as `?` for the user to fill in, so the output does
/// not parse until edited.
pub fn render(topology: &Topology, generated: &str) -> String {
    let mut lines = vec![
        format!("# This is an energy model template generated by emodel on {}", generated),
        "# Lines starting with # or which are blank are ignored".to_string(),
        "# Replace ? with correct values".to_string(),
        format!("clusters {}", topology.clusters.len()),
    ];

    for (ordinal, cluster) in topology.clusters.iter().enumerate() {
        let (pstates, cstates) = cluster
            .representative_cpu()
            .map(|cpu| (cpu.pstates.as_slice(), cpu.cstates.as_slice()))
            .unwrap_or_default();

        lines.push(format!(
            "cluster{}: {} cap states {} C states",
            cluster_letter(ordinal),
            pstates.len(),
            cstates.len()
        ));
        lines.push(String::new());
        lines.push("P-states:".to_string());
        lines.push("# speed, cluster power, core power".to_string());
        lines.extend(pstates.iter().map(|p| format!("{}\t\t?\t?", p.freq_khz())));
        lines.push(String::new());
        lines.push("C-states:".to_string());
        lines.push("# name, cluster power, core power".to_string());
        lines.extend(cstates.iter().map(|c| format!("{}\t\t?\t?", c.name)));
        lines.push(String::new());
        lines.push("wakeup\t\t?\t?".to_string());
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Write a template for `topology` to `path`, replacing any existing file.
pub fn write(path: &Path, topology: &Topology) -> Result<()> {
    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    std::fs::write(path, render(topology, &generated)).map_err(|e| Error::TemplateWrite {
        path: path.to_path_buf(),
        source: e,
    })
}
