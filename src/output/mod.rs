use crate::energy::{BreakdownRow, ClusterReport, EnergyReport, Origin};
use crate::model::{EnergyModel, cluster_letter};
use colored::Colorize;

/// Fixed-point and scientific renderings of one energy value.
fn energy_cell(value: f64) -> String {
    format!("{:14.0} ({})", value, scientific(value))
}

/// `{:.6e}` with a signed, two-digit exponent: `1.400000e+01`.
fn scientific(value: f64) -> String {
    let raw = format!("{:.6e}", value);
    let Some((mantissa, exponent)) = raw.split_once('e') else {
        return raw;
    };
    match exponent.parse::<i32>() {
        Ok(exp) => {
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        Err(_) => raw,
    }
}

fn table_header(letter: char) -> String {
    format!(
        "Cluster{}{:29} | {:>13} | {:>7} | {:>7} | {:>12} | {:>12} | {:>12} |",
        letter, "", "[us] Duration", "Power", "Energy", "E_cap", "E_idle", "E_wkup"
    )
}

fn origin_label(origin: Origin) -> String {
    match origin {
        Origin::Cluster => "    ".to_string(),
        Origin::Cpu(id) => format!("Cpu{}", id),
    }
}

/// One line of the verbose breakdown table.
pub fn format_row(row: &BreakdownRow) -> String {
    match row {
        BreakdownRow::IdleNoHits {
            origin,
            index,
            name,
        } => format!("{:<5} C{:<2} +{:>7} hits for [{}]", origin_label(*origin), index, 0, name),
        BreakdownRow::IdleNoModel {
            origin,
            index,
            name,
            hits,
            duration,
        } => format!(
            "{:<5} C{:<2} no energy model for [{}] ({} hits, {:.6} duration)",
            origin_label(*origin),
            index,
            name,
            hits,
            duration
        ),
        BreakdownRow::Idle {
            origin,
            index,
            name,
            hits,
            duration,
            power,
            acc,
        } => format!(
            "{:<5} C{:<2} +{:>7} hits for [{:>7}] | {:>13.0} | {:>7} | {:>7} | {:>12} | {:>12.0} | {:>12} |",
            origin_label(*origin),
            index,
            hits,
            name,
            duration,
            power,
            "",
            "",
            acc,
            ""
        ),
        BreakdownRow::Wakeup {
            origin,
            index,
            name,
            hits,
            energy,
            acc,
        } => format!(
            "{:<5} C{:<2} +{:>7} wkps frm [{:>4}] | {:>13} | {:>7} | {:>7} | {:>12} | {:>12} | {:>12.0} |",
            origin_label(*origin),
            index,
            hits,
            name,
            "",
            "",
            energy,
            "",
            "",
            acc
        ),
        BreakdownRow::FreqNoHits { cpu, index, khz } => {
            format!("Cpu{:<2}  P{:<2} +{:>7} hits for [{}]", cpu, index, 0, khz)
        }
        BreakdownRow::FreqNoModel {
            cpu,
            index,
            khz,
            hits,
            duration,
        } => format!(
            "Cpu{:<2}  P{:<2} no energy model for [{}] ({} hits, {:.6} duration)",
            cpu, index, khz, hits, duration
        ),
        BreakdownRow::Freq {
            cpu,
            index,
            khz,
            hits,
            duration,
            power,
            acc,
        } => format!(
            "Cpu{:<2}  P{:<2} +{:>7} hits for [{:>7}] | {:>13.0} | {:>7} | {:>7} | {:>12.0} | {:>12} | {:>12} |",
            cpu, index, hits, khz, duration, power, "", acc, "", ""
        ),
        BreakdownRow::CapEstimate {
            pstate,
            khz,
            max_duration,
            power,
            acc,
        } => format!(
            "       P{:02} cap estimate for [{:>7}] | {:>13.0} | {:>7} | {:>7} | {:>12.0} | {:>12} | {:>12} |",
            pstate, khz, max_duration, power, "", acc, "", ""
        ),
    }
}

fn print_cluster(cluster: &ClusterReport, verbosity: u8) {
    let shown: Vec<&BreakdownRow> = cluster
        .rows
        .iter()
        .filter(|r| r.verbosity() <= verbosity)
        .collect();

    if verbosity >= 1 {
        println!();
        println!("{}", table_header(cluster.letter).bold());
        for row in shown {
            let line = format_row(row);
            if row.verbosity() > 1 {
                println!("{}", line.dimmed());
            } else {
                println!("{}", line);
            }
        }
        println!();
    }

    let letter = cluster.letter;
    let e = &cluster.energy;
    println!("Cluster{} Energy Caps  {}", letter, energy_cell(e.cap));
    println!("Cluster{} Energy Idle  {}", letter, energy_cell(e.idle));
    println!("Cluster{} Energy Wkps  {}", letter, energy_cell(e.wakeup));
    println!(
        "{}",
        format!("Cluster{} Energy Index {}", letter, energy_cell(e.total())).bold()
    );
}

/// Print the per-cluster and system energy breakdown.
/// Verbosity 1 adds the traversal table, 2 adds skipped states.
pub fn print_report(report: &EnergyReport, verbosity: u8) {
    for cluster in &report.clusters {
        println!();
        print_cluster(cluster, verbosity);
    }

    println!();
    println!(
        "{}",
        format!("   Total Energy Index {}", energy_cell(report.total.total()))
            .green()
            .bold()
    );
    println!();
}

pub fn print_report_json(report: &EnergyReport) {
    let output = serde_json::json!({
        "clusters": report.clusters.iter().map(|c| serde_json::json!({
            "cluster": c.letter.to_string(),
            "cap": c.energy.cap,
            "idle": c.energy.idle,
            "wakeup": c.energy.wakeup,
            "total": c.energy.total(),
        })).collect::<Vec<_>>(),
        "total": {
            "cap": report.total.cap,
            "idle": report.total.idle,
            "wakeup": report.total.wakeup,
            "total": report.total.total(),
        },
    });

    println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
}

/// Summary printed by `emodel check`.
pub fn print_model_summary(model: &EnergyModel) {
    println!("{} {}", "Clusters:".bold(), model.cluster_count());
    for (ordinal, cluster) in model.clusters.iter().enumerate() {
        println!(
            "  cluster{}  {} cap states  {} C states  wakeup {}/{}",
            cluster_letter(ordinal),
            cluster.number_cap_states,
            cluster.number_c_states,
            cluster.wakeup_energy.cluster_wakeup_energy,
            cluster.wakeup_energy.core_wakeup_energy
        );
        if !cluster.c_energy.is_empty() {
            let names: Vec<&str> = cluster.c_energy.iter().map(|c| c.name.as_str()).collect();
            println!("             {}", names.join(" ").dimmed());
        }
    }
}
