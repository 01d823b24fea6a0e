//! Rendering of actions, patches and cycle reports

use colored::{ColoredString, Colorize};
use maintenance::{ActionDescription, ActionKind, CycleReport, PatchOp, PhaseReport, ReportPatch};
use std::collections::BTreeMap;

fn action_symbol(kind: ActionKind) -> ColoredString {
    match kind {
        ActionKind::CreateDatabase | ActionKind::CreateCollection | ActionKind::EnsureIndex => {
            "+".green()
        }
        ActionKind::DropDatabase | ActionKind::DropCollection | ActionKind::DropIndex => "-".red(),
        ActionKind::UpdateCollection => "~".yellow(),
        ActionKind::ResignShardLeadership | ActionKind::SynchronizeShard => "»".cyan(),
    }
}

/// Target of an action, e.g. `d1/s1`
fn action_target(action: &ActionDescription) -> String {
    match (action.database(), action.shard()) {
        (Some(database), Some(shard)) => format!("{database}/{shard}"),
        (Some(database), None) => database.to_string(),
        _ => String::new(),
    }
}

/// Parameters worth showing next to the target
fn action_details(action: &ActionDescription) -> String {
    let mut details = Vec::new();
    match action.kind() {
        ActionKind::CreateCollection | ActionKind::UpdateCollection => {
            let leader = action.get("leader").unwrap_or_default();
            details.push(if leader.is_empty() {
                "leading".to_string()
            } else {
                format!("following {leader}")
            });
            if let Some(props) = action.properties().and_then(|p| p.as_object())
                && action.kind() == ActionKind::UpdateCollection
                && !props.is_empty()
            {
                let keys: Vec<&str> = props.keys().map(String::as_str).collect();
                details.push(keys.join(", "));
            }
        }
        ActionKind::EnsureIndex => {
            details.push(format!(
                "{} {}",
                action.get("type").unwrap_or_default(),
                action.get("fields").unwrap_or_default()
            ));
        }
        ActionKind::DropIndex => details.push(format!("index {}", action.get("id").unwrap_or_default())),
        ActionKind::SynchronizeShard => {
            details.push(format!("from {}", action.get("leader").unwrap_or_default()));
        }
        _ => {}
    }
    details.join("; ")
}

/// Display actions grouped by kind
pub fn display_actions(title: &str, actions: &[ActionDescription]) {
    if actions.is_empty() {
        println!();
        println!("  {} {}: nothing to do", "✓".green(), title);
        return;
    }

    let mut by_kind: BTreeMap<ActionKind, Vec<&ActionDescription>> = BTreeMap::new();
    for action in actions {
        by_kind.entry(action.kind()).or_default().push(action);
    }

    println!();
    println!("┌─ {} ─────────────────────────────────────────┐", title.bold());
    println!("│");
    for (kind, kind_actions) in &by_kind {
        println!("│ {}", kind.as_str().bold());
        for action in kind_actions {
            println!(
                "│   {} {:<30} {}",
                action_symbol(*kind),
                action_target(action),
                action_details(action).dimmed()
            );
        }
        println!("│");
    }

    let destructive = actions.iter().filter(|a| a.kind().is_destructive()).count();
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} actions ({} destructive)",
        actions.len().to_string().bold(),
        destructive.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Display report patches in the order they would be published
///
/// Payloads are only shown with `show_payloads`.
pub fn display_patches(title: &str, patches: &[ReportPatch], show_payloads: bool) {
    if patches.is_empty() {
        println!();
        println!("  {} {}: Current is up to date", "✓".green(), title);
        return;
    }

    println!();
    println!("┌─ {} ─────────────────────────────────────────┐", title.bold());
    println!("│");
    for patch in patches {
        let symbol = match patch.operation {
            PatchOp::Set => "=".green(),
            PatchOp::Delete => "-".red(),
        };
        println!("│   {} {}", symbol, patch.path);
        if let Some(payload) = patch.payload.as_ref().filter(|_| show_payloads) {
            println!("│       {}", payload.to_string().dimmed());
        }
    }
    println!("│");

    let deletes = patches
        .iter()
        .filter(|p| p.operation == PatchOp::Delete)
        .count();
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} patches ({} set, {} delete)",
        patches.len().to_string().bold(),
        (patches.len() - deletes).to_string().green(),
        deletes.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

fn format_version(version: Option<u64>) -> String {
    version.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}

fn display_phase(name: &str, phase: &PhaseReport) {
    crate::ui::section(name);
    crate::ui::kv("version", &format_version(phase.version));
    crate::ui::kv(
        "actions",
        &format!("{} derived, {} submitted", phase.actions.len(), phase.submitted),
    );
    crate::ui::kv(
        "patches",
        &format!("{} derived, {} published", phase.patches.len(), phase.published),
    );
    for error in &phase.errors {
        crate::ui::error(error);
    }
}

/// One-line outcome of a cycle
pub fn display_cycle_summary(report: &CycleReport) {
    if report.is_success() {
        crate::ui::success(&format!(
            "Cycle complete: {} actions, {} patches",
            report.total_actions(),
            report.total_patches()
        ));
    } else {
        crate::ui::warn("Cycle completed with errors");
    }
}

/// Display a full cycle report
pub fn display_cycle(report: &CycleReport, show_payloads: bool) {
    crate::ui::header(&format!("Maintenance cycle for {}", report.server_id));
    crate::ui::kv("started", &report.started_at.to_rfc3339());

    display_phase("Phase one: Plan vs Local", &report.phase_one);
    display_actions("Local actions", &report.phase_one.actions);

    display_phase("Phase two: Local vs Current", &report.phase_two);
    display_patches("Current report", &report.phase_two.patches, show_payloads);
    display_actions("Follower resync", &report.phase_two.actions);

    println!();
    display_cycle_summary(report);
}
