//! Human-readable run summaries.

use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use lampkit_core::{PublishOutcome, RepositorySetupResult, SetupStatus};
use lampkit_runtime::{PublishRecord, ReloadOutcome, RunSummary, SupervisorOutcome};

#[derive(Tabled)]
struct SetupRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "repository")]
    repository: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "detail")]
    detail: String,
    #[tabled(rename = "time")]
    elapsed: String,
}

#[derive(Tabled)]
struct PublishRow {
    #[tabled(rename = "repository")]
    repository: String,
    #[tabled(rename = "publish")]
    status: String,
    #[tabled(rename = "detail")]
    detail: String,
}

pub fn print_setup(results: &[RepositorySetupResult]) {
    if results.is_empty() {
        println!("Manifest is empty; nothing to set up.");
        return;
    }
    let rows: Vec<SetupRow> = results
        .iter()
        .map(|r| SetupRow {
            index: r.descriptor.index,
            repository: r.descriptor.label(),
            status: setup_label(&r.status),
            detail: r.detail.clone().unwrap_or_default(),
            elapsed: format!("{:.1}s", r.elapsed_ms as f64 / 1000.0),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

pub fn print_publish(records: &[PublishRecord], reload: &ReloadOutcome) {
    if records.is_empty() {
        return;
    }
    let rows: Vec<PublishRow> = records
        .iter()
        .map(|p| {
            let (status, detail) = publish_cells(p);
            PublishRow {
                repository: format!("{}/{}", p.org, p.repo),
                status,
                detail,
            }
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!("web server: {}", reload_label(reload));
}

pub fn print_run(summary: &RunSummary) {
    print_setup(&summary.setup);
    print_publish(&summary.publish, &summary.reload);
    println!("supervisor: {}", supervisor_label(&summary.supervisor));

    let total = summary.setup.len();
    let configured = summary.configured();
    let separator = "■".repeat(60).bright_black().to_string();
    println!("{separator}");
    println!(
        "{} configured  {} skipped/failed  ({:.1}s)",
        configured.to_string().green().bold(),
        (total - configured).to_string().red().bold(),
        summary.duration_ms as f64 / 1000.0,
    );
}

pub fn setup_label(status: &SetupStatus) -> String {
    match status {
        SetupStatus::Succeeded => "SUCCEEDED".green().bold().to_string(),
        SetupStatus::Failed(reason) => format!("FAILED ({reason})").red().bold().to_string(),
    }
}

fn publish_cells(record: &PublishRecord) -> (String, String) {
    if let Some(err) = &record.error {
        return ("FAILED".red().bold().to_string(), err.clone());
    }
    match &record.outcome {
        Some(PublishOutcome::Published {
            symlink_path,
            acl_applied,
            ..
        }) => {
            let acl = if *acl_applied { " (+acl)" } else { "" };
            (
                "PUBLISHED".green().bold().to_string(),
                format!("{}{acl}", symlink_path.display()),
            )
        }
        Some(PublishOutcome::Skipped { reason, .. }) => {
            ("SKIPPED".yellow().bold().to_string(), reason.to_string())
        }
        None => (String::new(), String::new()),
    }
}

fn reload_label(reload: &ReloadOutcome) -> String {
    match reload {
        ReloadOutcome::Reloaded => "reloaded".green().to_string(),
        ReloadOutcome::Skipped(why) => format!("not reloaded ({why})").bright_black().to_string(),
        ReloadOutcome::Failed(err) => format!("reload failed: {err}").red().to_string(),
    }
}

fn supervisor_label(outcome: &SupervisorOutcome) -> String {
    match outcome {
        SupervisorOutcome::Applied { config_path } => {
            format!("applied {}", config_path.display()).green().to_string()
        }
        SupervisorOutcome::Skipped { reason } => {
            format!("skipped ({reason})").bright_black().to_string()
        }
    }
}
