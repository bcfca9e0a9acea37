//! Sync command implementations.

use std::sync::Arc;
use std::time::Duration;

use tabled::{Table, Tabled};
use tracing::{info, warn};

use crate::cli::error::CliResult;
use crate::cli::utils::{OutputFormat, apply_table_style, format_time, or_dash, parse_format, yes_no};
use crate::config::{ConfigSource, YamlConfigFile};
use crate::db::{Database, Table as DbTable};
use crate::sync::{
    FetchOutcome, GitOps, PushOutcome, SyncManager, SyncReport, SyncService, SyncStatus,
};

/// Initialize the sync repository.
pub async fn init<D, G, C>(manager: &SyncManager<D, G, C>) -> CliResult<String>
where
    D: Database,
    G: GitOps,
    C: ConfigSource,
{
    if !manager.initialize().await? {
        return Ok(
            "ℹ Sync is disabled or has no repository URL; nothing to initialize\n".to_string(),
        );
    }

    let status = manager.status().await?;
    let mut output = String::from("✓ Sync initialized\n\n");
    output.push_str(&format!("Sync directory: {}\n", status.sync_dir.display()));
    output.push_str(&format!("Remote URL:     {}\n", or_dash(status.remote_url)));
    Ok(output)
}

/// Run one sync cycle.
pub async fn sync<D, G, C>(manager: &SyncManager<D, G, C>, format: &str) -> CliResult<String>
where
    D: Database,
    G: GitOps,
    C: ConfigSource,
{
    let format = parse_format(format)?;
    let report = manager.sync().await?;
    format_report(&report, format)
}

/// Show sync status.
pub async fn status<D, G, C>(manager: &SyncManager<D, G, C>, format: &str) -> CliResult<String>
where
    D: Database,
    G: GitOps,
    C: ConfigSource,
{
    let format = parse_format(format)?;
    let status = manager.status().await?;
    format_status(&status, format)
}

/// Run the sync service until Ctrl-C, re-reading the config file every
/// `poll`.
pub async fn watch<D, G>(
    manager: SyncManager<D, G, YamlConfigFile>,
    config: Arc<YamlConfigFile>,
    poll: Duration,
) -> CliResult<()>
where
    D: Database,
    G: GitOps + 'static,
{
    let service = SyncService::new(manager);
    service.startup().await;
    info!(config = %config.path().display(), "Watching for changes, press Ctrl-C to stop");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(poll);
    ticker.tick().await;

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = config.reload() {
                    warn!(error = %e, "Failed to reload configuration");
                }
            }
        }
    }

    service.shutdown().await;
    Ok(())
}

fn fetch_label(fetch: &FetchOutcome) -> String {
    match fetch {
        FetchOutcome::Skipped => "skipped".to_string(),
        FetchOutcome::NoRemoteBranch => "remote empty".to_string(),
        FetchOutcome::CheckedOut => "checked out remote".to_string(),
        FetchOutcome::UpToDate => "up to date".to_string(),
        FetchOutcome::FastForwarded => "fast-forwarded".to_string(),
        FetchOutcome::Merged => "merged".to_string(),
        FetchOutcome::Resolved { files } => format!("resolved conflicts in {}", files.join(", ")),
    }
}

fn push_label(push: Option<PushOutcome>, attempts: u32) -> String {
    match push {
        Some(PushOutcome::Pushed) if attempts > 1 => format!("pushed after {} attempts", attempts),
        Some(PushOutcome::Pushed) => "pushed".to_string(),
        Some(PushOutcome::UpToDate) => "up to date".to_string(),
        None => "-".to_string(),
    }
}

fn table_title(table: DbTable) -> &'static str {
    match table {
        DbTable::Documents => "Documents",
        DbTable::Extensions => "Extensions",
        DbTable::KeyBindings => "Key bindings",
        DbTable::Themes => "Themes",
    }
}

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "Table")]
    table: &'static str,
    #[tabled(rename = "Created")]
    created: usize,
    #[tabled(rename = "Updated")]
    updated: usize,
    #[tabled(rename = "Unchanged")]
    unchanged: usize,
    #[tabled(rename = "Exported")]
    exported: usize,
}

/// Render a sync report.
pub fn format_report(report: &SyncReport, format: OutputFormat) -> CliResult<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(report)?);
    }

    let mut output = String::from("✓ Sync complete\n\n");
    output.push_str(&format!("Fetch:  {}\n", fetch_label(&report.fetch)));
    output.push_str(&format!("Import: {} records changed\n", report.import.changed()));
    output.push_str(&format!("Commit: {}\n", yes_no(report.committed)));
    output.push_str(&format!(
        "Push:   {}\n\n",
        push_label(report.push, report.push_attempts)
    ));

    let rows: Vec<ReportRow> = DbTable::ALL
        .iter()
        .map(|&table| {
            let imported = report.import.table(table);
            ReportRow {
                table: table_title(table),
                created: imported.created,
                updated: imported.updated,
                unchanged: imported.unchanged,
                exported: report.export.get(table),
            }
        })
        .collect();
    let mut table = Table::new(rows);
    apply_table_style(&mut table);
    output.push_str(&table.to_string());
    output.push('\n');

    for warning in &report.warnings {
        output.push_str(&format!("⚠ {}\n", warning));
    }
    Ok(output)
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Table")]
    table: &'static str,
    #[tabled(rename = "Store")]
    store: usize,
    #[tabled(rename = "Snapshot")]
    snapshot: usize,
}

/// Render the sync status.
pub fn format_status(status: &SyncStatus, format: OutputFormat) -> CliResult<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(status)?);
    }

    let fields = vec![
        FieldRow {
            field: "Enabled",
            value: yes_no(status.enabled).to_string(),
        },
        FieldRow {
            field: "Ready",
            value: yes_no(status.ready).to_string(),
        },
        FieldRow {
            field: "Phase",
            value: status.phase.to_string(),
        },
        FieldRow {
            field: "Repository URL",
            value: or_dash(Some(&status.repo_url).filter(|u| !u.is_empty())),
        },
        FieldRow {
            field: "Remote",
            value: or_dash(status.remote_url.as_ref()),
        },
        FieldRow {
            field: "Sync directory",
            value: status.sync_dir.display().to_string(),
        },
        FieldRow {
            field: "Working tree",
            value: match status.clean {
                Some(true) => "clean".to_string(),
                Some(false) => "modified".to_string(),
                None => "not initialized".to_string(),
            },
        },
        FieldRow {
            field: "Auto-sync",
            value: or_dash(status.auto_sync_minutes.map(|m| format!("every {} min", m))),
        },
        FieldRow {
            field: "Last sync",
            value: format_time(status.last_sync_at),
        },
        FieldRow {
            field: "Last error",
            value: or_dash(status.last_error.as_ref()),
        },
    ];
    let mut table = Table::new(fields);
    apply_table_style(&mut table);
    let mut output = table.to_string();
    output.push_str("\n\n");

    let mut counts: Vec<CountRow> = DbTable::ALL
        .iter()
        .map(|&table| CountRow {
            table: table_title(table),
            store: status.db_counts.get(table),
            snapshot: status.snapshot_counts.get(table),
        })
        .collect();
    counts.push(CountRow {
        table: "Total",
        store: status.db_counts.total(),
        snapshot: status.snapshot_counts.total(),
    });
    let mut table = Table::new(counts);
    apply_table_style(&mut table);
    output.push_str(&table.to_string());
    output.push('\n');
    Ok(output)
}
