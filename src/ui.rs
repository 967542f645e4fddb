use std::sync::Arc;

use prettytable::{Cell, Row, Table};
use serde_json::{Value, json};
use tracing as log;

use crate::{
    restore::{Notice, NoticeSink, Phase, RestoreResult, Severity},
    tooling::HostConsole,
};

const PREFIX: &str = "[RegionRestore]";

fn color(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "gray",
        Severity::Warning => "gold",
        Severity::Error => "red",
    }
}

/// Chat component for a notice that still allows cancelling: the message
/// followed by a clickable `[Cancel]` that runs `abort_command`.
pub fn render_tellraw(notice: &Notice, abort_command: &str) -> Value {
    json!([
        {
            "text": format!("{PREFIX} {} ", notice.message),
            "color": color(notice.severity),
        },
        {
            "text": "[Cancel]",
            "color": "red",
            "bold": true,
            "clickEvent": { "action": "run_command", "value": abort_command },
            "hoverEvent": {
                "action": "show_text",
                "contents": format!("Click to run {abort_command}"),
            },
        },
    ])
}

fn render_command(notice: &Notice, abort_command: &str) -> String {
    if notice.cancellable {
        format!("tellraw @a {}", render_tellraw(notice, abort_command))
    } else {
        format!("say {}", notice.message)
    }
}

pub struct BroadcastSink {
    host: Arc<dyn HostConsole>,
    abort_command: String,
}

impl BroadcastSink {
    pub fn new(host: Arc<dyn HostConsole>, abort_command: impl Into<String>) -> Self {
        Self {
            host,
            abort_command: abort_command.into(),
        }
    }
}

impl NoticeSink for BroadcastSink {
    fn notify(&self, notice: &Notice) {
        let cmd = render_command(notice, &self.abort_command);
        if let Err(e) = self.host.execute(&cmd) {
            log::warn!("broadcast failed: {e:#}");
        }
    }
}

pub fn result_table(res: &RestoreResult) -> Table {
    let mut table = Table::new();
    table.set_titles(Row::new(vec![
        Cell::new("Region"),
        Cell::new("Outcome"),
        Cell::new("Detail"),
    ]));
    for r in &res.succeeded {
        table.add_row(Row::new(vec![
            Cell::new(r),
            Cell::new("restored"),
            Cell::new(""),
        ]));
    }
    for f in &res.failed {
        table.add_row(Row::new(vec![
            Cell::new(&f.region),
            Cell::new("failed"),
            Cell::new(&f.reason),
        ]));
    }
    table
}

pub fn log_result(res: &RestoreResult) {
    log::info!(
        "Restore #{}: backup #{} ({}) {}",
        res.job_id,
        res.backup_id,
        res.dimension,
        res.phase
    );
    if let Some(dir) = &res.export_dir {
        log::info!("Export: {}", dir.display());
    }
    match res.phase {
        Phase::Completed => {
            result_table(res).printstd();
            if !res.failed.is_empty() {
                log::warn!("not restored: {}", res.failed_regions().join(", "));
            }
        }
        Phase::Failed => {
            log::error!("{}", res.reason.as_deref().unwrap_or("unknown error"));
        }
        _ => {}
    }
}
