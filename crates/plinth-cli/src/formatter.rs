//! Output formatters for run reports and status listings.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use plinth_core::{MigrationId, RunReport, UnitStatus};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter {
    /// Format a run report.
    fn format_report(&self, report: &RunReport) -> String;

    /// Format the status of every catalog unit.
    fn format_status(&self, status: &[UnitStatus]) -> String;

    /// Format a list of pending ids.
    fn format_pending(&self, pending: &[MigrationId]) -> String;

    /// Format a simple message.
    fn format_message(&self, message: &str) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_report(&self, report: &RunReport) -> String {
        if report.is_empty() {
            return "No migrations found".to_string();
        }

        let mut table = Table::new();
        table.set_header(vec!["id", "result", "detail"]);

        for id in &report.skipped {
            table.add_row(vec![Cell::new(id), Cell::new("skipped"), Cell::new("")]);
        }
        for entry in &report.executed {
            let result = if entry.dry_run { "pending (dry run)" } else { "applied" };
            table.add_row(vec![
                Cell::new(&entry.id),
                Cell::new(result),
                Cell::new(&entry.source),
            ]);
        }
        for entry in &report.errors {
            table.add_row(vec![
                Cell::new(&entry.id),
                Cell::new(entry.code),
                Cell::new(&entry.message),
            ]);
        }

        format!(
            "{}\n{} applied, {} skipped, {} failed",
            table,
            report.executed.iter().filter(|e| !e.dry_run).count(),
            report.skipped.len(),
            report.errors.len()
        )
    }

    fn format_status(&self, status: &[UnitStatus]) -> String {
        if status.is_empty() {
            return "No migrations found".to_string();
        }

        let mut table = Table::new();
        table.set_header(vec!["id", "description", "body", "state"]);
        for unit in status {
            table.add_row(vec![
                Cell::new(&unit.id),
                Cell::new(&unit.description),
                Cell::new(unit.body),
                Cell::new(if unit.applied { "applied" } else { "pending" }),
            ]);
        }
        table.to_string()
    }

    fn format_pending(&self, pending: &[MigrationId]) -> String {
        if pending.is_empty() {
            return "No pending migrations".to_string();
        }
        let ids: Vec<&str> = pending.iter().map(MigrationId::as_str).collect();
        format!("{} pending: {}", pending.len(), ids.join(", "))
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_report(&self, report: &RunReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_status(&self, status: &[UnitStatus]) -> String {
        serde_json::to_string_pretty(status).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_pending(&self, pending: &[MigrationId]) -> String {
        serde_json::to_string(pending).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({
            "message": message
        })
        .to_string()
    }
}
