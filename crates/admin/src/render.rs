//! Plain-text and JSON output for the admin CLI.

use db::models::{booking::Booking, customer::Customer};
use serde::Serialize;
use services::services::list::{RenderState, SyncState, ViewRow};

use crate::commands::Window;

/// One table line per row type
pub trait TableRow {
    fn header() -> String;
    fn line(&self) -> String;
}

impl TableRow for Customer {
    fn header() -> String {
        format!("{:<36}  {:<24}  {:<28}  {}", "ID", "NAME", "EMAIL", "PHONE")
    }

    fn line(&self) -> String {
        format!(
            "{:<36}  {:<24}  {:<28}  {}",
            self.id,
            truncate(&self.name, 24),
            truncate(&self.email, 28),
            self.phone.as_deref().unwrap_or("-")
        )
    }
}

impl TableRow for Booking {
    fn header() -> String {
        format!(
            "{:<36}  {:<20}  {:<16}  {:<10}  {}",
            "ID", "CLIENT", "SERVICE", "STATUS", "DEPOSIT"
        )
    }

    fn line(&self) -> String {
        let deposit = self
            .deposit_cents
            .map(|cents| format!("{}.{:02}", cents / 100, cents % 100))
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{:<36}  {:<20}  {:<16}  {:<10}  {}",
            self.id,
            truncate(&self.client_name, 20),
            truncate(&self.service, 16),
            self.status,
            deposit
        )
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut out: String = value.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn marker(state: SyncState) -> &'static str {
    match state {
        SyncState::Confirmed => " ",
        SyncState::Pending => "~",
        SyncState::Failed => "!",
    }
}

pub fn table<R: TableRow>(window: &Window<R>) -> String {
    let mut out = format!("  {}\n", R::header());
    for ViewRow { row, sync_state } in &window.rows {
        out.push_str(marker(*sync_state));
        out.push(' ');
        out.push_str(&row.line());
        out.push('\n');
    }

    let first = if window.rows.is_empty() { 0 } else { window.offset + 1 };
    out.push_str(&format!(
        "rows {}-{} of {}{}",
        first,
        window.offset + window.rows.len(),
        window.loaded,
        if window.has_more { "+" } else { "" }
    ));
    if window.state != RenderState::Idle {
        out.push_str(&format!(" ({})", window.state));
    }
    out
}

#[derive(Serialize)]
struct JsonRow<'a, R> {
    #[serde(flatten)]
    row: &'a R,
    sync_state: String,
}

pub fn json<R: Serialize>(window: &Window<R>) -> serde_json::Result<String> {
    let rows: Vec<JsonRow<'_, R>> = window
        .rows
        .iter()
        .map(|r| JsonRow {
            row: &r.row,
            sync_state: r.sync_state.to_string(),
        })
        .collect();
    serde_json::to_string_pretty(&serde_json::json!({
        "rows": rows,
        "offset": window.offset,
        "loaded": window.loaded,
        "has_more": window.has_more,
    }))
}
