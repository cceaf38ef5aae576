use crate::db;
use crate::export;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_opt_str, map_store_err, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::LogEntry;
use chrono::{DateTime, Local};
use rusqlite::Connection;
use serde_json::json;
use std::path::{Path, PathBuf};

fn filter_logs(logs: Vec<LogEntry>, search: &str) -> Vec<LogEntry> {
    let needle = search.trim();
    if needle.is_empty() {
        logs
    } else {
        logs.into_iter().filter(|e| e.matches(needle)).collect()
    }
}

fn is_today(iso: &str) -> bool {
    DateTime::parse_from_rfc3339(iso)
        .map(|dt| dt.with_timezone(&Local).date_naive() == Local::now().date_naive())
        .unwrap_or(false)
}

fn logs_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let search = get_opt_str(params, "search").unwrap_or_default();
    let logs = db::read_logs(conn).map_err(map_store_err)?;
    // Summary counts describe the whole list, not the filtered view.
    let total = logs.len();
    let today_count = logs.iter().filter(|e| is_today(&e.checkin_time)).count();
    let filtered = filter_logs(logs, &search);

    Ok(json!({
        "logs": filtered,
        "total": total,
        "todayCount": today_count,
    }))
}

fn logs_export(
    conn: &Connection,
    workspace: &Path,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let search = get_opt_str(params, "search").unwrap_or_default();
    let filtered = filter_logs(db::read_logs(conn).map_err(map_store_err)?, &search);

    let out_path: PathBuf = match get_opt_str(params, "outPath") {
        Some(p) if !p.trim().is_empty() => PathBuf::from(p),
        _ => workspace.join(export::default_export_filename()),
    };

    let row_count = export::write_logs_csv(&out_path, &filtered).map_err(|e| HandlerErr {
        code: "export_failed",
        message: format!("{:#}", e),
        details: None,
    })?;

    Ok(json!({
        "outPath": out_path.to_string_lossy(),
        "rowCount": row_count,
    }))
}

fn handle_logs_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match logs_list(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_logs_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (Some(conn), Some(workspace)) = (state.db.as_ref(), state.workspace.as_ref()) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match logs_export(conn, workspace, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "logs.list" => Some(handle_logs_list(state, req)),
        "logs.export" => Some(handle_logs_export(state, req)),
        _ => None,
    }
}
