use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_opt_str, get_required_str, map_store_err, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{normalize_student_id, now_iso, LogEntry, DEFAULT_RECEPTIONIST};
use rusqlite::Connection;
use serde_json::json;

fn checkin_lookup(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let code = get_required_str(params, "code")?;
    if code.trim().is_empty() {
        return Err(HandlerErr::bad_params(
            "enter a student ID or scan a barcode",
        ));
    }
    let student_id = normalize_student_id(&code);

    let Some(record) = db::get_student(conn, &student_id).map_err(map_store_err)? else {
        return Err(HandlerErr::not_found(format!(
            "no student found with ID {}",
            student_id
        )));
    };

    let derived = record.derived();
    Ok(json!({
        "student": record,
        "derived": derived,
    }))
}

/// The increment, the record write and the log prepend commit together, so a
/// second desk confirming the same student concurrently cannot lose a session.
fn checkin_confirm(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = normalize_student_id(&get_required_str(params, "studentId")?);
    let receptionist =
        get_opt_str(params, "receptionist").unwrap_or_else(|| DEFAULT_RECEPTIONIST.to_string());

    let tx = conn.unchecked_transaction().map_err(|e| HandlerErr {
        code: "db_tx_failed",
        message: e.to_string(),
        details: None,
    })?;

    let Some(mut record) = db::get_student(&tx, &student_id).map_err(map_store_err)? else {
        return Err(HandlerErr::not_found(format!(
            "no student found with ID {}",
            student_id
        )));
    };

    if record.derived().remaining_sessions <= 0 {
        return Err(HandlerErr {
            code: "no_sessions_remaining",
            message: format!("{} has no sessions remaining", record.full_name),
            details: None,
        });
    }

    record.attended_sessions += 1;
    record.last_checkin = Some(now_iso());

    let entry = LogEntry {
        student_id: record.student_id.clone(),
        student_name: record.full_name.clone(),
        checkin_time: record.last_checkin.clone().unwrap_or_else(now_iso),
        receptionist,
        session_number: record.attended_sessions,
    };

    let retention = db::get_settings(&tx).map_err(map_store_err)?.log_retention;

    db::upsert_student(&tx, &record).map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: format!("{:#}", e),
        details: None,
    })?;
    db::append_log(&tx, entry.clone(), retention).map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: format!("{:#}", e),
        details: None,
    })?;

    tx.commit().map_err(|e| HandlerErr {
        code: "db_commit_failed",
        message: e.to_string(),
        details: None,
    })?;

    let derived = record.derived();
    Ok(json!({
        "student": record,
        "derived": derived,
        "log": entry,
    }))
}

fn handle_checkin_lookup(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match checkin_lookup(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_checkin_confirm(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match checkin_confirm(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "checkin.lookup" => Some(handle_checkin_lookup(state, req)),
        "checkin.confirm" => Some(handle_checkin_confirm(state, req)),
        _ => None,
    }
}
