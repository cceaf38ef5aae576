use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_required_non_empty, get_required_str, map_store_err, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{
    generate_student_id, normalize_student_id, now_iso, StudentRecord, PACKAGE_SIZES,
};
use chrono::{Local, Months};
use rusqlite::Connection;
use serde_json::json;

/// The chosen package size arrives as the raw select value ("5".."20") but a
/// bare number is accepted too.
fn parse_package(params: &serde_json::Value) -> Result<i64, HandlerErr> {
    let raw = match params.get("sessions") {
        Some(v) if v.is_string() => v.as_str().unwrap_or("").trim().to_string(),
        Some(v) if v.is_u64() || v.is_i64() => v.to_string(),
        _ => return Err(HandlerErr::bad_params("missing sessions")),
    };
    if raw.is_empty() {
        return Err(HandlerErr::bad_params("sessions must not be empty"));
    }
    let n: i64 = raw.parse().map_err(|_| HandlerErr {
        code: "invalid_package",
        message: format!("sessions must be numeric, got {:?}", raw),
        details: None,
    })?;
    if !PACKAGE_SIZES.contains(&n) {
        return Err(HandlerErr {
            code: "invalid_package",
            message: format!("unknown session package: {}", n),
            details: Some(json!({ "allowed": PACKAGE_SIZES })),
        });
    }
    Ok(n)
}

fn students_register(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let full_name = get_required_non_empty(params, "fullName")?;
    let email = get_required_non_empty(params, "email")?;
    let phone = get_required_non_empty(params, "phone")?;
    let package = parse_package(params)?;

    let record = StudentRecord {
        student_id: generate_student_id(),
        full_name,
        email,
        phone,
        sessions: package.to_string(),
        attended_sessions: 0,
        registration_date: now_iso(),
        last_checkin: None,
    };

    db::upsert_student(conn, &record).map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: format!("{:#}", e),
        details: None,
    })?;

    let derived = record.derived();
    Ok(json!({
        "student": record,
        "derived": derived,
    }))
}

fn card_preview(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = normalize_student_id(&get_required_str(params, "studentId")?);
    let Some(record) = db::get_student(conn, &student_id).map_err(map_store_err)? else {
        return Err(HandlerErr::not_found(format!(
            "no student found with ID {}",
            student_id
        )));
    };

    // The card is a static mockup: barcode text is the member ID, the printed
    // expiry sits six months out from today.
    let expiration = Local::now()
        .date_naive()
        .checked_add_months(Months::new(6))
        .map(|d| d.to_string())
        .unwrap_or_default();
    let derived = record.derived();

    let card = json!({
        "barcode": record.student_id.clone(),
        "memberSince": record.registration_date.clone(),
        "expirationDate": expiration,
        "totalSessions": derived.total_sessions,
        "attendedSessions": record.attended_sessions,
    });

    Ok(json!({
        "student": record,
        "derived": derived,
        "card": card,
    }))
}

fn handle_students_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match students_register(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_card_preview(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match card_preview(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.register" => Some(handle_students_register(state, req)),
        "card.preview" => Some(handle_card_preview(state, req)),
        _ => None,
    }
}
