use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_opt_str, get_required_str, map_store_err, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{normalize_student_id, StudentStatus};
use rusqlite::Connection;
use serde_json::json;

fn students_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let search = get_opt_str(params, "search").unwrap_or_default();
    let status_filter = get_opt_str(params, "status")
        .as_deref()
        .and_then(StudentStatus::parse_filter);

    let mut students = db::list_students(conn).map_err(map_store_err)?;
    let total = students.len();

    // Newest registrations first; key scan order is not meaningful.
    students.sort_by(|a, b| {
        b.registration_date
            .cmp(&a.registration_date)
            .then_with(|| a.student_id.cmp(&b.student_id))
    });

    let rows: Vec<serde_json::Value> = students
        .iter()
        .filter(|s| search.trim().is_empty() || s.matches(search.trim()))
        .filter(|s| match status_filter {
            Some(want) => s.derived().status == want,
            None => true,
        })
        .map(|s| json!({ "student": s, "derived": s.derived() }))
        .collect();

    Ok(json!({ "students": rows, "total": total }))
}

fn students_detail(
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

    // Per-student history is a scan of the global list; log entries are
    // denormalized and survive independently of the record.
    let history: Vec<_> = db::read_logs(conn)
        .map_err(map_store_err)?
        .into_iter()
        .filter(|e| e.student_id == student_id)
        .collect();

    let derived = record.derived();
    Ok(json!({
        "student": record,
        "derived": derived,
        "attendanceHistory": history,
    }))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match students_list(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_students_detail(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match students_detail(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.detail" => Some(handle_students_detail(state, req)),
        _ => None,
    }
}
