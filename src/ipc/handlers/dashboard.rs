use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{map_store_err, HandlerErr};
use crate::ipc::types::{AppState, Request};
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde_json::json;

const RECENT_CHECKINS: usize = 5;

/// Recomputed from the store on every call; the admin screen polls this on a
/// fixed interval and owns the refresh cadence.
fn dashboard_stats(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let students = db::list_students(conn).map_err(map_store_err)?;
    let logs = db::read_logs(conn).map_err(map_store_err)?;

    let total_students = students.len();
    let total_attended: i64 = students.iter().map(|s| s.attended_sessions).sum();

    let one_week_ago = Utc::now() - Duration::days(7);
    let weekly_checkins = logs
        .iter()
        .filter(|e| {
            DateTime::parse_from_rfc3339(&e.checkin_time)
                .map(|dt| dt.with_timezone(&Utc) > one_week_ago)
                .unwrap_or(false)
        })
        .count();

    // List is maintained newest-first, so the most recent entries are a prefix.
    let recent: Vec<_> = logs.iter().take(RECENT_CHECKINS).collect();

    let avg_sessions = if total_students > 0 {
        (total_attended as f64 / total_students as f64 * 10.0).round() / 10.0
    } else {
        0.0
    };

    Ok(json!({
        "totalStudents": total_students,
        "totalAttendedSessions": total_attended,
        "weeklyCheckins": weekly_checkins,
        "recentCheckins": recent,
        "avgSessionsPerStudent": avg_sessions,
    }))
}

fn handle_dashboard_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match dashboard_stats(conn) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.stats" => Some(handle_dashboard_stats(state, req)),
        _ => None,
    }
}
