use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{map_store_err, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match db::open_db(&path) {
        Ok(conn) => {
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

fn settings_get(conn: &rusqlite::Connection) -> Result<serde_json::Value, HandlerErr> {
    let settings = db::get_settings(conn).map_err(map_store_err)?;
    Ok(json!({ "logRetention": settings.log_retention }))
}

fn settings_update(
    conn: &rusqlite::Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let retention = params
        .get("logRetention")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| HandlerErr::bad_params("missing logRetention"))?;
    if retention == 0 {
        return Err(HandlerErr::bad_params("logRetention must be at least 1"));
    }

    let mut settings = db::get_settings(conn).map_err(map_store_err)?;
    settings.log_retention = retention as usize;
    db::set_settings(conn, &settings).map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: format!("{:#}", e),
        details: None,
    })?;
    Ok(json!({ "logRetention": settings.log_retention }))
}

fn handle_settings_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match settings_get(conn) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_settings_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match settings_update(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "settings.get" => Some(handle_settings_get(state, req)),
        "settings.update" => Some(handle_settings_update(state, req)),
        _ => None,
    }
}
