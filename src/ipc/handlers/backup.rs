use crate::backup;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_opt_str, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn resolve_workspace(state: &AppState, params: &serde_json::Value) -> Result<PathBuf, HandlerErr> {
    if let Some(p) = get_opt_str(params, "workspacePath") {
        if !p.trim().is_empty() {
            return Ok(PathBuf::from(p));
        }
    }
    state.workspace.clone().ok_or_else(|| HandlerErr {
        code: "no_workspace",
        message: "select a workspace first".to_string(),
        details: None,
    })
}

fn handle_export_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let workspace = match resolve_workspace(state, &req.params) {
        Ok(w) => w,
        Err(e) => return e.response(&req.id),
    };
    let out_path = match get_required_str(&req.params, "outPath") {
        Ok(p) => PathBuf::from(p),
        Err(e) => return e.response(&req.id),
    };

    match backup::export_workspace_bundle(&workspace, &out_path) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "outPath": out_path.to_string_lossy(),
                "bundleFormat": summary.bundle_format,
                "store": summary.store,
            }),
        ),
        Err(e) => err(&req.id, "backup_failed", format!("{:#}", e), None),
    }
}

fn handle_import_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let workspace = match resolve_workspace(state, &req.params) {
        Ok(w) => w,
        Err(e) => return e.response(&req.id),
    };
    let in_path = match get_required_str(&req.params, "inPath") {
        Ok(p) => PathBuf::from(p),
        Err(e) => return e.response(&req.id),
    };

    // The open connection would otherwise keep pointing at the replaced file.
    let reopen = state.workspace.as_deref() == Some(workspace.as_path());
    if reopen {
        state.db = None;
    }

    let summary = match backup::import_workspace_bundle(&in_path, &workspace) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "restore_failed", format!("{:#}", e), None),
    };

    if reopen {
        match db::open_db(&workspace) {
            Ok(conn) => state.db = Some(conn),
            Err(e) => return err(&req.id, "db_open_failed", format!("{e:?}"), None),
        }
    }

    ok(
        &req.id,
        json!({
            "bundleFormatDetected": summary.bundle_format_detected,
            "store": summary.store,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportWorkspaceBundle" => Some(handle_export_bundle(state, req)),
        "backup.importWorkspaceBundle" => Some(handle_import_bundle(state, req)),
        _ => None,
    }
}
