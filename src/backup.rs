use crate::db;
use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const BUNDLE_FORMAT: &str = "frontdesk-workspace-v1";
const MANIFEST_ENTRY: &str = "manifest.json";
const STORE_ENTRY: &str = "store/frontdesk.sqlite3";

/// Store counts captured at export time. A restore re-reads the extracted
/// store and checks it against these, so a truncated or mismatched archive
/// fails loudly instead of silently installing a partial store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSummary {
    pub student_count: usize,
    pub log_entry_count: usize,
    pub log_retention: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    format: String,
    version: u32,
    app_version: String,
    exported_at: String,
    store: StoreSummary,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub store: StoreSummary,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    /// Absent for legacy bare-sqlite imports, which carry no manifest.
    pub store: Option<StoreSummary>,
}

fn summarize_store(workspace: &Path) -> anyhow::Result<StoreSummary> {
    let conn = db::open_db(workspace)?;
    Ok(StoreSummary {
        student_count: db::list_students(&conn)?.len(),
        log_entry_count: db::read_logs(&conn)?.len(),
        log_retention: db::get_settings(&conn)?.log_retention,
    })
}

pub fn export_workspace_bundle(
    workspace: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let store_path = workspace.join(db::DB_FILE);
    if !store_path.is_file() {
        bail!(
            "workspace store not found: {}",
            store_path.to_string_lossy()
        );
    }
    let store = summarize_store(workspace)?;

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path)
        .with_context(|| format!("failed to create bundle {}", out_path.to_string_lossy()))?;

    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = Manifest {
        format: BUNDLE_FORMAT.to_string(),
        version: 1,
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        exported_at: crate::model::now_iso(),
        store: store.clone(),
    };
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(&serde_json::to_vec_pretty(&manifest).context("failed to encode manifest")?)
        .context("failed to write manifest entry")?;

    zip.start_file(STORE_ENTRY, opts)
        .context("failed to start store entry")?;
    let mut store_file = File::open(&store_path)
        .with_context(|| format!("failed to open store {}", store_path.to_string_lossy()))?;
    std::io::copy(&mut store_file, &mut zip).context("failed to write store entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT.to_string(),
        store,
    })
}

pub fn import_workspace_bundle(
    in_path: &Path,
    workspace: &Path,
) -> anyhow::Result<ImportSummary> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace.to_string_lossy()
        )
    })?;
    let dst = workspace.join(db::DB_FILE);

    if !is_zip_file(in_path)? {
        // A bare sqlite file from an older manual backup is accepted as-is;
        // there is no manifest to check it against.
        std::fs::copy(in_path, &dst).with_context(|| {
            format!(
                "failed to copy legacy sqlite backup from {}",
                in_path.to_string_lossy()
            )
        })?;
        return Ok(ImportSummary {
            bundle_format_detected: "legacy-sqlite3".to_string(),
            store: None,
        });
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let manifest: Manifest = {
        let mut text = String::new();
        archive
            .by_name(MANIFEST_ENTRY)
            .context("bundle missing manifest.json")?
            .read_to_string(&mut text)
            .context("failed to read manifest.json")?;
        serde_json::from_str(&text).context("manifest.json is invalid")?
    };
    if manifest.format != BUNDLE_FORMAT {
        bail!("unsupported bundle format: {}", manifest.format);
    }

    let staged = workspace.join("frontdesk.sqlite3.importing");
    if staged.exists() {
        let _ = std::fs::remove_file(&staged);
    }
    {
        let mut store_entry = archive
            .by_name(STORE_ENTRY)
            .context("bundle missing store/frontdesk.sqlite3")?;
        let mut staged_out = File::create(&staged)
            .with_context(|| format!("failed to stage store {}", staged.to_string_lossy()))?;
        std::io::copy(&mut store_entry, &mut staged_out)
            .context("failed to extract store entry")?;
        staged_out.flush().context("failed to flush staged store")?;
    }

    if dst.exists() {
        std::fs::remove_file(&dst).with_context(|| {
            format!("failed to remove existing store {}", dst.to_string_lossy())
        })?;
    }
    std::fs::rename(&staged, &dst)
        .with_context(|| format!("failed to install store {}", dst.to_string_lossy()))?;

    let restored = summarize_store(workspace)?;
    if restored != manifest.store {
        return Err(anyhow!(
            "restored store does not match bundle manifest: {} students / {} log entries restored, manifest says {} / {}",
            restored.student_count,
            restored.log_entry_count,
            manifest.store.student_count,
            manifest.store.log_entry_count,
        ));
    }

    Ok(ImportSummary {
        bundle_format_detected: manifest.format,
        store: Some(manifest.store),
    })
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut sig = [0u8; 4];
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    match f.read_exact(&mut sig) {
        Ok(()) => Ok(sig == *b"PK\x03\x04"),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e).context("failed to read file signature"),
    }
}
