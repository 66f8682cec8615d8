//! Ingestion service: runs passes one at a time and publishes their snapshots.
//!
//! Passes are triggered by [`spawn_refresh_loop`] on a fixed interval and on
//! demand through [`Ingestor::refresh`] (the `/api/refresh` endpoint). A single
//! mutex keeps them from overlapping; each pass replaces the whole dataset.

use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::logs::{log_error, log_info, log_success};
use crate::error::{ServerError, ServerResult};
use crate::parser::{read_workbook, read_workbook_bytes, source_for_path, TabularSource};
use crate::store::{Snapshot, SnapshotStore};
use crate::transform::pipeline::{run_pass, PassOutcome, PassReport};

pub struct Ingestor {
    source: Arc<dyn TabularSource>,
    /// Workbook file replaced by uploads; `None` when the source is not a file.
    upload_path: Option<PathBuf>,
    store: Arc<SnapshotStore>,
    pass_lock: Mutex<()>,
}

impl Ingestor {
    pub fn new(source: Arc<dyn TabularSource>, store: Arc<SnapshotStore>) -> Self {
        Self {
            source,
            upload_path: None,
            store,
            pass_lock: Mutex::new(()),
        }
    }

    /// Ingest from a workbook file or a CSV sheet directory. Uploads are
    /// accepted only for workbook files.
    pub fn for_path(path: impl Into<PathBuf>, store: Arc<SnapshotStore>) -> Self {
        let path = path.into();
        let upload_path = (!path.is_dir()).then(|| path.clone());
        Self {
            source: source_for_path(path),
            upload_path,
            store,
            pass_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    /// Run a pass now and publish it. Waits for any pass already running.
    pub async fn refresh(&self) -> Arc<Snapshot> {
        let _guard = self.pass_lock.lock().await;
        self.run_and_publish().await
    }

    /// Replace the workbook file with uploaded bytes, then run a pass.
    ///
    /// The bytes are parsed before anything is written, and the staged copy is
    /// read back through the configured file's reader before it is renamed into
    /// place, so a bad upload leaves both the file and the current snapshot
    /// untouched.
    pub async fn replace_workbook(&self, bytes: Vec<u8>) -> ServerResult<Arc<Snapshot>> {
        let path = self.upload_path.clone().ok_or_else(|| {
            ServerError::BadRequest("the configured source does not accept uploads".to_string())
        })?;

        let workbook = read_workbook_bytes(&bytes)?;

        let _guard = self.pass_lock.lock().await;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = staging_path(&path);
        let staged = match tokio::fs::write(&staging, &bytes).await {
            Ok(()) => install_staged(&staging, &path).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = staged {
            discard(&staging).await;
            return Err(e);
        }

        log_success(format!(
            "Upload accepted: {} sheets, {} rows",
            workbook.sheets.len(),
            workbook.row_count()
        ));
        log_info(format!("Workbook replaced at {}", path.display()));

        Ok(self.run_and_publish().await)
    }

    async fn run_and_publish(&self) -> Arc<Snapshot> {
        let source = Arc::clone(&self.source);
        let today = Local::now().date_naive();

        let report = match tokio::task::spawn_blocking(move || run_pass(source.as_ref(), today)).await {
            Ok(report) => report,
            Err(e) => {
                log_error(format!("Ingestion pass aborted: {}", e));
                PassReport {
                    today,
                    source: self.source.describe(),
                    rows: Vec::new(),
                    programs: Vec::new(),
                    outcome: PassOutcome::SourceUnavailable {
                        reason: format!("pass aborted: {}", e),
                    },
                }
            }
        };

        let generation = self.store.publish(report);
        tracing::info!(generation, "snapshot published");
        self.store.current()
    }
}

/// `book.xlsx` stages as `book.upload.xlsx`, keeping the extension the
/// workbook reader dispatches on.
fn staging_path(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => path.with_extension(format!("upload.{}", ext)),
        None => path.with_extension("upload"),
    }
}

/// Check the staged file opens as the target's format, then move it into place.
async fn install_staged(staging: &Path, target: &Path) -> ServerResult<()> {
    let staged = staging.to_path_buf();
    tokio::task::spawn_blocking(move || read_workbook(&staged))
        .await
        .map_err(|e| ServerError::Internal(format!("upload check aborted: {}", e)))?
        .map_err(|e| {
            ServerError::BadRequest(format!(
                "upload does not match the format of {}: {}",
                target.display(),
                e
            ))
        })?;

    tokio::fs::rename(staging, target).await?;
    Ok(())
}

async fn discard(staging: &Path) {
    match tokio::fs::remove_file(staging).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log_error(format!("Could not remove {}: {}", staging.display(), e)),
    }
}

/// Refresh immediately, then every `every`. Ticks missed while a pass runs
/// are skipped rather than queued.
pub fn spawn_refresh_loop(ingestor: Arc<Ingestor>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let snapshot = ingestor.refresh().await;
            tracing::debug!(
                generation = snapshot.generation,
                rows = snapshot.rows.len(),
                "scheduled refresh done"
            );
        }
    })
}
