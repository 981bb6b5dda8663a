use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use rusqlite::{Connection, Transaction};
use uuid::Uuid;

use crate::data::{self, repository};
use crate::error::AppError;
use crate::models::job::JobStatus;
use crate::scope_path;
use crate::services::ocr_service::{ImageSource, OcrExtractor};
use crate::services::scan_service::{self, SourceKind};
use crate::state::IndexProgress;

/// One indexing run over a root directory, executed on its own thread.
/// A job runs at most once; later `start()` calls do nothing.
pub struct IndexJob {
    id: Uuid,
    root: PathBuf,
    db_path: PathBuf,
    extractor: Mutex<Option<OcrExtractor>>,
    progress: Arc<IndexProgress>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl IndexJob {
    pub fn new(root: impl Into<PathBuf>, db_path: impl Into<PathBuf>, extractor: OcrExtractor) -> Self {
        Self {
            id: Uuid::new_v4(),
            root: root.into(),
            db_path: db_path.into(),
            extractor: Mutex::new(Some(extractor)),
            progress: Arc::new(IndexProgress::new()),
            worker: Mutex::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn start(&self) -> Result<(), AppError> {
        let Some(extractor) = self
            .extractor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        else {
            log::debug!("index job {} already started", self.id);
            return Ok(());
        };

        self.progress.set_status(JobStatus::Scanning);
        let root = self.root.clone();
        let db_path = self.db_path.clone();
        let progress = self.progress.clone();
        let handle = std::thread::Builder::new()
            .name(format!("index-{}", self.id))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    run(&root, &db_path, &extractor, &progress)
                }));
                // the run's transaction was dropped while unwinding
                if outcome.is_err() {
                    progress.error("Indexing failed unexpectedly, no changes were saved.");
                    progress.finish(JobStatus::Failed);
                }
            })
            .map_err(|err| {
                self.progress.error(format!("Could not start indexing: {err}"));
                self.progress.finish(JobStatus::Failed);
                AppError::from(err)
            })?;

        *self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);
        Ok(())
    }

    /// Requests cancellation. The worker notices at its next check.
    pub fn stop(&self) {
        self.progress.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.progress.is_finished()
    }

    pub fn get_messages(&self) -> Vec<String> {
        self.progress.drain_messages()
    }

    pub fn get_curr_file_index(&self) -> usize {
        self.progress.curr_file_index()
    }

    pub fn get_num_files(&self) -> usize {
        self.progress.num_files()
    }

    pub fn get_status(&self) -> JobStatus {
        self.progress.status()
    }

    /// Blocks until the worker thread exits. Returns at once if the job was
    /// never started.
    pub fn wait(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

fn run(root: &Path, db_path: &Path, extractor: &OcrExtractor, progress: &IndexProgress) {
    let status = match index_directory(root, db_path, extractor, progress) {
        Ok(status) => status,
        Err(err) => {
            progress.error(format!("Indexing failed, no changes were saved: {err}"));
            JobStatus::Failed
        }
    };
    progress.finish(status);
}

fn index_directory(
    root: &Path,
    db_path: &Path,
    extractor: &OcrExtractor,
    progress: &IndexProgress,
) -> Result<JobStatus, AppError> {
    let root_str = scope_path::normalize_path(root);
    let mut conn = data::open(db_path)?;
    // dropping the transaction without commit rolls the whole run back
    let mut tx = conn.transaction()?;
    let directory_id = repository::begin_directory(&tx, &root_str)?;

    progress.set_status(JobStatus::Scanning);
    progress.info("Scanning files");
    let files: Vec<PathBuf> = scan_service::scan(root, progress.cancel_flag()).collect();
    if progress.is_cancelled() {
        progress.info("Indexing cancelled, no changes were saved.");
        return Ok(JobStatus::Cancelled);
    }
    progress.set_num_files(files.len());
    progress.info(format!(
        "Scanning files finished. Found {} files for indexing.",
        files.len()
    ));

    progress.set_status(JobStatus::Processing);
    let mut indexed = 0;
    for (index, path) in files.iter().enumerate() {
        if progress.is_cancelled() {
            break;
        }
        let rel = scope_path::display_relative(&scope_path::normalize_path(path), &root_str);
        match index_file(&mut tx, extractor, path, &rel, directory_id, progress) {
            Ok(count) => indexed += count,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => progress.warn(format!("Could not index {rel}: {err}")),
        }
        progress.set_curr_file_index(index + 1);
    }

    if progress.is_cancelled() {
        progress.info("Indexing cancelled, no changes were saved.");
        return Ok(JobStatus::Cancelled);
    }
    tx.commit()?;
    progress.info(format!("Indexing finished. {indexed} new images indexed."));
    Ok(JobStatus::Completed)
}

/// Returns how many images were added for `path`.
fn index_file(
    tx: &mut Transaction<'_>,
    extractor: &OcrExtractor,
    path: &Path,
    rel: &str,
    directory_id: i64,
    progress: &IndexProgress,
) -> Result<usize, AppError> {
    let path_str = scope_path::normalize_path(path);
    match scan_service::source_kind(path) {
        Some(SourceKind::Image) => {
            if repository::is_image_indexed(tx, &path_str)? {
                progress.info(format!("Skipping already indexed file {rel}."));
                return Ok(0);
            }
            progress.info(format!("Extracting text from {rel}."));
            let source = ImageSource::Image {
                path: path.to_path_buf(),
            };
            let fragments = store_source(tx, extractor, &source, directory_id)?;
            progress.info(format!("Indexed {rel} ({fragments} text fragments)."));
            Ok(1)
        }
        Some(SourceKind::Pdf) => {
            if repository::is_document_indexed(tx, &path_str)? {
                progress.info(format!("Skipping already indexed file {rel}."));
                return Ok(0);
            }
            progress.info(format!("Extracting text from {rel}."));
            let mut added = 0;
            for source in extractor.rasterize_pdf(path)? {
                let ImageSource::PdfPage { page, .. } = &source else {
                    continue;
                };
                let page = *page;
                let page_path = scope_path::normalize_path(source.image_path());
                if repository::is_image_indexed(tx, &page_path)? {
                    continue;
                }
                match store_source(tx, extractor, &source, directory_id) {
                    Ok(_) => added += 1,
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => progress.warn(format!("Could not index page {page} of {rel}: {err}")),
                }
            }
            progress.info(format!("Indexed {rel} ({added} pages)."));
            Ok(added)
        }
        None => Ok(0),
    }
}

/// OCRs one image and writes it inside a savepoint, so a failure leaves no
/// partial rows behind. Returns the number of fragments stored.
fn store_source(
    tx: &mut Transaction<'_>,
    extractor: &OcrExtractor,
    source: &ImageSource,
    directory_id: i64,
) -> Result<usize, AppError> {
    let fragments = extractor.extract(source)?;
    let image_path = scope_path::normalize_path(source.image_path());

    let sp = tx.savepoint()?;
    let image_id = repository::insert_image(&sp, &image_path, directory_id)?;
    if let ImageSource::PdfPage { document, page, .. } = source {
        repository::link_document_page(
            &sp,
            image_id,
            &scope_path::normalize_path(document),
            directory_id,
            *page,
        )?;
    }
    let written = repository::insert_text_fragments(&sp, image_id, &fragments)?;
    sp.commit()?;
    Ok(written)
}

/// Removes a directory with all its rows, then deletes the page images that
/// were generated for its PDFs. Returns false when the directory is unknown.
pub fn remove_directory(conn: &mut Connection, path: &str) -> Result<bool, AppError> {
    let path = scope_path::normalize(path);
    let Some(removed) = repository::delete_directory(conn, &path)? else {
        return Ok(false);
    };

    for file in &removed.generated_files {
        match std::fs::remove_file(file) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => log::warn!("Could not delete {}: {err}", file.display()),
        }
    }
    log::info!(
        "Removed {path}: {} images, {} documents, {} page files",
        removed.images,
        removed.documents,
        removed.generated_files.len()
    );
    Ok(true)
}
