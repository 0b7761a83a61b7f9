//! Batch export with progress, cancellation, and per-item failure isolation.
//!
//! [`run_batch`] processes requests strictly in input order and records one
//! [`ItemOutcome`] per item; a failing item never aborts its siblings.
//! Cancellation is cooperative: the [`CancelToken`] is checked before each
//! item, files already written stay on disk. [`spawn_batch`] runs the same
//! loop on a worker thread and streams [`ProgressEvent`]s over a channel.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::content::ContentRequest;
use crate::engine;
use crate::error::QrError;
use crate::logo::{LogoPolicy, LogoSpec};
use crate::qrcode::EccLevel;
use crate::render::{self, OutputFormat, RenderStyle};

/// Longest content-derived filename stem fragment.
const SLUG_MAX_LEN: usize = 20;

/// Parameters shared by every item of a batch run.
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Directory the files are written into; created if missing.
    pub destination: PathBuf,
    /// Filename template with `{index}` and `{content}` tokens, no extension.
    pub naming_template: String,
    pub format: OutputFormat,
    pub level: EccLevel,
    pub style: RenderStyle,
    pub logo: Option<LogoSpec>,
    pub policy: LogoPolicy,
}

impl BatchConfig {
    /// Creates a config with the default template `qr_{index}`, PNG output,
    /// Medium level, and default style and policy.
    pub fn new(destination: PathBuf) -> Self {
        Self {
            destination,
            naming_template: "qr_{index}".to_owned(),
            format: OutputFormat::Png,
            level: EccLevel::Medium,
            style: RenderStyle::default(),
            logo: None,
            policy: LogoPolicy::default(),
        }
    }
}

/// Cooperative cancellation flag shared between a batch run and its owner.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Items not yet started will be skipped.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One unit of batch work: a request plus its resolved output filename.
#[derive(Clone, Debug)]
pub struct BatchItem {
    pub index: usize,
    pub request: ContentRequest,
    pub filename: String,
}

/// Result of processing one batch item.
#[derive(Clone, Debug)]
pub enum ItemOutcome {
    /// The file was written to this path.
    Ok(PathBuf),
    /// The item failed; siblings are unaffected.
    Failed(QrError),
}

impl ItemOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ItemOutcome::Ok(_))
    }
}

/// Summary of a finished (or cancelled) batch run. Outcomes are in input
/// order, one per request.
#[derive(Clone, Debug)]
pub struct BatchResult {
    pub succeeded: usize,
    pub outcomes: Vec<ItemOutcome>,
}

/// Progress notification emitted after each processed item.
#[derive(Clone, Debug)]
pub struct ProgressEvent {
    /// Input-order index of the item just processed.
    pub index: usize,
    /// Total number of items in the run.
    pub total: usize,
    /// Items that have succeeded so far.
    pub succeeded: usize,
    /// Filename on success, error text on failure.
    pub detail: String,
}

/// Handle to a batch run on a worker thread.
pub struct BatchHandle {
    /// Joins the worker and yields the run's result.
    pub handle: JoinHandle<Result<BatchResult, QrError>>,
    /// Receives one event per processed item, in input order.
    pub progress: Receiver<ProgressEvent>,
    /// Cancels the run cooperatively.
    pub cancel: CancelToken,
}

/// Runs a batch synchronously on the calling thread.
///
/// Filenames are resolved for all items up front, so collisions are handled
/// deterministically regardless of which items later fail. The progress
/// callback fires once per processed item; cancelled items are recorded
/// without an event.
///
/// # Errors
///
/// Only destination-directory creation is run-fatal; every other failure is
/// recorded as that item's [`ItemOutcome::Failed`].
pub fn run_batch<F: FnMut(&ProgressEvent)>(
    requests: Vec<ContentRequest>,
    config: &BatchConfig,
    cancel: &CancelToken,
    mut progress: F,
) -> Result<BatchResult, QrError> {
    std::fs::create_dir_all(&config.destination)?;
    let total = requests.len();
    info!(total, destination = %config.destination.display(), "batch run started");

    let items = resolve_items(requests, config);
    let mut outcomes: Vec<ItemOutcome> = Vec::with_capacity(total);
    let mut succeeded: usize = 0;

    for item in items {
        if cancel.is_cancelled() {
            debug!(index = item.index, "skipping item after cancellation");
            outcomes.push(ItemOutcome::Failed(QrError::Cancelled));
            continue;
        }

        let outcome = match process_item(&item, config) {
            Ok(path) => {
                succeeded += 1;
                debug!(index = item.index, path = %path.display(), "item written");
                ItemOutcome::Ok(path)
            }
            Err(err) => {
                warn!(index = item.index, error = %err, "item failed");
                ItemOutcome::Failed(err)
            }
        };

        let detail = match &outcome {
            ItemOutcome::Ok(path) => path.display().to_string(),
            ItemOutcome::Failed(err) => err.to_string(),
        };
        progress(&ProgressEvent {
            index: item.index,
            total,
            succeeded,
            detail,
        });
        outcomes.push(outcome);
    }

    info!(succeeded, total, "batch run finished");
    Ok(BatchResult {
        succeeded,
        outcomes,
    })
}

/// Runs a batch on a worker thread, returning a [`BatchHandle`] for progress,
/// cancellation, and the final result.
pub fn spawn_batch(requests: Vec<ContentRequest>, config: BatchConfig) -> BatchHandle {
    let (tx, rx) = mpsc::channel();
    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();
    let handle = thread::spawn(move || {
        run_batch(requests, &config, &worker_cancel, |event| {
            // A dropped receiver only means nobody is watching
            let _ = tx.send(event.clone());
        })
    });
    BatchHandle {
        handle,
        progress: rx,
        cancel,
    }
}

// Resolves every item's filename before processing starts. Collisions, both
// within the run and with files already in the destination, get _1, _2, ...
// suffixes.
fn resolve_items(requests: Vec<ContentRequest>, config: &BatchConfig) -> Vec<BatchItem> {
    let mut taken: HashSet<String> = HashSet::new();
    requests
        .into_iter()
        .enumerate()
        .map(|(index, request)| {
            let mut stem = config
                .naming_template
                .replace("{index}", &index.to_string())
                .replace("{content}", &slugify(request.summary()));
            if stem.is_empty() {
                stem = format!("qr_{index}");
            }

            let ext = config.format.extension();
            let mut filename = format!("{stem}.{ext}");
            let mut counter: usize = 0;
            while taken.contains(&filename) || config.destination.join(&filename).exists() {
                counter += 1;
                filename = format!("{stem}_{counter}.{ext}");
            }
            taken.insert(filename.clone());
            BatchItem {
                index,
                request,
                filename,
            }
        })
        .collect()
}

fn process_item(item: &BatchItem, config: &BatchConfig) -> Result<PathBuf, QrError> {
    let image = engine::generate_image(
        &item.request,
        config.level,
        &config.style,
        config.logo.as_ref(),
        &config.policy,
    )?;
    let path = config.destination.join(&item.filename);
    render::save_image(&image, &path, config.format, &config.style)?;
    Ok(path)
}

// Reduces content text to a filesystem-safe stem fragment.
fn slugify(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(SLUG_MAX_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::WifiSecurity;
    use tempfile::tempdir;

    fn text_request(text: &str) -> ContentRequest {
        ContentRequest::PlainText { text: text.into() }
    }

    fn fast_config(destination: &Path) -> BatchConfig {
        let mut config = BatchConfig::new(destination.to_path_buf());
        config.style.scale = 2;
        config.style.quiet_zone = 2;
        config
    }

    #[test]
    fn failures_are_isolated_per_item() {
        let dir = tempdir().unwrap();
        let config = fast_config(dir.path());
        let requests = vec![
            text_request("one"),
            text_request("two"),
            text_request("three"),
            // Invalid: empty SSID
            ContentRequest::Wifi {
                ssid: String::new(),
                password: None,
                security: WifiSecurity::Wpa,
                hidden: false,
            },
            text_request("five"),
        ];

        let result = run_batch(requests, &config, &CancelToken::new(), |_| {}).unwrap();
        assert_eq!(result.succeeded, 4);
        assert_eq!(result.outcomes.len(), 5);
        for (i, outcome) in result.outcomes.iter().enumerate() {
            match outcome {
                ItemOutcome::Ok(path) => {
                    assert!(path.exists(), "missing output for item {i}");
                }
                ItemOutcome::Failed(err) => {
                    assert_eq!(i, 3);
                    assert!(matches!(err, QrError::InvalidInput { field: "ssid", .. }));
                }
            }
        }
    }

    #[test]
    fn cancellation_skips_remaining_items_and_keeps_written_files() {
        let dir = tempdir().unwrap();
        let config = fast_config(dir.path());
        let requests: Vec<ContentRequest> =
            (0..5).map(|i| text_request(&format!("item {i}"))).collect();

        let cancel = CancelToken::new();
        let cancel_inside = cancel.clone();
        let result = run_batch(requests, &config, &cancel, |event| {
            if event.index == 1 {
                cancel_inside.cancel();
            }
        })
        .unwrap();

        assert_eq!(result.succeeded, 2);
        assert!(result.outcomes[0].is_ok());
        assert!(result.outcomes[1].is_ok());
        for outcome in &result.outcomes[2..] {
            assert!(matches!(outcome, ItemOutcome::Failed(QrError::Cancelled)));
        }
        if let ItemOutcome::Ok(path) = &result.outcomes[0] {
            assert!(path.exists());
        }
    }

    #[test]
    fn colliding_content_names_get_numbered_suffixes() {
        let dir = tempdir().unwrap();
        let mut config = fast_config(dir.path());
        config.naming_template = "{content}".to_owned();
        let requests = vec![
            text_request("same"),
            text_request("same"),
            text_request("same"),
        ];

        let result = run_batch(requests, &config, &CancelToken::new(), |_| {}).unwrap();
        assert_eq!(result.succeeded, 3);
        let names: Vec<String> = result
            .outcomes
            .iter()
            .map(|o| match o {
                ItemOutcome::Ok(path) => {
                    path.file_name().unwrap().to_string_lossy().into_owned()
                }
                ItemOutcome::Failed(err) => panic!("unexpected failure: {err}"),
            })
            .collect();
        assert_eq!(names, vec!["same.png", "same_1.png", "same_2.png"]);
    }

    #[test]
    fn content_slugs_are_sanitized_and_truncated() {
        assert_eq!(slugify("https://example.com/page"), "https___example_com_");
        assert_eq!(slugify("short"), "short");
        assert_eq!(slugify("a b/c"), "a_b_c");
    }

    #[test]
    fn spawned_batch_streams_ordered_progress() {
        let dir = tempdir().unwrap();
        let config = fast_config(dir.path());
        let requests: Vec<ContentRequest> =
            (0..3).map(|i| text_request(&format!("bg {i}"))).collect();

        let batch = spawn_batch(requests, config);
        let indices: Vec<usize> = batch.progress.iter().map(|e| e.index).collect();
        let result = batch.handle.join().unwrap().unwrap();

        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(result.succeeded, 3);
    }

    #[test]
    fn unusable_destination_is_run_fatal() {
        let file = tempfile::NamedTempFile::new().unwrap();
        // A path under a regular file cannot be created as a directory
        let config = BatchConfig::new(file.path().join("out"));
        let err = run_batch(
            vec![text_request("x")],
            &config,
            &CancelToken::new(),
            |_| {},
        )
        .unwrap_err();
        assert!(matches!(err, QrError::Io(_)));
    }
}
