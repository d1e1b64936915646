//! Directory upload driver.
//!
//! Files are uploaded strictly one at a time from a work queue. A failed
//! file goes to the back of the queue, so every other pending file gets a
//! turn before it is retried (round-robin, no backoff). Each file gets
//! `1 + max_retries` attempts; files that exhaust them are reported together
//! once the queue drains.

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

pub use static_deploy_upload_models::DEFAULT_MAX_RETRIES;
use static_deploy_upload_models::{FileDescriptor, UploadParameters};

use crate::UploadError;
use crate::enumerate::enumerate_files;
use crate::executor::{self, UploadOutcome};
use crate::params::{build_parameters, object_key};
use crate::progress::{ProgressSink, Tone};
use crate::store::ObjectStore;

/// Knobs for one directory upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Key prefix prepended to every relative path. Empty for none.
    pub prefix: String,
    /// Extra attempts per file after the first one fails.
    pub max_retries: u32,
    /// Upper bound on a single put attempt.
    pub timeout: Option<Duration>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: None,
        }
    }
}

/// Totals for a finished directory upload.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    /// Files uploaded.
    pub files: u64,
    /// Bytes uploaded (successful attempts only).
    pub bytes: u64,
    /// Put attempts made, successful or not.
    pub attempts: u64,
    /// Attempts that were re-queued after a failure.
    pub retries: u64,
}

impl std::fmt::Display for UploadSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} file(s), {} bytes, {} attempt(s), {} retr{}",
            self.files,
            self.bytes,
            self.attempts,
            self.retries,
            if self.retries == 1 { "y" } else { "ies" }
        )
    }
}

/// A queued file and how many times it has failed so far.
struct Pending {
    file: FileDescriptor,
    failures: u32,
}

/// Uploads every file under `dir`.
///
/// # Errors
///
/// * [`UploadError::Enumerate`] / [`UploadError::Io`] if the directory or a
///   file in it cannot be read. Fatal, nothing further is attempted.
/// * [`UploadError::Incomplete`] if any file still failed after all of its
///   attempts.
pub async fn upload_directory<S: ObjectStore + ?Sized>(
    store: &S,
    progress: &dyn ProgressSink,
    dir: &Path,
    options: &UploadOptions,
) -> Result<UploadSummary, UploadError> {
    let files = enumerate_files(dir)?;

    log::info!(
        "Uploading {} file(s) from {} to s3://{}/{}",
        files.len(),
        dir.display(),
        store.bucket(),
        options.prefix
    );

    upload_files(store, progress, files, options).await
}

/// Drains `files` through the store in order, re-queuing failures.
///
/// Returns once every file has succeeded, or once the queue is empty with
/// some files out of attempts.
///
/// # Errors
///
/// See [`upload_directory`].
pub async fn upload_files<S: ObjectStore + ?Sized>(
    store: &S,
    progress: &dyn ProgressSink,
    files: Vec<FileDescriptor>,
    options: &UploadOptions,
) -> Result<UploadSummary, UploadError> {
    let mut remaining = files.len();
    let mut queue: VecDeque<Pending> = files
        .into_iter()
        .map(|file| Pending { file, failures: 0 })
        .collect();
    let mut summary = UploadSummary::default();
    let mut failed = Vec::new();

    while remaining > 0 {
        let Some(Pending { file, failures }) = queue.pop_front() else {
            break;
        };

        let key = object_key(&options.prefix, &file.relative_path);
        let params = derive_parameters(&file, key).await?;

        summary.attempts += 1;
        let result = executor::upload(store, progress, file, &params, options.timeout).await;

        match result.outcome {
            UploadOutcome::Success(_) => {
                remaining -= 1;
                summary.files += 1;
                summary.bytes += result.file.size;
            }
            UploadOutcome::Failure(e) => {
                progress.write_line(Tone::Error, &e.to_string());

                let failures = failures + 1;
                if failures > options.max_retries {
                    log::error!("Giving up on {} after {failures} attempt(s)", params.key);
                    remaining -= 1;
                    failed.push(params.key);
                } else {
                    summary.retries += 1;
                    queue.push_back(Pending {
                        file: result.file,
                        failures,
                    });
                }
            }
        }
    }

    if !failed.is_empty() {
        return Err(UploadError::Incomplete { failed });
    }

    Ok(summary)
}

/// Runs the parameter builder off the async thread, since gzip validation
/// reads the whole file.
async fn derive_parameters(
    file: &FileDescriptor,
    key: String,
) -> Result<UploadParameters, UploadError> {
    let path = file.absolute_path.clone();
    let size = file.size;

    tokio::task::spawn_blocking(move || build_parameters(&path, size, Some(&key)))
        .await
        .map_err(|e| UploadError::Io {
            path: file.absolute_path.display().to_string(),
            source: std::io::Error::other(e),
        })?
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::progress::NullProgress;
    use crate::testing::{ProgressEvent, RecordingProgress, ScriptedStore};

    fn write_files(dir: &Path, files: &[(&str, usize)]) {
        for (name, size) in files {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, vec![b'x'; *size]).unwrap();
        }
    }

    #[tokio::test]
    async fn uploads_every_file_once_when_nothing_fails() {
        let tmp = tempfile::tempdir().unwrap();
        write_files(tmp.path(), &[("a.js", 100), ("b.css", 50)]);
        let store = ScriptedStore::new("site", "us-east-1");
        let progress = RecordingProgress::default();

        let summary = upload_directory(&store, &progress, tmp.path(), &UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(store.put_keys(), vec!["a.js", "b.css"]);
        assert_eq!(
            summary,
            UploadSummary {
                files: 2,
                bytes: 150,
                attempts: 2,
                retries: 0,
            }
        );

        let lines = progress.lines_with(Tone::Success);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Upload complete: a.js "));
        assert!(lines[1].starts_with("Upload complete: b.css "));
        assert!(progress.lines_with(Tone::Error).is_empty());
    }

    #[tokio::test]
    async fn failed_file_is_retried_and_then_completes() {
        let tmp = tempfile::tempdir().unwrap();
        write_files(tmp.path(), &[("a.js", 10)]);
        let store = ScriptedStore::new("site", "us-east-1").failing("a.js", 1);
        let progress = RecordingProgress::default();

        let summary = upload_directory(&store, &progress, tmp.path(), &UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(store.put_keys(), vec!["a.js", "a.js"]);
        assert_eq!(summary.attempts, 2);
        assert_eq!(summary.retries, 1);

        let errors = progress.lines_with(Tone::Error);
        assert!(errors[0].starts_with("Upload error: a.js "));
        assert_eq!(
            progress
                .lines_with(Tone::Success)
                .iter()
                .filter(|l| l.starts_with("Upload complete: a.js"))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn failures_rotate_to_the_back_of_the_queue() {
        let tmp = tempfile::tempdir().unwrap();
        write_files(tmp.path(), &[("a.js", 1), ("b.js", 1), ("c.js", 1)]);
        let store = ScriptedStore::new("site", "us-east-1").failing("b.js", 2);

        let summary = upload_directory(
            &store,
            &NullProgress,
            tmp.path(),
            &UploadOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(store.put_keys(), vec!["a.js", "b.js", "c.js", "b.js", "b.js"]);
        // (N - 1) + (K + 1)
        assert_eq!(summary.attempts, 2 + 3);
        assert_eq!(summary.files, 3);
    }

    #[tokio::test]
    async fn keys_carry_the_prefix_and_directory_structure() {
        let tmp = tempfile::tempdir().unwrap();
        write_files(tmp.path(), &[("css/app.css", 4), ("index.html", 4)]);
        let store = ScriptedStore::new("site", "us-east-1");
        let options = UploadOptions {
            prefix: "v2".to_string(),
            ..UploadOptions::default()
        };

        upload_directory(&store, &NullProgress, tmp.path(), &options)
            .await
            .unwrap();

        assert_eq!(store.put_keys(), vec!["v2/css/app.css", "v2/index.html"]);
    }

    #[tokio::test]
    async fn gives_up_after_bounded_retries() {
        let tmp = tempfile::tempdir().unwrap();
        write_files(tmp.path(), &[("a.js", 1), ("b.js", 1)]);
        let store = ScriptedStore::new("site", "us-east-1").failing("a.js", u32::MAX);
        let options = UploadOptions {
            max_retries: 2,
            ..UploadOptions::default()
        };

        let err = upload_directory(&store, &NullProgress, tmp.path(), &options)
            .await
            .unwrap_err();

        assert_eq!(store.put_keys(), vec!["a.js", "b.js", "a.js", "a.js"]);
        match err {
            UploadError::Incomplete { failed } => assert_eq!(failed, vec!["a.js"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn slow_put_times_out_and_is_retried() {
        let tmp = tempfile::tempdir().unwrap();
        write_files(tmp.path(), &[("slow.js", 1)]);
        let store = ScriptedStore::new("site", "us-east-1").stalling("slow.js", 1);
        let options = UploadOptions {
            timeout: Some(Duration::from_millis(50)),
            ..UploadOptions::default()
        };
        let progress = RecordingProgress::default();

        let summary = upload_directory(&store, &progress, tmp.path(), &options)
            .await
            .unwrap();

        assert_eq!(summary.attempts, 2);
        assert!(
            progress
                .lines_with(Tone::Error)
                .iter()
                .any(|l| l.contains("timed out"))
        );
    }

    #[tokio::test]
    async fn every_attempt_brackets_the_spinner() {
        let tmp = tempfile::tempdir().unwrap();
        write_files(tmp.path(), &[("a.js", 100)]);
        let store = ScriptedStore::new("site", "us-east-1");
        let progress = RecordingProgress::default();

        upload_directory(&store, &progress, tmp.path(), &UploadOptions::default())
            .await
            .unwrap();

        let events = progress.events();
        assert_eq!(events[0], ProgressEvent::Start("Uploading a.js [100b]".to_string()));
        assert_eq!(events[1], ProgressEvent::Stop);
    }

    #[tokio::test]
    async fn empty_directory_completes_immediately() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ScriptedStore::new("site", "us-east-1");

        let summary = upload_directory(
            &store,
            &NullProgress,
            tmp.path(),
            &UploadOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(summary, UploadSummary::default());
        assert!(store.put_keys().is_empty());
    }
}
