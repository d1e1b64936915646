//! Single-file upload.
//!
//! [`upload`] is an `async fn`, so calling it only builds the attempt; the
//! put starts when the orchestrator awaits the returned future. Every
//! outcome comes back as an [`UploadResult`], store failures included, so
//! the caller can make retry decisions uniformly.

use std::time::{Duration, Instant};

use static_deploy_upload_models::{FileDescriptor, PutReceipt, UploadParameters};

use crate::StoreError;
use crate::progress::{ProgressSink, Tone, format_elapsed};
use crate::store::ObjectStore;

/// How one upload attempt ended.
#[derive(Debug)]
pub enum UploadOutcome {
    /// The store accepted the object.
    Success(PutReceipt),
    /// The store call failed or timed out.
    Failure(StoreError),
}

/// Result of one upload attempt, handing the descriptor back to the caller.
#[derive(Debug)]
pub struct UploadResult {
    /// The file that was attempted.
    pub file: FileDescriptor,
    /// What happened.
    pub outcome: UploadOutcome,
}

impl UploadResult {
    /// Returns `true` if the attempt succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, UploadOutcome::Success(_))
    }
}

/// Uploads one file and reports start/stop to `progress`.
///
/// When `timeout` is set, an attempt that takes longer is abandoned and
/// reported as [`StoreError::Timeout`].
pub async fn upload<S: ObjectStore + ?Sized>(
    store: &S,
    progress: &dyn ProgressSink,
    file: FileDescriptor,
    params: &UploadParameters,
    timeout: Option<Duration>,
) -> UploadResult {
    let start = Instant::now();

    progress.start(
        &format!("Uploading {} [{}b]", params.key, params.content_length),
        '.',
    );

    let put = store.put_object(params, &file.absolute_path);
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, put)
            .await
            .unwrap_or_else(|_| {
                Err(StoreError::Timeout {
                    key: params.key.clone(),
                    after: limit,
                })
            }),
        None => put.await,
    };

    progress.stop();
    let elapsed = format_elapsed(start.elapsed());

    let outcome = match result {
        Ok(receipt) => {
            progress.write_line(
                Tone::Success,
                &format!("Upload complete: {} {elapsed}", params.key),
            );
            UploadOutcome::Success(receipt)
        }
        Err(e) => {
            log::debug!("put {} failed: {e}", params.key);
            progress.write_line(Tone::Error, &format!("Upload error: {} {elapsed}", params.key));
            UploadOutcome::Failure(e)
        }
    };

    UploadResult { file, outcome }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use static_deploy_upload_models::{CACHE_CONTROL, ObjectAcl};

    use super::*;
    use crate::testing::{ProgressEvent, RecordingProgress, ScriptedStore};

    fn descriptor(name: &str) -> FileDescriptor {
        FileDescriptor {
            relative_path: name.to_string(),
            absolute_path: PathBuf::from(name),
            size: 42,
        }
    }

    fn params(key: &str) -> UploadParameters {
        UploadParameters {
            key: key.to_string(),
            content_type: "application/javascript".to_string(),
            cache_control: CACHE_CONTROL.to_string(),
            content_encoding: None,
            content_length: 42,
            acl: ObjectAcl::PublicRead,
        }
    }

    #[tokio::test]
    async fn nothing_happens_until_awaited() {
        let store = ScriptedStore::new("site", "us-east-1");
        let progress = RecordingProgress::default();

        let params = params("a.js");
        let attempt = upload(&store, &progress, descriptor("a.js"), &params, None);
        assert!(store.puts().is_empty());
        assert!(progress.events().is_empty());

        let result = attempt.await;
        assert!(result.is_success());
        assert_eq!(store.put_keys(), vec!["a.js"]);
    }

    #[tokio::test]
    async fn store_errors_become_failures() {
        let store = ScriptedStore::new("site", "us-east-1").failing("a.js", 1);
        let progress = RecordingProgress::default();

        let result = upload(&store, &progress, descriptor("a.js"), &params("a.js"), None).await;

        assert!(matches!(
            result.outcome,
            UploadOutcome::Failure(StoreError::Put { .. })
        ));
        assert_eq!(result.file, descriptor("a.js"));

        let events = progress.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], ProgressEvent::Start("Uploading a.js [42b]".to_string()));
        assert_eq!(events[1], ProgressEvent::Stop);
        assert!(matches!(
            &events[2],
            ProgressEvent::Line(Tone::Error, line) if line.starts_with("Upload error: a.js [")
        ));
    }

    #[tokio::test]
    async fn success_carries_the_store_receipt() {
        let store = ScriptedStore::new("site", "us-east-1");
        let result = upload(
            &store,
            &RecordingProgress::default(),
            descriptor("a.js"),
            &params("v2/a.js"),
            None,
        )
        .await;

        match result.outcome {
            UploadOutcome::Success(receipt) => {
                assert_eq!(receipt.e_tag.as_deref(), Some("\"v2/a.js\""));
            }
            UploadOutcome::Failure(e) => panic!("unexpected failure: {e}"),
        }
    }
}
