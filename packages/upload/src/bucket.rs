//! Pre-flight bucket validation.

use static_deploy_upload_models::BucketLocation;

use crate::UploadError;
use crate::progress::{ProgressSink, Tone};
use crate::store::ObjectStore;

/// Confirms the bucket exists and points `store` at the bucket's real
/// region.
///
/// Takes the store mutably: the region correction must land before any
/// upload borrows it.
///
/// # Errors
///
/// Returns [`UploadError::BucketValidation`] if the bucket cannot be
/// located. Deployment cannot continue past this.
pub async fn validate<S: ObjectStore + ?Sized>(
    store: &mut S,
    progress: &dyn ProgressSink,
) -> Result<BucketLocation, UploadError> {
    progress.start("Verifying bucket", '.');
    let result = store.bucket_location().await;
    progress.stop();

    match result {
        Ok(location) => {
            progress.write_line(Tone::Success, &format!("Bucket found: {}", store.bucket()));

            if location.region != store.region() {
                log::info!(
                    "Bucket {} lives in {}, not {}; switching region",
                    store.bucket(),
                    location.region,
                    store.region()
                );
                store.set_region(&location.region);
            }

            Ok(location)
        }
        Err(e) => {
            progress.write_line(
                Tone::Error,
                &format!("Error locating bucket: {}", store.bucket()),
            );
            Err(UploadError::BucketValidation {
                bucket: store.bucket().to_string(),
                source: e,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UploadOptions;
    use crate::orchestrator::upload_files;
    use crate::progress::NullProgress;
    use crate::testing::{RecordingProgress, ScriptedStore};

    #[tokio::test]
    async fn corrects_the_region_before_uploads() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.js");
        std::fs::write(&path, b"1").unwrap();

        let mut store = ScriptedStore::new("site", "us-east-1").located_in("eu-central-1");
        let progress = RecordingProgress::default();

        let location = validate(&mut store, &progress).await.unwrap();
        assert_eq!(location.region, "eu-central-1");
        assert_eq!(store.region(), "eu-central-1");
        assert_eq!(progress.lines_with(Tone::Success), vec!["Bucket found: site"]);

        let files = vec![static_deploy_upload_models::FileDescriptor {
            relative_path: "a.js".to_string(),
            absolute_path: path,
            size: 1,
        }];
        upload_files(&store, &progress, files, &UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(store.puts()[0].region, "eu-central-1");
    }

    #[tokio::test]
    async fn keeps_a_matching_region() {
        let mut store = ScriptedStore::new("site", "us-west-2");
        validate(&mut store, &NullProgress)
            .await
            .unwrap();
        assert_eq!(store.region(), "us-west-2");
    }

    #[tokio::test]
    async fn missing_bucket_is_fatal() {
        let mut store = ScriptedStore::new("site", "us-east-1").missing_bucket();
        let progress = RecordingProgress::default();

        let err = validate(&mut store, &progress).await.unwrap_err();

        assert!(matches!(err, UploadError::BucketValidation { ref bucket, .. } if bucket == "site"));
        assert_eq!(
            progress.lines_with(Tone::Error),
            vec!["Error locating bucket: site"]
        );
    }
}
