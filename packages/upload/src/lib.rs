#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Directory upload pipeline for deploying static build output to S3.
//!
//! The pipeline runs in four stages:
//!
//! 1. [`enumerate::enumerate_files`] walks the build output once, up front.
//! 2. [`params::build_parameters`] derives each object's headers (content
//!    type by extension, gzip encoding by content, fixed cache policy/ACL).
//! 3. [`executor::upload`] performs one put and classifies the outcome.
//! 4. [`orchestrator::upload_files`] drives the work queue strictly
//!    sequentially, sending failed files to the back of the queue until they
//!    succeed or run out of attempts.
//!
//! [`bucket::validate`] runs once before all of this and corrects the
//! store's region if the bucket lives somewhere else.

pub mod bucket;
pub mod enumerate;
pub mod executor;
pub mod orchestrator;
pub mod params;
pub mod progress;
pub mod store;

#[cfg(any(test, feature = "testing"))]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used)]
pub mod testing;

use std::time::Duration;

pub use orchestrator::{UploadOptions, UploadSummary, upload_directory, upload_files};
pub use progress::{NullProgress, ProgressSink, Tone};
pub use store::{ObjectStore, S3Settings, S3Store};

/// Errors from a single object store call.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// S3 `PutObject` failed.
    #[error("Failed to upload s3://{bucket}/{key}: {source}")]
    Put {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// S3 `GetBucketLocation` failed.
    #[error("Failed to locate bucket {bucket}: {source}")]
    Location {
        /// Bucket name.
        bucket: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A put did not finish within the configured timeout.
    #[error("Upload of {key} timed out after {after:.1?}")]
    Timeout {
        /// Object key.
        key: String,
        /// The configured limit.
        after: Duration,
    },
}

/// Fatal errors that abort a directory upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The deploy root could not be walked.
    #[error("Failed to read directory {path}: {source}")]
    Enumerate {
        /// Path that could not be read.
        path: String,
        /// Underlying error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A file could not be opened for inspection.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The target bucket could not be located.
    #[error("Bucket validation failed for {bucket}: {source}")]
    BucketValidation {
        /// Bucket name.
        bucket: String,
        /// Store error from the lookup.
        source: StoreError,
    },

    /// Some files were still failing after all of their attempts.
    #[error("{} file(s) could not be uploaded: {}", failed.len(), failed.join(", "))]
    Incomplete {
        /// Keys of the files that never succeeded.
        failed: Vec<String>,
    },
}
