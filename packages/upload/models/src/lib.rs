#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the static deploy upload pipeline.
//!
//! A [`FileDescriptor`] is produced once per file found under the deploy
//! root. [`UploadParameters`] are derived fresh from a descriptor for every
//! upload attempt and describe the object exactly as it is sent to the
//! bucket.

use std::path::PathBuf;

use strum_macros::{AsRefStr, Display, EnumString};

/// `Cache-Control` header attached to every uploaded object: cache for one
/// year, publicly cacheable.
pub const CACHE_CONTROL: &str = "max-age=31536000, public";

/// Content type used when the file extension is unknown or missing.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Region reported by S3 for buckets with an empty location constraint, and
/// the region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Extra attempts per file after a failed upload when none are configured.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// A regular file discovered under the deploy root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Path relative to the deploy root, always `/`-separated.
    pub relative_path: String,
    /// Absolute (or root-joined) path on the local filesystem.
    pub absolute_path: PathBuf,
    /// File size in bytes at enumeration time.
    pub size: u64,
}

/// Canned ACL applied to uploaded objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum ObjectAcl {
    /// Anyone can read the object.
    PublicRead,
}

/// `Content-Encoding` of an uploaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ContentEncoding {
    /// The body is a gzip stream.
    Gzip,
}

/// Everything the object store needs to know about one `PutObject` call,
/// except the body itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadParameters {
    /// Object key within the bucket.
    pub key: String,
    /// MIME type inferred from the file extension.
    pub content_type: String,
    /// Always [`CACHE_CONTROL`].
    pub cache_control: String,
    /// Set when the file content is a valid gzip stream.
    pub content_encoding: Option<ContentEncoding>,
    /// Body length in bytes.
    pub content_length: u64,
    /// Always [`ObjectAcl::PublicRead`].
    pub acl: ObjectAcl,
}

/// Region a bucket actually lives in, as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketLocation {
    /// Region name (e.g. `eu-west-1`).
    pub region: String,
}

/// What the store returned for a successful `PutObject`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutReceipt {
    /// Object `ETag`, if the store returned one.
    pub e_tag: Option<String>,
    /// Object version, for versioned buckets.
    pub version_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acl_and_encoding_render_as_header_values() {
        assert_eq!(ObjectAcl::PublicRead.to_string(), "public-read");
        assert_eq!(ContentEncoding::Gzip.as_ref(), "gzip");
        assert_eq!("gzip".parse::<ContentEncoding>().ok(), Some(ContentEncoding::Gzip));
    }
}
