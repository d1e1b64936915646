//! Per-file upload parameter derivation.
//!
//! Content type comes from the file extension; `Content-Encoding: gzip` is
//! decided by inspecting the bytes, never by the file name. Cache policy and
//! ACL are fixed.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use static_deploy_upload_models::{
    CACHE_CONTROL, ContentEncoding, DEFAULT_CONTENT_TYPE, ObjectAcl, UploadParameters,
};

use crate::UploadError;

/// The two magic bytes every gzip member starts with.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Derives the upload parameters for one file.
///
/// `key` defaults to the file's base name when no override is given. Callers
/// that want to keep the directory structure must pass the full key.
///
/// # Errors
///
/// Returns [`UploadError::Io`] if the file cannot be opened for content
/// inspection.
pub fn build_parameters(
    full_path: &Path,
    size: u64,
    key_override: Option<&str>,
) -> Result<UploadParameters, UploadError> {
    let is_gzip = is_gzip_file(full_path).map_err(|e| UploadError::Io {
        path: full_path.display().to_string(),
        source: e,
    })?;

    let key = key_override.map_or_else(
        || {
            full_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        },
        str::to_string,
    );

    Ok(UploadParameters {
        key,
        content_type: content_type_for(full_path),
        cache_control: CACHE_CONTROL.to_string(),
        content_encoding: is_gzip.then_some(ContentEncoding::Gzip),
        content_length: size,
        acl: ObjectAcl::PublicRead,
    })
}

/// Builds the object key for a file: `prefix/relative`, or `relative`
/// unchanged when the prefix is empty.
#[must_use]
pub fn object_key(prefix: &str, relative_path: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let relative = relative_path.trim_start_matches('/');
    if prefix.is_empty() {
        relative.to_string()
    } else {
        format!("{prefix}/{relative}")
    }
}

/// MIME type for a path, falling back to [`DEFAULT_CONTENT_TYPE`].
#[must_use]
pub fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

/// Returns `true` if the file is a complete, valid gzip stream.
///
/// Checks the magic bytes first, then decompresses the whole file into a
/// sink so truncated or corrupt streams are rejected.
fn is_gzip_file(path: &Path) -> Result<bool, std::io::Error> {
    let mut file = File::open(path)?;

    let mut magic = [0u8; 2];
    if file.read_exact(&mut magic).is_err() || magic != GZIP_MAGIC {
        return Ok(false);
    }

    let file = File::open(path)?;
    let mut decoder = MultiGzDecoder::new(BufReader::new(file));
    Ok(std::io::copy(&mut decoder, &mut std::io::sink()).is_ok())
}
