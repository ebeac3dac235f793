//! Record archives: one gzipped tarball per record.
//!
//! Packing and unpacking are synchronous (`tar` + `flate2`) and run on the
//! blocking thread pool.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where the bytes of a new archive come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArchiveSource {
    /// An already packed `.tar.gz` blob, stored as-is.
    Bytes(Vec<u8>),
    /// A directory holding one sub-directory per record; the record's own
    /// `<root>/<name>` directory is packed with `<name>/` as its top-level
    /// entry.
    Directory(PathBuf),
}

impl ArchiveSource {
    pub(crate) async fn into_bytes(self, name: &str) -> Result<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::Directory(root) => pack(root.join(name), name.to_string()).await,
        }
    }
}

pub(crate) const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// File (or blob) name of a record's archive.
pub fn archive_name(name: &str) -> String {
    format!("{name}{ARCHIVE_SUFFIX}")
}

/// Pack `dir` into a gzipped tarball whose entries live under `prefix/`.
pub async fn pack(dir: PathBuf, prefix: String) -> Result<Vec<u8>> {
    let result_of_thread = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
        if !dir.is_dir() {
            exn::bail!(ErrorKind::NotFound(format!("archive directory {}", dir.display())));
        }
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        builder
            .append_dir_all(&prefix, &dir)
            .or_raise(|| ErrorKind::Backend(format!("could not pack {}", dir.display())))?;
        let encoder = builder.into_inner().or_raise(|| ErrorKind::Backend("could not finish tarball".into()))?;
        let bytes = encoder.finish().or_raise(|| ErrorKind::Backend("could not finish gzip stream".into()))?;
        debug!(dir = %dir.display(), size = bytes.len(), "packed archive");
        Ok(bytes)
    })
    .await;
    result_of_thread.or_raise(|| ErrorKind::Backend("archive packing task failed".into()))?
}

/// Unpack a gzipped tarball into `dest`.
pub async fn unpack(bytes: Vec<u8>, dest: PathBuf) -> Result<()> {
    let result_of_thread = tokio::task::spawn_blocking(move || -> Result<()> {
        let mut archive = tar::Archive::new(GzDecoder::new(bytes.as_slice()));
        archive
            .unpack(&dest)
            .or_raise(|| ErrorKind::Backend(format!("could not unpack into {}", dest.display())))
    })
    .await;
    result_of_thread.or_raise(|| ErrorKind::Backend("archive unpacking task failed".into()))?
}

/// Missing or unreadable paths are not directories.
pub(crate) async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}
