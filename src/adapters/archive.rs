//! Archive extraction for zip and tar.gz bundles.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::read::GzDecoder;
use tar::Archive;
use zip::result::ZipError;
use zip::ZipArchive;

use super::{ExtractError, Extractor};

/// Extractor dispatching on the archive file name. The blocking unpack work
/// runs on the blocking thread pool; the contract to the caller stays a
/// plain awaited call.
pub struct ArchiveExtractor;

#[async_trait]
impl Extractor for ArchiveExtractor {
    async fn extract(&self, archive: &Path, dest: &Path) -> Result<PathBuf, ExtractError> {
        let archive = archive.to_path_buf();
        let dest = dest.to_path_buf();

        tokio::task::spawn_blocking(move || extract_sync(&archive, &dest))
            .await
            .map_err(|e| ExtractError::Storage(io::Error::new(io::ErrorKind::Other, e)))?
    }
}

fn extract_sync(archive: &Path, dest: &Path) -> Result<PathBuf, ExtractError> {
    std::fs::create_dir_all(dest)?;

    let name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ExtractError::CorruptArchive("archive has no readable file name".into()))?;

    if name.ends_with(".zip") {
        extract_zip(archive, dest)?;
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        extract_tar_gz(archive, dest)?;
    } else {
        return Err(ExtractError::CorruptArchive(format!(
            "unsupported archive format: {}",
            name
        )));
    }

    Ok(dest.to_path_buf())
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<(), ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(zip_error)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(zip_error)?;
        let outpath = match entry.enclosed_name() {
            Some(path) => dest.join(path),
            // Entries escaping the destination are skipped, not extracted.
            None => continue,
        };

        if entry.name().ends_with('/') {
            std::fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&outpath)?;
            io::copy(&mut entry, &mut outfile)?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))?;
            }
        }
    }

    Ok(())
}

fn extract_tar_gz(archive_path: &Path, dest: &Path) -> Result<(), ExtractError> {
    let file = File::open(archive_path)?;
    let decoder = GzDecoder::new(file);
    let mut archive = Archive::new(decoder);
    archive.unpack(dest).map_err(|e| match e.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
            ExtractError::CorruptArchive(e.to_string())
        }
        _ => ExtractError::Storage(e),
    })?;
    Ok(())
}

fn zip_error(err: ZipError) -> ExtractError {
    match err {
        ZipError::Io(e) => ExtractError::Storage(e),
        other => ExtractError::CorruptArchive(other.to_string()),
    }
}
