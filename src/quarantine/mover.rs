//! Directory moves: rename when possible, copy and delete across devices.

use std::io;
use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::QuarantineError;

/// Moves `from` to `to`. Refuses to overwrite an existing destination.
pub async fn move_dir(from: &Path, to: &Path) -> Result<(), QuarantineError> {
    if tokio::fs::symlink_metadata(to).await.is_ok() {
        return Err(QuarantineError::DestinationExists {
            path: to.to_path_buf(),
        });
    }

    let failed = |source: io::Error| QuarantineError::MoveFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(
                "{} and {} are on different devices, copying",
                from.display(),
                to.display()
            );
            let (src, dst) = (from.to_path_buf(), to.to_path_buf());
            tokio::task::spawn_blocking(move || copy_then_remove(&src, &dst))
                .await
                .map_err(io::Error::other)
                .and_then(|r| r)
                .map_err(failed)
        }
        Err(e) => Err(failed(e)),
    }
}

fn copy_then_remove(src: &Path, dst: &Path) -> io::Result<()> {
    if let Err(e) = copy_dir_recursive(src, dst) {
        if let Err(cleanup) = std::fs::remove_dir_all(dst) {
            warn!("Failed to clean up partial copy {}: {}", dst.display(), cleanup);
        }
        return Err(e);
    }
    std::fs::remove_dir_all(src)
}

/// Recursively copies a directory, preserving relative layout.
pub(crate) fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(std::fs::read_link(link)?, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    std::fs::copy(link, target).map(|_| ())
}
