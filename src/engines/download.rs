//! Model and tessdata download helpers shared by the engines

use crate::error::OcrError;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Return `cache_dir/filename`, downloading it from `url` first if missing
pub fn ensure_cached(cache_dir: &Path, filename: &str, url: &str) -> Result<PathBuf, OcrError> {
    std::fs::create_dir_all(cache_dir).map_err(|e| {
        OcrError::InitializationError(format!(
            "Failed to create cache directory {}: {}",
            cache_dir.display(),
            e
        ))
    })?;

    let path = cache_dir.join(filename);
    if !path.exists() {
        tracing::info!("Downloading {} (this may take a moment)...", filename);
        download_file(url, &path)?;
        tracing::info!("Downloaded {} to {:?}", filename, path);
    } else {
        tracing::debug!("Using cached {} from {:?}", filename, path);
    }
    Ok(path)
}

/// Download a file from URL to path using ureq.
/// The body lands in a temporary file first so an aborted download is not
/// mistaken for a cached file on the next start.
fn download_file(url: &str, path: &Path) -> Result<(), OcrError> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| OcrError::InitializationError(format!("Failed to download {}: {}", url, e)))?;

    let buffer = response.into_body().read_to_vec().map_err(|e| {
        OcrError::InitializationError(format!("Failed to read response body: {}", e))
    })?;

    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let mut file = File::create(&partial).map_err(|e| {
        OcrError::InitializationError(format!("Failed to create {}: {}", partial.display(), e))
    })?;
    file.write_all(&buffer).map_err(|e| {
        OcrError::InitializationError(format!("Failed to write {}: {}", partial.display(), e))
    })?;
    std::fs::rename(&partial, path).map_err(|e| {
        OcrError::InitializationError(format!("Failed to move {}: {}", path.display(), e))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_file_is_not_downloaded_again() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("model.rten"), b"weights").unwrap();

        // An unreachable URL proves no request is made
        let path = ensure_cached(dir.path(), "model.rten", "http://127.0.0.1:9/model.rten").unwrap();

        assert_eq!(std::fs::read(path).unwrap(), b"weights");
    }
}
