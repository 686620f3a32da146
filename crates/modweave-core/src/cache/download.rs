//! Fetching a mod file from a backend URL into the cache.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::{ModError, Result};
use crate::types::DeployMode;

use super::{CacheStore, ModCoords, extract_zip_reader};

/// Download `url` into the cache entry at `coords`.
///
/// In [`DeployMode::Extract`] a `.zip` download is unpacked into the entry;
/// anything else, and every download in [`DeployMode::Copy`], is stored as
/// `file_name` unmodified. Returns the stored paths relative to the entry.
/// Failures are surfaced as [`ModError::DownloadFailed`] and never retried.
pub async fn download_to_cache(
    client: &reqwest::Client,
    url: &str,
    cache: &dyn CacheStore,
    coords: &ModCoords,
    file_name: &str,
    mode: DeployMode,
) -> Result<Vec<PathBuf>> {
    let failed = |message: String| ModError::DownloadFailed {
        url: url.to_string(),
        message,
    };

    tracing::info!(%coords, url, "downloading mod file");
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| failed(err.to_string()))?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|err| failed(format!("failed to read response body: {err}")))?;

    store_download(cache, coords, file_name, mode, &bytes)
}

fn store_download(
    cache: &dyn CacheStore,
    coords: &ModCoords,
    file_name: &str,
    mode: DeployMode,
    bytes: &[u8],
) -> Result<Vec<PathBuf>> {
    let name = Path::new(file_name)
        .file_name()
        .ok_or_else(|| {
            ModError::InvalidConfig(format!("invalid download file name: {file_name}"))
        })?;

    if mode == DeployMode::Extract && is_zip(file_name) {
        let dest = cache.mod_path(coords);
        return extract_zip_reader(Cursor::new(bytes), &dest);
    }

    cache.store(coords, Path::new(name), &mut &bytes[..])?;
    Ok(vec![PathBuf::from(name)])
}

fn is_zip(file_name: &str) -> bool {
    file_name.to_ascii_lowercase().ends_with(".zip")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DiskCache;
    use std::io::Write;

    fn zip_bytes() -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Stored);
            zip.start_file("meshes/a.nif", options).expect("Failed to start file");
            zip.write_all(b"nif").expect("Failed to write file");
            zip.finish().expect("Failed to finish zip");
        }
        buf.into_inner()
    }

    #[test]
    fn extract_mode_unpacks_zip() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let cache = DiskCache::new(tmp.path());
        let coords = ModCoords::new("skyrim", "nexus", "1", "1.0");

        let zip = zip_bytes();
        let files = store_download(&cache, &coords, "Mod-1.0.zip", DeployMode::Extract, &zip)
            .expect("store should succeed");

        assert_eq!(files, vec![PathBuf::from("meshes/a.nif")]);
        assert_eq!(
            cache.list_files(&coords).expect("list should succeed"),
            vec![PathBuf::from("meshes/a.nif")]
        );
    }

    #[test]
    fn copy_mode_keeps_archive_intact() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let cache = DiskCache::new(tmp.path());
        let coords = ModCoords::new("skyrim", "nexus", "1", "1.0");
        let data = zip_bytes();

        let files = store_download(&cache, &coords, "Mod-1.0.zip", DeployMode::Copy, &data)
            .expect("store should succeed");

        assert_eq!(files, vec![PathBuf::from("Mod-1.0.zip")]);
        let stored = cache
            .get_file_path(&coords, Path::new("Mod-1.0.zip"))
            .expect("file should exist");
        assert_eq!(std::fs::read(stored).expect("read should succeed"), data);
    }

    #[tokio::test]
    async fn unreachable_url_is_download_failure() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let cache = DiskCache::new(tmp.path());
        let coords = ModCoords::new("skyrim", "nexus", "1", "1.0");
        let client = reqwest::Client::new();

        // Port 9 (discard) on localhost is not expected to serve HTTP.
        let err = download_to_cache(
            &client,
            "http://127.0.0.1:9/mod.zip",
            &cache,
            &coords,
            "mod.zip",
            DeployMode::Extract,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ModError::DownloadFailed { .. }));
    }
}
