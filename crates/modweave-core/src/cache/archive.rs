//! Zip extraction into cache entries.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::error::Result;

/// Extract a zip archive on disk into `dest`.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(archive)
        .with_context(|| format!("Failed to open archive: {}", archive.display()))?;
    extract_zip_reader(file, dest)
}

/// Extract a zip archive into `dest`, returning the extracted file paths
/// relative to `dest`. Entries that would escape `dest` are skipped.
pub fn extract_zip_reader<R: Read + Seek>(reader: R, dest: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create extract directory: {}", dest.display()))?;

    let mut archive = zip::ZipArchive::new(reader).context("Failed to read zip archive")?;
    let mut extracted = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read zip entry {}", i))?;

        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!(entry = entry.name(), "skipping zip entry with unsafe path");
            continue;
        };
        let outpath = dest.join(&relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath)
                .with_context(|| format!("Failed to create directory: {}", outpath.display()))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create parent directory: {}", parent.display())
            })?;
        }

        let mut outfile = File::create(&outpath)
            .with_context(|| format!("Failed to create file: {}", outpath.display()))?;
        std::io::copy(&mut entry, &mut outfile)
            .with_context(|| format!("Failed to write file: {}", outpath.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode)).ok();
            }
        }

        extracted.push(relative);
    }

    extracted.sort();
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Stored);
            for (name, data) in entries {
                zip.start_file(*name, options).expect("Failed to start file");
                zip.write_all(data).expect("Failed to write file");
            }
            zip.finish().expect("Failed to finish zip");
        }
        buf.into_inner()
    }

    #[test]
    fn extracts_nested_files() {
        let temp = tempfile::TempDir::new().expect("Failed to create temp dir");
        let data = zip_with(&[
            ("textures/sky.dds", b"dds"),
            ("plugin.esp", b"esp"),
        ]);

        let files =
            extract_zip_reader(Cursor::new(data), temp.path()).expect("extract should succeed");

        assert_eq!(
            files,
            vec![PathBuf::from("plugin.esp"), PathBuf::from("textures/sky.dds")]
        );
        assert_eq!(
            std::fs::read(temp.path().join("textures/sky.dds")).expect("read should succeed"),
            b"dds"
        );
    }

    #[test]
    fn skips_entries_escaping_destination() {
        let temp = tempfile::TempDir::new().expect("Failed to create temp dir");
        let dest = temp.path().join("out");
        let data = zip_with(&[("../evil.txt", b"x"), ("ok.txt", b"y")]);

        let files = extract_zip_reader(Cursor::new(data), &dest).expect("extract should succeed");

        assert_eq!(files, vec![PathBuf::from("ok.txt")]);
        assert!(!temp.path().join("evil.txt").exists());
    }

    #[test]
    fn rejects_non_zip_input() {
        let temp = tempfile::TempDir::new().expect("Failed to create temp dir");
        let result = extract_zip_reader(Cursor::new(b"not a zip".to_vec()), temp.path());
        assert!(result.is_err());
    }
}
