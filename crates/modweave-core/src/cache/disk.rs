//! On-disk cache laid out as `<root>/<game>/<source>/<mod>/<version>/`.

use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use anyhow::Context;

use crate::error::{ModError, NotFoundKind, Result};

use super::{CacheStore, ModCoords};

const LATEST_DIR: &str = "latest";

#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, coords: &ModCoords) -> Result<PathBuf> {
        let dir = self.mod_path(coords);
        if !dir.is_dir() {
            return Err(ModError::not_found(NotFoundKind::File, coords.to_string()));
        }
        Ok(dir)
    }
}

impl CacheStore for DiskCache {
    fn mod_path(&self, coords: &ModCoords) -> PathBuf {
        let version = if coords.version.is_empty() {
            LATEST_DIR
        } else {
            &coords.version
        };
        self.root
            .join(safe_component(&coords.game_id))
            .join(safe_component(&coords.source_id))
            .join(safe_component(&coords.mod_id))
            .join(safe_component(version))
    }

    fn exists(&self, coords: &ModCoords) -> bool {
        self.mod_path(coords).is_dir()
    }

    fn store(
        &self,
        coords: &ModCoords,
        relative: &Path,
        contents: &mut dyn Read,
    ) -> Result<PathBuf> {
        ensure_relative_path(relative)?;
        let target = self.mod_path(coords).join(relative);
        let parent = target.parent().ok_or_else(|| {
            ModError::InvalidConfig(format!("invalid cache path: {}", relative.display()))
        })?;
        fs::create_dir_all(parent).map_err(|err| ModError::io(parent, err))?;

        let tmp = parent.join(format!(
            ".{}.part",
            target
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default()
        ));
        if let Err(err) = write_via_temp(&tmp, &target, contents) {
            let _ = fs::remove_file(&tmp);
            return Err(ModError::io(&target, err));
        }
        Ok(target)
    }

    fn list_files(&self, coords: &ModCoords) -> Result<Vec<PathBuf>> {
        let dir = self.entry_dir(coords)?;
        let mut files = Vec::new();
        collect_files(&dir, Path::new(""), &mut files)
            .with_context(|| format!("Failed to list cache entry: {}", dir.display()))?;
        files.sort();
        Ok(files)
    }

    fn delete(&self, coords: &ModCoords) -> Result<()> {
        let dir = self.mod_path(coords);
        crate::fs::remove_path_if_exists(&dir).map_err(|err| ModError::io(&dir, err))?;
        Ok(())
    }

    fn size(&self, coords: &ModCoords) -> Result<u64> {
        let dir = self.entry_dir(coords)?;
        let mut total = 0;
        for relative in self.list_files(coords)? {
            let path = dir.join(&relative);
            let meta = fs::metadata(&path).map_err(|err| ModError::io(&path, err))?;
            total += meta.len();
        }
        Ok(total)
    }

    fn get_file_path(&self, coords: &ModCoords, relative: &Path) -> Result<PathBuf> {
        ensure_relative_path(relative)?;
        let path = self.mod_path(coords).join(relative);
        if !path.is_file() {
            return Err(ModError::not_found(
                NotFoundKind::File,
                format!("{} in {}", relative.display(), coords),
            ));
        }
        Ok(path)
    }
}

fn write_via_temp(tmp: &Path, target: &Path, contents: &mut dyn Read) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp)?;
    std::io::copy(contents, &mut file)?;
    file.sync_all()?;
    fs::rename(tmp, target)
}

fn collect_files(dir: &Path, prefix: &Path, out: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read dir: {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read dir entry: {}", dir.display()))?;
        let ty = entry
            .file_type()
            .with_context(|| format!("Failed to stat dir entry: {}", entry.path().display()))?;
        let name = entry.file_name();
        let relative = prefix.join(&name);

        if ty.is_dir() {
            collect_files(&entry.path(), &relative, out)?;
        } else if is_partial_download(&name.to_string_lossy()) {
            continue;
        } else {
            out.push(relative);
        }
    }
    Ok(())
}

/// Temp files written by `store` are named `.{file_name}.part`.
fn is_partial_download(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(".part")
}

fn safe_component(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            other => other,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => format!("_{cleaned}"),
        _ => cleaned,
    }
}

fn ensure_relative_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() || path.is_absolute() {
        return Err(ModError::InvalidConfig(format!(
            "cache paths must be relative: {}",
            path.display()
        )));
    }
    for component in path.components() {
        if !matches!(component, Component::Normal(_)) {
            return Err(ModError::InvalidConfig(format!(
                "path traversal not allowed in cache paths: {}",
                path.display()
            )));
        }
    }
    Ok(())
}
