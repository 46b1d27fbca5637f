use std::fs;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

use crate::error::GearError;

pub fn ensure_dir(path: &Utf8Path) -> Result<(), GearError> {
    fs::create_dir_all(path.as_std_path()).map_err(|err| GearError::Filesystem(err.to_string()))
}

pub fn enclosed_join(root: &Utf8Path, relative: &Utf8Path) -> Option<Utf8PathBuf> {
    let mut joined = root.to_path_buf();
    for component in relative.components() {
        match component {
            Utf8Component::Normal(part) => joined.push(part),
            Utf8Component::CurDir => {}
            _ => return None,
        }
    }
    Some(joined)
}

pub fn copy_file(source: &Utf8Path, dest: &Utf8Path) -> Result<(), GearError> {
    let parent = dest
        .parent()
        .ok_or_else(|| GearError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| GearError::Filesystem(err.to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix("vcid-asl-file")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| GearError::Filesystem(err.to_string()))?;
    fs::copy(source.as_std_path(), temp.path())
        .map_err(|err| GearError::Filesystem(err.to_string()))?;
    if dest.as_std_path().exists() {
        fs::remove_file(dest.as_std_path()).map_err(|err| GearError::Filesystem(err.to_string()))?;
    }
    temp.persist(dest.as_std_path())
        .map_err(|err| GearError::Filesystem(err.to_string()))?;
    Ok(())
}

pub fn copy_dir_files(source: &Utf8Path, dest: &Utf8Path) -> Result<usize, GearError> {
    ensure_dir(dest)?;
    let mut copied = 0;
    for file in walk_files(source)? {
        let relative = file
            .strip_prefix(source)
            .map_err(|err| GearError::Filesystem(err.to_string()))?;
        copy_file(&file, &dest.join(relative))?;
        copied += 1;
    }
    Ok(copied)
}

pub fn walk_files(root: &Utf8Path) -> Result<Vec<Utf8PathBuf>, GearError> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries =
            fs::read_dir(dir.as_std_path()).map_err(|err| GearError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| GearError::Filesystem(err.to_string()))?;
            let path = Utf8PathBuf::from_path_buf(entry.path())
                .map_err(|_| GearError::Filesystem("non-utf8 path in dataset".to_string()))?;
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

#[derive(Debug)]
pub struct ScopedDir {
    path: Utf8PathBuf,
    keep: bool,
}

impl ScopedDir {
    pub fn create(path: &Utf8Path) -> Result<Self, GearError> {
        ensure_dir(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            keep: false,
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn keep(mut self) -> Utf8PathBuf {
        self.keep = true;
        self.path.clone()
    }
}

impl Drop for ScopedDir {
    fn drop(&mut self) {
        if !self.keep && self.path.as_std_path().exists() {
            let _ = fs::remove_dir_all(self.path.as_std_path());
        }
    }
}
