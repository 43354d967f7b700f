use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use zip::ZipArchive;
use zip::write::SimpleFileOptions;

use crate::error::ShotScaleError;

/// Zips `source_dir` into `zip_path`; entry names start with the directory's own name.
pub fn archive_dir(source_dir: &Path, zip_path: &Path) -> Result<usize, ShotScaleError> {
    let base = source_dir.parent().unwrap_or(Path::new(""));
    let file = fs::File::create(zip_path)
        .map_err(|err| ShotScaleError::Archive(format!("create {}: {err}", zip_path.display())))?;
    let mut writer = zip::ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut files = 0usize;
    for path in walk_dir(source_dir)? {
        let name = entry_name(&path, base)?;
        if path.is_dir() {
            writer
                .add_directory(name, options)
                .map_err(|err| ShotScaleError::Archive(err.to_string()))?;
            continue;
        }
        writer
            .start_file(name, options)
            .map_err(|err| ShotScaleError::Archive(err.to_string()))?;
        let mut input = fs::File::open(&path)
            .map_err(|err| ShotScaleError::Archive(format!("open {}: {err}", path.display())))?;
        io::copy(&mut input, &mut writer).map_err(|err| ShotScaleError::Archive(err.to_string()))?;
        files += 1;
    }
    writer
        .finish()
        .map_err(|err| ShotScaleError::Archive(err.to_string()))?;
    Ok(files)
}

pub fn validate_zip(zip_path: &Path) -> Result<usize, ShotScaleError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| ShotScaleError::Archive(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| ShotScaleError::Archive(err.to_string()))?;

    let mut files = 0usize;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| ShotScaleError::Archive(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        io::copy(&mut entry, &mut io::sink())
            .map_err(|err| ShotScaleError::Archive(err.to_string()))?;
        files += 1;
    }
    Ok(files)
}

pub fn walk_dir(root: &Path) -> Result<Vec<PathBuf>, ShotScaleError> {
    let mut items = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        let entries =
            fs::read_dir(&path).map_err(|err| ShotScaleError::Filesystem(err.to_string()))?;
        let mut children = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| ShotScaleError::Filesystem(err.to_string()))?;
            children.push(entry.path());
        }
        children.sort();
        for child in children.iter().rev() {
            if child.is_dir() {
                stack.push(child.clone());
            }
        }
        items.extend(children);
    }
    Ok(items)
}

fn entry_name(path: &Path, base: &Path) -> Result<String, ShotScaleError> {
    let relative = path
        .strip_prefix(base)
        .map_err(|_| ShotScaleError::Archive(format!("{} escapes archive root", path.display())))?;
    let parts = relative
        .components()
        .map(|part| {
            part.as_os_str().to_str().ok_or_else(|| {
                ShotScaleError::Archive(format!("non-utf8 path {}", path.display()))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join("/"))
}
