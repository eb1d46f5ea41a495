// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Application package building.
//!
//! The platform accepts bits as a zip archive. Jar and war files already are
//! zip archives and are uploaded as-is; anything else fetched from a URL is
//! treated as a single executable and wrapped into an archive.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::SourceError;

const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";
const EMPTY_ZIP_MAGIC: [u8; 4] = *b"PK\x05\x06";

/// Directories never included in a package.
const SKIPPED_DIRS: [&str; 1] = [".git"];

/// What a materialized artifact turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// A zip, jar or war archive uploaded unchanged.
    ApplicationPackage,
    /// A single executable wrapped into an archive.
    WrappedExecutable,
    /// A directory archived recursively.
    PackagedDirectory,
}

/// Classify a file by its leading bytes.
pub fn identify_artifact(path: &Path) -> Result<ArtifactKind, SourceError> {
    let mut header = [0u8; 4];
    let mut file = File::open(path)?;
    let read = read_header(&mut file, &mut header)?;
    if read == header.len() && (header == ZIP_MAGIC || header == EMPTY_ZIP_MAGIC) {
        Ok(ArtifactKind::ApplicationPackage)
    } else {
        Ok(ArtifactKind::WrappedExecutable)
    }
}

fn read_header(file: &mut File, header: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < header.len() {
        match file.read(&mut header[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

fn options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Wrap a single executable into `dest`, keeping its file name and marking it
/// executable.
pub(crate) fn wrap_executable(executable: &Path, dest: &Path) -> Result<(), SourceError> {
    let name = executable
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "app".to_string());

    let mut zip = ZipWriter::new(File::create(dest)?);
    zip.start_file(name, options().unix_permissions(0o755))?;
    let mut input = File::open(executable)?;
    io::copy(&mut input, &mut zip)?;
    zip.finish()?.flush()?;
    Ok(())
}

/// Archive the contents of `dir` into `dest`.
///
/// Entries are added in sorted order so the same tree always yields the same
/// archive layout.
pub(crate) fn zip_directory(dir: &Path, dest: &Path) -> Result<usize, SourceError> {
    let mut files = Vec::new();
    collect_files(dir, dir, &mut files)?;
    files.sort();

    let mut zip = ZipWriter::new(File::create(dest)?);
    for (relative, absolute) in &files {
        let mut opts = options();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(absolute)?.permissions().mode();
            opts = opts.unix_permissions(mode & 0o777);
        }
        zip.start_file(relative.as_str(), opts)?;
        let mut input = File::open(absolute)?;
        io::copy(&mut input, &mut zip)?;
    }
    zip.finish()?.flush()?;
    Ok(files.len())
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<(String, PathBuf)>) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if SKIPPED_DIRS.iter().any(|s| entry.file_name() == *s) {
                continue;
            }
            collect_files(root, &path, out)?;
        } else if file_type.is_file() {
            let relative = path
                .strip_prefix(root)
                .map_err(|e| io::Error::other(e.to_string()))?
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            out.push((relative, path));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zip::ZipArchive;

    fn entry_names(archive: &Path) -> Vec<String> {
        let mut zip = ZipArchive::new(File::open(archive).unwrap()).unwrap();
        (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_identify_zip_and_executable() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("app.jar");
        std::fs::write(&jar, b"PK\x03\x04rest-of-archive").unwrap();
        let binary = dir.path().join("server");
        std::fs::write(&binary, b"\x7fELF binary").unwrap();
        let tiny = dir.path().join("tiny");
        std::fs::write(&tiny, b"PK").unwrap();

        assert_eq!(identify_artifact(&jar).unwrap(), ArtifactKind::ApplicationPackage);
        assert_eq!(identify_artifact(&binary).unwrap(), ArtifactKind::WrappedExecutable);
        assert_eq!(identify_artifact(&tiny).unwrap(), ArtifactKind::WrappedExecutable);
    }

    #[test]
    fn test_wrap_executable_keeps_name() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("server");
        std::fs::write(&binary, b"#!/bin/sh\necho hi\n").unwrap();
        let dest = dir.path().join("bits.zip");

        wrap_executable(&binary, &dest).unwrap();

        assert_eq!(entry_names(&dest), vec!["server".to_string()]);
        assert_eq!(identify_artifact(&dest).unwrap(), ArtifactKind::ApplicationPackage);
    }

    #[test]
    fn test_zip_directory_sorted_and_skips_git() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("public")).unwrap();
        std::fs::create_dir_all(src.join(".git")).unwrap();
        std::fs::write(src.join("package.json"), b"{}").unwrap();
        std::fs::write(src.join("public/index.html"), b"<html/>").unwrap();
        std::fs::write(src.join(".git/HEAD"), b"ref: refs/heads/main").unwrap();
        let dest = dir.path().join("bits.zip");

        let count = zip_directory(&src, &dest).unwrap();

        assert_eq!(count, 2);
        assert_eq!(
            entry_names(&dest),
            vec!["package.json".to_string(), "public/index.html".to_string()]
        );
    }
}
