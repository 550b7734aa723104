//! Source archive unpacking.
//!
//! Extracts verified `.tar.gz` archives into the scratch directory with
//! path traversal protection and locates the single top-level directory
//! that becomes the unit's source tree.

use flate2::read::GzDecoder;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use tar::EntryType;

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum UnpackError {
    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive contains no entries.
    #[error("archive is empty")]
    EmptyArchive,

    /// The archive does not unpack into exactly one top-level directory.
    #[error("expected a single top-level directory, found: {}", roots.join(", "))]
    NoSingleRoot {
        /// Top-level names seen in the archive.
        roots: Vec<String>,
    },
}

/// Unpack the `.tar.gz` at `archive_path` into `dest_dir` and return the
/// path of its single top-level directory.
///
/// # Errors
///
/// Returns [`UnpackError::PathTraversal`] if an entry would escape
/// `dest_dir`, [`UnpackError::NoSingleRoot`] if the archive is not rooted
/// in one directory, and [`UnpackError::Io`] on read or write failures.
pub fn unpack_source(archive_path: &Path, dest_dir: &Path) -> Result<PathBuf, UnpackError> {
    let file = std::fs::File::open(archive_path)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    let mut roots = BTreeSet::new();
    let mut root_is_dir = true;

    std::fs::create_dir_all(dest_dir)?;
    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        if entry.header().entry_type() == EntryType::XGlobalHeader {
            continue;
        }
        let entry_path = entry.path()?.into_owned();
        validate_entry_path(&entry_path)?;

        let Some(root) = top_level(&entry_path) else {
            continue;
        };
        let depth = entry_path
            .components()
            .filter(|component| matches!(component, Component::Normal(_)))
            .count();
        if depth == 1 && !entry.header().entry_type().is_dir() {
            root_is_dir = false;
        }
        roots.insert(root);

        let dest_path = dest_dir.join(&entry_path);
        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        entry.unpack(&dest_path)?;
    }

    let mut names = roots.into_iter();
    match (names.next(), names.next()) {
        (None, _) => Err(UnpackError::EmptyArchive),
        (Some(root), None) if root_is_dir => {
            log::debug!("unpacked {} into {root}", archive_path.display());
            Ok(dest_dir.join(root))
        }
        (Some(first), rest) => Err(UnpackError::NoSingleRoot {
            roots: std::iter::once(first).chain(rest).chain(names).collect(),
        }),
    }
}

/// First normal component of an entry path, skipping any `./` prefix.
fn top_level(path: &Path) -> Option<String> {
    path.components().find_map(|component| match component {
        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
        _ => None,
    })
}

/// Validate that a tar entry path does not escape the destination
/// directory via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), UnpackError> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)));
    if escapes {
        return Err(UnpackError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use rstest::rstest;

    fn write_archive(path: &Path, entries: &[(&str, &[u8])]) {
        let file = std::fs::File::create(path).expect("create archive");
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, name, *contents)
                .expect("append entry");
        }
        builder
            .into_inner()
            .expect("tar finish")
            .finish()
            .expect("gzip finish");
    }

    #[test]
    fn unpacks_single_rooted_tree() {
        let temp = tempfile::tempdir().expect("temp dir");
        let archive = temp.path().join("socat-1.8.0.0.tar.gz");
        write_archive(
            &archive,
            &[
                ("socat-1.8.0.0/configure", b"#!/bin/sh\n"),
                ("socat-1.8.0.0/doc/socat.1", b".TH socat"),
            ],
        );
        let source = unpack_source(&archive, &temp.path().join("src")).expect("unpack");
        assert!(source.ends_with("socat-1.8.0.0"));
        assert!(source.join("configure").is_file());
        assert!(source.join("doc/socat.1").is_file());
    }

    #[test]
    fn rejects_multiple_roots() {
        let temp = tempfile::tempdir().expect("temp dir");
        let archive = temp.path().join("messy.tar.gz");
        write_archive(&archive, &[("a/configure", b""), ("b/configure", b"")]);
        let result = unpack_source(&archive, &temp.path().join("src"));
        assert!(
            matches!(result, Err(UnpackError::NoSingleRoot { ref roots }) if roots == &["a", "b"])
        );
    }

    #[test]
    fn rejects_flat_archive() {
        let temp = tempfile::tempdir().expect("temp dir");
        let archive = temp.path().join("flat.tar.gz");
        write_archive(&archive, &[("configure", b"")]);
        let result = unpack_source(&archive, &temp.path().join("src"));
        assert!(matches!(result, Err(UnpackError::NoSingleRoot { .. })));
    }

    #[test]
    fn rejects_empty_archive() {
        let temp = tempfile::tempdir().expect("temp dir");
        let archive = temp.path().join("empty.tar.gz");
        write_archive(&archive, &[]);
        let result = unpack_source(&archive, &temp.path().join("src"));
        assert!(matches!(result, Err(UnpackError::EmptyArchive)));
    }

    #[rstest]
    #[case::parent_dir("../escape.txt")]
    #[case::nested_parent("pkg/../../escape.txt")]
    #[case::absolute("/etc/passwd")]
    fn rejects_path_traversal(#[case] bad_path: &str) {
        let result = validate_entry_path(Path::new(bad_path));
        assert!(
            matches!(result, Err(UnpackError::PathTraversal { .. })),
            "expected PathTraversal for {bad_path}"
        );
    }

    #[rstest]
    #[case::plain("socat-1.8.0.0/configure", "socat-1.8.0.0")]
    #[case::dot_prefixed("./openssl-3.3.2/Configure", "openssl-3.3.2")]
    fn top_level_skips_current_dir(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(top_level(Path::new(path)).as_deref(), Some(expected));
    }
}
