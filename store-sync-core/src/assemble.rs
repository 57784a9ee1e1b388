//! Builds the upload payloads for a directory: every text file is merged into
//! one newline-delimited JSON bundle, every binary document is uploaded on its
//! own.
//!
//! Files are classified by a fixed, case-insensitive extension table. Anything
//! not in the table is ignored. Source files are only ever read.
//!
//! The walk is deterministic: inside each directory the regular files come
//! first in lexicographic order, then the subdirectories, each descended
//! depth-first in lexicographic order. The same tree always yields the same
//! bundle bytes. Subdirectories that cannot be opened are skipped with a
//! warning; an unreadable root or text file stops the run.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Extensions merged into the bundle.
pub const TEXT_EXTENSIONS: &[&str] = &[
    "c", "cpp", "cs", "css", "go", "html", "java", "js", "json", "md", "py", "rb", "sh", "tex",
    "ts", "txt",
];

/// Extensions uploaded individually.
pub const BINARY_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "pptx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    Text,
    Binary,
}

/// A supported file found under the scanned root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    pub category: FileCategory,
}

/// One line of the bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRecord {
    pub text: String,
    pub metadata: BundleMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleMetadata {
    /// Path relative to the scanned root, `/`-separated.
    pub path: String,
}

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("failed to walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialise bundle record for {path}: {source}")]
    Serialise {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to create bundle file: {0}")]
    TempFile(#[source] io::Error),
    #[error("failed to write bundle: {0}")]
    Write(#[from] io::Error),
}

/// The ordered upload list for one run, together with the temporary bundle
/// backing its first entry.
///
/// Dropping this value deletes the temporary bundle, whatever the outcome of
/// the run. Removal errors are ignored.
#[derive(Debug)]
pub struct Payloads {
    bundle: Option<NamedTempFile>,
    paths: Vec<PathBuf>,
}

impl Payloads {
    /// A single pre-built bundle, uploaded as-is and never deleted.
    pub fn single(path: PathBuf) -> Self {
        Self {
            bundle: None,
            paths: vec![path],
        }
    }

    /// Paths to upload, in upload order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// The temporary bundle created for this run, if any.
    pub fn bundle_path(&self) -> Option<&Path> {
        self.bundle.as_ref().map(NamedTempFile::path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Category for `path` by its extension, or `None` when unsupported.
pub fn classify(path: &Path) -> Option<FileCategory> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        Some(FileCategory::Text)
    } else if BINARY_EXTENSIONS.contains(&ext.as_str()) {
        Some(FileCategory::Binary)
    } else {
        None
    }
}

/// Walk `root` and return every supported file in traversal order.
pub fn scan(root: &Path) -> Result<Vec<LocalFile>, AssembleError> {
    let walker = WalkDir::new(root).min_depth(1).sort_by(|a, b| {
        a.file_type()
            .is_dir()
            .cmp(&b.file_type().is_dir())
            .then_with(|| a.file_name().cmp(b.file_name()))
    });

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            // An unreadable directory below the root is left out of the run.
            Err(e) if e.depth() > 0 && e.io_error().is_some() && e.path().is_some_and(Path::is_dir) => {
                warn!(path = ?e.path(), error = %e, "Skipping unreadable directory");
                continue;
            }
            Err(e) => {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                return Err(AssembleError::Walk { path, source: e });
            }
        };
        // Symlinks are followed for files only, never for directories.
        if entry.file_type().is_dir() || !entry.path().is_file() {
            continue;
        }
        match classify(entry.path()) {
            Some(category) => files.push(LocalFile {
                path: entry.into_path(),
                category,
            }),
            None => debug!(path = %entry.path().display(), "Skipping unsupported file"),
        }
    }

    info!(root = %root.display(), count = files.len(), "Scanned directory");
    Ok(files)
}

/// Read a text file for the bundle. Invalid UTF-8 is replaced rather than
/// rejected. Returns `None` when nothing is left after trimming.
pub fn read_text(path: &Path) -> Result<Option<String>, AssembleError> {
    let bytes = fs::read(path).map_err(|source| AssembleError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8_lossy(&bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_owned()))
    }
}

/// `path` relative to `root`, joined with `/` whatever the platform.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Write one JSON line per non-empty text file in `files`. Binary entries are
/// skipped. Returns the number of lines written.
pub fn write_bundle<W: Write>(
    root: &Path,
    files: &[LocalFile],
    mut writer: W,
) -> Result<usize, AssembleError> {
    let mut lines = 0;
    for file in files.iter().filter(|f| f.category == FileCategory::Text) {
        let Some(text) = read_text(&file.path)? else {
            debug!(path = %file.path.display(), "Skipping empty text file");
            continue;
        };
        let record = BundleRecord {
            text,
            metadata: BundleMetadata {
                path: relative_path(root, &file.path),
            },
        };
        serde_json::to_writer(&mut writer, &record).map_err(|source| {
            AssembleError::Serialise {
                path: record.metadata.path.clone(),
                source,
            }
        })?;
        writer.write_all(b"\n")?;
        lines += 1;
    }
    Ok(lines)
}

/// Scan `root`, write the text bundle to a fresh temporary file and collect
/// the binary documents. The bundle is always the first payload, even when it
/// has no lines.
pub fn assemble(root: &Path) -> Result<Payloads, AssembleError> {
    let files = scan(root)?;

    let mut bundle = tempfile::Builder::new()
        .prefix("store-sync-")
        .suffix(".jsonl")
        .tempfile()
        .map_err(AssembleError::TempFile)?;

    let lines = {
        let mut writer = BufWriter::new(bundle.as_file_mut());
        let lines = write_bundle(root, &files, &mut writer)?;
        writer.flush()?;
        lines
    };
    if lines == 0 {
        warn!(root = %root.display(), "No text content found; the bundle is empty");
    }
    info!(path = %bundle.path().display(), lines, "Wrote text bundle");

    let mut paths = vec![bundle.path().to_path_buf()];
    paths.extend(
        files
            .into_iter()
            .filter(|f| f.category == FileCategory::Binary)
            .map(|f| f.path),
    );
    info!(payloads = paths.len(), "Assembled payloads");

    Ok(Payloads {
        bundle: Some(bundle),
        paths,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{create_dir_all, write};
    use tempfile::tempdir;

    fn bundle_lines(payloads: &Payloads) -> Vec<BundleRecord> {
        let path = payloads.bundle_path().expect("bundle present");
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn classify_is_case_insensitive() {
        assert_eq!(classify(Path::new("a/Main.JAVA")), Some(FileCategory::Text));
        assert_eq!(classify(Path::new("notes.Md")), Some(FileCategory::Text));
        assert_eq!(classify(Path::new("deck.PPTX")), Some(FileCategory::Binary));
        assert_eq!(classify(Path::new("paper.pdf")), Some(FileCategory::Binary));
    }

    #[test]
    fn classify_ignores_unknown_and_missing_extensions() {
        assert_eq!(classify(Path::new("image.png")), None);
        assert_eq!(classify(Path::new("Makefile")), None);
        assert_eq!(classify(Path::new(".md")), None);
        assert_eq!(classify(Path::new("lib.rs")), None);
    }

    #[test]
    fn scan_lists_files_before_subdirectories_sorted() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        create_dir_all(root.join("b/inner")).unwrap();
        create_dir_all(root.join("a")).unwrap();
        write(root.join("z.txt"), "z").unwrap();
        write(root.join("m.pdf"), "pdf").unwrap();
        write(root.join("a/one.py"), "1").unwrap();
        write(root.join("b/two.md"), "2").unwrap();
        write(root.join("b/inner/three.c"), "3").unwrap();
        write(root.join("b/skip.png"), "png").unwrap();

        let rel: Vec<_> = scan(root)
            .unwrap()
            .iter()
            .map(|f| relative_path(root, &f.path))
            .collect();
        assert_eq!(
            rel,
            vec!["m.pdf", "z.txt", "a/one.py", "b/two.md", "b/inner/three.c"]
        );
    }

    #[test]
    fn text_is_trimmed_and_whitespace_only_files_are_dropped() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        write(root.join("hello.txt"), "  hello  ").unwrap();
        write(root.join("blank.md"), " \n\t \n").unwrap();

        let payloads = assemble(root).unwrap();
        let records = bundle_lines(&payloads);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "hello");
        assert_eq!(records[0].metadata.path, "hello.txt");
    }

    #[test]
    fn invalid_utf8_is_tolerated() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        write(root.join("bad.txt"), b"ok \xff\xfe bytes").unwrap();

        let payloads = assemble(root).unwrap();
        let records = bundle_lines(&payloads);
        assert_eq!(records.len(), 1);
        assert!(records[0].text.starts_with("ok "));
        assert!(records[0].text.ends_with(" bytes"));
    }

    #[test]
    fn bundle_lines_have_exact_shape_and_trailing_newline() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        create_dir_all(root.join("src")).unwrap();
        write(root.join("src/main.go"), "package main\n").unwrap();

        let payloads = assemble(root).unwrap();
        let raw = fs::read_to_string(payloads.bundle_path().unwrap()).unwrap();
        assert_eq!(
            raw,
            "{\"text\":\"package main\",\"metadata\":{\"path\":\"src/main.go\"}}\n"
        );
    }

    #[test]
    fn binaries_follow_the_bundle_in_traversal_order() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        create_dir_all(root.join("docs")).unwrap();
        write(root.join("b.docx"), "x").unwrap();
        write(root.join("a.pdf"), "x").unwrap();
        write(root.join("docs/c.doc"), "x").unwrap();
        write(root.join("readme.md"), "# hi").unwrap();

        let payloads = assemble(root).unwrap();
        let paths = payloads.paths();
        assert_eq!(paths.len(), 4);
        assert_eq!(Some(paths[0].as_path()), payloads.bundle_path());
        assert_eq!(paths[1], root.join("a.pdf"));
        assert_eq!(paths[2], root.join("b.docx"));
        assert_eq!(paths[3], root.join("docs/c.doc"));
    }

    #[test]
    fn empty_directory_still_yields_an_empty_bundle() {
        let tmp = tempdir().unwrap();
        write(tmp.path().join("photo.jpg"), "x").unwrap();

        let payloads = assemble(tmp.path()).unwrap();
        assert_eq!(payloads.len(), 1);
        let raw = fs::read(payloads.bundle_path().unwrap()).unwrap();
        assert!(raw.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempdir().unwrap();
        let root = tmp.path();
        write(root.join("a.txt"), "kept").unwrap();
        let locked = root.join("locked");
        create_dir_all(&locked).unwrap();
        write(locked.join("hidden.md"), "hidden").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users read through the mode bits.
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = assemble(root);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let payloads = result.expect("an unreadable subdirectory is not fatal");
        let records = bundle_lines(&payloads);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metadata.path, "a.txt");
    }

    #[test]
    fn missing_root_is_a_walk_error() {
        let tmp = tempdir().unwrap();
        let err = scan(&tmp.path().join("gone")).unwrap_err();
        assert!(matches!(err, AssembleError::Walk { .. }), "got {err:?}");
    }

    #[test]
    fn non_ascii_text_is_written_as_raw_utf8() {
        let tmp = tempdir().unwrap();
        write(tmp.path().join("a.txt"), "café").unwrap();

        let payloads = assemble(tmp.path()).unwrap();
        let raw = fs::read_to_string(payloads.bundle_path().unwrap()).unwrap();
        assert_eq!(raw, "{\"text\":\"café\",\"metadata\":{\"path\":\"a.txt\"}}\n");
    }

    #[test]
    fn same_tree_gives_identical_bundle_bytes() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        create_dir_all(root.join("pkg/sub")).unwrap();
        write(root.join("pkg/sub/x.ts"), "export const x = 1;").unwrap();
        write(root.join("pkg/y.rb"), "puts 'y'").unwrap();
        write(root.join("index.html"), "<p>\"quoted\"</p>").unwrap();

        let first = assemble(root).unwrap();
        let second = assemble(root).unwrap();
        assert_ne!(first.bundle_path(), second.bundle_path());
        assert_eq!(
            fs::read(first.bundle_path().unwrap()).unwrap(),
            fs::read(second.bundle_path().unwrap()).unwrap()
        );
    }

    #[test]
    fn dropping_payloads_removes_the_bundle() {
        let tmp = tempdir().unwrap();
        write(tmp.path().join("a.txt"), "a").unwrap();

        let payloads = assemble(tmp.path()).unwrap();
        let bundle = payloads.bundle_path().unwrap().to_path_buf();
        assert!(bundle.exists());
        drop(payloads);
        assert!(!bundle.exists());
    }

    #[test]
    fn assemble_never_touches_sources() {
        let tmp = tempdir().unwrap();
        let src = tmp.path().join("keep.sh");
        write(&src, "  echo hi  \n").unwrap();

        let _payloads = assemble(tmp.path()).unwrap();
        assert_eq!(fs::read_to_string(&src).unwrap(), "  echo hi  \n");
    }

    #[test]
    fn single_bundle_is_not_owned() {
        let tmp = tempdir().unwrap();
        let given = tmp.path().join("given.jsonl");
        write(&given, "{}\n").unwrap();

        let payloads = Payloads::single(given.clone());
        assert_eq!(payloads.paths(), &[given.clone()]);
        assert!(payloads.bundle_path().is_none());
        drop(payloads);
        assert!(given.exists());
    }
}
