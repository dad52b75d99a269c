// codeatlas-core/src/infrastructure/fs.rs

use crate::infrastructure::error::InfrastructureError;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write content to a file atomically using a temporary file.
///
/// Creates a temp file in the same directory as the target, writes to
/// it, then persists (renames) it over the target, so the file is either
/// fully written or not written at all.
pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(
    path: P,
    content: C,
) -> Result<(), InfrastructureError> {
    let path = path.as_ref();
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(InfrastructureError::Io)?;
    temp_file
        .write_all(content.as_ref())
        .map_err(InfrastructureError::Io)?;
    temp_file
        .persist(path)
        .map_err(|e| InfrastructureError::Io(e.error))?;

    Ok(())
}

/// Blake3 checksum of a file's contents, used to detect unchanged files
/// across runs and as the `File.checksum` column (spec.md §3).
pub fn checksum_file(path: &Path) -> Result<String, InfrastructureError> {
    let bytes = std::fs::read(path).map_err(InfrastructureError::Io)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// One file discovered by the tree walk, with its size already known so
/// `maxFileBytes` filtering doesn't need a second stat.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Walks `root`, respecting `.gitignore`-style rules plus the caller's
/// explicit glob overrides (spec.md §4.5 step 1 "Skip binary and oversize
/// files"; §6 `ignore` option), and returns every regular file found.
/// Binary detection here is a conservative heuristic: a file is treated
/// as binary if its first 8KB contains a NUL byte.
pub fn discover_files(
    root: &Path,
    ignore_globs: &[String],
    max_file_bytes: u64,
) -> Result<Vec<DiscoveredFile>, InfrastructureError> {
    let mut overrides = ignore::overrides::OverrideBuilder::new(root);
    for pattern in ignore_globs {
        // A leading `!` in `ignore`'s override syntax means "do not
        // ignore"; our glob patterns are plain excludes, so negate them.
        overrides
            .add(&format!("!{pattern}"))
            .map_err(|e| InfrastructureError::Config(format!("invalid ignore glob: {e}")))?;
    }
    let overrides = overrides
        .build()
        .map_err(|e| InfrastructureError::Config(format!("invalid ignore globs: {e}")))?;

    let walker = ignore::WalkBuilder::new(root)
        .overrides(overrides)
        .hidden(false)
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| InfrastructureError::Config(e.to_string()))?;
        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }

        let metadata = entry
            .metadata()
            .map_err(|e| InfrastructureError::Config(e.to_string()))?;
        let size_bytes = metadata.len();
        if size_bytes > max_file_bytes {
            continue;
        }
        if is_probably_binary(entry.path())? {
            continue;
        }

        files.push(DiscoveredFile {
            path: entry.path().to_path_buf(),
            size_bytes,
        });
    }

    Ok(files)
}

fn is_probably_binary(path: &Path) -> Result<bool, InfrastructureError> {
    use std::io::Read;

    let mut file = std::fs::File::open(path).map_err(InfrastructureError::Io)?;
    let mut buf = [0u8; 8192];
    let n = file.read(&mut buf).map_err(InfrastructureError::Io)?;
    Ok(buf[..n].contains(&0))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write_creates_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.txt");
        atomic_write(&file_path, "hello").unwrap();
        assert_eq!(fs::read_to_string(file_path).unwrap(), "hello");
    }

    #[test]
    fn test_atomic_write_overwrites_existing() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.txt");
        atomic_write(&file_path, "first").unwrap();
        atomic_write(&file_path, "second").unwrap();
        assert_eq!(fs::read_to_string(file_path).unwrap(), "second");
    }

    #[test]
    fn test_checksum_changes_with_content() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("a.py");
        fs::write(&file_path, "def foo(): return 1").unwrap();
        let c1 = checksum_file(&file_path).unwrap();
        fs::write(&file_path, "def foo(): return 2").unwrap();
        let c2 = checksum_file(&file_path).unwrap();
        assert_ne!(c1, c2);
    }

    #[test]
    fn test_discover_files_respects_max_bytes_and_ignore() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("small.py"), "x = 1").unwrap();
        fs::write(dir.path().join("big.py"), "x".repeat(100)).unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/dep.js"), "ignored").unwrap();

        let files = discover_files(dir.path(), &["node_modules/**".to_string()], 10).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert!(names.contains(&"small.py".to_string()));
        assert!(!names.contains(&"big.py".to_string()));
        assert!(!names.contains(&"dep.js".to_string()));
    }
}
