use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

/// Create the parent directory of `path` if it doesn't exist; error if a non-directory is there.
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else { return Ok(()) };
    if parent.exists() {
        if !parent.is_dir() {
            anyhow::bail!("Path exists but is not a directory: {}", parent.display());
        }
    } else {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

/// Write `path` through `write`. With `atomic`, the content goes to a temporary sibling
/// that is renamed over `path` only once `write` has succeeded.
pub(crate) fn write_with(path: &Path, atomic: bool, write: impl FnOnce(&mut File) -> Result<()>) -> Result<()> {
    ensure_parent_dir(path)?;

    if atomic {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
        write(tmp.as_file_mut())?;
        tmp.as_file_mut().flush()?;
        tmp.persist(path)
            .with_context(|| format!("Failed to move temporary file to {}", path.display()))?;
    } else {
        let mut file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        write(&mut file)?;
        file.flush()?;
    }
    Ok(())
}

/// Write a text or binary artifact.
pub fn write_output(path: &Path, bytes: &[u8], atomic: bool) -> Result<()> {
    write_with(path, atomic, |file| {
        file.write_all(bytes)
            .with_context(|| format!("Failed to write {}", path.display()))
    })
}

/// Hex sha256 of a file's contents.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .with_context(|| format!("Failed to hash {}", path.display()))?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{sha256_file, write_output};

    #[test]
    fn writes_plain_and_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("nested/plain.txt");
        let atomic = dir.path().join("nested/atomic.txt");

        write_output(&plain, b"one", false).unwrap();
        write_output(&atomic, b"two", true).unwrap();
        write_output(&atomic, b"three", true).unwrap();

        assert_eq!(fs::read_to_string(plain).unwrap(), "one");
        assert_eq!(fs::read_to_string(atomic).unwrap(), "three");
        assert_eq!(fs::read_dir(dir.path().join("nested")).unwrap().count(), 2);
    }

    #[test]
    fn hashes_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
        );
    }
}
