//! Checksum manifest generation
//!
//! Writes a `checksums.txt` covering every emitted bundle file: one line
//! per file, lowercase hex SHA-256, two spaces, path relative to the
//! bundle root, LF line endings, sorted by path, trailing LF.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{RecipeError, Result};

/// Standard name for checksum manifests.
pub const CHECKSUM_FILE_NAME: &str = "checksums.txt";

/// Compute the lowercase hex SHA-256 of a byte slice.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex_encode(&hasher.finalize())
}

fn hex_encode(digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Generate `checksums.txt` in `bundle_dir` covering `files`.
///
/// Paths are recorded relative to `bundle_dir` (absolute when a file lies
/// outside it) and sorted, so the manifest content does not depend on the
/// order artifacts were emitted. Returns the manifest path.
pub fn write_checksums(
    token: &CancellationToken,
    bundle_dir: &Path,
    files: &[PathBuf],
) -> Result<PathBuf> {
    if token.is_cancelled() {
        return Err(RecipeError::Cancelled);
    }

    let mut lines = Vec::with_capacity(files.len());
    for file in files {
        if token.is_cancelled() {
            return Err(RecipeError::Cancelled);
        }

        let data = fs::read(file)?;
        let relative = file
            .strip_prefix(bundle_dir)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| file.clone());

        lines.push(format!(
            "{}  {}",
            sha256_hex(&data),
            relative.to_string_lossy().replace('\\', "/")
        ));
    }

    lines.sort_by(|a, b| path_of(a).cmp(path_of(b)));

    let manifest_path = bundle_dir.join(CHECKSUM_FILE_NAME);
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(&manifest_path, content)?;

    debug!(
        file_count = lines.len(),
        path = %manifest_path.display(),
        "Checksums generated"
    );

    Ok(manifest_path)
}

fn path_of(line: &str) -> &str {
    // Line format is "<hex>  <path>"; sort on the path half.
    line.split_once("  ").map(|(_, p)| p).unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_checksums_sorted_by_path_with_trailing_lf() {
        let dir = tempfile::tempdir().unwrap();
        let zebra = dir.path().join("zebra.yaml");
        let alpha = dir.path().join("alpha.yaml");
        fs::write(&zebra, "z").unwrap();
        fs::write(&alpha, "a").unwrap();

        let token = CancellationToken::new();
        let manifest =
            write_checksums(&token, dir.path(), &[zebra.clone(), alpha.clone()]).unwrap();

        let content = fs::read_to_string(&manifest).unwrap();
        assert!(content.ends_with('\n'));

        let lines: Vec<&str> = content.trim_end().lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("  alpha.yaml"));
        assert!(lines[1].ends_with("  zebra.yaml"));
    }

    #[test]
    fn test_checksums_reproduce_file_digests() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("values.yaml");
        fs::write(&file, "driver:\n  enabled: true\n").unwrap();

        let token = CancellationToken::new();
        let manifest = write_checksums(&token, dir.path(), &[file.clone()]).unwrap();

        let content = fs::read_to_string(&manifest).unwrap();
        let (recorded, path) = content.trim_end().split_once("  ").unwrap();
        assert_eq!(path, "values.yaml");
        assert_eq!(recorded, sha256_hex(&fs::read(&file).unwrap()));
    }

    #[test]
    fn test_cancelled_token_aborts_checksums() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let err = write_checksums(&token, dir.path(), &[]).unwrap_err();
        assert!(matches!(err, RecipeError::Cancelled));
    }
}
