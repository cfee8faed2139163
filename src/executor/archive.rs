//! Tar stream builders for put-archive uploads and image build contexts.
//!
//! Code is always transferred into containers as a tar upload, never by
//! interpolating the payload into a shell command, so the file content can
//! contain anything without becoming an injection vector.

use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;
use tar::{Builder, Header};

/// Builds a finalized in-memory tar stream containing a single file entry
/// with mode 0644.
pub(crate) fn single_file_archive(filename: &str, content: &[u8]) -> Result<Bytes> {
    let mut builder = Builder::new(Vec::new());

    let mut header = Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, filename, content)
        .with_context(|| format!("failed to append {filename} to archive"))?;

    let data = builder
        .into_inner()
        .context("failed to finalize archive")?;
    Ok(Bytes::from(data))
}

/// Builds a finalized in-memory tar stream from a directory's contents.
///
/// Entries are named relative to `dir` with forward slashes; the root itself
/// is not included. Suitable as a Docker build context.
pub(crate) fn directory_archive(dir: &Path) -> Result<Bytes> {
    let mut builder = Builder::new(Vec::new());
    builder
        .append_dir_all("", dir)
        .with_context(|| format!("failed to read build context {}", dir.display()))?;
    let data = builder
        .into_inner()
        .context("failed to finalize archive")?;
    Ok(Bytes::from(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;
    use tempfile::tempdir;

    fn entries(bytes: &Bytes) -> Vec<(String, Vec<u8>)> {
        let mut archive = tar::Archive::new(bytes.as_ref());
        archive
            .entries()
            .unwrap()
            .map(|e| {
                let mut e = e.unwrap();
                let name = e.path().unwrap().to_string_lossy().into_owned();
                let mut content = Vec::new();
                e.read_to_end(&mut content).unwrap();
                (name, content)
            })
            .collect()
    }

    #[test]
    fn test_single_file_archive_roundtrip() {
        let bytes = single_file_archive("t.py", b"print(42)\n").unwrap();
        let got = entries(&bytes);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].0, "t.py");
        assert_eq!(got[0].1, b"print(42)\n");
    }

    #[test]
    fn test_single_file_archive_mode_and_size() {
        let bytes = single_file_archive("run.sh", b"echo hi").unwrap();
        let mut archive = tar::Archive::new(bytes.as_ref());
        let entry = archive.entries().unwrap().next().unwrap().unwrap();
        assert_eq!(entry.header().mode().unwrap() & 0o777, 0o644);
        assert_eq!(entry.header().size().unwrap(), 7);
    }

    #[test]
    fn test_single_file_archive_preserves_arbitrary_bytes() {
        // Content that would be dangerous in a shell command must survive
        // byte-exact through the archive.
        let payload = b"echo $(rm -rf /); '\"` \x00\xff";
        let bytes = single_file_archive("x.sh", payload).unwrap();
        let got = entries(&bytes);
        assert_eq!(got[0].1, payload);
    }

    #[test]
    fn test_directory_archive_relative_names() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Dockerfile"), "FROM alpine\n").unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/app.py"), "print(1)\n").unwrap();

        let bytes = directory_archive(dir.path()).unwrap();
        let names: Vec<String> = entries(&bytes).into_iter().map(|(n, _)| n).collect();

        assert!(names.iter().any(|n| n == "Dockerfile"));
        assert!(names.iter().any(|n| n == "src/app.py"));
        // The walk must not include the root directory itself.
        assert!(!names.iter().any(|n| n == "." || n.is_empty()));
    }

    #[test]
    fn test_directory_archive_missing_dir_fails() {
        let dir = tempdir().unwrap();
        let gone = dir.path().join("nope");
        assert!(directory_archive(&gone).is_err());
    }
}
