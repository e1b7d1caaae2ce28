//! Byte-reproducible tar.gz assembly

use crate::error::{DocforgeError, DocforgeResult};
use crate::graph::stage::Artifact;
use crate::revision::{CommitTimestamp, Revision};
use flate2::{Compression, GzBuilder};
use sha2::{Digest, Sha256};
use std::io::Write;
use tracing::debug;

/// Default output file name. Deliberately free of timestamps and build
/// counters so the path itself is stable across runs.
pub const DEFAULT_ARCHIVE_NAME: &str = "docs.tar.gz";

/// SHA-256 of a byte slice as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Reject path shapes that would make extraction surprising or entry
/// identity ambiguous. Backslashes are normalized so the same logical
/// tree archives identically regardless of the producing platform.
fn normalize_entry_path(path: &str) -> DocforgeResult<String> {
    let normalized = path.replace('\\', "/");

    if normalized.is_empty() {
        return Err(DocforgeError::ArchivePathInvalid {
            path: path.to_string(),
            reason: "empty path".to_string(),
        });
    }
    if normalized.starts_with('/') {
        return Err(DocforgeError::ArchivePathInvalid {
            path: path.to_string(),
            reason: "absolute paths are not allowed".to_string(),
        });
    }
    if normalized.split('/').any(|part| part == "..") {
        return Err(DocforgeError::ArchivePathInvalid {
            path: path.to_string(),
            reason: "parent-directory components are not allowed".to_string(),
        });
    }
    if normalized.split('/').any(|part| part.is_empty() || part == ".") {
        return Err(DocforgeError::ArchivePathInvalid {
            path: path.to_string(),
            reason: "empty or '.' path components are not allowed".to_string(),
        });
    }

    Ok(normalized)
}

/// Package artifacts into one reproducible gzip-compressed tar.
///
/// Entries are sorted by normalized path, byte-wise, regardless of the
/// order the caller discovered them in. Every tar header carries the
/// revision's commit timestamp as mtime, uid/gid 0, and mode 0644; the
/// gzip header mtime is pinned to zero. A path collision after
/// normalization is an error rather than a silently last-writer-wins
/// archive.
pub fn assemble(
    revision: &Revision,
    timestamp: &CommitTimestamp,
    artifacts: &[Artifact],
) -> DocforgeResult<Vec<u8>> {
    let mut entries: Vec<(String, &Artifact)> = artifacts
        .iter()
        .map(|a| Ok((normalize_entry_path(&a.path)?, a)))
        .collect::<DocforgeResult<_>>()?;
    entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    for pair in entries.windows(2) {
        if pair[0].0 == pair[1].0 {
            return Err(DocforgeError::ArchivePathCollision {
                path: pair[0].0.clone(),
            });
        }
    }

    let mut builder = tar::Builder::new(Vec::new());
    for (path, artifact) in &entries {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_mtime(timestamp.epoch_secs().max(0) as u64);
        header.set_uid(0);
        header.set_gid(0);
        header.set_mode(0o644);
        header.set_size(artifact.bytes.len() as u64);
        builder
            .append_data(&mut header, path, artifact.bytes.as_slice())
            .map_err(|e| DocforgeError::io(format!("writing archive entry {path}"), e))?;
    }
    builder
        .finish()
        .map_err(|e| DocforgeError::io("finishing tar stream", e))?;
    let tar_bytes = builder
        .into_inner()
        .map_err(|e| DocforgeError::io("finalizing tar stream", e))?;

    // GzBuilder leaves mtime at zero and sets no name or comment, so the
    // gzip header contributes nothing host- or time-dependent.
    let mut encoder = GzBuilder::new().write(Vec::new(), Compression::default());
    encoder
        .write_all(&tar_bytes)
        .map_err(|e| DocforgeError::io("compressing archive", e))?;
    let bytes = encoder
        .finish()
        .map_err(|e| DocforgeError::io("finishing gzip stream", e))?;

    debug!(
        revision = %revision.short(),
        entries = entries.len(),
        size = bytes.len(),
        "archive assembled"
    );
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> CommitTimestamp {
        CommitTimestamp::from_epoch_secs(1_709_287_200)
    }

    fn rev() -> Revision {
        Revision::new("abc123")
    }

    fn sample() -> Vec<Artifact> {
        vec![
            Artifact::new("apidocs/index.html", b"<html>index</html>".to_vec()),
            Artifact::new("apidocs/overview.html", b"<html>overview</html>".to_vec()),
            Artifact::new("release-notes.txt", b"v2.0 notes\n".to_vec()),
        ]
    }

    #[test]
    fn repeated_assembly_is_byte_identical() {
        let artifacts = sample();
        let first = assemble(&rev(), &ts(), &artifacts).unwrap();
        let second = assemble(&rev(), &ts(), &artifacts).unwrap();
        assert_eq!(first, second);
        assert_eq!(sha256_hex(&first), sha256_hex(&second));
    }

    #[test]
    fn input_order_does_not_change_output() {
        let forward = sample();
        let mut reversed = sample();
        reversed.reverse();

        let a = assemble(&rev(), &ts(), &forward).unwrap();
        let b = assemble(&rev(), &ts(), &reversed).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn entries_carry_commit_time_and_fixed_ownership() {
        let bytes = assemble(&rev(), &ts(), &sample()).unwrap();

        let decoder = flate2::read::GzDecoder::new(bytes.as_slice());
        let mut archive = tar::Archive::new(decoder);
        let mut paths = vec![];
        for entry in archive.entries().unwrap() {
            let entry = entry.unwrap();
            let header = entry.header();
            assert_eq!(header.mtime().unwrap(), 1_709_287_200);
            assert_eq!(header.uid().unwrap(), 0);
            assert_eq!(header.gid().unwrap(), 0);
            assert_eq!(header.mode().unwrap(), 0o644);
            paths.push(entry.path().unwrap().to_string_lossy().into_owned());
        }

        // Sorted by path, not by input order.
        assert_eq!(
            paths,
            vec!["apidocs/index.html", "apidocs/overview.html", "release-notes.txt"]
        );
    }

    #[test]
    fn timestamp_changes_output() {
        let artifacts = sample();
        let a = assemble(&rev(), &ts(), &artifacts).unwrap();
        let b = assemble(
            &rev(),
            &CommitTimestamp::from_epoch_secs(1_709_287_201),
            &artifacts,
        )
        .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn path_collision_is_fatal() {
        let artifacts = vec![
            Artifact::new("notes.txt", b"a".to_vec()),
            Artifact::new("notes.txt", b"b".to_vec()),
        ];
        let err = assemble(&rev(), &ts(), &artifacts).unwrap_err();
        assert!(matches!(err, DocforgeError::ArchivePathCollision { .. }));
    }

    #[test]
    fn collision_after_normalization_is_detected() {
        let artifacts = vec![
            Artifact::new("apidocs/index.html", b"a".to_vec()),
            Artifact::new("apidocs\\index.html", b"b".to_vec()),
        ];
        let err = assemble(&rev(), &ts(), &artifacts).unwrap_err();
        assert!(matches!(err, DocforgeError::ArchivePathCollision { .. }));
    }

    #[test]
    fn hostile_paths_are_rejected() {
        for path in ["/etc/passwd", "../escape.txt", "a//b.txt", "", "./x.txt"] {
            let artifacts = vec![Artifact::new(path, b"x".to_vec())];
            let err = assemble(&rev(), &ts(), &artifacts).unwrap_err();
            assert!(
                matches!(err, DocforgeError::ArchivePathInvalid { .. }),
                "path {path:?} should be rejected"
            );
        }
    }

    #[test]
    fn empty_artifact_set_still_produces_an_archive() {
        let bytes = assemble(&rev(), &ts(), &[]).unwrap();
        let again = assemble(&rev(), &ts(), &[]).unwrap();
        assert_eq!(bytes, again);
        assert!(!bytes.is_empty());
    }
}
