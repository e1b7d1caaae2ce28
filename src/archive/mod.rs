//! Deterministic archive assembly and verification
//!
//! The assembler is a pure function of the revision timestamp and the
//! artifact contents. Entry order, timestamps, ownership, permissions,
//! and compression metadata are all pinned, so the same inputs produce
//! the same bytes on any host at any wall-clock time.

pub mod assemble;
pub mod verify;

pub use assemble::{assemble, sha256_hex, DEFAULT_ARCHIVE_NAME};
pub use verify::{against_hash, compare, VerifyReport};
