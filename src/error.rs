use std::io;

use thiserror::Error;

use crate::version::Version;

/// Errors reported by arena operations.
#[derive(Debug, Error)]
pub enum ArenaError {
  #[error("Invalid size (must be > 0)")]
  InvalidSize,

  #[error("Invalid alignment (must be power of 2): {alignment}")]
  InvalidAlignment { alignment: usize },

  #[error("Request of {size} bytes aligned to {alignment} overflows the address space")]
  SizeOverflow { size: usize, alignment: usize },

  #[error("Failed to map a block of {size} bytes")]
  Map {
    size: usize,
    #[source]
    source: io::Error,
  },

  #[error("Fixed-capacity arena exhausted (requested: {requested} bytes, remaining: {remaining} bytes)")]
  CapacityExceeded { requested: usize, remaining: usize },

  #[error("Protection change failed after updating {updated} of {total} blocks")]
  Protect {
    updated: usize,
    total: usize,
    #[source]
    source: io::Error,
  },

  #[error("Arena memory is not writable under its current protection")]
  ReadOnly,

  #[error("Checkpoint no longer refers to a live position in this arena")]
  StaleCheckpoint,

  #[error("Formatting into the arena failed")]
  Format,

  #[error("Version mismatch (expected: {expected}, found: {found})")]
  VersionMismatch { expected: Version, found: Version },
}

pub type Result<T> = core::result::Result<T, ArenaError>;

#[cfg(test)]
mod tests {
  use std::error::Error as _;

  use super::*;

  #[test]
  fn test_messages() {
    assert_eq!(ArenaError::InvalidSize.to_string(), "Invalid size (must be > 0)");
    assert_eq!(
      ArenaError::InvalidAlignment { alignment: 3 }.to_string(),
      "Invalid alignment (must be power of 2): 3"
    );
    assert_eq!(
      ArenaError::CapacityExceeded {
        requested: 24576,
        remaining: 16000
      }
      .to_string(),
      "Fixed-capacity arena exhausted (requested: 24576 bytes, remaining: 16000 bytes)"
    );
  }

  #[test]
  fn test_os_errors_keep_their_source() {
    let err = ArenaError::Map {
      size: 4096,
      source: io::Error::from_raw_os_error(libc::ENOMEM),
    };

    let source = err.source().unwrap();
    assert!(source.to_string().contains("memory"));

    let err = ArenaError::Protect {
      updated: 1,
      total: 3,
      source: io::Error::from_raw_os_error(libc::EACCES),
    };
    assert_eq!(err.to_string(), "Protection change failed after updating 1 of 3 blocks");
    assert!(err.source().is_some());
  }
}
