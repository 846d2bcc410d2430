//! Semantic version of the allocator engine.
//!
//! Callers that build against one release and load another (for example
//! through a `cdylib` boundary) compare [`VERSION`] as they compiled it with
//! [`version()`] as reported by the linked engine.

use std::fmt;

use crate::error::{ArenaError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
  pub major: u32,
  pub minor: u32,
  pub patch: u32,
}

/// Version of this build, taken from the crate manifest.
pub const VERSION: Version = Version {
  major: parse_component(env!("CARGO_PKG_VERSION_MAJOR")),
  minor: parse_component(env!("CARGO_PKG_VERSION_MINOR")),
  patch: parse_component(env!("CARGO_PKG_VERSION_PATCH")),
};

const fn parse_component(digits: &str) -> u32 {
  let bytes = digits.as_bytes();
  let mut value = 0u32;
  let mut i = 0;

  while i < bytes.len() {
    assert!(bytes[i].is_ascii_digit(), "version component is not numeric");
    value = value * 10 + (bytes[i] - b'0') as u32;
    i += 1;
  }

  value
}

/// Version of the engine that is actually running.
#[inline(never)]
pub fn version() -> Version {
  VERSION
}

impl Version {
  pub const fn new(
    major: u32,
    minor: u32,
    patch: u32,
  ) -> Self {
    Self { major, minor, patch }
  }

  /// Binary compatible: same major, and for `0.x` releases the same minor too.
  pub fn is_compatible_with(
    &self,
    other: &Version,
  ) -> bool {
    if self.major != other.major {
      return false;
    }

    self.major != 0 || self.minor == other.minor
  }

  /// Checks that the running engine is compatible with `expected`.
  ///
  /// ```rust
  /// use memarena::VERSION;
  ///
  /// assert!(memarena::version().check(&VERSION).is_ok());
  /// ```
  pub fn check(
    &self,
    expected: &Version,
  ) -> Result<()> {
    if self.is_compatible_with(expected) {
      return Ok(());
    }

    Err(ArenaError::VersionMismatch {
      expected: *expected,
      found: *self,
    })
  }
}

impl fmt::Display for Version {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
  }
}
