use crate::os::Protection;

/// Minimum usable capacity of a freshly mapped block.
pub const DEFAULT_BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Alignment used by [`Arena::alloc`](crate::Arena::alloc).
pub const DEFAULT_ALIGNMENT: usize = 2 * core::mem::size_of::<usize>();

/// What the arena does once its current block is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Growth {
  /// Map another block and link it ahead of the current one.
  Chained,
  /// Never grow. A single block is mapped up front and overflowing requests fail.
  Fixed,
}

impl Default for Growth {
  fn default() -> Self {
    if cfg!(feature = "fixed-capacity") {
      Growth::Fixed
    } else {
      Growth::Chained
    }
  }
}

/// Construction parameters for an [`Arena`](crate::Arena).
///
/// ```rust
/// use memarena::{ArenaConfig, Growth, Protection};
///
/// let config = ArenaConfig::new()
///   .block_size(64 * 1024)
///   .protection(Protection::READ_WRITE)
///   .growth(Growth::Fixed);
///
/// assert_eq!(config.block_size, 64 * 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
  /// Usable bytes a new block is sized for at minimum (before page rounding).
  pub block_size: usize,
  pub protection: Protection,
  pub growth: Growth,
}

impl ArenaConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn block_size(
    mut self,
    block_size: usize,
  ) -> Self {
    self.block_size = block_size;
    self
  }

  pub fn protection(
    mut self,
    protection: Protection,
  ) -> Self {
    self.protection = protection;
    self
  }

  pub fn growth(
    mut self,
    growth: Growth,
  ) -> Self {
    self.growth = growth;
    self
  }

  pub fn is_fixed(&self) -> bool {
    self.growth == Growth::Fixed
  }
}

impl Default for ArenaConfig {
  fn default() -> Self {
    Self {
      block_size: DEFAULT_BLOCK_SIZE,
      protection: Protection::default(),
      growth: Growth::default(),
    }
  }
}
