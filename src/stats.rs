use std::fmt;

use crate::{arena::Arena, os, poison::Poison};

const KIB: usize = 1024;
const MIB: usize = 1024 * 1024;

/// Read-only snapshot of an arena's block chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArenaStats {
  pub page_size: usize,
  pub blocks: usize,
  /// Mapped bytes across all blocks, headers included.
  pub capacity: usize,
  /// Sum of block cursors, headers included.
  pub used: usize,
  /// Free tail of the current block.
  pub remaining: usize,
}

impl<P: Poison> Arena<P> {
  pub fn stats(&self) -> ArenaStats {
    let mut stats = ArenaStats {
      page_size: os::page_size(),
      remaining: self.remaining(),
      ..ArenaStats::default()
    };

    for block in &self.blocks {
      stats.blocks += 1;
      stats.capacity += block.size();
      stats.used += block.cursor();
    }

    stats
  }

  /// Prints [`stats`](Arena::stats) to stdout.
  pub fn print_stats(&self) {
    println!("{}", self.stats());
  }
}

impl fmt::Display for ArenaStats {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    writeln!(f, "Arena Stats:")?;
    writeln!(f, "  OS Page size: {}KiB", self.page_size / KIB)?;
    writeln!(f, "  Blocks:   {}", self.blocks)?;
    writeln!(f, "  Capacity: {} MB ({} KiB)", self.capacity / MIB, self.capacity / KIB)?;
    write!(
      f,
      "  Used:     {} MB ({} KiB) [{} bytes]",
      self.used / MIB,
      self.used / KIB,
      self.used
    )
  }
}
