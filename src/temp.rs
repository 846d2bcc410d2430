//! Temporary regions: remember a position, allocate scratch data, roll back.
//!
//! ```text
//!   begin_checkpoint()                        end_checkpoint(mark)
//!          │                                          │
//!          ▼                                          ▼
//!   ┌──────────┬─────────┐   ┌───────────┐     ┌──────────┬─────────┐
//!   │ block A  │ scratch │ → │  block B  │ ⇒   │ block A  │  free   │
//!   └──────────┴─────────┘   └───────────┘     └──────────┴─────────┘
//!              ▲                 (unmapped)               ▲
//!              mark                                       cursor
//! ```
//!
//! Checkpoints must be ended newest first and never outlive a reset/free of
//! their arena. [`Arena::temp`] enforces the nesting through borrows; raw
//! [`Checkpoint`] marks leave it to the caller and report violations as
//! [`ArenaError::StaleCheckpoint`] where they can be detected.

use std::ops::{Deref, DerefMut};

use log::{debug, warn};

use crate::{
  arena::Arena,
  block::BlockId,
  error::{ArenaError, Result},
  poison::Poison,
};

/// A saved arena position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
  /// `None` when the arena had no block yet.
  position: Option<(BlockId, usize)>,
  used: usize,
}

impl Checkpoint {
  /// Block that was current when the mark was taken.
  pub fn block(&self) -> Option<BlockId> {
    self.position.map(|(id, _)| id)
  }

  /// `total_used` of the arena at the time of the mark.
  pub fn used(&self) -> usize {
    self.used
  }
}

impl<P: Poison> Arena<P> {
  /// Remembers the current block and cursor.
  pub fn begin_checkpoint(&self) -> Checkpoint {
    Checkpoint {
      position: self.blocks.last().map(|block| (block.id(), block.cursor())),
      used: self.total_used(),
    }
  }

  /// Rolls the arena back to `mark`.
  ///
  /// Blocks created after the mark are unmapped, the marked block becomes
  /// current again and its cursor is rewound. A mark taken on an empty arena
  /// releases everything.
  ///
  /// # Errors
  ///
  /// [`ArenaError::StaleCheckpoint`] if the marked block is no longer in the
  /// chain (a reset or free discarded it) or the arena was already rewound
  /// past the mark. Nothing is changed in that case.
  pub fn end_checkpoint(
    &mut self,
    mark: Checkpoint,
  ) -> Result<()> {
    let Some((id, cursor)) = mark.position else {
      if !self.blocks.is_empty() {
        debug!("rollback to empty arena: releasing {} blocks", self.blocks.len());
        self.blocks.clear();
      }
      return Ok(());
    };

    let Some(index) = self.blocks.iter().rposition(|block| block.id() == id) else {
      warn!("checkpoint block {id} is not in the chain; ignoring rollback");
      return Err(ArenaError::StaleCheckpoint);
    };

    if cursor > self.blocks[index].cursor() {
      warn!(
        "checkpoint cursor {cursor} is ahead of block {id} cursor {}; ignoring rollback",
        self.blocks[index].cursor()
      );
      return Err(ArenaError::StaleCheckpoint);
    }

    let released = self.blocks.len() - index - 1;
    self.blocks.truncate(index + 1);

    let block = &mut self.blocks[index];
    let old_cursor = block.cursor();
    block.set_cursor(cursor);
    block.notify::<P>(cursor, old_cursor - cursor, P::poison);

    debug!(
      "rollback to block {id}: released {released} blocks, rewound {} bytes",
      old_cursor - cursor
    );

    Ok(())
  }

  /// Opens a temporary region that rolls back when the guard drops.
  ///
  /// ```rust
  /// use memarena::{Arena, Protection};
  ///
  /// let mut arena = Arena::new(Protection::READ_WRITE).unwrap();
  /// arena.alloc(64).unwrap();
  /// let used = arena.total_used();
  ///
  /// {
  ///   let mut scratch = arena.temp();
  ///   scratch.alloc(1 << 20).unwrap();
  /// }
  ///
  /// assert_eq!(arena.total_used(), used);
  /// ```
  pub fn temp(&mut self) -> TempArena<'_, P> {
    let mark = self.begin_checkpoint();
    TempArena { arena: self, mark }
  }
}

/// Scoped temporary region, see [`Arena::temp`].
pub struct TempArena<'a, P: Poison> {
  arena: &'a mut Arena<P>,
  mark: Checkpoint,
}

impl<P: Poison> TempArena<'_, P> {
  pub fn checkpoint(&self) -> Checkpoint {
    self.mark
  }
}

impl<P: Poison> Deref for TempArena<'_, P> {
  type Target = Arena<P>;

  fn deref(&self) -> &Self::Target {
    self.arena
  }
}

impl<P: Poison> DerefMut for TempArena<'_, P> {
  fn deref_mut(&mut self) -> &mut Self::Target {
    self.arena
  }
}

impl<P: Poison> Drop for TempArena<'_, P> {
  fn drop(&mut self) {
    if let Err(err) = self.arena.end_checkpoint(self.mark) {
      warn!("temporary region not rolled back: {err}");
    }
  }
}
