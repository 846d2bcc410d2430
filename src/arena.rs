use std::{alloc::Layout, marker::PhantomData, mem, ptr, ptr::NonNull};

use log::{debug, trace, warn};

use crate::{
  align::is_power_of_two,
  block::{BLOCK_HEADER_SIZE, Block, BlockId},
  config::{ArenaConfig, DEFAULT_ALIGNMENT},
  error::{ArenaError, Result},
  os::Protection,
  poison::{NoPoison, Poison},
};

/// A growable chain of page-backed blocks with a bump cursor.
///
/// Pointers handed out stay valid until the next [`reset`](Arena::reset),
/// [`free`](Arena::free) or checkpoint rollback that covers them. Nothing is
/// ever freed individually.
///
/// The `P` parameter selects the diagnostics hook run when memory is handed
/// out or reclaimed (see [`crate::poison`]).
pub struct Arena<P: Poison = NoPoison> {
  /// Oldest first; the last entry is the current block.
  pub(crate) blocks: Vec<Block>,
  pub(crate) config: ArenaConfig,
  _poison: PhantomData<fn() -> P>,
}

// Blocks are owned exclusively by the arena; moving it moves all of them.
unsafe impl<P: Poison> Send for Arena<P> {}

impl Arena {
  /// Creates an arena whose blocks use `protection`.
  ///
  /// With the default growable configuration no memory is mapped until the
  /// first allocation. Under the `fixed-capacity` feature the single block is
  /// mapped here, which is why this can fail.
  pub fn new(protection: Protection) -> Result<Self> {
    Self::with_config(ArenaConfig::default().protection(protection))
  }

  pub fn with_config(config: ArenaConfig) -> Result<Self> {
    Self::configured(config)
  }
}

impl<P: Poison> Arena<P> {
  /// Creates an arena with an explicit diagnostics hook.
  ///
  /// ```rust
  /// use memarena::{Arena, ArenaConfig, Scribble};
  ///
  /// let mut arena = Arena::<Scribble>::configured(ArenaConfig::default()).unwrap();
  /// assert!(arena.alloc(16).is_ok());
  /// ```
  pub fn configured(config: ArenaConfig) -> Result<Self> {
    let mut arena = Self {
      blocks: Vec::new(),
      config,
      _poison: PhantomData,
    };

    if config.is_fixed() {
      arena.push_block(config.block_size)?;
    }

    Ok(arena)
  }

  /// Allocates `size` bytes aligned to the default alignment.
  pub fn alloc(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    self.alloc_aligned(size, DEFAULT_ALIGNMENT)
  }

  /// Allocates `size` bytes whose address is a multiple of `alignment`.
  ///
  /// Padding skipped to reach the alignment stays unused until the next
  /// reset or rewind. When the current block can't fit the request a new block
  /// is mapped and becomes current; the old block's tail is abandoned.
  ///
  /// # Errors
  ///
  /// Invalid requests are rejected before anything changes. If the OS refuses
  /// a mapping, or a fixed-capacity arena is full, the arena is left as it was.
  pub fn alloc_aligned(
    &mut self,
    size: usize,
    alignment: usize,
  ) -> Result<NonNull<u8>> {
    if size == 0 {
      return Err(ArenaError::InvalidSize);
    }

    if !is_power_of_two(alignment) {
      return Err(ArenaError::InvalidAlignment { alignment });
    }

    let created = self.blocks.is_empty();
    if created {
      let capacity = if self.config.is_fixed() {
        self.config.block_size
      } else {
        size.max(self.config.block_size)
      };
      self.push_block(capacity)?;
    }

    let start = match self.fit_or_grow(size, alignment) {
      Ok(start) => start,
      Err(err) => {
        if created {
          self.blocks.clear();
        }
        return Err(err);
      },
    };

    let block = self.current_mut();
    let ptr = block.at(start);
    block.set_cursor(start + size);
    block.notify::<P>(start, size, P::unpoison);

    trace!("alloc {size} bytes (align {alignment}) at {ptr:?} in block {}", block.id());

    Ok(unsafe { NonNull::new_unchecked(ptr) })
  }

  /// Allocates `size` bytes and fills them with zero.
  pub fn alloc_zeroed(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    self.ensure_writable()?;

    let ptr = self.alloc(size)?;
    unsafe { ptr.as_ptr().write_bytes(0, size) };

    Ok(ptr)
  }

  /// Allocates room for `layout`.
  pub fn alloc_layout(
    &mut self,
    layout: Layout,
  ) -> Result<NonNull<u8>> {
    self.alloc_aligned(layout.size(), layout.align())
  }

  /// Moves `value` into the arena.
  ///
  /// The arena never runs destructors, so `value` is leaked at reset/free.
  pub fn alloc_value<T>(
    &mut self,
    value: T,
  ) -> Result<NonNull<T>> {
    let ptr = if mem::size_of::<T>() == 0 {
      NonNull::dangling()
    } else {
      self.ensure_writable()?;
      self.alloc_layout(Layout::new::<T>())?.cast::<T>()
    };

    unsafe { ptr.as_ptr().write(value) };

    Ok(ptr)
  }

  /// Copies `src` into the arena.
  pub fn alloc_slice_copy<T: Copy>(
    &mut self,
    src: &[T],
  ) -> Result<NonNull<[T]>> {
    if src.is_empty() || mem::size_of::<T>() == 0 {
      return Ok(NonNull::slice_from_raw_parts(NonNull::dangling(), src.len()));
    }

    self.ensure_writable()?;

    let layout = Layout::for_value(src);
    let ptr = self.alloc_layout(layout)?.cast::<T>();
    unsafe { ptr::copy_nonoverlapping(src.as_ptr(), ptr.as_ptr(), src.len()) };

    Ok(NonNull::slice_from_raw_parts(ptr, src.len()))
  }

  /// Resizes an allocation, in place when it is the most recent one.
  ///
  /// Unlike [`grow_aligned`](Arena::grow_aligned) the in-place path accepts
  /// any address, so byte-aligned allocations grow in place too. Only a moved
  /// copy gets the default alignment.
  ///
  /// # Safety
  ///
  /// Same as [`grow_aligned`](Arena::grow_aligned).
  pub unsafe fn grow(
    &mut self,
    ptr: NonNull<u8>,
    old_size: usize,
    new_size: usize,
  ) -> Result<NonNull<u8>> {
    unsafe { self.resize(ptr, old_size, new_size, DEFAULT_ALIGNMENT, false) }
  }

  /// Resizes the allocation at `ptr` from `old_size` to `new_size` bytes.
  ///
  /// If `ptr + old_size` is the current block's cursor and the block has room,
  /// the cursor just moves (backwards too, when shrinking) and `ptr` comes back
  /// unchanged. Otherwise a fresh `new_size` allocation is made and the first
  /// `min(old_size, new_size)` bytes are copied over; the old region stays
  /// allocated until the next reset/free.
  ///
  /// # Safety
  ///
  /// `ptr` must come from this arena, cover at least `old_size` readable bytes,
  /// and not have been invalidated by a reset, free or rollback.
  pub unsafe fn grow_aligned(
    &mut self,
    ptr: NonNull<u8>,
    old_size: usize,
    new_size: usize,
    alignment: usize,
  ) -> Result<NonNull<u8>> {
    unsafe { self.resize(ptr, old_size, new_size, alignment, true) }
  }

  /// Shared body of `grow`/`grow_aligned`. `strict` requires `ptr` itself to
  /// be `alignment`-aligned before it may be extended in place.
  unsafe fn resize(
    &mut self,
    ptr: NonNull<u8>,
    old_size: usize,
    new_size: usize,
    alignment: usize,
    strict: bool,
  ) -> Result<NonNull<u8>> {
    if new_size == 0 {
      return Err(ArenaError::InvalidSize);
    }

    if !is_power_of_two(alignment) {
      return Err(ArenaError::InvalidAlignment { alignment });
    }

    if old_size == 0 {
      return self.alloc_aligned(new_size, alignment);
    }

    let addr = ptr.as_ptr() as usize;

    if let Some(block) = self.blocks.last_mut() {
      let is_last = addr.checked_add(old_size) == Some(block.top()) && block.contains(ptr.as_ptr());

      if is_last && (!strict || addr % alignment == 0) {
        let offset = addr - block.base().as_ptr() as usize;

        if let Some(end) = offset.checked_add(new_size).filter(|&end| end <= block.size()) {
          let old_cursor = block.cursor();
          block.set_cursor(end);

          if end > old_cursor {
            block.notify::<P>(old_cursor, end - old_cursor, P::unpoison);
          } else {
            block.notify::<P>(end, old_cursor - end, P::poison);
          }

          trace!("grow {old_size} -> {new_size} bytes in place at {ptr:?}");
          return Ok(ptr);
        }
      }
    }

    self.ensure_writable()?;

    let moved = self.alloc_aligned(new_size, alignment)?;
    unsafe { ptr::copy_nonoverlapping(ptr.as_ptr(), moved.as_ptr(), old_size.min(new_size)) };

    trace!("grow {old_size} -> {new_size} bytes moved {ptr:?} -> {moved:?}");

    Ok(moved)
  }

  /// Releases every block but the oldest and rewinds that one to empty.
  ///
  /// The surviving block is kept mapped so the next round of allocations
  /// doesn't have to go back to the OS. Does nothing on an empty arena.
  pub fn reset(&mut self) {
    if self.blocks.is_empty() {
      return;
    }

    let released = self.blocks.len() - 1;
    self.blocks.truncate(1);

    let block = &mut self.blocks[0];
    let used = block.cursor() - BLOCK_HEADER_SIZE;
    block.set_cursor(BLOCK_HEADER_SIZE);
    block.notify::<P>(BLOCK_HEADER_SIZE, block.size() - BLOCK_HEADER_SIZE, P::poison);

    debug!(
      "reset: released {released} blocks, rewound block {} ({used} bytes)",
      block.id()
    );
  }

  /// Returns every block to the OS. The arena can be used again afterwards.
  pub fn free(&mut self) {
    if self.blocks.is_empty() {
      return;
    }

    debug!("free: releasing {} blocks ({} bytes)", self.blocks.len(), self.capacity());
    self.blocks.clear();
  }

  /// Applies `protection` to every block, newest first, and to blocks made later.
  ///
  /// # Errors
  ///
  /// The walk stops at the first block the OS refuses. Blocks already changed
  /// keep the new mode and the recorded mode stays the old one; the error's
  /// `updated` count tells how far the walk got.
  pub fn set_protection(
    &mut self,
    protection: Protection,
  ) -> Result<()> {
    let total = self.blocks.len();

    for (updated, block) in self.blocks.iter_mut().rev().enumerate() {
      if let Err(source) = block.protect(protection) {
        warn!(
          "set_protection({protection:?}) failed on block {} after {updated} of {total} blocks: {source}",
          block.id()
        );
        return Err(ArenaError::Protect { updated, total, source });
      }
    }

    debug!("protection {:?} -> {protection:?} on {total} blocks", self.config.protection);
    self.config.protection = protection;

    Ok(())
  }

  /// Sum of every block's cursor, headers included. Zero for an empty arena.
  pub fn total_used(&self) -> usize {
    self.blocks.iter().map(Block::cursor).sum()
  }

  /// Total mapped bytes.
  pub fn capacity(&self) -> usize {
    self.blocks.iter().map(Block::size).sum()
  }

  pub fn block_count(&self) -> usize {
    self.blocks.len()
  }

  /// Free tail of the current block.
  pub fn remaining(&self) -> usize {
    self.blocks.last().map_or(0, Block::remaining)
  }

  /// The block new allocations are carved from, if any.
  pub fn current_block(&self) -> Option<BlockId> {
    self.blocks.last().map(Block::id)
  }

  pub fn protection(&self) -> Protection {
    self.config.protection
  }

  pub fn config(&self) -> &ArenaConfig {
    &self.config
  }

  /// Whether `ptr` lies inside memory currently handed out by this arena.
  pub fn owns(
    &self,
    ptr: *const u8,
  ) -> bool {
    self.blocks.iter().any(|block| block.contains(ptr))
  }

  fn fit_or_grow(
    &mut self,
    size: usize,
    alignment: usize,
  ) -> Result<usize> {
    if let Some(start) = self.current().fit(size, alignment) {
      return Ok(start);
    }

    if self.config.is_fixed() {
      return Err(ArenaError::CapacityExceeded {
        requested: size,
        remaining: self.remaining(),
      });
    }

    let needed = size
      .checked_add(alignment)
      .ok_or(ArenaError::SizeOverflow { size, alignment })?;
    self.push_block(needed.max(self.config.block_size))?;

    self
      .current()
      .fit(size, alignment)
      .ok_or(ArenaError::SizeOverflow { size, alignment })
  }

  fn push_block(
    &mut self,
    capacity: usize,
  ) -> Result<()> {
    let block = Block::new(capacity, self.config.protection, self.blocks.last())
      .map_err(|source| ArenaError::Map { size: capacity, source })?;

    block.notify::<P>(BLOCK_HEADER_SIZE, block.size() - BLOCK_HEADER_SIZE, P::poison_new);

    debug!(
      "mapped block {} of {} bytes at {:?} (blocks: {})",
      block.id(),
      block.size(),
      block.base(),
      self.blocks.len() + 1
    );

    self.blocks.push(block);
    Ok(())
  }

  /// Write paths check both the block they may land in and the mode new
  /// blocks get; a failed `set_protection` can leave the two apart.
  pub(crate) fn ensure_writable(&self) -> Result<()> {
    let current = self.blocks.last().is_none_or(|block| block.protection().is_writable());

    if current && self.config.protection.is_writable() {
      Ok(())
    } else {
      Err(ArenaError::ReadOnly)
    }
  }

  fn current(&self) -> &Block {
    &self.blocks[self.blocks.len() - 1]
  }

  fn current_mut(&mut self) -> &mut Block {
    let last = self.blocks.len() - 1;
    &mut self.blocks[last]
  }
}

impl<P: Poison> Drop for Arena<P> {
  fn drop(&mut self) {
    self.free();
  }
}

impl<P: Poison> std::fmt::Debug for Arena<P> {
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>,
  ) -> std::fmt::Result {
    f.debug_struct("Arena")
      .field("config", &self.config)
      .field("blocks", &self.blocks)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    config::Growth,
    os::page_size,
    poison::{SCRIBBLE_BYTE, Scribble},
  };

  const KIB: usize = 1024;

  fn small_arena() -> Arena {
    Arena::with_config(ArenaConfig::new().block_size(16 * KIB).growth(Growth::Chained)).unwrap()
  }

  #[test]
  fn test_lazy_first_block() {
    let mut arena = small_arena();

    assert_eq!(arena.block_count(), 0);
    assert_eq!(arena.total_used(), 0);
    assert_eq!(arena.current_block(), None);

    arena.alloc(40).unwrap();

    assert_eq!(arena.block_count(), 1);
    assert_eq!(arena.capacity() % page_size(), 0);
    assert!(arena.capacity() >= 16 * KIB);
    assert_eq!(arena.total_used(), BLOCK_HEADER_SIZE + 40);
  }

  #[test]
  fn test_invalid_requests_have_no_side_effects() {
    let mut arena = small_arena();

    assert!(matches!(arena.alloc(0), Err(ArenaError::InvalidSize)));
    assert!(matches!(
      arena.alloc_aligned(8, 3),
      Err(ArenaError::InvalidAlignment { alignment: 3 })
    ));
    assert!(matches!(
      arena.alloc_aligned(8, 0),
      Err(ArenaError::InvalidAlignment { alignment: 0 })
    ));

    assert_eq!(arena.block_count(), 0);
  }

  #[test]
  fn test_alignment_padding() {
    let mut arena = small_arena();

    let a = arena.alloc_aligned(1, 1).unwrap();
    let b = arena.alloc_aligned(8, 64).unwrap();

    assert_eq!(b.as_ptr() as usize % 64, 0);
    assert!(b.as_ptr() as usize > a.as_ptr() as usize);

    let used = arena.total_used();
    let c = arena.alloc_aligned(1, 1).unwrap();
    assert_eq!(c.as_ptr() as usize, b.as_ptr() as usize + 8);
    assert_eq!(arena.total_used(), used + 1);
  }

  #[test]
  fn test_growth_links_new_block() {
    let mut arena = small_arena();

    arena.alloc(KIB).unwrap();
    let first = arena.current_block().unwrap();

    arena.alloc(KIB).unwrap();
    assert_eq!(arena.current_block(), Some(first));

    let big = 64 * KIB;
    let ptr = arena.alloc(big).unwrap();
    let second = arena.current_block().unwrap();

    assert_ne!(first, second);
    assert_eq!(arena.block_count(), 2);
    assert!(arena.owns(ptr.as_ptr()));

    unsafe { ptr.as_ptr().add(big - 1).write(0xFF) };
  }

  #[test]
  fn test_abandoned_tail_is_not_reused() {
    let mut arena = small_arena();

    arena.alloc(KIB).unwrap();
    let old_remaining = arena.remaining();
    arena.alloc(old_remaining + 1).unwrap();
    let grown = arena.current_block();

    // Fits the old tail but the old block is no longer current.
    arena.alloc(16).unwrap();
    assert_eq!(arena.current_block(), grown);
  }

  #[test]
  fn test_alloc_zeroed_after_reset() {
    let mut arena = small_arena();

    let ptr = arena.alloc(128).unwrap();
    unsafe { ptr.as_ptr().write_bytes(0xEE, 128) };

    arena.reset();

    let zeroed = arena.alloc_zeroed(128).unwrap();
    assert_eq!(zeroed, ptr);

    let bytes = unsafe { std::slice::from_raw_parts(zeroed.as_ptr(), 128) };
    assert!(bytes.iter().all(|&b| b == 0));
  }

  #[test]
  fn test_alloc_value_and_slice() {
    let mut arena = small_arena();

    let value = arena.alloc_value(0x1122_3344_5566_7788u64).unwrap();
    assert_eq!(value.as_ptr() as usize % mem::align_of::<u64>(), 0);
    assert_eq!(unsafe { *value.as_ptr() }, 0x1122_3344_5566_7788);

    let slice = arena.alloc_slice_copy(&[1u16, 2, 3, 4]).unwrap();
    assert_eq!(unsafe { slice.as_ref() }, &[1, 2, 3, 4]);

    let empty = arena.alloc_slice_copy::<u32>(&[]).unwrap();
    assert_eq!(unsafe { empty.as_ref() }.len(), 0);

    let unit = arena.alloc_value(()).unwrap();
    assert_eq!(unit, NonNull::dangling());
  }

  #[test]
  fn test_reset_keeps_oldest_block() {
    let mut arena = small_arena();

    arena.alloc(KIB).unwrap();
    let oldest = arena.current_block();
    arena.alloc(64 * KIB).unwrap();
    arena.alloc(64 * KIB).unwrap();
    assert_eq!(arena.block_count(), 3);

    arena.reset();

    assert_eq!(arena.block_count(), 1);
    assert_eq!(arena.current_block(), oldest);
    assert_eq!(arena.total_used(), BLOCK_HEADER_SIZE);

    // Empty arena reset is a no-op.
    let mut empty = small_arena();
    empty.reset();
    assert_eq!(empty.block_count(), 0);
  }

  #[test]
  fn test_free_and_reuse() {
    let mut arena = small_arena();

    arena.alloc(64 * KIB).unwrap();
    arena.alloc(64 * KIB).unwrap();
    arena.free();

    assert_eq!(arena.block_count(), 0);
    assert_eq!(arena.total_used(), 0);
    assert_eq!(arena.current_block(), None);

    arena.free();

    arena.alloc(40).unwrap();
    assert_eq!(arena.block_count(), 1);
    assert_eq!(arena.total_used(), BLOCK_HEADER_SIZE + 40);
  }

  #[test]
  fn test_fixed_capacity() {
    let mut arena = Arena::with_config(ArenaConfig::new().block_size(16 * KIB).growth(Growth::Fixed)).unwrap();

    assert_eq!(arena.block_count(), 1);
    let block = arena.current_block();

    arena.alloc(KIB).unwrap();
    assert_eq!(arena.current_block(), block);

    let remaining = arena.remaining();
    let err = arena.alloc(remaining + 1).unwrap_err();
    assert!(matches!(
      err,
      ArenaError::CapacityExceeded { requested, remaining: r } if requested == remaining + 1 && r == remaining
    ));
    assert_eq!(arena.block_count(), 1);
    assert_eq!(arena.remaining(), remaining);

    arena.free();
    arena.alloc(KIB).unwrap();
    assert_eq!(arena.block_count(), 1);
    assert!(arena.alloc(32 * KIB).is_err());
  }

  #[test]
  fn test_fixed_capacity_first_request_too_large() {
    let mut arena = Arena::with_config(ArenaConfig::new().block_size(4 * KIB).growth(Growth::Fixed)).unwrap();
    arena.free();

    assert!(matches!(arena.alloc(1 << 20), Err(ArenaError::CapacityExceeded { .. })));
    assert_eq!(arena.block_count(), 0);
  }

  #[test]
  fn test_huge_request_overflow() {
    let mut arena = small_arena();
    arena.alloc(8).unwrap();

    assert!(arena.alloc_aligned(usize::MAX - 8, 16).is_err());
    assert_eq!(arena.block_count(), 1);
  }

  #[test]
  fn test_grow_in_place() {
    let mut arena = small_arena();

    let ptr = arena.alloc(128).unwrap();
    unsafe { ptr.as_ptr().write_bytes(0xAA, 128) };

    let grown = unsafe { arena.grow(ptr, 128, 256) }.unwrap();
    assert_eq!(grown, ptr);
    assert_eq!(arena.total_used(), BLOCK_HEADER_SIZE + 256);

    let shrunk = unsafe { arena.grow(grown, 256, 64) }.unwrap();
    assert_eq!(shrunk, ptr);
    assert_eq!(arena.total_used(), BLOCK_HEADER_SIZE + 64);

    let next = arena.alloc(8).unwrap();
    assert_eq!(next.as_ptr() as usize, ptr.as_ptr() as usize + 64);
  }

  #[test]
  fn test_grow_fallback_copies() {
    let mut arena = small_arena();

    let ptr = arena.alloc(256).unwrap();
    unsafe { ptr.as_ptr().write_bytes(0xAA, 256) };
    arena.alloc(64).unwrap();

    let moved = unsafe { arena.grow(ptr, 256, 512) }.unwrap();
    assert_ne!(moved, ptr);

    let bytes = unsafe { std::slice::from_raw_parts(moved.as_ptr(), 256) };
    assert!(bytes.iter().all(|&b| b == 0xAA));
  }

  #[test]
  fn test_grow_past_block_end_moves() {
    let mut arena = small_arena();

    let ptr = arena.alloc(64).unwrap();
    unsafe { ptr.as_ptr().write(7) };
    let block = arena.current_block();

    let moved = unsafe { arena.grow(ptr, 64, 64 * KIB) }.unwrap();
    assert_ne!(moved, ptr);
    assert_ne!(arena.current_block(), block);
    assert_eq!(unsafe { *moved.as_ptr() }, 7);
  }

  #[test]
  fn test_grow_rejects_bad_arguments() {
    let mut arena = small_arena();
    let ptr = arena.alloc(8).unwrap();

    unsafe {
      assert!(matches!(arena.grow(ptr, 8, 0), Err(ArenaError::InvalidSize)));
      assert!(matches!(
        arena.grow_aligned(ptr, 8, 16, 12),
        Err(ArenaError::InvalidAlignment { alignment: 12 })
      ));
    }
  }

  #[test]
  fn test_grow_byte_aligned_last_allocation_in_place() {
    let mut arena = small_arena();

    arena.alloc_aligned(3, 1).unwrap();
    let ptr = arena.alloc_aligned(5, 1).unwrap();
    assert_ne!(ptr.as_ptr() as usize % DEFAULT_ALIGNMENT, 0);
    unsafe { ptr.as_ptr().write_bytes(0x5A, 5) };

    let used = arena.total_used();
    let grown = unsafe { arena.grow(ptr, 5, 10) }.unwrap();

    assert_eq!(grown, ptr);
    assert_eq!(arena.total_used(), used + 5);

    let bytes = unsafe { std::slice::from_raw_parts(grown.as_ptr(), 5) };
    assert!(bytes.iter().all(|&b| b == 0x5A));
  }

  #[test]
  fn test_grow_formatted_text_in_place() {
    let mut arena = small_arena();

    let text = arena.alloc_fmt(format_args!("abc")).unwrap();
    let ptr = text.cast::<u8>();

    let grown = unsafe { arena.grow(ptr, 4, 32) }.unwrap();
    assert_eq!(grown, ptr);
    assert_eq!(arena.total_used(), BLOCK_HEADER_SIZE + 32);
  }

  #[test]
  fn test_grow_aligned_moves_misaligned_allocation() {
    let mut arena = small_arena();

    arena.alloc_aligned(1, 1).unwrap();
    let ptr = arena.alloc_aligned(8, 1).unwrap();

    let moved = unsafe { arena.grow_aligned(ptr, 8, 16, 64) }.unwrap();
    assert_ne!(moved, ptr);
    assert_eq!(moved.as_ptr() as usize % 64, 0);
  }

  #[test]
  fn test_set_protection_applies_to_all_blocks() {
    let mut arena = small_arena();

    arena.alloc(KIB).unwrap();
    arena.alloc(64 * KIB).unwrap();

    arena.set_protection(Protection::READ).unwrap();
    assert_eq!(arena.protection(), Protection::READ);
    assert!(arena.blocks.iter().all(|block| block.protection() == Protection::READ));

    assert!(matches!(arena.alloc_zeroed(8), Err(ArenaError::ReadOnly)));

    arena.set_protection(Protection::READ_WRITE).unwrap();
    let ptr = arena.alloc_zeroed(8).unwrap();
    unsafe { ptr.as_ptr().write(1) };
  }

  #[test]
  fn test_set_protection_partial_failure() {
    let mut arena = small_arena();

    let first = arena.alloc(KIB).unwrap();
    arena.alloc(64 * KIB).unwrap();
    assert_eq!(arena.block_count(), 2);

    // Pull the oldest mapping out from under the arena so mprotect fails on it.
    let base = arena.blocks[0].base().as_ptr().cast::<libc::c_void>();
    let len = arena.blocks[0].size();
    assert_eq!(unsafe { libc::munmap(base, len) }, 0);

    let err = arena.set_protection(Protection::READ).unwrap_err();
    assert!(matches!(err, ArenaError::Protect { updated: 1, total: 2, .. }));

    assert_eq!(arena.protection(), Protection::READ_WRITE);
    assert_eq!(arena.blocks[1].protection(), Protection::READ);
    assert_eq!(arena.blocks[0].protection(), Protection::READ_WRITE);

    let restored = unsafe {
      libc::mmap(
        base,
        len,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_FIXED,
        -1,
        0,
      )
    };
    assert_eq!(restored, base);

    // The current block is read-only although the recorded mode is not.
    assert!(matches!(arena.alloc_zeroed(8), Err(ArenaError::ReadOnly)));
    assert!(matches!(arena.alloc_value(1u8), Err(ArenaError::ReadOnly)));
    assert!(matches!(arena.alloc_slice_copy(&[1u32, 2]), Err(ArenaError::ReadOnly)));
    assert!(matches!(arena.alloc_fmt(format_args!("{}", 1)), Err(ArenaError::ReadOnly)));
    assert!(matches!(
      unsafe { arena.grow(first, KIB, 2 * KIB) },
      Err(ArenaError::ReadOnly)
    ));

    arena.set_protection(Protection::READ_WRITE).unwrap();
    let ptr = arena.alloc_zeroed(8).unwrap();
    unsafe { ptr.as_ptr().write(1) };
  }

  #[test]
  fn test_new_blocks_use_recorded_protection() {
    let mut arena = small_arena();

    arena.alloc(8).unwrap();
    arena.set_protection(Protection::READ).unwrap();
    arena.alloc(64 * KIB).unwrap();

    assert_eq!(arena.blocks[1].protection(), Protection::READ);
  }

  #[test]
  fn test_reset_scribbles_reclaimed_memory() {
    let mut arena = Arena::<Scribble>::configured(ArenaConfig::new().block_size(4 * KIB).growth(Growth::Chained)).unwrap();

    let ptr = arena.alloc(32).unwrap();
    unsafe { ptr.as_ptr().write_bytes(0x11, 32) };

    arena.reset();

    let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 32) };
    assert!(bytes.iter().all(|&b| b == SCRIBBLE_BYTE));
  }

  #[test]
  fn test_shrink_in_place_scribbles_tail() {
    let mut arena = Arena::<Scribble>::configured(ArenaConfig::new().block_size(4 * KIB).growth(Growth::Chained)).unwrap();

    let ptr = arena.alloc(64).unwrap();
    unsafe { ptr.as_ptr().write_bytes(0x11, 64) };

    let shrunk = unsafe { arena.grow(ptr, 64, 16) }.unwrap();
    assert_eq!(shrunk, ptr);

    let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 64) };
    assert!(bytes[..16].iter().all(|&b| b == 0x11));
    assert!(bytes[16..].iter().all(|&b| b == SCRIBBLE_BYTE));
  }

  #[test]
  fn test_arena_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<Arena>();
    assert_send::<Arena<Scribble>>();
  }
}
