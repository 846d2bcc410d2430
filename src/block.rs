use std::{
  fmt, io, mem,
  ptr::NonNull,
  sync::atomic::{AtomicU64, Ordering},
};

use crate::{
  align,
  os::{self, Mapping, Protection},
  poison::Poison,
};

/// Stamp written at the start of every block mapping.
const BLOCK_MAGIC: u64 = 0x4D45_4D41_5245_4E41; // "MEMARENA"

/// Self-describing header at the start of each mapping.
///
/// It lets a debugger or core dump identify arena blocks. The arena keeps its
/// bookkeeping out of band and never reads this back, so blocks stay
/// accountable even when their protection forbids access.
#[repr(C)]
pub struct BlockHeader {
  pub magic: u64,
  pub id: u64,
  pub size: usize,
  pub previous: *const u8,
}

/// Bytes at the start of every block that are never handed out.
pub const BLOCK_HEADER_SIZE: usize = align!(mem::size_of::<BlockHeader>());

/// Identity of a block.
///
/// Ids increase monotonically and are never reused, unlike addresses. They come
/// from one process-wide counter, so an id never names a block of another arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(u64);

static NEXT_BLOCK_ID: AtomicU64 = AtomicU64::new(1);

impl BlockId {
  pub(crate) fn next() -> Self {
    BlockId(NEXT_BLOCK_ID.fetch_add(1, Ordering::Relaxed))
  }
}

impl fmt::Display for BlockId {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// One OS mapping plus its bump cursor.
///
/// Invariant: `BLOCK_HEADER_SIZE <= cursor <= size`.
pub struct Block {
  mapping: Mapping,
  cursor: usize,
  id: BlockId,
  protection: Protection,
}

impl Block {
  /// Maps a block able to hold at least `capacity` bytes after its header.
  pub fn new(
    capacity: usize,
    protection: Protection,
    previous: Option<&Block>,
  ) -> io::Result<Self> {
    let id = BlockId::next();
    let total_size = capacity
      .checked_add(BLOCK_HEADER_SIZE)
      .and_then(os::round_to_page)
      .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOMEM))?;

    // The header is stamped through a writable view before the requested mode is applied.
    let mapping = Mapping::new(total_size, Protection::READ_WRITE)?;

    let header = BlockHeader {
      magic: BLOCK_MAGIC,
      id: id.0,
      size: total_size,
      previous: previous.map_or(std::ptr::null(), |block| block.base().as_ptr() as *const u8),
    };
    unsafe { (mapping.base().as_ptr() as *mut BlockHeader).write(header) };

    if protection != Protection::READ_WRITE {
      mapping.protect(protection)?;
    }

    Ok(Self {
      mapping,
      cursor: BLOCK_HEADER_SIZE,
      id,
      protection,
    })
  }

  #[inline]
  pub fn id(&self) -> BlockId {
    self.id
  }

  #[inline]
  pub fn protection(&self) -> Protection {
    self.protection
  }

  #[inline]
  pub fn base(&self) -> NonNull<u8> {
    self.mapping.base()
  }

  /// Total mapping length, header included.
  #[inline]
  pub fn size(&self) -> usize {
    self.mapping.len()
  }

  /// Offset of the first free byte from the block start.
  #[inline]
  pub fn cursor(&self) -> usize {
    self.cursor
  }

  #[inline]
  pub fn remaining(&self) -> usize {
    self.size() - self.cursor
  }

  /// Address of the first free byte.
  #[inline]
  pub fn top(&self) -> usize {
    self.base().as_ptr() as usize + self.cursor
  }

  /// Pointer to `offset` bytes into the block.
  #[inline]
  pub fn at(
    &self,
    offset: usize,
  ) -> *mut u8 {
    debug_assert!(offset <= self.size());
    unsafe { self.base().as_ptr().add(offset) }
  }

  /// Offset of the next `alignment`-aligned address at or after the cursor,
  /// if `size` bytes fit there.
  pub fn fit(
    &self,
    size: usize,
    alignment: usize,
  ) -> Option<usize> {
    let padding = crate::align::padding_for(self.top(), alignment);
    let start = self.cursor.checked_add(padding)?;
    let end = start.checked_add(size)?;

    (end <= self.size()).then_some(start)
  }

  /// Moves the cursor. Callers keep it within `BLOCK_HEADER_SIZE..=size`.
  #[inline]
  pub fn set_cursor(
    &mut self,
    cursor: usize,
  ) {
    debug_assert!((BLOCK_HEADER_SIZE..=self.size()).contains(&cursor));
    self.cursor = cursor;
  }

  /// Whether `ptr` points into this block's handed-out region.
  pub fn contains(
    &self,
    ptr: *const u8,
  ) -> bool {
    let addr = ptr as usize;
    let base = self.base().as_ptr() as usize;

    addr >= base + BLOCK_HEADER_SIZE && addr <= base + self.cursor
  }

  pub fn protect(
    &mut self,
    protection: Protection,
  ) -> io::Result<()> {
    self.mapping.protect(protection)?;
    self.protection = protection;
    Ok(())
  }

  /// Runs a hook of `P` over `offset..offset + len`.
  ///
  /// Hooks that write are skipped unless the block is mapped writable.
  pub fn notify<P: Poison>(
    &self,
    offset: usize,
    len: usize,
    hook: unsafe fn(*mut u8, usize),
  ) {
    if len == 0 || (P::WRITES && !self.protection.is_writable()) {
      return;
    }

    debug_assert!(offset + len <= self.size());
    unsafe { hook(self.at(offset), len) };
  }
}

impl fmt::Debug for Block {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Block")
      .field("id", &self.id)
      .field("base", &self.base())
      .field("size", &self.size())
      .field("cursor", &self.cursor)
      .field("protection", &self.protection)
      .finish()
  }
}
