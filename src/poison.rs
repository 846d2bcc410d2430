//! Diagnostics hooks for memory that is not currently handed out.
//!
//! The arena reports four kinds of events through a [`Poison`] implementation
//! chosen at compile time:
//!
//! - block creation: the usable part of the new block is poisoned,
//! - allocation: the returned bytes are unpoisoned,
//! - reset: the reclaimed part of the surviving block is poisoned,
//! - checkpoint rollback and in-place shrink: the rewound span is poisoned.
//!
//! [`NoPoison`] compiles to nothing. [`Scribble`] overwrites reclaimed memory
//! with [`SCRIBBLE_BYTE`] so stale reads show up as garbage instead of old
//! data. With the `asan` feature, [`AsanPoison`] forwards to the
//! AddressSanitizer runtime so stale accesses crash immediately.

/// Receives poison/unpoison events from an arena.
///
/// Hooks that store into the block (`WRITES`) are skipped on blocks that
/// aren't mapped writable. Hooks that only track state elsewhere always run.
pub trait Poison {
  /// Whether the hooks store into the block itself.
  const WRITES: bool;

  /// `len` bytes at `ptr` are no longer (or not yet) handed out.
  ///
  /// # Safety
  ///
  /// `ptr..ptr + len` lies inside a live block of the calling arena, mapped
  /// writable if `WRITES` is set.
  unsafe fn poison(
    ptr: *mut u8,
    len: usize,
  );

  /// `len` bytes at `ptr` were just handed out.
  ///
  /// # Safety
  ///
  /// Same as [`Poison::poison`].
  unsafe fn unpoison(
    ptr: *mut u8,
    len: usize,
  );

  /// The usable part of a freshly mapped block. Defaults to [`Poison::poison`].
  ///
  /// # Safety
  ///
  /// Same as [`Poison::poison`].
  unsafe fn poison_new(
    ptr: *mut u8,
    len: usize,
  ) {
    unsafe { Self::poison(ptr, len) }
  }
}

/// No diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPoison;

impl Poison for NoPoison {
  const WRITES: bool = false;

  #[inline(always)]
  unsafe fn poison(
    _ptr: *mut u8,
    _len: usize,
  ) {
  }

  #[inline(always)]
  unsafe fn unpoison(
    _ptr: *mut u8,
    _len: usize,
  ) {
  }
}

/// Fill pattern written by [`Scribble`] into reclaimed memory.
pub const SCRIBBLE_BYTE: u8 = 0xA5;

/// Overwrites reclaimed memory with [`SCRIBBLE_BYTE`].
///
/// Fresh blocks are not touched: the OS already hands them out zeroed and
/// filling them would commit every page up front.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scribble;

impl Poison for Scribble {
  const WRITES: bool = true;

  unsafe fn poison(
    ptr: *mut u8,
    len: usize,
  ) {
    unsafe { ptr.write_bytes(SCRIBBLE_BYTE, len) };
  }

  #[inline(always)]
  unsafe fn unpoison(
    _ptr: *mut u8,
    _len: usize,
  ) {
  }

  #[inline(always)]
  unsafe fn poison_new(
    _ptr: *mut u8,
    _len: usize,
  ) {
  }
}

#[cfg(feature = "asan")]
unsafe extern "C" {
  fn __asan_poison_memory_region(
    addr: *const libc::c_void,
    size: usize,
  );
  fn __asan_unpoison_memory_region(
    addr: *const libc::c_void,
    size: usize,
  );
}

/// Marks regions (un)addressable in the AddressSanitizer shadow memory.
#[cfg(feature = "asan")]
#[derive(Debug, Clone, Copy, Default)]
pub struct AsanPoison;

#[cfg(feature = "asan")]
impl Poison for AsanPoison {
  const WRITES: bool = false;

  unsafe fn poison(
    ptr: *mut u8,
    len: usize,
  ) {
    unsafe { __asan_poison_memory_region(ptr as *const libc::c_void, len) };
  }

  unsafe fn unpoison(
    ptr: *mut u8,
    len: usize,
  ) {
    unsafe { __asan_unpoison_memory_region(ptr as *const libc::c_void, len) };
  }
}
