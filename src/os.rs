//! Thin layer over the operating system's virtual memory calls.
//!
//! Everything the arena needs from the kernel lives here: the page size,
//! anonymous private mappings (`mmap(2)`/`munmap(2)`) and protection changes
//! (`mprotect(2)`).

use std::{io, ptr::NonNull, sync::OnceLock};

use bitflags::bitflags;
use libc::{c_int, c_void};

use crate::align_to;

/// Page size used when `sysconf` can't tell us.
const FALLBACK_PAGE_SIZE: usize = 4096;

static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

/// Returns the OS page size, queried once and cached for the process.
pub fn page_size() -> usize {
  *PAGE_SIZE.get_or_init(|| {
    let res = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if res > 0 { res as usize } else { FALLBACK_PAGE_SIZE }
  })
}

/// Rounds `size` up to a whole number of pages.
///
/// Returns `None` if the rounded size does not fit in `usize`.
pub fn round_to_page(size: usize) -> Option<usize> {
  let page = page_size();
  size.checked_add(page - 1)?;
  Some(align_to!(size, page))
}

bitflags! {
  /// Access protection applied to every block of an arena.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
  pub struct Protection: u32 {
    /// Pages may be read.
    const READ = 1 << 0;
    /// Pages may be written.
    const WRITE = 1 << 1;
    /// Pages may be executed.
    const EXEC = 1 << 2;
  }
}

impl Protection {
  /// No access at all. Any touch of the memory faults.
  pub const NONE: Protection = Protection::empty();

  /// The usual mode for heap-like memory.
  pub const READ_WRITE: Protection = Protection::READ.union(Protection::WRITE);

  pub fn is_writable(self) -> bool {
    self.contains(Protection::WRITE)
  }

  pub(crate) fn to_native(self) -> c_int {
    let mut prot = libc::PROT_NONE;
    if self.contains(Protection::READ) {
      prot |= libc::PROT_READ;
    }
    if self.contains(Protection::WRITE) {
      prot |= libc::PROT_WRITE;
    }
    if self.contains(Protection::EXEC) {
      prot |= libc::PROT_EXEC;
    }
    prot
  }
}

impl Default for Protection {
  fn default() -> Self {
    Protection::READ_WRITE
  }
}

/// An owned anonymous private mapping. Unmapped on drop.
#[derive(Debug)]
pub struct Mapping {
  base: NonNull<u8>,
  len: usize,
}

impl Mapping {
  /// Maps `len` bytes (a whole number of pages) with `protection`.
  pub fn new(
    len: usize,
    protection: Protection,
  ) -> io::Result<Self> {
    debug_assert!(len > 0 && len % page_size() == 0);

    let address = unsafe {
      libc::mmap(
        std::ptr::null_mut(),
        len,
        protection.to_native(),
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if address == libc::MAP_FAILED {
      return Err(io::Error::last_os_error());
    }

    match NonNull::new(address as *mut u8) {
      Some(base) => Ok(Self { base, len }),
      None => Err(io::Error::other("mmap returned a null mapping")),
    }
  }

  /// Changes the protection of the whole mapping.
  pub fn protect(
    &self,
    protection: Protection,
  ) -> io::Result<()> {
    let res = unsafe { libc::mprotect(self.base.as_ptr() as *mut c_void, self.len, protection.to_native()) };

    if res == -1 {
      return Err(io::Error::last_os_error());
    }

    Ok(())
  }

  #[inline]
  pub fn base(&self) -> NonNull<u8> {
    self.base
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.len
  }
}

impl Drop for Mapping {
  fn drop(&mut self) {
    let res = unsafe { libc::munmap(self.base.as_ptr() as *mut c_void, self.len) };

    if res == -1 {
      log::error!(
        "munmap({:?}, {}) failed: {}",
        self.base,
        self.len,
        io::Error::last_os_error()
      );
    }
  }
}
