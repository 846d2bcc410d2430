//! Formatting straight into arena memory.

use std::{
  fmt::{self, Write},
  ptr::NonNull,
  slice, str,
};

use crate::{
  arena::Arena,
  error::{ArenaError, Result},
  poison::Poison,
};

/// Formats into an arena, like `format!` but without a heap `String`.
///
/// Expands to [`Arena::alloc_fmt`] and returns a `Result<NonNull<str>>`.
///
/// ```rust
/// use memarena::{Arena, Protection, arena_format};
///
/// let mut arena = Arena::new(Protection::READ_WRITE).unwrap();
/// let text = arena_format!(arena, "{} + {} = {}", 2, 2, 4).unwrap();
///
/// assert_eq!(unsafe { text.as_ref() }, "2 + 2 = 4");
/// ```
#[macro_export]
macro_rules! arena_format {
  ($arena:expr, $($arg:tt)*) => {
    $arena.alloc_fmt(format_args!($($arg)*))
  };
}

/// Counts the bytes a formatting pass would produce.
#[derive(Default)]
struct Counter {
  len: usize,
}

impl Write for Counter {
  fn write_str(
    &mut self,
    s: &str,
  ) -> fmt::Result {
    self.len = self.len.checked_add(s.len()).ok_or(fmt::Error)?;
    Ok(())
  }
}

/// Writes into a fixed buffer, failing instead of overflowing it.
struct Cursor<'a> {
  buf: &'a mut [u8],
  pos: usize,
}

impl Write for Cursor<'_> {
  fn write_str(
    &mut self,
    s: &str,
  ) -> fmt::Result {
    let end = self.pos.checked_add(s.len()).ok_or(fmt::Error)?;
    let dst = self.buf.get_mut(self.pos..end).ok_or(fmt::Error)?;

    dst.copy_from_slice(s.as_bytes());
    self.pos = end;
    Ok(())
  }
}

impl<P: Poison> Arena<P> {
  /// Renders `args` into freshly allocated arena memory.
  ///
  /// A sizing pass computes the exact length, then `len + 1` bytes are
  /// allocated and rendered into. The extra byte holds a NUL terminator so the
  /// text can be passed to C as well; it is not part of the returned `str`.
  ///
  /// # Errors
  ///
  /// [`ArenaError::Format`] if a `Display` impl fails, or renders a different
  /// length on the second pass (the allocation is rolled back then), plus any
  /// allocation error.
  pub fn alloc_fmt(
    &mut self,
    args: fmt::Arguments<'_>,
  ) -> Result<NonNull<str>> {
    let mut counter = Counter::default();
    counter.write_fmt(args).map_err(|_| ArenaError::Format)?;

    let len = counter.len;
    let size = len.checked_add(1).ok_or(ArenaError::SizeOverflow { size: len, alignment: 1 })?;

    self.ensure_writable()?;

    let mark = self.begin_checkpoint();
    let ptr = self.alloc_aligned(size, 1)?;
    let buf = unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), size) };

    let mut cursor = Cursor {
      buf: &mut buf[..len],
      pos: 0,
    };
    if cursor.write_fmt(args).is_err() || cursor.pos != len {
      self.end_checkpoint(mark)?;
      return Err(ArenaError::Format);
    }

    buf[len] = 0;

    let text = str::from_utf8(&buf[..len]).map_err(|_| ArenaError::Format)?;

    Ok(NonNull::from(text))
  }
}
