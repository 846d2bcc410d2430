/// Rounds `value` up to the machine word size.
///
/// # Examples
///
/// ```rust
/// use memarena::align;
///
/// match std::mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, ::core::mem::size_of::<usize>())
  };
}

/// Rounds `value` up to the next multiple of `alignment`, which must be a
/// power of two.
///
/// ```rust
/// use memarena::align_to;
///
/// assert_eq!(align_to!(4097, 4096), 8192);
/// assert_eq!(align_to!(64, 64), 64);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $alignment:expr) => {
    ($value + $alignment - 1) & !($alignment - 1)
  };
}

/// Returns `true` for 1, 2, 4, 8, ...
#[inline]
pub const fn is_power_of_two(value: usize) -> bool {
  value != 0 && value & (value - 1) == 0
}

/// Next address at or after `addr` that is a multiple of `alignment`.
///
/// Returns `None` when rounding would wrap the address space.
#[inline]
pub const fn align_forward(
  addr: usize,
  alignment: usize,
) -> Option<usize> {
  debug_assert!(is_power_of_two(alignment));

  let modulo = addr & (alignment - 1);
  if modulo == 0 {
    return Some(addr);
  }

  addr.checked_add(alignment - modulo)
}

/// Bytes of padding needed to move `addr` forward onto `alignment`.
#[inline]
pub const fn padding_for(
  addr: usize,
  alignment: usize,
) -> usize {
  (alignment - (addr & (alignment - 1))) & (alignment - 1)
}
