//! # memarena - A Page-Backed Region Allocator
//!
//! This crate provides a **region** (arena) allocator that bump-allocates out
//! of memory blocks mapped straight from the operating system with `mmap(2)`.
//!
//! ## Overview
//!
//! Many small, individually freed allocations are replaced by O(1) bump
//! allocation and O(1) bulk release:
//!
//! ```text
//!   Arena Concept:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                        BLOCK (OS mapping)                            │
//!   │                                                                      │
//!   │   ┌────────┬─────┬───┬─────┬─────┬──────────────────────────────┐    │
//!   │   │ Header │ A1  │pad│ A2  │ A3  │          Free Space          │    │
//!   │   └────────┴─────┴───┴─────┴─────┴──────────────────────────────┘    │
//!   │                                  ▲                              ▲    │
//!   │                                  │                              │    │
//!   │                               cursor                      block end  │
//!   │                            (next alloc)                  (page size) │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Each allocation aligns the cursor, then "bumps" it forward.
//!   Nothing is freed on its own: reset, rewind or free release everything.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   memarena
//!   ├── align      - Alignment macros (align!, align_to!) and helpers
//!   ├── os         - Page size, mappings, Protection flags
//!   ├── block      - Block (one mapping + cursor), BlockHeader, BlockId
//!   ├── config     - ArenaConfig, Growth, DEFAULT_BLOCK_SIZE
//!   ├── poison     - Diagnostics hooks (NoPoison, Scribble, AsanPoison)
//!   ├── arena      - Arena: growth engine, reset, free, protection, grow
//!   ├── temp       - Checkpoints and scoped temporary regions
//!   ├── stats      - ArenaStats and print_stats
//!   ├── format     - alloc_fmt and arena_format!
//!   └── version    - Version and compatibility checks
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use memarena::{Arena, Protection};
//!
//! let mut arena = Arena::new(Protection::READ_WRITE).unwrap();
//!
//! // Allocate memory for ten i32s
//! let nums = arena.alloc(10 * std::mem::size_of::<i32>()).unwrap().cast::<i32>();
//!
//! unsafe {
//!     *nums.as_ptr() = 42;
//!     assert_eq!(*nums.as_ptr(), 42);
//! }
//!
//! // Scratch work that is rolled back afterwards
//! let used = arena.total_used();
//! {
//!     let mut scratch = arena.temp();
//!     scratch.alloc(4096).unwrap();
//! }
//! assert_eq!(arena.total_used(), used);
//!
//! // Release everything but the first block
//! arena.reset();
//! ```
//!
//! ## How It Works
//!
//! Blocks are linked newest to oldest. When the current block can't fit a
//! request, a new one sized `max(size + alignment, DEFAULT_BLOCK_SIZE)` is
//! mapped and becomes current:
//!
//! ```text
//!   Arena Growth:
//!
//!   Arena ──current──▶ ┌──────────┐ previous ┌──────────┐ previous ┌──────────┐
//!                      │ block #3 │ ───────▶ │ block #2 │ ───────▶ │ block #1 │
//!                      │ (newest) │          │          │          │ (oldest) │
//!                      └──────────┘          └──────────┘          └──────────┘
//!
//!   reset()  : unmaps #3 and #2, rewinds #1 to just past its header
//!   free()   : unmaps everything, arena is empty again
//!   rewind   : unmaps blocks newer than the mark, rewinds the marked block
//! ```
//!
//! ## Features
//!
//! - **Lazy**: no memory is mapped before the first allocation
//! - **Page-rounded blocks** with a self-describing header
//! - **Arbitrary power-of-two alignment**
//! - **Checkpoints**: roll back scratch allocations in O(blocks since mark)
//! - **In-place growth** of the most recent allocation
//! - **Protection control** for every block via `mprotect(2)`
//! - **Poisoning hooks** to catch use-after-reset in testing
//!
//! ## Cargo Features
//!
//! - `fixed-capacity`: arenas map one block up front and never grow
//! - `asan`: enables `AsanPoison` for AddressSanitizer builds
//!
//! ## Limitations
//!
//! - **Single-threaded only**: an arena can be moved between threads but not shared
//! - **No per-object free**: dead space is reclaimed only in bulk
//! - **Unix-only**: requires `libc` (`mmap`, `munmap`, `mprotect`, `sysconf`)
//!
//! ## Safety
//!
//! Allocation itself is safe, but it hands out raw pointers. Dereferencing
//! them is only sound until the arena is reset, freed, dropped, or rolled back
//! past them. Debug builds can catch violations with [`Scribble`] or
//! `AsanPoison`.

pub mod align;
mod arena;
mod block;
mod config;
mod error;
mod format;
pub mod os;
pub mod poison;
mod stats;
mod temp;
mod version;

pub use arena::Arena;
pub use block::{BLOCK_HEADER_SIZE, BlockHeader, BlockId};
pub use config::{ArenaConfig, DEFAULT_ALIGNMENT, DEFAULT_BLOCK_SIZE, Growth};
pub use error::{ArenaError, Result};
pub use os::{Protection, page_size};
#[cfg(feature = "asan")]
pub use poison::AsanPoison;
pub use poison::{NoPoison, Poison, SCRIBBLE_BYTE, Scribble};
pub use stats::ArenaStats;
pub use temp::{Checkpoint, TempArena};
pub use version::{VERSION, Version, version};
