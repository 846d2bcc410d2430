use std::mem;

use memarena::{Arena, ArenaConfig, Growth, Protection, Scribble, VERSION, page_size, version};

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;

/// Compares the version this demo was compiled against with the linked engine.
fn check_version() -> bool {
  let running = version();
  println!(">> Memory arena version: {running}");

  if let Err(err) = running.check(&VERSION) {
    println!(">> FAIL: {err}");
    return false;
  }

  true
}

/// A 64 MiB + 1 byte request must produce a page-rounded block, and the slack
/// left at its end must serve the next small request.
fn page_alignment() -> memarena::Result<()> {
  println!("=== Page Alignment Test ===");

  let mut arena = Arena::new(Protection::READ_WRITE)?;

  // --------------------------------------------------------------------
  // 1) One byte past 64 MiB: the block gets rounded to the next page.
  // --------------------------------------------------------------------
  let weird_size = 64 * MIB + 1;
  println!(">> Allocating 64MB + 1 byte ({weird_size} bytes)");
  arena.alloc(weird_size)?;
  arena.print_stats();

  let capacity = arena.capacity();
  if capacity % page_size() == 0 {
    println!(">> SUCCESS: Block size {capacity} is divisible by page size {}", page_size());
  } else {
    println!(">> FAIL: Block size {capacity} is NOT page aligned!");
  }

  // --------------------------------------------------------------------
  // 2) 1 KiB fits in the slack space of the same block.
  // --------------------------------------------------------------------
  println!("\n=== Slack Space Test ===");
  println!(">> {} bytes remain in the current block", arena.remaining());

  let before = arena.current_block();
  arena.alloc(KIB)?;

  if arena.current_block() == before {
    println!(">> SUCCESS: Still in the same block, the slack space was used.");
  } else {
    println!(">> FAIL: Created a new block unnecessarily.");
  }

  // --------------------------------------------------------------------
  // 3) 100 MiB can't fit: a new block is linked in front.
  // --------------------------------------------------------------------
  println!(">> Now allocating 100MB. Should trigger a new block.");
  arena.alloc(100 * MIB)?;

  if arena.current_block() != before {
    println!(">> SUCCESS: Created a new block.");
  } else {
    println!(">> FAIL: Stayed in the same block.");
  }

  arena.print_stats();
  println!();

  Ok(())
}

/// Without growth, the single block fails requests it can't hold.
fn fixed_capacity() -> memarena::Result<()> {
  println!("=== Fixed Capacity Test ===");

  let mut arena = Arena::with_config(ArenaConfig::new().block_size(64 * MIB).growth(Growth::Fixed))?;
  println!(">> Initialized arena ({} MiB mapped up front)", arena.capacity() / MIB);

  let remaining = arena.remaining();
  arena.alloc(remaining - 16 * KIB)?;
  println!(">> Filled all but 16KiB of the block");

  match arena.alloc(24 * KIB) {
    Err(err) => println!(">> SUCCESS: Allocation failed as expected ({err})"),
    Ok(_) => println!(">> FAIL: 24KiB fit into 16KiB of space."),
  }

  arena.print_stats();
  println!();

  Ok(())
}

/// Reset rewinds the first block; with [`Scribble`] the old bytes are overwritten.
fn poison() -> memarena::Result<()> {
  println!("=== Poison Test ===");

  let mut arena = Arena::<Scribble>::configured(ArenaConfig::new().growth(Growth::Chained))?;
  println!(">> Initialized arena (not allocating yet)");

  let nums = arena.alloc(10 * mem::size_of::<i32>())?.cast::<i32>();
  unsafe { nums.as_ptr().write(42) };
  println!(">> Wrote to the block: {}", unsafe { nums.as_ptr().read() });

  println!(">> Expect {} MiB mapped and {} bytes used", arena.capacity() / MIB, arena.total_used());
  arena.print_stats();

  println!("\n>> Allocating 70MB");
  arena.alloc(70 * MIB)?;
  arena.print_stats();

  println!("\n>> Resetting arena");
  arena.reset();
  arena.print_stats();

  // Reading after reset is a use-after-reset bug; the scribble makes it visible.
  let stale = unsafe { nums.as_ptr().read() };
  println!(">> Old value now reads {stale:#x} (scribbled)");

  arena.free();
  println!();

  Ok(())
}

/// In-place growth for the last allocation, copying fallback otherwise.
fn realloc() -> memarena::Result<()> {
  println!("=== Realloc Test ===");

  let mut arena = Arena::new(Protection::READ_WRITE)?;

  // --------------------------------------------------------------------
  // 1) Last allocation grows in place.
  // --------------------------------------------------------------------
  let first = arena.alloc(128)?;
  unsafe { first.as_ptr().write_bytes(0xAA, 128) };

  let grown = unsafe { arena.grow(first, 128, 256)? };
  if grown == first {
    println!(">> SUCCESS: Realloc stayed in place for the last allocation.");
  } else {
    println!(">> FAIL: Realloc moved despite being the last allocation.");
  }

  // --------------------------------------------------------------------
  // 2) Something allocated after it forces a move.
  // --------------------------------------------------------------------
  arena.alloc(64)?;
  let moved = unsafe { arena.grow(grown, 256, 512)? };

  if moved != grown {
    println!(">> SUCCESS: Fallback triggered (pointer moved).");
    if unsafe { moved.as_ptr().read() } == 0xAA {
      println!(">> SUCCESS: Data preserved after move.");
    }
  } else {
    println!(">> FAIL: Realloc stayed in place even though memory was blocked.");
  }

  // --------------------------------------------------------------------
  // 3) Alignment survives growth.
  // --------------------------------------------------------------------
  let align = 64;
  let aligned = arena.alloc_aligned(32, align)?;
  let aligned_grown = unsafe { arena.grow_aligned(aligned, 32, 128, align)? };

  if aligned_grown.as_ptr() as usize % align == 0 {
    println!(">> SUCCESS: Grown pointer is still aligned to {align}.");
  } else {
    println!(">> FAIL: Grown pointer lost alignment ({align})!");
  }

  let (used, blocks) = (arena.total_used(), arena.block_count());
  let text = memarena::arena_format!(arena, "{used} bytes used in {blocks} blocks")?;
  println!(">> {}", unsafe { text.as_ref() });

  Ok(())
}

fn main() -> memarena::Result<()> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  if !check_version() {
    std::process::exit(1);
  }

  page_alignment()?;
  fixed_capacity()?;
  poison()?;
  realloc()?;

  Ok(())
}
