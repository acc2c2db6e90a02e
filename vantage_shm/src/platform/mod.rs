//! Platform-specific shared-memory primitives. Linux is the only
//! supported target; there is no portable fallback because the bridge
//! relies on `mmap`/NUMA/huge-page behavior that has no POSIX-portable
//! equivalent.

pub mod linux;
pub use linux::*;
