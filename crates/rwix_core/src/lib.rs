//! rwix_core: Core utilities for the rwix installer toolchain.
//!
//! Provides the target platform enumeration, cooperative cancellation, and
//! the atomic file writes shared by the binder and decompiler.

pub mod cancel;
pub mod fs;
pub mod platform;

// Re-export commonly used types
pub use cancel::CancellationToken;
pub use platform::Platform;
