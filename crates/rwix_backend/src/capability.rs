//! Backend capabilities.

use bitflags::bitflags;

bitflags! {
    /// What a backend can do for its output kind.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Serialize an unlinked intermediate (libraries).
        const COMPILE_EMIT = 1 << 0;
        /// Produce a binary artifact from a resolved intermediate.
        const BIND_EMIT = 1 << 1;
        /// Read a binary artifact back into tables.
        const DECOMPILE_INGEST = 1 << 2;
    }
}

impl Capabilities {
    /// Name of a single capability as used in diagnostics.
    pub fn name(self) -> &'static str {
        if self == Capabilities::COMPILE_EMIT {
            "compile-emit"
        } else if self == Capabilities::BIND_EMIT {
            "bind-emit"
        } else if self == Capabilities::DECOMPILE_INGEST {
            "decompile-ingest"
        } else {
            "a combined capability"
        }
    }

    /// Names of every capability in the set.
    pub fn names(self) -> Vec<&'static str> {
        self.iter().map(Capabilities::name).collect()
    }
}
