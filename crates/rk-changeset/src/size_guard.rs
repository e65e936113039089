// size_guard.rs — Byte ceiling for the rendered summary comment.
//
// The host platform rejects comments above ~65 KB. The guard is checked
// against the fully rendered candidate summary before anything is written,
// so a rejected acceptance leaves no partial state behind.

use crate::error::ChangeSetError;

/// Default ceiling in UTF-8 bytes, leaving headroom below the platform limit.
pub const DEFAULT_BYTE_CEILING: usize = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeGuard {
    ceiling: usize,
}

impl Default for SizeGuard {
    fn default() -> Self {
        Self::new(DEFAULT_BYTE_CEILING)
    }
}

impl SizeGuard {
    pub fn new(ceiling: usize) -> Self {
        Self { ceiling }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Ok when `rendered` fits under the ceiling.
    pub fn check(&self, rendered: &str) -> Result<(), ChangeSetError> {
        let size = rendered.len();
        if size > self.ceiling {
            tracing::warn!(size, ceiling = self.ceiling, "rendered summary exceeds byte ceiling");
            return Err(ChangeSetError::SizeExceeded {
                size,
                ceiling: self.ceiling,
            });
        }
        Ok(())
    }
}
