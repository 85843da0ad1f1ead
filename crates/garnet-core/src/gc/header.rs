//! GC slot header

/// Metadata stored alongside every heap slot
#[derive(Debug, Clone, Copy, Default)]
pub struct GcHeader {
    /// Mark bit for GC (true = reachable)
    marked: bool,

    /// Number of collections this slot has survived
    survived: u32,
}

impl GcHeader {
    /// Create a fresh, unmarked header
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if this slot is marked
    #[inline]
    pub fn is_marked(&self) -> bool {
        self.marked
    }

    /// Mark this slot as reachable
    #[inline]
    pub fn mark(&mut self) {
        self.marked = true;
    }

    /// Clear the mark bit and count the survived cycle
    #[inline]
    pub fn unmark(&mut self) {
        self.marked = false;
        self.survived = self.survived.saturating_add(1);
    }

    /// Collections survived so far
    #[inline]
    pub fn survived(&self) -> u32 {
        self.survived
    }
}
