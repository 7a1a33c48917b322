use crossbeam_utils::CachePadded;

#[derive(Clone, Copy, Debug)]
struct Position {
    index: usize,
    mask: usize,
}

/// Round-robin shard selector.
///
/// The submission side and the retrieval side each own one, usually from
/// different threads, so each cursor sits on its own cache line.
#[derive(Debug)]
pub(crate) struct Cursor(CachePadded<Position>);

impl Cursor {
    /// Creates a cursor over `shards` shards, starting at shard 0.
    ///
    /// `shards` must be a power of two so the wrap is a mask, not a modulo.
    pub(crate) fn new(shards: usize) -> Self {
        debug_assert!(shards.is_power_of_two());
        Self(CachePadded::new(Position {
            index: 0,
            mask: shards - 1,
        }))
    }

    #[inline]
    pub(crate) fn get(&self) -> usize {
        self.0.index
    }

    #[inline]
    pub(crate) fn advance(&mut self) {
        self.0.index = (self.0.index + 1) & self.0.mask;
    }
}
