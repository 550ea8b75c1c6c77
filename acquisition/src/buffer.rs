use ringbuf::ring_buffer::RbBase;
use ringbuf::Rb;
use ringbuf::StaticRb;

/// Fixed-capacity FIFO of raw converter codes.
///
/// Filled from interrupt context through [`SampleBuffer::try_put`] and emptied by the
/// foreground through [`SampleBuffer::drain_all`]. Once `N` samples have been stored the buffer
/// latches `full` and refuses everything until [`SampleBuffer::reset`].
///
/// `N` must be non-zero, which is checked when the buffer is built:
///
/// ```compile_fail
/// let _ = acquisition::SampleBuffer::<0>::new();
/// ```
pub struct SampleBuffer<const N: usize> {
    samples: StaticRb<u16, N>,
    full: bool,
}

impl<const N: usize> Default for SampleBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SampleBuffer<N> {
    const NON_EMPTY: () = assert!(N > 0, "sample buffer needs room for at least one sample");

    pub fn new() -> Self {
        let () = Self::NON_EMPTY;
        Self {
            samples: StaticRb::default(),
            full: false,
        }
    }

    /// Append a sample unless the buffer is full. Never blocks, never fails.
    pub fn try_put(&mut self, raw: u16) {
        if self.full {
            return;
        }
        // Cannot fail: `full` is latched as soon as the last free slot is taken.
        let _ = self.samples.push(raw);
        if self.samples.len() >= N {
            self.full = true;
        }
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Remove all buffered samples in insertion order.
    ///
    /// The `full` latch is left untouched: a drained buffer still rejects samples until it is
    /// reset for the next run.
    pub fn drain_all(&mut self) -> impl Iterator<Item = u16> + '_ {
        core::iter::from_fn(move || self.samples.pop())
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.full = false;
    }
}
