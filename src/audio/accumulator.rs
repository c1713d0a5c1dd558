// FrameAccumulator - turns variable-length hardware blocks into fixed windows
//
// Real-time safe: all buffers are allocated in `new`, `push` only copies.

use crate::analysis::WindowOutcome;

/// Result of feeding one hardware block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushSummary {
    /// Windows completed during this push
    pub windows: usize,
    /// Samples written into the ring (padding included)
    pub consumed: usize,
    /// An analysis callback asked to drop the rest of the block
    pub interrupted: bool,
}

/// Collects samples into windows of `window_size`, one completed every
/// `hop_size` samples.
///
/// The last `window_size` samples live in a ring. When the hop cursor
/// reaches `hop_size` the ring is copied out oldest-first, so with
/// `hop_size == window_size` windows are disjoint and with a smaller hop
/// consecutive windows overlap by `window_size - hop_size` samples. Before
/// the ring has filled, the missing history reads as zeros.
pub struct FrameAccumulator {
    ring: Vec<f32>,
    write_pos: usize,
    cursor: usize,
    hop_size: usize,
    frame: Vec<f32>,
    staging: Vec<f32>,
    pad_short_blocks: bool,
    windows_completed: u64,
}

impl FrameAccumulator {
    /// # Panics
    ///
    /// Panics if `window_size` or `block_capacity` is zero, or if
    /// `hop_size` is outside `1..=window_size`. Configuration is validated
    /// before an accumulator is built.
    pub fn new(
        window_size: usize,
        hop_size: usize,
        block_capacity: usize,
        pad_short_blocks: bool,
    ) -> Self {
        assert!(window_size > 0, "window_size must be > 0");
        assert!(
            hop_size > 0 && hop_size <= window_size,
            "hop_size must be within 1..=window_size"
        );
        assert!(block_capacity > 0, "block_capacity must be > 0");

        Self {
            ring: vec![0.0; window_size],
            write_pos: 0,
            cursor: 0,
            hop_size,
            frame: vec![0.0; window_size],
            staging: vec![0.0; block_capacity],
            pad_short_blocks,
            windows_completed: 0,
        }
    }

    pub fn window_size(&self) -> usize {
        self.ring.len()
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    pub fn block_capacity(&self) -> usize {
        self.staging.len()
    }

    /// Samples accumulated toward the next window
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn windows_completed(&self) -> u64 {
        self.windows_completed
    }

    /// Feed one hardware block, calling `on_window` for each completed window.
    ///
    /// Blocks longer than the staging capacity are processed in
    /// capacity-sized chunks, and their trailing partial chunk is fed as is.
    /// A block shorter than the capacity is copied into staging with the
    /// remainder zero-filled; only the real samples are accumulated unless
    /// `pad_short_blocks` is set, in which case the whole zero-padded staging
    /// buffer is. Returning [`WindowOutcome::Interrupt`] discards whatever is
    /// left of the block.
    pub fn push<F>(&mut self, block: &[f32], mut on_window: F) -> PushSummary
    where
        F: FnMut(&[f32]) -> WindowOutcome,
    {
        let mut summary = PushSummary::default();
        let capacity = self.staging.len();
        let pad = self.pad_short_blocks && block.len() < capacity;

        for chunk in block.chunks(capacity) {
            let fed = if chunk.len() < capacity {
                self.staging[..chunk.len()].copy_from_slice(chunk);
                self.staging[chunk.len()..].fill(0.0);
                if pad {
                    capacity
                } else {
                    chunk.len()
                }
            } else {
                self.staging.copy_from_slice(chunk);
                capacity
            };

            for i in 0..fed {
                let sample = self.staging[i];
                summary.consumed += 1;
                if self.write(sample) {
                    summary.windows += 1;
                    if on_window(&self.frame) == WindowOutcome::Interrupt {
                        summary.interrupted = true;
                        return summary;
                    }
                }
            }
        }

        summary
    }

    /// Write one sample; returns true when it completed a window, which is
    /// then available in `self.frame`.
    fn write(&mut self, sample: f32) -> bool {
        let size = self.ring.len();
        self.ring[self.write_pos] = sample;
        self.write_pos += 1;
        if self.write_pos == size {
            self.write_pos = 0;
        }

        self.cursor += 1;
        if self.cursor < self.hop_size {
            return false;
        }
        self.cursor = 0;

        let split = size - self.write_pos;
        self.frame[..split].copy_from_slice(&self.ring[self.write_pos..]);
        self.frame[split..].copy_from_slice(&self.ring[..self.write_pos]);
        self.windows_completed += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(acc: &mut FrameAccumulator, block: &[f32]) -> (Vec<Vec<f32>>, PushSummary) {
        let mut windows = Vec::new();
        let summary = acc.push(block, |w| {
            windows.push(w.to_vec());
            WindowOutcome::Continue
        });
        (windows, summary)
    }

    #[test]
    fn test_disjoint_windows() {
        let mut acc = FrameAccumulator::new(4, 4, 8, false);
        let block: Vec<f32> = (1..=8).map(|v| v as f32).collect();

        let (windows, summary) = collect(&mut acc, &block);
        assert_eq!(windows, vec![vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]]);
        assert_eq!(summary.windows, 2);
        assert_eq!(summary.consumed, 8);
        assert_eq!(acc.cursor(), 0);
    }

    #[test]
    fn test_windows_span_blocks() {
        let mut acc = FrameAccumulator::new(4, 4, 8, false);
        let (first, _) = collect(&mut acc, &[1.0, 2.0, 3.0]);
        assert!(first.is_empty());
        assert_eq!(acc.cursor(), 3);

        let (second, _) = collect(&mut acc, &[4.0, 5.0]);
        assert_eq!(second, vec![vec![1.0, 2.0, 3.0, 4.0]]);
        assert_eq!(acc.cursor(), 1);
    }

    #[test]
    fn test_overlapping_windows() {
        let mut acc = FrameAccumulator::new(4, 2, 8, false);
        let block: Vec<f32> = (1..=6).map(|v| v as f32).collect();

        let (windows, _) = collect(&mut acc, &block);
        assert_eq!(
            windows,
            vec![
                vec![0.0, 0.0, 1.0, 2.0],
                vec![1.0, 2.0, 3.0, 4.0],
                vec![3.0, 4.0, 5.0, 6.0],
            ]
        );
    }

    #[test]
    fn test_window_count_matches_hop() {
        for &(window, hop, capacity) in &[(8, 8, 5), (8, 3, 4), (16, 4, 7), (4, 1, 3)] {
            for &len in &[0usize, 1, 7, 8, 31, 64] {
                let mut acc = FrameAccumulator::new(window, hop, capacity, false);
                let mut total = 0;
                for chunk in vec![0.5f32; len].chunks(capacity) {
                    total += acc.push(chunk, |_| WindowOutcome::Continue).windows;
                }
                assert_eq!(total, len / hop, "window={window} hop={hop} len={len}");
                assert_eq!(acc.windows_completed(), (len / hop) as u64);
                assert_eq!(acc.cursor(), len % hop);
            }
        }
    }

    #[test]
    fn test_long_block_processed_in_chunks() {
        let mut acc = FrameAccumulator::new(4, 4, 3, false);
        let block: Vec<f32> = (1..=10).map(|v| v as f32).collect();

        let (windows, summary) = collect(&mut acc, &block);
        assert_eq!(summary.consumed, 10);
        assert_eq!(windows, vec![vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]]);
    }

    #[test]
    fn test_short_block_padding() {
        let mut acc = FrameAccumulator::new(4, 4, 4, true);
        let (windows, summary) = collect(&mut acc, &[1.0, 2.0]);
        assert_eq!(summary.consumed, 4);
        assert_eq!(windows, vec![vec![1.0, 2.0, 0.0, 0.0]]);
    }

    #[test]
    fn test_padding_skips_tail_of_long_block() {
        let mut acc = FrameAccumulator::new(4, 4, 4, true);
        let (windows, summary) = collect(&mut acc, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(windows, vec![vec![1.0, 2.0, 3.0, 4.0]]);
        assert_eq!(summary.consumed, 6);
        assert_eq!(acc.cursor(), 2);

        let (windows, _) = collect(&mut acc, &[7.0, 8.0, 9.0, 10.0, 11.0]);
        assert_eq!(windows, vec![vec![5.0, 6.0, 7.0, 8.0]]);
        assert_eq!(acc.windows_completed(), 2);
    }

    #[test]
    fn test_short_block_without_padding() {
        let mut acc = FrameAccumulator::new(4, 4, 4, false);
        let (windows, summary) = collect(&mut acc, &[1.0, 2.0]);
        assert!(windows.is_empty());
        assert_eq!(summary.consumed, 2);
        assert_eq!(acc.cursor(), 2);
    }

    #[test]
    fn test_interrupt_discards_block_remainder() {
        let mut acc = FrameAccumulator::new(4, 4, 16, false);
        let block: Vec<f32> = (1..=10).map(|v| v as f32).collect();

        let mut seen = 0;
        let summary = acc.push(&block, |_| {
            seen += 1;
            WindowOutcome::Interrupt
        });
        assert_eq!(seen, 1);
        assert!(summary.interrupted);
        assert_eq!(summary.consumed, 4);
        assert_eq!(acc.cursor(), 0);

        // Next block starts a fresh hop
        let (windows, _) = collect(&mut acc, &[11.0, 12.0, 13.0, 14.0]);
        assert_eq!(windows, vec![vec![11.0, 12.0, 13.0, 14.0]]);
    }

    #[test]
    fn test_empty_block_is_noop() {
        let mut acc = FrameAccumulator::new(4, 2, 4, true);
        let (windows, summary) = collect(&mut acc, &[]);
        assert!(windows.is_empty());
        assert_eq!(summary, PushSummary::default());
    }

    #[test]
    #[should_panic]
    fn test_hop_larger_than_window_panics() {
        let _ = FrameAccumulator::new(4, 5, 4, false);
    }
}
