//! Bayer cycle scheduling for sparse temporal sampling.
//!
//! Each sparse render covers one pixel of every 2x2 output block; a fixed
//! 4-entry sub-pixel offset table cycles so that the block is fully covered
//! exactly once every 4 consecutive frames.

use glam::Mat4;

/// Number of frames in one full coverage cycle.
pub const CYCLE_LENGTH: u32 = 4;

/// Sub-pixel offsets within a 2x2 block, diagonal-first.
///
/// Diagonal-first ordering spreads consecutive samples as far apart as the
/// block allows, which reads better than row-major while converging.
pub const BAYER_OFFSETS: [[u32; 2]; 4] = [[0, 0], [1, 1], [1, 0], [0, 1]];

/// Sub-pixel offset for a frame index. Pure lookup, no state.
#[inline]
pub fn bayer_offset(frame_index: u32) -> [u32; 2] {
    BAYER_OFFSETS[(frame_index % CYCLE_LENGTH) as usize]
}

/// Projection jitter matching the current Bayer cell, in sparse-pixel units.
///
/// A sparse pixel spans a 2x2 block of output pixels, so the sample point
/// for cell (ox, oy) sits a quarter pixel off the sparse pixel center:
/// offsets are -0.25 or +0.25 on each axis.
#[inline]
pub fn bayer_jitter(frame_index: u32) -> (f32, f32) {
    let [ox, oy] = bayer_offset(frame_index);
    (ox as f32 * 0.5 - 0.25, oy as f32 * 0.5 - 0.25)
}

/// Apply a sub-pixel jitter to a projection matrix.
///
/// The jitter is given in pixel units relative to the render target of
/// `width` x `height` pixels and is converted to an NDC offset on the
/// projection's translation terms.
#[inline]
pub fn apply_subpixel_offset(
    proj: Mat4,
    jitter_x: f32,
    jitter_y: f32,
    width: u32,
    height: u32,
) -> Mat4 {
    let offset_x = 2.0 * jitter_x / width as f32;
    let offset_y = 2.0 * jitter_y / height as f32;

    let jitter_matrix = glam::Mat4::from_cols(
        glam::Vec4::new(1.0, 0.0, 0.0, 0.0),
        glam::Vec4::new(0.0, 1.0, 0.0, 0.0),
        glam::Vec4::new(offset_x, offset_y, 1.0, 0.0),
        glam::Vec4::new(0.0, 0.0, 0.0, 1.0),
    );

    jitter_matrix * proj
}

/// Per-frame accumulation bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleState {
    /// Position in the 4-frame Bayer cycle.
    pub frame_index: u32,
    /// Which accumulation buffer is the write target this frame (0 or 1).
    pub buffer_index: usize,
    /// True once a full cycle has completed since the last reset.
    pub is_valid: bool,
}

impl CycleState {
    pub fn new() -> Self {
        Self {
            frame_index: 0,
            buffer_index: 0,
            is_valid: false,
        }
    }

    /// End-of-frame bookkeeping: swap the write buffer, step the Bayer
    /// cycle, and mark history valid on the first wrap back to 0.
    pub fn advance(&mut self) {
        self.buffer_index = 1 - self.buffer_index;
        self.frame_index = (self.frame_index + 1) % CYCLE_LENGTH;
        if self.frame_index == 0 {
            self.is_valid = true;
        }
    }

    /// Drop history validity and restart the cycle. Buffer contents are
    /// left in place; readers must not treat them as valid history.
    pub fn invalidate(&mut self) {
        self.is_valid = false;
        self.frame_index = 0;
    }

    /// Sub-pixel offset for the current frame.
    #[inline]
    pub fn offset(&self) -> [u32; 2] {
        bayer_offset(self.frame_index)
    }
}

impl Default for CycleState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bayer_offsets_cover_block_once() {
        let mut seen = [[false; 2]; 2];
        for i in 0..CYCLE_LENGTH {
            let [x, y] = bayer_offset(i);
            assert!(!seen[x as usize][y as usize], "cell ({},{}) repeated", x, y);
            seen[x as usize][y as usize] = true;
        }
    }

    #[test]
    fn test_bayer_diagonal_first() {
        assert_eq!(bayer_offset(0), [0, 0]);
        assert_eq!(bayer_offset(1), [1, 1]);
        assert_eq!(bayer_offset(2), [1, 0]);
        assert_eq!(bayer_offset(3), [0, 1]);
        // Wraps past the cycle length
        assert_eq!(bayer_offset(4), [0, 0]);
        assert_eq!(bayer_offset(7), [0, 1]);
    }

    #[test]
    fn test_cycle_advance_and_validity() {
        let mut cycle = CycleState::new();
        assert!(!cycle.is_valid);

        let expected_frames = [1, 2, 3, 0, 1, 2, 3, 0];
        for (call, expected) in expected_frames.iter().enumerate() {
            cycle.advance();
            assert_eq!(cycle.frame_index, *expected);
            // Valid exactly from the 4th advance onwards
            assert_eq!(cycle.is_valid, call >= 3, "after advance #{}", call + 1);
        }
    }

    #[test]
    fn test_buffer_index_alternates() {
        let mut cycle = CycleState::new();
        let mut previous = cycle.buffer_index;
        for _ in 0..10 {
            cycle.advance();
            assert_eq!(cycle.buffer_index, 1 - previous);
            previous = cycle.buffer_index;
        }
    }

    #[test]
    fn test_invalidate_resets_frame_and_validity() {
        let mut cycle = CycleState::new();
        for _ in 0..5 {
            cycle.advance();
        }
        assert!(cycle.is_valid);
        let buffer_index = cycle.buffer_index;

        cycle.invalidate();
        assert!(!cycle.is_valid);
        assert_eq!(cycle.frame_index, 0);
        // Buffer parity is untouched by invalidation
        assert_eq!(cycle.buffer_index, buffer_index);

        // Idempotent
        cycle.invalidate();
        assert!(!cycle.is_valid);
        assert_eq!(cycle.frame_index, 0);
    }

    #[test]
    fn test_bayer_jitter_quarter_pixel() {
        for i in 0..CYCLE_LENGTH {
            let (x, y) = bayer_jitter(i);
            assert!(x == -0.25 || x == 0.25);
            assert!(y == -0.25 || y == 0.25);
        }
        assert_eq!(bayer_jitter(0), (-0.25, -0.25));
        assert_eq!(bayer_jitter(1), (0.25, 0.25));
    }

    #[test]
    fn test_subpixel_offset_shifts_ndc() {
        let proj = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
        let jittered = apply_subpixel_offset(proj, 0.25, -0.25, 100, 50);
        let p = glam::Vec4::new(0.0, 0.0, -1.0, 1.0);
        let a = proj * p;
        let b = jittered * p;
        let ndc_a = (a / a.w).truncate();
        let ndc_b = (b / b.w).truncate();
        assert!(((ndc_b.x - ndc_a.x) - 2.0 * 0.25 / 100.0).abs() < 1e-6);
        assert!(((ndc_b.y - ndc_a.y) + 2.0 * 0.25 / 50.0).abs() < 1e-6);
    }
}
