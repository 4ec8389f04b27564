/// In-memory LED buffer: one fixed-length sequence of colors per arm.
///
/// Arm indices are validated once through [`LedArray::arm_index`]; the
/// resulting [`ArmIndex`] is the only way to address a single arm, so fills
/// never see an unchecked index. Lengths are fixed at construction.

use crate::color::Color;

/// An arm index that was checked against an [`LedArray`]'s arm count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmIndex(usize);

impl ArmIndex {
    pub fn get(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedArray {
    arms: Vec<Vec<Color>>,
    dirty: bool,
}

impl LedArray {
    /// Allocate one arm per entry of `lengths`, all off.
    pub fn new(lengths: &[usize]) -> Self {
        Self {
            arms: lengths.iter().map(|&len| vec![Color::OFF; len]).collect(),
            dirty: true,
        }
    }

    pub fn arm_count(&self) -> usize {
        self.arms.len()
    }

    pub fn arm_len(&self, arm: ArmIndex) -> usize {
        self.arms[arm.0].len()
    }

    pub fn arm_index(&self, index: usize) -> Option<ArmIndex> {
        (index < self.arms.len()).then_some(ArmIndex(index))
    }

    pub fn arm_indices(&self) -> impl Iterator<Item = ArmIndex> + use<> {
        (0..self.arms.len()).map(ArmIndex)
    }

    pub fn fill_all(&mut self, color: Color) {
        for arm in &mut self.arms {
            arm.fill(color);
        }
        self.dirty = true;
    }

    /// Panics if `arm` came from an array with more arms than this one.
    pub fn fill_arm(&mut self, arm: ArmIndex, color: Color) {
        self.arms[arm.0].fill(color);
        self.dirty = true;
    }

    /// Write `pattern` repeatedly over `start..start + len` of one arm.
    ///
    /// Returns false without touching the buffer if the range does not fit
    /// inside the arm or the pattern is empty.
    #[must_use]
    pub fn fill_range(&mut self, arm: ArmIndex, start: usize, len: usize, pattern: &[Color]) -> bool {
        let Some(leds) = self.arms.get_mut(arm.0) else {
            return false;
        };
        let Some(end) = start.checked_add(len) else {
            return false;
        };
        if pattern.is_empty() || end > leds.len() {
            return false;
        }
        for (led, &color) in leds[start..end].iter_mut().zip(pattern.iter().cycle()) {
            *led = color;
        }
        self.dirty = true;
        true
    }

    pub fn clear(&mut self) {
        self.fill_all(Color::OFF);
    }

    pub fn arms(&self) -> &[Vec<Color>] {
        &self.arms
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_rendered(&mut self) {
        self.dirty = false;
    }
}
