//! Seeded pseudo-random source for reproducible runs.
//!
//! A plain 64-bit LCG is enough here: the simulator needs replayable
//! choices, not statistical quality.

/// Deterministic RNG. The same seed always yields the same sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            state: seed ^ 0x9E37_79B9_7F4A_7C15,
        }
    }

    pub const fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.state
    }

    /// Uniform-ish value in `0..upper`; `0` when `upper == 0`.
    pub const fn next_bounded(&mut self, upper: u64) -> u64 {
        if upper == 0 {
            return 0;
        }
        (self.next_u64() >> 11) % upper
    }

    /// `true` with probability `percent / 100`.
    pub fn hit(&mut self, percent: u8) -> bool {
        if percent == 0 {
            return false;
        }
        self.next_bounded(100) < u64::from(percent)
    }

    /// Fair coin.
    pub const fn flip(&mut self) -> bool {
        self.next_bounded(2) == 1
    }

    /// Pick one element, or `None` for an empty slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        let len = u64::try_from(items.len()).ok()?;
        let index = usize::try_from(self.next_bounded(len)).ok()?;
        items.get(index)
    }
}
