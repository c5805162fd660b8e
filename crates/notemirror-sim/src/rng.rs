use serde::{Deserialize, Serialize};

/// Seeded source of choices for simulated mirror edits.
///
/// A seed replays the same edits on any host, which is what makes
/// `--replay <seed>` reproduce a failing campaign round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
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

    /// Raw 64-bit draw that the edit pickers reduce.
    #[must_use]
    pub const fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        // The low bits of an LCG cycle quickly; fold the high half in.
        self.state ^ (self.state >> 33)
    }

    /// Draw in `[0, upper_exclusive)`; zero when the range is empty.
    #[must_use]
    pub const fn next_bounded(&mut self, upper_exclusive: u64) -> u64 {
        if upper_exclusive == 0 {
            return 0;
        }
        self.next_u64() % upper_exclusive
    }

    /// Index of the item or folder to edit among `len` candidates.
    #[must_use]
    pub fn choose_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let picked = self.next_bounded(len as u64);
        usize::try_from(picked).ok()
    }

    /// True in roughly `percent` of draws, e.g. the share of folders a grown tree gets.
    #[must_use]
    pub fn hit_rate_percent(&mut self, percent: u8) -> bool {
        if percent == 0 {
            return false;
        }
        if percent >= 100 {
            return true;
        }
        self.next_bounded(100) < u64::from(percent)
    }
}
