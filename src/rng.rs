//! Small seedable generator for randomized dispatch order.
//!
//! XorShift64 with Lemire's bounded sampling, seeded through splitmix64 so
//! that small neighbouring seeds start from unrelated states.  Each scheduler
//! owns its own instance, so a given seed always reproduces the same dispatch
//! order.

fn splitmix64(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[derive(Clone, Debug)]
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        let state = splitmix64(seed);
        // Zero is the one state xorshift never leaves.
        let state = if state == 0 { 0x9E37_79B9_7F4A_7C15 } else { state };
        Rng { state }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform in [0, upper).
    pub fn below(&mut self, upper: usize) -> usize {
        debug_assert!(upper > 0);
        let upper = upper as u64;
        let threshold = upper.wrapping_neg() % upper;
        loop {
            let m = (self.next_u64() as u128) * (upper as u128);
            if (m as u64) >= threshold {
                return (m >> 64) as usize;
            }
        }
    }

    /// Fisher-Yates: walking down from the end, swap each slot with a
    /// uniformly chosen slot at or below it.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        for i in (1..slice.len()).rev() {
            let j = self.below(i + 1);
            slice.swap(i, j);
        }
    }
}
