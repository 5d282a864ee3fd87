//! glibc-compatible `srand`/`rand`
//!
//! Reproduces the TYPE_3 additive feedback generator behind glibc's `rand()`,
//! so a seed produces the same draw sequence as a C program calling
//! `srand(seed)`. Plugs into the workloads like any other `rand` generator.

use rand::{Error, RngCore, SeedableRng};

const DEGREE: usize = 31;
const SEPARATION: usize = 3;
const WARMUP: usize = 310;

/// Largest value returned by [`LibcRand::next_rand`] (`RAND_MAX`)
pub const RAND_MAX: u32 = 0x7fff_ffff;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibcRand {
    state: [u32; DEGREE],
    /// Oldest word, the `r[i - 31]` term
    pos: usize,
}

impl LibcRand {
    /// Equivalent of `srand(seed)`; seed 0 behaves like 1
    pub fn new(seed: u32) -> Self {
        let seed = if seed == 0 { 1 } else { seed };

        let mut initial = [0i32; DEGREE];
        initial[0] = seed as i32;
        for i in 1..DEGREE {
            // 16807 * r[i-1] % (2^31 - 1) without overflowing 32 bits
            let word = initial[i - 1];
            let hi = word / 127_773;
            let lo = word % 127_773;
            let mut next = 16_807 * lo - 2_836 * hi;
            if next < 0 {
                next += 2_147_483_647;
            }
            initial[i] = next;
        }

        // r[31..34] repeat r[0..3], so the window after them is r[3..34]
        let mut state = [0u32; DEGREE];
        for (i, slot) in state.iter_mut().enumerate() {
            *slot = initial[(i + SEPARATION) % DEGREE] as u32;
        }

        let mut rng = LibcRand { state, pos: 0 };
        for _ in 0..WARMUP {
            rng.step();
        }
        rng
    }

    fn step(&mut self) -> u32 {
        let value = self.state[self.pos]
            .wrapping_add(self.state[(self.pos + DEGREE - SEPARATION) % DEGREE]);
        self.state[self.pos] = value;
        self.pos = (self.pos + 1) % DEGREE;
        value
    }

    /// Equivalent of `rand()`: a value in `0..=RAND_MAX`
    pub fn next_rand(&mut self) -> u32 {
        self.step() >> 1
    }
}

impl RngCore for LibcRand {
    fn next_u32(&mut self) -> u32 {
        self.next_rand()
    }

    fn next_u64(&mut self) -> u64 {
        let low = u64::from(self.next_u32());
        let high = u64::from(self.next_u32());
        (high << 32) | low
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for LibcRand {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        LibcRand::new(u32::from_le_bytes(seed))
    }

    /// Truncates to the low 32 bits, like passing the value to `srand`
    fn seed_from_u64(state: u64) -> Self {
        LibcRand::new(state as u32)
    }
}
