/// xorshift32; used by policies and tests to derive reproducible action streams.
#[derive(Clone, Copy, Debug)]
pub struct SeededRng {
    state: u32,
}

impl SeededRng {
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0xDEAD_BEEF } else { seed },
        }
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        self.state
    }

    pub fn next_index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0);
        (self.next_u32() % len as u32) as usize
    }

    pub fn next_range(&mut self, min: u32, max_exclusive: u32) -> u32 {
        debug_assert!(max_exclusive > min);
        min + self.next_u32() % (max_exclusive - min)
    }
}
