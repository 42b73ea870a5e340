/// The corpus-wide string hash. Must match whatever produced the hashes
/// embedded in client binaries, so implementations are fixed algorithms.
pub trait StringHasher {
    fn hash_str(&self, s: &str) -> u64;
}

/// MurmurHash2, 64-bit variant A
#[derive(Debug, Clone, Copy, Default)]
pub struct MurmurHash64A {
    pub seed: u64,
}

const M: u64 = 0xc6a4_a793_5bd1_e995;
const R: u32 = 47;

impl MurmurHash64A {
    pub fn new(seed: u64) -> Self {
        MurmurHash64A { seed }
    }

    pub fn hash_bytes(&self, data: &[u8]) -> u64 {
        let mut h = self.seed ^ (data.len() as u64).wrapping_mul(M);

        let mut blocks = data.chunks_exact(8);
        for block in &mut blocks {
            let mut k = u64::from_le_bytes([
                block[0], block[1], block[2], block[3],
                block[4], block[5], block[6], block[7],
            ]);
            k = k.wrapping_mul(M);
            k ^= k >> R;
            k = k.wrapping_mul(M);

            h ^= k;
            h = h.wrapping_mul(M);
        }

        let tail = blocks.remainder();
        if !tail.is_empty() {
            for (i, &byte) in tail.iter().enumerate() {
                h ^= (byte as u64) << (8 * i);
            }
            h = h.wrapping_mul(M);
        }

        h ^= h >> R;
        h = h.wrapping_mul(M);
        h ^= h >> R;
        h
    }
}

impl StringHasher for MurmurHash64A {
    fn hash_str(&self, s: &str) -> u64 {
        self.hash_bytes(s.as_bytes())
    }
}
