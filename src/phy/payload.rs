use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Counting payload, cycling 0x00..=0xFF
pub fn sequential_payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}

/// Pseudo-random payload. Seeded, so the same seed gives byte-identical
/// packets across runs and captures stay comparable.
pub fn random_payload(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.random()).collect()
}
