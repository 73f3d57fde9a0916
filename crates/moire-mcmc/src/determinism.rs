use moire_core::derive_substream_seed;

/// Derives the seed for the chain built at `rung` on initialisation attempt `attempt`.
pub fn chain_seed(master_seed: u64, rung: usize, attempt: usize) -> u64 {
    let intermediate = derive_substream_seed(master_seed, rung as u64);
    derive_substream_seed(intermediate, attempt as u64)
}

/// Seed of the coordinator stream that drives the swap pass.
pub fn swap_seed(master_seed: u64) -> u64 {
    derive_substream_seed(master_seed ^ 0xA5A5_A5A5_A5A5_A5A5, u64::MAX)
}
