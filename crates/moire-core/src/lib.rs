#![deny(missing_docs)]
#![doc = "Foundations for the moire engine: data, randomness, enumeration and log-domain numerics."]

pub mod combinations;
pub mod data;
pub mod errors;
pub mod numeric;
pub mod observation;
pub mod rng;

pub use combinations::{allele_copies, enumerate_multisets, multiset_count, MultisetCache};
pub use data::GenotypingData;
pub use errors::{ErrorInfo, MoireError};
pub use observation::{prob_any_missing, IndependentStrainDetection, MissingAlleleModel};
pub use rng::{derive_substream_seed, RngHandle};
