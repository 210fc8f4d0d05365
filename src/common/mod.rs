//! Pieces shared by the builder and the reader: bit packing, segment codec, Reed-Solomon,
//! masking and the symbol tables.

pub mod bit_utils;
pub mod codec;
pub mod ec;
pub mod error;
pub mod iter;
pub mod mask;
pub mod metadata;
