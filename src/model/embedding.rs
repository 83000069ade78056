use rig::embeddings::Embedding;

/// Conversion between embedding vectors and their stored binary form
///
/// Vectors are stored as little-endian `f32`, four bytes per dimension.
pub trait EmbeddingConversion {
    fn to_binary(&self) -> Vec<u8>;
}

impl EmbeddingConversion for [f64] {
    fn to_binary(&self) -> Vec<u8> {
        self.iter().flat_map(|f| (*f as f32).to_le_bytes()).collect()
    }
}

impl EmbeddingConversion for Embedding {
    fn to_binary(&self) -> Vec<u8> {
        self.vec.to_binary()
    }
}

/// Decode a stored blob; `None` if its length is not a whole number of `f32`s
pub fn from_binary(binary: &[u8]) -> Option<Vec<f64>> {
    if binary.len() % 4 != 0 {
        return None;
    }
    Some(
        binary
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f64)
            .collect(),
    )
}
