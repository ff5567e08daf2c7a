use anyhow::Result;

/// Text-embedding collaborator
///
/// Produces a fixed-length vector per text; the dimensionality must match
/// what the index was seeded with. Production deployments bind a sentence
/// encoder behind this trait.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Output vector length, fixed by the model
    fn dim(&self) -> usize;

    /// Model identifier stored with indexed entries
    fn model_name(&self) -> &str;
}

/// Deterministic feature-hashing embedder
///
/// Hashes lowercased character trigrams into `dim` signed buckets and
/// L2-normalizes the result. Identical texts always embed identically, so
/// exact seed questions retrieve at distance zero; it is the built-in
/// stand-in for a real sentence encoder.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dim];

        // Normalize: lowercase, collapse whitespace runs to single spaces
        let normalized: String = text
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        let chars: Vec<char> = normalized.chars().collect();
        if chars.is_empty() {
            return Ok(vector);
        }

        for window in chars.windows(3.min(chars.len())) {
            let h = fnv1a(window);
            let bucket = (h % self.dim as u64) as usize;
            let sign = if (h >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn model_name(&self) -> &str {
        "hash-trigram"
    }
}

fn fnv1a(chars: &[char]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for c in chars {
        let mut buf = [0u8; 4];
        for b in c.encode_utf8(&mut buf).as_bytes() {
            hash ^= u64::from(*b);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }
    hash
}
