use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use nw_model::Vocabulary;
use nw_tensor::{Shape, Tensor};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{Result, TrainError};

/// Standard deviation of the random fallback initialisation.
pub const RANDOM_INIT_STD: f32 = 0.01;

/// Word vectors read from a whitespace-separated text file.
#[derive(Debug, Default)]
pub struct EmbeddingIndex {
    pub vectors: HashMap<String, Vec<f32>>,
    pub dim: usize,
    /// Lines skipped for a parse error or a wrong width.
    pub skipped: usize,
}

/// Resulting embedding matrix and where it came from.
#[derive(Debug)]
pub struct EmbeddingMatrix {
    pub matrix: Tensor,
    /// Human-readable source, e.g. `glove.6B.300d.txt` or `random`.
    pub source: String,
    /// Vocabulary words that received a pretrained vector.
    pub found: usize,
}

/// First existing path among `candidates`.
pub fn find_embeddings(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| p.is_file()).cloned()
}

/// Parse `word v1 v2 ... vdim` lines, keeping only vectors of width `dim`.
pub fn load_embedding_index(path: &Path, dim: usize) -> Result<EmbeddingIndex> {
    let reader = BufReader::new(File::open(path)?);
    let mut index = EmbeddingIndex {
        dim,
        ..EmbeddingIndex::default()
    };

    for line in reader.lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let Some(word) = parts.next() else {
            continue;
        };
        let vector: std::result::Result<Vec<f32>, _> = parts.map(str::parse::<f32>).collect();
        match vector {
            Ok(v) if v.len() == dim => {
                index.vectors.insert(word.to_string(), v);
            }
            _ => index.skipped += 1,
        }
    }

    tracing::info!(
        path = %path.display(),
        vectors = index.vectors.len(),
        skipped = index.skipped,
        "embedding index loaded"
    );
    Ok(index)
}

/// Build the `[vocab.len(), dim]` embedding matrix.
///
/// With an index, rows of words it knows are copied and the rest stay
/// zero. Without one every row is drawn from N(0, 0.01^2).
pub fn build_embedding_matrix<R: Rng + ?Sized>(
    vocab: &Vocabulary,
    index: Option<(&EmbeddingIndex, &str)>,
    dim: usize,
    rng: &mut R,
) -> Result<EmbeddingMatrix> {
    let shape = Shape::matrix(vocab.len(), dim);
    let Some((index, source)) = index else {
        let normal =
            Normal::new(0.0f32, RANDOM_INIT_STD).map_err(|e| TrainError::Msg(e.to_string()))?;
        let data: Vec<f32> = (0..shape.numel()).map(|_| normal.sample(rng)).collect();
        return Ok(EmbeddingMatrix {
            matrix: Tensor::try_new(data, shape)?,
            source: "random".to_string(),
            found: 0,
        });
    };

    if index.dim != dim {
        return Err(TrainError::Msg(format!(
            "embedding index has width {}, model expects {dim}",
            index.dim
        )));
    }

    let mut matrix = Tensor::zeros(shape);
    let mut found = 0;
    for (id, word) in vocab.iter() {
        if let Some(vector) = index.vectors.get(word) {
            matrix.set_row(id as usize, vector)?;
            found += 1;
        }
    }
    Ok(EmbeddingMatrix {
        matrix,
        source: source.to_string(),
        found,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::fs;

    fn vocab() -> Vocabulary {
        Vocabulary::from_words(["the", "king", "queen"].map(String::from)).unwrap()
    }

    #[test]
    fn test_load_skips_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vec.txt");
        fs::write(&path, "the 0.1 0.2 0.3\nking 1 2\nqueen x 1 2\n\nhorse 0.5 0.5 0.5\n").unwrap();

        let index = load_embedding_index(&path, 3).unwrap();
        assert_eq!(index.vectors.len(), 2);
        assert_eq!(index.skipped, 2);
        assert_eq!(index.vectors["the"], vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_matrix_from_index() {
        let mut index = EmbeddingIndex {
            dim: 2,
            ..EmbeddingIndex::default()
        };
        index.vectors.insert("king".to_string(), vec![1.0, -1.0]);
        index.vectors.insert("horse".to_string(), vec![3.0, 3.0]);

        let vocab = vocab();
        let mut rng = StdRng::seed_from_u64(0);
        let out = build_embedding_matrix(&vocab, Some((&index, "vec.txt")), 2, &mut rng).unwrap();
        assert_eq!(out.found, 1);
        assert_eq!(out.source, "vec.txt");
        assert_eq!(out.matrix.row(vocab.id("king").unwrap() as usize).unwrap(), &[1.0, -1.0]);
        assert_eq!(out.matrix.row(vocab.id("the").unwrap() as usize).unwrap(), &[0.0, 0.0]);
    }

    #[test]
    fn test_random_fallback_is_small() {
        let mut rng = StdRng::seed_from_u64(0);
        let out = build_embedding_matrix(&vocab(), None, 8, &mut rng).unwrap();
        assert_eq!(out.source, "random");
        assert_eq!(out.matrix.shape().dims(), &[5, 8]);
        assert!(out.matrix.data().iter().all(|v| v.abs() < 0.1));
        assert!(out.matrix.data().iter().any(|v| *v != 0.0));
    }

    #[test]
    fn test_find_embeddings_takes_first_existing() {
        let dir = tempfile::tempdir().unwrap();
        let b = dir.path().join("b.txt");
        fs::write(&b, "x 1").unwrap();
        let candidates = vec![dir.path().join("a.txt"), b.clone(), dir.path().join("c.txt")];
        assert_eq!(find_embeddings(&candidates), Some(b));
        assert_eq!(find_embeddings(&candidates[..1]), None);
    }
}
