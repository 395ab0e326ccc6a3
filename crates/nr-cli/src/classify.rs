//! Top-k selection over dequantized model outputs.

/// One scored class from a model output.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub class: usize,
    pub score: f32,
}

/// Select the `k` best-scoring classes, highest score first.
///
/// Ties break toward the lower class index, so the ranking is total and
/// stable across runs.
pub fn top_k(scores: &[f32], k: usize) -> Vec<Classification> {
    let mut ranked: Vec<Classification> = scores
        .iter()
        .enumerate()
        .map(|(class, &score)| Classification { class, score })
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.class.cmp(&b.class))
    });
    ranked.truncate(k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes(ranked: &[Classification]) -> Vec<usize> {
        ranked.iter().map(|c| c.class).collect()
    }

    #[test]
    fn test_top_k_breaks_ties_by_index() {
        let ranked = top_k(&[10.0, 50.0, 20.0, 50.0, 5.0], 3);
        assert_eq!(classes(&ranked), vec![1, 3, 2]);
        assert_eq!(ranked[0].score, 50.0);
        assert_eq!(ranked[1].score, 50.0);
        assert_eq!(ranked[2].score, 20.0);
    }

    #[test]
    fn test_top_k_zero() {
        assert!(top_k(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn test_top_k_larger_than_input() {
        let ranked = top_k(&[0.2, 0.8], 5);
        assert_eq!(classes(&ranked), vec![1, 0]);
    }

    #[test]
    fn test_top_k_empty_scores() {
        assert!(top_k(&[], 3).is_empty());
    }
}
