use crate::core::{NerError, Result};
use candle_nn::VarBuilder;

/// Linear-chain transition scores. `transitions[i][j]` scores moving from
/// tag `i` to tag `j`.
#[derive(Debug, Clone)]
pub struct Crf {
    start: Vec<f32>,
    end: Vec<f32>,
    transitions: Vec<Vec<f32>>,
}

impl Crf {
    pub fn new(start: Vec<f32>, end: Vec<f32>, transitions: Vec<Vec<f32>>) -> Result<Self> {
        let n = start.len();
        if n == 0 {
            return Err(NerError::Inference("CRF needs at least one tag".to_string()));
        }
        if end.len() != n {
            return Err(NerError::mismatch("crf.end_transitions", n, end.len()));
        }
        if transitions.len() != n {
            return Err(NerError::mismatch("crf.transitions rows", n, transitions.len()));
        }
        if let Some(row) = transitions.iter().find(|row| row.len() != n) {
            return Err(NerError::mismatch("crf.transitions columns", n, row.len()));
        }
        Ok(Self {
            start,
            end,
            transitions,
        })
    }

    pub fn load(vb: VarBuilder, num_tags: usize) -> candle_core::Result<Self> {
        let start = vb.get(num_tags, "start_transitions")?.to_vec1::<f32>()?;
        let end = vb.get(num_tags, "end_transitions")?.to_vec1::<f32>()?;
        let transitions = vb.get((num_tags, num_tags), "transitions")?.to_vec2::<f32>()?;
        Ok(Self {
            start,
            end,
            transitions,
        })
    }

    pub fn num_tags(&self) -> usize {
        self.start.len()
    }

    /// Total score of `tags` over the given emissions.
    #[cfg(test)]
    pub(crate) fn score(&self, emissions: &[Vec<f32>], tags: &[usize]) -> f32 {
        let Some((&first, rest)) = tags.split_first() else {
            return 0.0;
        };
        let mut total = self.start[first] + emissions[0][first];
        let mut prev = first;
        for (t, &tag) in rest.iter().enumerate() {
            total += self.transitions[prev][tag] + emissions[t + 1][tag];
            prev = tag;
        }
        total + self.end[prev]
    }

    /// Highest scoring tag sequence (Viterbi).
    ///
    /// `emissions` holds one score row per position. `mask` marks valid
    /// positions; valid positions must form a prefix starting at 0. The
    /// returned path covers exactly the valid positions.
    pub fn decode(&self, emissions: &[Vec<f32>], mask: &[bool]) -> Result<Vec<usize>> {
        let n = self.num_tags();
        if emissions.is_empty() {
            return Ok(Vec::new());
        }
        if mask.len() != emissions.len() {
            return Err(NerError::Inference(format!(
                "mask length {} does not match sequence length {}",
                mask.len(),
                emissions.len()
            )));
        }
        if let Some(row) = emissions.iter().find(|row| row.len() != n) {
            return Err(NerError::Inference(format!(
                "emission row has {} scores, expected {}",
                row.len(),
                n
            )));
        }
        if !mask[0] {
            return Err(NerError::Inference(
                "the first position of the mask must be valid".to_string(),
            ));
        }
        let valid = mask.iter().take_while(|&&m| m).count();
        if mask[valid..].iter().any(|&m| m) {
            return Err(NerError::Inference(
                "mask must mark a contiguous prefix".to_string(),
            ));
        }

        let mut score: Vec<f32> = (0..n).map(|j| self.start[j] + emissions[0][j]).collect();
        let mut backpointers: Vec<Vec<usize>> = Vec::with_capacity(valid.saturating_sub(1));

        for row in &emissions[1..valid] {
            let mut next = vec![f32::NEG_INFINITY; n];
            let mut pointers = vec![0usize; n];
            for j in 0..n {
                let (best_i, best) = argmax((0..n).map(|i| score[i] + self.transitions[i][j]));
                next[j] = best + row[j];
                pointers[j] = best_i;
            }
            score = next;
            backpointers.push(pointers);
        }

        let (mut last, _) = argmax((0..n).map(|j| score[j] + self.end[j]));
        let mut path = Vec::with_capacity(valid);
        path.push(last);
        for pointers in backpointers.iter().rev() {
            last = pointers[last];
            path.push(last);
        }
        path.reverse();
        Ok(path)
    }
}

/// Index and value of the first maximum.
fn argmax<I: Iterator<Item = f32>>(values: I) -> (usize, f32) {
    let mut best = (0, f32::NEG_INFINITY);
    for (i, v) in values.enumerate() {
        if v > best.1 {
            best = (i, v);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crf(transitions: Vec<Vec<f32>>) -> Crf {
        let n = transitions.len();
        Crf::new(vec![0.0; n], vec![0.0; n], transitions).unwrap()
    }

    fn brute_force(crf: &Crf, emissions: &[Vec<f32>]) -> (Vec<usize>, f32) {
        let n = crf.num_tags();
        let len = emissions.len();
        let mut best = (Vec::new(), f32::NEG_INFINITY);
        for code in 0..n.pow(len as u32) {
            let mut tags = Vec::with_capacity(len);
            let mut c = code;
            for _ in 0..len {
                tags.push(c % n);
                c /= n;
            }
            let s = crf.score(emissions, &tags);
            if s > best.1 {
                best = (tags, s);
            }
        }
        best
    }

    #[test]
    fn test_no_transitions_is_per_position_argmax() {
        let crf = crf(vec![vec![0.0; 3]; 3]);
        let emissions = vec![vec![1.0, 5.0, 0.0], vec![3.0, 0.0, 0.0], vec![0.0, 0.0, 2.0]];
        assert_eq!(crf.decode(&emissions, &[true; 3]).unwrap(), vec![1, 0, 2]);
    }

    #[test]
    fn test_transitions_override_local_choice() {
        // Tags: 0 = O, 1 = B, 2 = I. O -> I is heavily penalised, so the
        // second position flips from its local best (O) to B to license I.
        let mut t = vec![vec![0.0; 3]; 3];
        t[0][2] = -10.0;
        let crf = crf(t);
        let emissions = vec![vec![0.0, 0.0, 0.0], vec![2.0, 1.5, 0.0], vec![0.0, 0.0, 4.0]];

        let path = crf.decode(&emissions, &[true; 3]).unwrap();
        assert_eq!(path, vec![0, 1, 2]);
        assert!((crf.score(&emissions, &path) - 5.5).abs() < 1e-6);
    }

    #[test]
    fn test_start_and_end_scores() {
        let crf = Crf::new(
            vec![-5.0, 0.0],
            vec![0.0, -5.0],
            vec![vec![0.0, 0.0], vec![0.0, 0.0]],
        )
        .unwrap();
        // Locally tag 0 wins at the start and tag 1 at the end, but the start
        // and end scores forbid both.
        let emissions = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert_eq!(crf.decode(&emissions, &[true, true]).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_matches_exhaustive_search() {
        let crf = Crf::new(
            vec![0.3, -0.2, 0.1],
            vec![-0.1, 0.4, 0.0],
            vec![
                vec![0.5, -1.0, 0.2],
                vec![-0.3, 0.8, -0.6],
                vec![0.1, 0.0, -0.4],
            ],
        )
        .unwrap();
        let emissions = vec![
            vec![0.2, 1.1, -0.5],
            vec![0.9, -0.2, 0.3],
            vec![-0.7, 0.4, 0.6],
            vec![0.1, 0.1, 0.8],
        ];

        let path = crf.decode(&emissions, &[true; 4]).unwrap();
        let (expected, best) = brute_force(&crf, &emissions);
        assert_eq!(path, expected);
        assert!((crf.score(&emissions, &path) - best).abs() < 1e-5);
    }

    #[test]
    fn test_mask_truncates_path() {
        let crf = crf(vec![vec![0.0; 2]; 2]);
        let emissions = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![9.0, 0.0]];
        let path = crf.decode(&emissions, &[true, true, false]).unwrap();
        assert_eq!(path, vec![0, 1]);
    }

    #[test]
    fn test_single_position() {
        let crf = crf(vec![vec![0.0; 2]; 2]);
        assert_eq!(crf.decode(&[vec![0.0, 2.0]], &[true]).unwrap(), vec![1]);
    }

    #[test]
    fn test_invalid_inputs() {
        let crf = crf(vec![vec![0.0; 2]; 2]);
        let emissions = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert!(crf.decode(&emissions, &[true]).is_err());
        assert!(crf.decode(&emissions, &[false, true]).is_err());
        assert!(crf.decode(&[vec![1.0, 0.0], vec![1.0], vec![0.0, 0.0]], &[true; 3]).is_err());
        assert!(crf.decode(&[vec![0.0; 2], vec![0.0; 2], vec![0.0; 2]], &[true, false, true]).is_err());
        assert!(crf.decode(&[], &[]).unwrap().is_empty());
    }

    #[test]
    fn test_new_validates_shapes() {
        assert!(Crf::new(vec![0.0; 2], vec![0.0; 3], vec![vec![0.0; 2]; 2]).is_err());
        assert!(Crf::new(vec![0.0; 2], vec![0.0; 2], vec![vec![0.0; 3]; 2]).is_err());
        assert!(Crf::new(vec![], vec![], vec![]).is_err());
    }
}
