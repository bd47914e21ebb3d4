// ============================================================
// Layer 4 — ELMo Character Ids
// ============================================================
// ELMo does not use a word vocabulary: every token is fed to
// the model as a fixed-width row of character (byte) ids.
//
// Row layout for one token (max_chars = 50):
//   [BOW, b0, b1, ..., bn, EOW, PAD, PAD, ...]
// where b* are the token's UTF-8 bytes (at most max_chars - 2).
//
// Each sentence is wrapped in boundary tokens whose rows hold a
// single reserved character:
//   <S>  → [BOW, BOS, EOW, PAD...]
//   </S> → [BOW, EOS, EOW, PAD...]
//
// Every id is shifted by +1 so that 0 can mean "no token here";
// sentences shorter than the longest in the batch are padded
// with all-zero rows.
//
// Reference: Peters et al. (2018) Deep contextualized word representations

/// Raw character-id constants (before the +1 shift).
pub const BOS_CHAR: i32 = 256;
pub const EOS_CHAR: i32 = 257;
pub const BOW_CHAR: i32 = 258;
pub const EOW_CHAR: i32 = 259;
pub const PAD_CHAR: i32 = 260;

pub const BOS_TOKEN: &str = "<S>";
pub const EOS_TOKEN: &str = "</S>";

/// Character ids for a whole batch, flattened row-major as
/// `[batch, timesteps, max_chars]`. `timesteps` includes the two
/// boundary tokens.
#[derive(Debug, Clone)]
pub struct CharacterBatch {
    pub ids:       Vec<i32>,
    pub batch:     usize,
    pub timesteps: usize,
    pub max_chars: usize,
    /// Token count of each sentence, boundaries excluded
    pub lengths:   Vec<usize>,
}

impl CharacterBatch {
    /// 1.0 for the boundary tokens and real tokens, 0.0 for padding.
    /// Row-major `[batch, timesteps]`.
    pub fn mask(&self) -> Vec<f32> {
        let mut mask = vec![0.0f32; self.batch * self.timesteps];
        for (b, &len) in self.lengths.iter().enumerate() {
            for t in 0..len + 2 {
                mask[b * self.timesteps + t] = 1.0;
            }
        }
        mask
    }
}

/// Maps tokens to shifted character-id rows.
#[derive(Debug, Clone)]
pub struct CharacterMapper {
    max_chars: usize,
}

impl CharacterMapper {
    pub fn new(max_chars: usize) -> Self {
        assert!(max_chars >= 3, "max_chars ({max_chars}) must fit BOW, one char and EOW");
        Self { max_chars }
    }

    /// Shifted ids for one token.
    pub fn token_ids(&self, token: &str) -> Vec<i32> {
        match token {
            BOS_TOKEN => self.reserved(BOS_CHAR),
            EOS_TOKEN => self.reserved(EOS_CHAR),
            _ => {
                let mut row = vec![PAD_CHAR; self.max_chars];
                let bytes   = token.as_bytes();
                let n       = bytes.len().min(self.max_chars - 2);
                row[0] = BOW_CHAR;
                for (i, &b) in bytes[..n].iter().enumerate() {
                    row[i + 1] = b as i32;
                }
                row[n + 1] = EOW_CHAR;
                row.into_iter().map(|c| c + 1).collect()
            }
        }
    }

    fn reserved(&self, character: i32) -> Vec<i32> {
        let mut row = vec![PAD_CHAR; self.max_chars];
        row[0] = BOW_CHAR;
        row[1] = character;
        row[2] = EOW_CHAR;
        row.into_iter().map(|c| c + 1).collect()
    }

    /// Build the padded, boundary-wrapped id grid for a batch.
    pub fn batch_ids(&self, sentences: &[Vec<String>]) -> CharacterBatch {
        let lengths: Vec<usize> = sentences.iter().map(Vec::len).collect();
        let timesteps = lengths.iter().copied().max().unwrap_or(0) + 2;
        let row_len   = self.max_chars;
        let mut ids   = vec![0i32; sentences.len() * timesteps * row_len];

        for (b, sentence) in sentences.iter().enumerate() {
            let base  = b * timesteps * row_len;
            let mut put = |t: usize, row: Vec<i32>| {
                let start = base + t * row_len;
                ids[start..start + row_len].copy_from_slice(&row);
            };
            put(0, self.token_ids(BOS_TOKEN));
            for (t, token) in sentence.iter().enumerate() {
                put(t + 1, self.token_ids(token));
            }
            put(sentence.len() + 1, self.token_ids(EOS_TOKEN));
        }

        CharacterBatch {
            ids,
            batch: sentences.len(),
            timesteps,
            max_chars: row_len,
            lengths,
        }
    }
}

impl Default for CharacterMapper {
    fn default() -> Self {
        Self::new(50)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_row_layout() {
        let m   = CharacterMapper::new(8);
        let row = m.token_ids("ab");
        assert_eq!(row, vec![259, 98, 99, 260, 261, 261, 261, 261]);
    }

    #[test]
    fn test_long_token_is_truncated() {
        let m   = CharacterMapper::new(5);
        let row = m.token_ids("abcdef");
        // BOW + 3 bytes + EOW
        assert_eq!(row, vec![259, 98, 99, 100, 260]);
    }

    #[test]
    fn test_boundary_rows() {
        let m = CharacterMapper::new(5);
        assert_eq!(m.token_ids(BOS_TOKEN), vec![259, 257, 260, 261, 261]);
        assert_eq!(m.token_ids(EOS_TOKEN), vec![259, 258, 260, 261, 261]);
    }

    #[test]
    fn test_batch_padding_and_mask() {
        let m = CharacterMapper::new(4);
        let batch = m.batch_ids(&[
            vec!["a".to_string(), "b".to_string()],
            vec!["c".to_string()],
        ]);
        assert_eq!(batch.timesteps, 4);
        assert_eq!(batch.ids.len(), 2 * 4 * 4);
        // second sentence: <S> c </S> then one zero row
        let last_row = &batch.ids[(4 + 3) * 4..(4 + 4) * 4];
        assert!(last_row.iter().all(|&c| c == 0));
        assert_eq!(batch.mask(), vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_empty_sentence_still_has_boundaries() {
        let m     = CharacterMapper::default();
        let batch = m.batch_ids(&[Vec::new()]);
        assert_eq!(batch.timesteps, 2);
        assert_eq!(batch.lengths, vec![0]);
    }
}
