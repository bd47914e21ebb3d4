// ============================================================
// Layer 6 — Vocabulary Store
// ============================================================
// Builds the word-level vocabulary from training source text,
// persists it, and maps sentences to ids and back.
//
// The vocabulary is written as a HuggingFace tokenizer JSON
// (WordLevel model + BertPreTokenizer) and loaded back with
// Tokenizer::from_file, so the same splitting rules apply at
// training and translation time.
//
// Id layout:
//   0 <unk>   1 <blank> (padding)   2 <s>   3 </s>
//   4..       corpus tokens, most frequent first,
//             ties broken alphabetically
//
// Reference: tokenizers crate — WordLevel, BertPreTokenizer

use anyhow::{Context, Result};
use std::{collections::HashMap, fs, path::PathBuf};
use tokenizers::{
    pre_tokenizers::bert::BertPreTokenizer,
    OffsetReferential, OffsetType, PreTokenizedString, PreTokenizer, Tokenizer,
};

pub const UNK_TOKEN: &str = "<unk>";
pub const PAD_TOKEN: &str = "<blank>";
pub const BOS_TOKEN: &str = "<s>";
pub const EOS_TOKEN: &str = "</s>";

pub const UNK_ID: u32 = 0;
pub const PAD_ID: u32 = 1;
pub const BOS_ID: u32 = 2;
pub const EOS_ID: u32 = 3;

const SPECIALS: [&str; 4] = [UNK_TOKEN, PAD_TOKEN, BOS_TOKEN, EOS_TOKEN];

/// Whitespace + punctuation split, case preserved.
pub fn pre_tokenize(text: &str) -> Result<Vec<String>> {
    let mut pre = PreTokenizedString::from(text);
    BertPreTokenizer
        .pre_tokenize(&mut pre)
        .map_err(|e| anyhow::anyhow!("Pre-tokenisation error: {e}"))?;
    Ok(pre
        .get_splits(OffsetReferential::Original, OffsetType::Byte)
        .into_iter()
        .map(|(s, _, _)| s.to_string())
        .collect())
}

/// Ordered token list: specials first, then every token seen at
/// least `min_freq` times.
pub fn build_tokens<'a>(texts: impl IntoIterator<Item = &'a str>, min_freq: usize) -> Result<Vec<String>> {
    let mut freq: HashMap<String, usize> = HashMap::new();
    for text in texts {
        for token in pre_tokenize(text)? {
            *freq.entry(token).or_insert(0) += 1;
        }
    }

    let mut words: Vec<(String, usize)> = freq
        .into_iter()
        .filter(|(w, n)| *n >= min_freq.max(1) && !SPECIALS.contains(&w.as_str()))
        .collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut tokens: Vec<String> = SPECIALS.iter().map(|s| s.to_string()).collect();
    tokens.extend(words.into_iter().map(|(w, _)| w));
    Ok(tokens)
}

// ─── Vocabulary ───────────────────────────────────────────────────────────────
pub struct Vocabulary {
    tokenizer: Tokenizer,
}

impl Vocabulary {
    pub fn len(&self) -> usize {
        self.tokenizer.get_vocab_size(false)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tokens in id order.
    pub fn tokens(&self) -> Vec<String> {
        let mut by_id: Vec<(u32, String)> = self
            .tokenizer
            .get_vocab(true)
            .into_iter()
            .map(|(t, id)| (id, t))
            .collect();
        by_id.sort_unstable_by_key(|(id, _)| *id);
        by_id.into_iter().map(|(_, t)| t).collect()
    }

    pub fn token_to_id(&self, token: &str) -> u32 {
        self.tokenizer.token_to_id(token).unwrap_or(UNK_ID)
    }

    /// `<s> ids… </s>` for one sentence.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let enc = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;
        let mut ids = Vec::with_capacity(enc.get_ids().len() + 2);
        ids.push(BOS_ID);
        ids.extend_from_slice(enc.get_ids());
        ids.push(EOS_ID);
        Ok(ids)
    }

    /// Space-joined tokens, special ids dropped.
    pub fn decode(&self, ids: &[u32]) -> String {
        ids.iter()
            .filter(|&&id| ![PAD_ID, BOS_ID, EOS_ID].contains(&id))
            .map(|&id| self.tokenizer.id_to_token(id).unwrap_or_else(|| UNK_TOKEN.to_string()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ─── VocabStore ───────────────────────────────────────────────────────────────
pub struct VocabStore {
    path: PathBuf,
}

impl VocabStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load a previously saved vocabulary.
    pub fn load(&self) -> Result<Vocabulary> {
        let tokenizer = Tokenizer::from_file(&self.path).map_err(|e| {
            anyhow::anyhow!(
                "Cannot load vocabulary from '{}': {}. Run 'train' first.",
                self.path.display(), e
            )
        })?;
        Ok(Vocabulary { tokenizer })
    }

    /// Write `tokens` (id order) as tokenizer JSON and load it back.
    pub fn save(&self, tokens: &[String]) -> Result<Vocabulary> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create '{}'", dir.display()))?;
        }

        let vocab: serde_json::Map<String, serde_json::Value> = tokens
            .iter()
            .enumerate()
            .map(|(id, t)| (t.clone(), serde_json::json!(id)))
            .collect();

        let added: Vec<serde_json::Value> = SPECIALS
            .iter()
            .enumerate()
            .map(|(id, t)| serde_json::json!({
                "id": id, "content": t, "single_word": false, "lstrip": false,
                "rstrip": false, "normalized": false, "special": true
            }))
            .collect();

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added,
            "normalizer": null,
            "pre_tokenizer": { "type": "BertPreTokenizer" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": UNK_TOKEN
            }
        });

        fs::write(&self.path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write vocabulary '{}'", self.path.display()))?;

        tracing::info!("Vocabulary of {} tokens saved to '{}'", tokens.len(), self.path.display());
        self.load()
    }
}
