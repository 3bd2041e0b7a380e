// ============================================================
// Layer 4 — Caption Vocabulary
// ============================================================
// Bidirectional token ↔ id mapping used to turn captions into
// integer sequences and to size the decoder's output layer.
//
// The mapping is a `tokenizers` WordLevel model with a
// lowercase normaliser and a whitespace pre-tokenizer, so the
// same JSON file can be reused by any tool that reads
// HuggingFace tokenizer files.
//
// Reserved ids (fixed across every vocabulary we build):
//   0 → <pad>    padding after the end of a caption
//   1 → <start>  first token of every caption
//   2 → <end>    last token of every caption
//   3 → <unk>    any word not in the vocabulary

use anyhow::{anyhow, bail, Result};
use tokenizers::{
    normalizers::Lowercase,
    pre_tokenizers::whitespace::Whitespace,
    NormalizedString, Normalizer, OffsetReferential, OffsetType, PreTokenizedString, PreTokenizer,
    Tokenizer,
};

pub const PAD_TOKEN:   &str = "<pad>";
pub const START_TOKEN: &str = "<start>";
pub const END_TOKEN:   &str = "<end>";
pub const UNK_TOKEN:   &str = "<unk>";

pub const PAD_ID:   u32 = 0;
pub const START_ID: u32 = 1;
pub const END_ID:   u32 = 2;
pub const UNK_ID:   u32 = 3;

/// Special tokens in id order.
pub const SPECIAL_TOKENS: [&str; 4] = [PAD_TOKEN, START_TOKEN, END_TOKEN, UNK_TOKEN];

/// A loaded or freshly built caption vocabulary.
#[derive(Clone)]
pub struct Vocabulary {
    tokenizer: Tokenizer,
}

impl Vocabulary {
    /// Wrap a tokenizer, checking that the reserved ids are where
    /// the rest of the pipeline expects them.
    pub fn from_tokenizer(tokenizer: Tokenizer) -> Result<Self> {
        let vocab = Self { tokenizer };
        for (expected, token) in SPECIAL_TOKENS.iter().enumerate() {
            match vocab.token_to_id(token) {
                Some(id) if id == expected as u32 => {}
                Some(id) => bail!(
                    "vocabulary maps '{token}' to id {id}, expected {expected}"
                ),
                None => bail!("vocabulary is missing the reserved token '{token}'"),
            }
        }
        Ok(vocab)
    }

    /// Number of distinct ids. The reserved tokens are part of the
    /// WordLevel model itself, so added tokens are not counted twice.
    pub fn len(&self) -> usize {
        self.tokenizer.get_vocab_size(false)
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.tokenizer.token_to_id(token)
    }

    /// Encode a caption as `<start> w1 … wn <end>`.
    ///
    /// With `max_len`, the sequence is cut to `max_len` ids and the
    /// last kept position is overwritten with `<end>`, so every
    /// encoded caption still terminates.
    pub fn encode_caption(&self, caption: &str, max_len: Option<usize>) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(caption, false)
            .map_err(|e| anyhow!("cannot tokenise caption '{caption}': {e}"))?;

        let mut ids = Vec::with_capacity(encoding.get_ids().len() + 2);
        ids.push(START_ID);
        ids.extend_from_slice(encoding.get_ids());
        ids.push(END_ID);

        if let Some(max) = max_len {
            if ids.len() > max {
                ids.truncate(max.max(2));
                if let Some(last) = ids.last_mut() {
                    *last = END_ID;
                }
            }
        }
        Ok(ids)
    }

    /// Serialise as a tokenizer JSON document.
    pub fn to_json(&self) -> Result<String> {
        self.tokenizer
            .to_string(true)
            .map_err(|e| anyhow!("cannot serialise vocabulary: {e}"))
    }
}

impl std::fmt::Debug for Vocabulary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vocabulary").field("len", &self.len()).finish()
    }
}

/// Split text with the vocabulary's own normaliser and
/// pre-tokenizer, so every counted word is one that encoding
/// can produce.
pub fn split_words(text: &str) -> Result<Vec<String>> {
    let mut normalized = NormalizedString::from(text);
    Lowercase
        .normalize(&mut normalized)
        .map_err(|e| anyhow!("cannot normalise '{text}': {e}"))?;

    let mut pretokenized = PreTokenizedString::from(normalized);
    Whitespace::default()
        .pre_tokenize(&mut pretokenized)
        .map_err(|e| anyhow!("cannot split '{text}': {e}"))?;

    Ok(pretokenized
        .get_splits(OffsetReferential::Original, OffsetType::Byte)
        .into_iter()
        .map(|(word, _, _)| word.to_string())
        .collect())
}
