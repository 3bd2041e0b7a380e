// ============================================================
// Layer 6 — Vocabulary Store
// ============================================================
// Builds a caption vocabulary from a corpus, and moves it to
// and from disk.
//
// The vocabulary is written as a HuggingFace tokenizer JSON
// document (WordLevel model) and read back with
// `tokenizers::Tokenizer`, so building never goes through the
// trainer API.
//
// Provisioning rules for a training run:
//   - `--vocab-path` given → load it verbatim, never write
//   - otherwise            → build from the corpus and save
//                            `vocab.json` into the run directory

use anyhow::{anyhow, Context, Result};
use std::{collections::HashMap, fs, path::Path};
use tokenizers::Tokenizer;

use crate::data::vocabulary::{split_words, Vocabulary, SPECIAL_TOKENS, UNK_TOKEN};

/// Load a vocabulary written by `save_vocab` (or `build-vocab`).
/// A missing or malformed file is an error.
pub fn load_vocab(path: &Path) -> Result<Vocabulary> {
    let bytes = fs::read(path)
        .with_context(|| format!("Cannot read vocabulary '{}'", path.display()))?;

    let tokenizer = Tokenizer::from_bytes(&bytes)
        .map_err(|e| anyhow!("Cannot parse vocabulary '{}': {e}", path.display()))?;

    let vocab = Vocabulary::from_tokenizer(tokenizer)
        .with_context(|| format!("Invalid vocabulary '{}'", path.display()))?;

    tracing::info!("Loaded vocabulary of {} tokens from '{}'", vocab.len(), path.display());
    Ok(vocab)
}

/// Write the vocabulary as pretty-printed tokenizer JSON,
/// replacing any existing file.
pub fn save_vocab(vocab: &Vocabulary, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create '{}'", parent.display()))?;
    }
    fs::write(path, vocab.to_json()?)
        .with_context(|| format!("Cannot write vocabulary to '{}'", path.display()))?;

    tracing::info!("Saved vocabulary ({} tokens) to '{}'", vocab.len(), path.display());
    Ok(())
}

/// Build a vocabulary from caption texts.
///
/// Words seen fewer than `threshold` times are left out and will
/// encode as `<unk>`. Ids after the reserved ones are assigned by
/// descending frequency, ties broken alphabetically, so the same
/// corpus always yields the same ids.
pub fn build_vocab<'a>(
    captions:  impl IntoIterator<Item = &'a str>,
    threshold: usize,
) -> Result<Vocabulary> {
    // ── Step 1: Count words ───────────────────────────────────────────────────
    let mut freq: HashMap<String, usize> = HashMap::new();
    let mut caption_count = 0usize;
    for caption in captions {
        caption_count += 1;
        for word in split_words(caption)? {
            *freq.entry(word).or_insert(0) += 1;
        }
    }

    let mut words: Vec<(String, usize)> = freq
        .into_iter()
        .filter(|(word, count)| *count >= threshold && !SPECIAL_TOKENS.contains(&word.as_str()))
        .collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    // ── Step 2: Assign ids ────────────────────────────────────────────────────
    let mut vocab = serde_json::Map::new();
    for (id, token) in SPECIAL_TOKENS.iter().enumerate() {
        vocab.insert(token.to_string(), serde_json::json!(id));
    }
    for (offset, (word, _)) in words.iter().enumerate() {
        vocab.insert(word.clone(), serde_json::json!(SPECIAL_TOKENS.len() + offset));
    }

    let added_tokens: Vec<serde_json::Value> = SPECIAL_TOKENS
        .iter()
        .enumerate()
        .map(|(id, token)| {
            serde_json::json!({
                "id": id, "content": token, "single_word": false,
                "lstrip": false, "rstrip": false, "normalized": false, "special": true
            })
        })
        .collect();

    // ── Step 3: Assemble tokenizer JSON ───────────────────────────────────────
    let tokenizer_json = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": added_tokens,
        "normalizer": { "type": "Lowercase" },
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": UNK_TOKEN
        }
    });

    let tokenizer = Tokenizer::from_bytes(serde_json::to_vec(&tokenizer_json)?)
        .map_err(|e| anyhow!("Cannot assemble vocabulary: {e}"))?;
    let vocab = Vocabulary::from_tokenizer(tokenizer)?;

    tracing::info!(
        "Built vocabulary of {} tokens from {} captions (threshold={})",
        vocab.len(),
        caption_count,
        threshold
    );
    Ok(vocab)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    const CORPUS: [&str; 3] = ["A dog runs on grass.", "A dog sleeps.", "Two cats play"];

    #[test]
    fn test_threshold_drops_rare_words() {
        let all    = build_vocab(CORPUS.iter().copied(), 1).unwrap();
        let common = build_vocab(CORPUS.iter().copied(), 2).unwrap();

        assert!(all.token_to_id("grass").is_some());
        assert!(common.token_to_id("grass").is_none());
        assert!(common.token_to_id("dog").is_some());
        // reserved + {a, dog, .}
        assert_eq!(common.len(), 4 + 3);
    }

    #[test]
    fn test_ids_follow_frequency() {
        let v = build_vocab(CORPUS.iter().copied(), 1).unwrap();
        // "a" and "dog" (2 each) come right after the reserved ids, alphabetically
        assert_eq!(v.token_to_id("."),   Some(4));
        assert_eq!(v.token_to_id("a"),   Some(5));
        assert_eq!(v.token_to_id("dog"), Some(6));
    }

    #[test]
    fn test_save_then_load_preserves_mapping() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("vocab.json");

        let built = build_vocab(CORPUS.iter().copied(), 1).unwrap();
        save_vocab(&built, &path).unwrap();
        let loaded = load_vocab(&path).unwrap();

        assert_eq!(loaded.len(), built.len());
        assert_eq!(
            loaded.encode_caption("two dogs play", None).unwrap(),
            built.encode_caption("two dogs play", None).unwrap()
        );
    }

    #[test]
    fn test_missing_or_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_vocab(&dir.path().join("absent.json")).is_err());

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, b"not json").unwrap();
        assert!(load_vocab(&corrupt).is_err());
    }
}
