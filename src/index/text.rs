//! In-memory inverted index with BM25 ranking
//!
//! Rebuilt from the `{base}_fts` table on open and after every backfill;
//! maintained incrementally after each committed mutation.

use std::collections::{BTreeMap, BTreeSet};

use unicode_segmentation::UnicodeSegmentation;

/// Term frequency saturation
const BM25_K1: f64 = 1.2;
/// Length normalization
const BM25_B: f64 = 0.75;
const MAX_TOKEN_LENGTH: usize = 255;

/// Splits text into lowercase Unicode words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words()
        .filter(|word| word.len() <= MAX_TOKEN_LENGTH)
        .map(str::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, Default)]
struct IndexedDoc {
    terms: BTreeMap<String, u32>,
    length: u32,
}

/// Term postings for one base
#[derive(Debug, Clone, Default)]
pub struct TextIndex {
    docs: BTreeMap<String, IndexedDoc>,
    postings: BTreeMap<String, BTreeMap<String, u32>>,
    total_length: u64,
}

impl TextIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from `(key, text)` pairs.
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut index = Self::new();
        for (key, text) in rows {
            index.upsert(key, text);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.docs.contains_key(key)
    }

    /// Indexes `text` under `key`, replacing any previous entry.
    pub fn upsert(&mut self, key: &str, text: &str) {
        self.remove(key);

        let mut doc = IndexedDoc::default();
        for token in tokenize(text) {
            *doc.terms.entry(token).or_insert(0) += 1;
            doc.length += 1;
        }
        for (term, tf) in &doc.terms {
            self.postings
                .entry(term.clone())
                .or_default()
                .insert(key.to_string(), *tf);
        }
        self.total_length += u64::from(doc.length);
        self.docs.insert(key.to_string(), doc);
    }

    pub fn remove(&mut self, key: &str) {
        let Some(doc) = self.docs.remove(key) else {
            return;
        };
        self.total_length -= u64::from(doc.length);
        for term in doc.terms.keys() {
            if let Some(posting) = self.postings.get_mut(term) {
                posting.remove(key);
                if posting.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
    }

    /// Returns every key containing all query terms with its BM25 rank.
    ///
    /// Higher rank is more relevant. Results are in key order.
    pub fn search(&self, query: &str) -> Vec<(String, f64)> {
        let terms: BTreeSet<String> = tokenize(query).into_iter().collect();
        if terms.is_empty() || self.docs.is_empty() {
            return Vec::new();
        }

        let mut term_postings = Vec::with_capacity(terms.len());
        for term in &terms {
            match self.postings.get(term) {
                Some(posting) => term_postings.push(posting),
                None => return Vec::new(),
            }
        }

        // Drive the intersection from the rarest term
        term_postings.sort_by_key(|posting| posting.len());
        let Some((rarest, rest)) = term_postings.split_first() else {
            return Vec::new();
        };

        let doc_count = self.docs.len() as f64;
        let avg_length = self.total_length as f64 / doc_count;

        rarest
            .keys()
            .filter(|key| rest.iter().all(|posting| posting.contains_key(*key)))
            .filter_map(|key| {
                let doc = self.docs.get(key)?;
                let rank = term_postings
                    .iter()
                    .map(|posting| {
                        let tf = f64::from(posting.get(key).copied().unwrap_or(0));
                        let df = posting.len() as f64;
                        let idf = (1.0 + (doc_count - df + 0.5) / (df + 0.5)).ln();
                        let norm = if avg_length > 0.0 {
                            f64::from(doc.length) / avg_length
                        } else {
                            0.0
                        };
                        idf * tf * (BM25_K1 + 1.0)
                            / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * norm))
                    })
                    .sum();
                Some((key.clone(), rank))
            })
            .collect()
    }
}
