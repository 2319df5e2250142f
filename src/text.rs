//! Text feature extraction
//!
//! Tokenization and n-gram count vectorization for the text-classification
//! pipeline. The learned vocabulary is laid out in lexicographic order so a
//! fitted vectorizer has an identical feature index layout on every run.

use crate::error::{ModelPortError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Common English stop words excluded from the vocabulary.
const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "am", "an", "and", "any", "are", "as", "at",
    "be", "because", "been", "before", "being", "below", "between", "both", "but", "by", "can",
    "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from", "further", "had",
    "has", "have", "having", "he", "her", "here", "hers", "him", "his", "how", "i", "if", "in",
    "into", "is", "it", "its", "just", "me", "more", "most", "my", "no", "nor", "not", "now", "of",
    "off", "on", "once", "only", "or", "other", "our", "ours", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom", "why",
    "will", "with", "you", "your", "yours",
];

/// Word tokenizer: lowercases, splits on non-alphanumerics, filters short
/// tokens and stop words.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextTokenizer {
    lowercase: bool,
    min_token_length: usize,
    stop_words: Vec<String>,
}

impl TextTokenizer {
    pub fn new() -> Self {
        Self {
            lowercase: true,
            min_token_length: 2,
            stop_words: Vec::new(),
        }
    }

    pub fn with_english_stop_words(mut self) -> Self {
        self.stop_words = ENGLISH_STOP_WORDS.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn stop_words(&self) -> &[String] {
        &self.stop_words
    }

    pub fn min_token_length(&self) -> usize {
        self.min_token_length
    }

    pub fn lowercase(&self) -> bool {
        self.lowercase
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let processed = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        processed
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty())
            .filter(|s| s.len() >= self.min_token_length)
            .filter(|s| !self.stop_words.iter().any(|w| w == s))
            .map(|s| s.to_string())
            .collect()
    }
}

impl Default for TextTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Count-based n-gram vectorizer.
///
/// Maps raw text to fixed-dimension count vectors. The vocabulary is learned
/// at fit time from the training documents only: n-grams in the configured
/// range are counted per document, and any n-gram appearing in fewer than
/// `min_df` documents is excluded. Surviving terms are sorted
/// lexicographically and assigned indices in that order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountVectorizer {
    tokenizer: TextTokenizer,
    vocabulary: HashMap<String, usize>,
    min_df: usize,
    ngram_range: (usize, usize),
    binary: bool,
}

impl CountVectorizer {
    pub fn new() -> Self {
        Self {
            tokenizer: TextTokenizer::new().with_english_stop_words(),
            vocabulary: HashMap::new(),
            min_df: 1,
            ngram_range: (1, 1),
            binary: false,
        }
    }

    /// Minimum number of documents a term must appear in.
    pub fn with_min_df(mut self, min_df: usize) -> Self {
        self.min_df = min_df.max(1);
        self
    }

    pub fn with_ngram_range(mut self, min: usize, max: usize) -> Self {
        self.ngram_range = (min.max(1), max.max(min));
        self
    }

    /// Emit 0/1 presence indicators instead of counts.
    pub fn with_binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }

    pub fn tokenizer(&self) -> &TextTokenizer {
        &self.tokenizer
    }

    pub fn ngram_range(&self) -> (usize, usize) {
        self.ngram_range
    }

    pub fn is_binary(&self) -> bool {
        self.binary
    }

    pub fn is_fitted(&self) -> bool {
        !self.vocabulary.is_empty()
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn contains_term(&self, term: &str) -> bool {
        self.vocabulary.contains_key(term)
    }

    /// Vocabulary terms in feature-index order.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = vec![String::new(); self.vocabulary.len()];
        for (term, &idx) in &self.vocabulary {
            names[idx] = term.clone();
        }
        names
    }

    fn generate_ngrams(&self, tokens: &[String]) -> Vec<String> {
        let mut ngrams = Vec::new();

        for n in self.ngram_range.0..=self.ngram_range.1 {
            if tokens.len() >= n {
                for i in 0..=(tokens.len() - n) {
                    ngrams.push(tokens[i..i + n].join(" "));
                }
            }
        }

        ngrams
    }

    /// Learn the vocabulary from the training documents.
    pub fn fit(&mut self, documents: &[String]) -> Result<()> {
        if documents.is_empty() {
            return Err(ModelPortError::InsufficientData(
                "no documents to fit vectorizer on".to_string(),
            ));
        }

        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let tokens = self.tokenizer.tokenize(doc);
            let ngrams = self.generate_ngrams(&tokens);

            let unique: HashSet<&String> = ngrams.iter().collect();
            for ngram in unique {
                *doc_freq.entry(ngram.clone()).or_insert(0) += 1;
            }
        }

        let mut terms: Vec<String> = doc_freq
            .into_iter()
            .filter(|(_, count)| *count >= self.min_df)
            .map(|(term, _)| term)
            .collect();
        terms.sort();

        if terms.is_empty() {
            return Err(ModelPortError::InsufficientData(format!(
                "no term reached the minimum document frequency of {}",
                self.min_df
            )));
        }

        self.vocabulary.clear();
        for (idx, term) in terms.into_iter().enumerate() {
            self.vocabulary.insert(term, idx);
        }

        Ok(())
    }

    /// Vectorize documents against the learned vocabulary.
    pub fn transform(&self, documents: &[String]) -> Result<Array2<f64>> {
        if self.vocabulary.is_empty() {
            return Err(ModelPortError::NotFitted);
        }

        let n_docs = documents.len();
        let n_features = self.vocabulary.len();
        let mut result = Array2::zeros((n_docs, n_features));

        for (doc_idx, doc) in documents.iter().enumerate() {
            let tokens = self.tokenizer.tokenize(doc);
            let ngrams = self.generate_ngrams(&tokens);

            for ngram in &ngrams {
                if let Some(&idx) = self.vocabulary.get(ngram.as_str()) {
                    if self.binary {
                        result[[doc_idx, idx]] = 1.0;
                    } else {
                        result[[doc_idx, idx]] += 1.0;
                    }
                }
            }
        }

        Ok(result)
    }

    /// Vectorize a single document.
    pub fn transform_one(&self, document: &str) -> Result<Array1<f64>> {
        let matrix = self.transform(std::slice::from_ref(&document.to_string()))?;
        Ok(matrix.row(0).to_owned())
    }

    pub fn fit_transform(&mut self, documents: &[String]) -> Result<Array2<f64>> {
        self.fit(documents)?;
        self.transform(documents)
    }
}

impl Default for CountVectorizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenizer_filters() {
        let tokenizer = TextTokenizer::new().with_english_stop_words();
        let tokens = tokenizer.tokenize("The food was GREAT, I loved it!");
        assert_eq!(tokens, vec!["food", "great", "loved"]);
    }

    #[test]
    fn test_vocabulary_is_sorted_and_filtered() {
        let docs: Vec<String> = vec![
            "great food great service".to_string(),
            "great food bad service".to_string(),
            "great day".to_string(),
        ];

        let mut vectorizer = CountVectorizer::new().with_min_df(2);
        vectorizer.fit(&docs).unwrap();

        // "bad" and "day" appear in one document each and are dropped
        assert!(!vectorizer.contains_term("bad"));
        assert!(!vectorizer.contains_term("day"));

        let names = vectorizer.feature_names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(names.contains(&"food".to_string()));
        assert!(names.contains(&"great".to_string()));
        assert!(names.contains(&"service".to_string()));
    }

    #[test]
    fn test_bigrams_counted() {
        let docs: Vec<String> = vec![
            "great food here".to_string(),
            "great food there".to_string(),
        ];

        let mut vectorizer = CountVectorizer::new().with_min_df(2).with_ngram_range(1, 2);
        let matrix = vectorizer.fit_transform(&docs).unwrap();

        assert!(vectorizer.contains_term("great food"));
        assert_eq!(matrix.nrows(), 2);
        let names = vectorizer.feature_names();
        let idx = names.iter().position(|n| n == "great food").unwrap();
        assert_eq!(matrix[[0, idx]], 1.0);
        assert_eq!(matrix[[1, idx]], 1.0);
    }

    #[test]
    fn test_stop_words_never_enter_vocabulary() {
        let docs: Vec<String> = vec!["the food and the service".to_string(); 5];
        let mut vectorizer = CountVectorizer::new().with_min_df(1).with_ngram_range(1, 2);
        vectorizer.fit(&docs).unwrap();

        assert!(!vectorizer.contains_term("the"));
        assert!(!vectorizer.contains_term("and"));
        // the bigram skips removed stop words
        assert!(vectorizer.contains_term("food service"));
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let vectorizer = CountVectorizer::new();
        assert!(matches!(
            vectorizer.transform_one("anything"),
            Err(ModelPortError::NotFitted)
        ));
    }

    #[test]
    fn test_min_df_unreachable_is_insufficient_data() {
        let docs: Vec<String> = vec!["alpha".to_string(), "beta".to_string()];
        let mut vectorizer = CountVectorizer::new().with_min_df(20);
        assert!(matches!(
            vectorizer.fit(&docs),
            Err(ModelPortError::InsufficientData(_))
        ));
    }
}
