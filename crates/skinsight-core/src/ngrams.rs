//! Top unigrams and bigrams across skin-related posts.
//!
//! Text is normalised (lowercase, links, mentions and punctuation removed), posts
//! without a skin keyword are dropped, and stopwords are excluded from the counts.
//! Percentages are relative to the total count of the returned n-grams.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::posts::Post;

pub const DEFAULT_NGRAM_TOP_K: usize = 50;

static URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"http\S+|www\.\S+").unwrap());
static MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@\w+").unwrap());
static HASHTAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(\w+)").unwrap());
static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9\s]").unwrap());
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const SKIN_KEYWORDS: &[&str] = &[
    "skin", "eczema", "psoriasis", "rash", "rashes", "itch", "itchy", "eucerin", "skin care",
    "flare", "flare-up", "flareups", "acne", "pimples", "blackheads", "whiteheads", "rosacea",
    "dermatitis", "hyperpigmentation", "dark spots", "redness", "sensitive", "barrier",
    "skin barrier", "spf", "sunscreen", "dryness", "dry skin", "oily skin", "combination skin",
    "scarring", "acne scars", "maskne", "allergic reaction", "hives", "bumps",
];

static SKIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = SKIN_KEYWORDS
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i){alternation}")).unwrap()
});

// English stopwords plus words that are noise in skincare posts.
// Apostrophe forms are omitted: normalisation splits them into the fragments below.
const STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
    "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
    "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
    "who", "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be",
    "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an",
    "the", "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by", "for",
    "with", "about", "against", "between", "into", "through", "during", "before", "after",
    "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over", "under",
    "again", "further", "then", "once", "here", "there", "when", "where", "why", "how", "all",
    "both", "each", "few", "more", "most", "other", "some", "such", "no", "nor", "not", "only",
    "own", "same", "so", "than", "too", "very", "s", "t", "can", "will", "just", "don",
    "should", "now", "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "couldn", "didn",
    "doesn", "hadn", "hasn", "haven", "isn", "ma", "mightn", "mustn", "needn", "shan",
    "shouldn", "wasn", "weren", "won", "wouldn",
    // domain
    "skin", "amp", "feel", "product", "products", "2", "im", "ive", "id", "didnt", "3", "1",
    "bad", "month", "months", "started", "start", "week", "day", "days", "help", "get", "got",
    "really", "use", "using", "used", "like", "know", "think", "one", "also", "bit", "make",
    "made",
];

static STOPWORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOPWORDS.iter().copied().collect());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NgramKind {
    Unigram,
    Bigram,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NgramCount {
    pub ngram: String,
    pub kind: NgramKind,
    pub count: usize,
    /// Share of the returned n-grams' total count, rounded to two decimals.
    pub percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NgramReport {
    /// Posts that mention a skin keyword and have text left after normalisation.
    pub skin_posts: usize,
    pub ngrams: Vec<NgramCount>,
}

/// Lowercases, strips links and @mentions, keeps hashtag words, replaces anything
/// outside `[a-z0-9]` with a space and collapses whitespace.
pub fn normalize_text(text: &str) -> String {
    let text = text.to_lowercase();
    let text = URL.replace_all(&text, "");
    let text = MENTION.replace_all(&text, "");
    let text = HASHTAG.replace_all(&text, "$1");
    let text = NON_ALNUM.replace_all(&text, " ");
    SPACES.replace_all(&text, " ").trim().to_string()
}

/// True when `text` contains any skin keyword as a substring (case-insensitive).
pub fn mentions_skin(text: &str) -> bool {
    !text.is_empty() && SKIN_PATTERN.is_match(text)
}

fn is_stopword(word: &str) -> bool {
    STOPWORD_SET.contains(word)
}

/// Ranks unigrams and bigrams over skin-related posts and keeps the `top_k` most frequent.
///
/// Unigrams skip stopwords and single characters; bigrams are adjacent words in the
/// normalised text where neither word is a stopword. Ties are ordered alphabetically.
pub fn top_ngrams(posts: &[Post], top_k: usize) -> NgramReport {
    let mut counts: HashMap<(NgramKind, String), usize> = HashMap::new();
    let mut skin_posts = 0;

    for post in posts {
        let text = normalize_text(&post.clean_text);
        if !mentions_skin(&text) {
            continue;
        }
        skin_posts += 1;
        let words: Vec<&str> = text.split(' ').collect();
        for w in &words {
            if w.chars().count() > 1 && !is_stopword(w) {
                *counts.entry((NgramKind::Unigram, w.to_string())).or_default() += 1;
            }
        }
        for pair in words.windows(2) {
            if !is_stopword(pair[0]) && !is_stopword(pair[1]) {
                let bigram = format!("{} {}", pair[0], pair[1]);
                *counts.entry((NgramKind::Bigram, bigram)).or_default() += 1;
            }
        }
    }
    debug!(skin_posts, distinct = counts.len(), "n-grams counted");

    let mut ranked: Vec<((NgramKind, String), usize)> = counts.into_iter().collect();
    ranked.sort_by(|((_, a), ca), ((_, b), cb)| cb.cmp(ca).then_with(|| a.cmp(b)));
    ranked.truncate(top_k);

    let total: usize = ranked.iter().map(|(_, c)| c).sum();
    let ngrams = ranked
        .into_iter()
        .map(|((kind, ngram), count)| NgramCount {
            ngram,
            kind,
            count,
            percent: round2(count as f64 * 100.0 / total as f64),
        })
        .collect();

    NgramReport { skin_posts, ngrams }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
