//! Text normalization shared by keyword extraction, query tokenization and
//! the lexical analyzer
//!
//! Tokens are case-folded and split on every run of characters that is not
//! an ASCII letter or digit, so `"Re-Bar"` and `"re bar"` normalize alike.

/// Split free text into normalized tokens, in order of appearance.
///
/// Empty and whitespace-only input yields no tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tokens used by the lexical index: keyword tokens of at least two
/// characters that are not English stop words.
pub fn analyze(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|token| token.len() >= 2 && !is_stop_word(token))
        .collect()
}

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.binary_search(&token).is_ok()
}

// Sorted; looked up with binary search.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "almost", "alone", "along",
    "already", "also", "although", "always", "am", "among", "an", "and", "another", "any",
    "anyhow", "anyone", "anything", "anywhere", "are", "around", "as", "at", "back", "be",
    "became", "because", "become", "becomes", "been", "before", "beforehand", "behind",
    "being", "below", "beside", "besides", "between", "beyond", "both", "but", "by", "can",
    "cannot", "could", "did", "do", "does", "doing", "done", "down", "during", "each",
    "either", "else", "elsewhere", "enough", "etc", "even", "ever", "every", "everyone",
    "everything", "everywhere", "except", "few", "for", "from", "further", "get", "give",
    "had", "has", "have", "he", "hence", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "however", "i", "ie", "if", "in", "indeed", "into", "is",
    "it", "its", "itself", "just", "keep", "last", "least", "less", "made", "many", "may",
    "me", "meanwhile", "might", "mine", "more", "moreover", "most", "mostly", "much",
    "must", "my", "myself", "namely", "neither", "never", "nevertheless", "next", "no",
    "nobody", "none", "nor", "not", "nothing", "now", "nowhere", "of", "off", "often",
    "on", "once", "one", "only", "onto", "or", "other", "others", "otherwise", "our",
    "ours", "ourselves", "out", "over", "own", "per", "perhaps", "please", "put", "rather",
    "re", "same", "see", "seem", "seemed", "seeming", "seems", "several", "she", "should",
    "since", "so", "some", "somehow", "someone", "something", "sometime", "sometimes",
    "somewhere", "still", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "thence", "there", "thereafter", "thereby", "therefore",
    "therein", "thereupon", "these", "they", "this", "those", "though", "through",
    "throughout", "thru", "thus", "to", "together", "too", "toward", "towards", "under",
    "until", "up", "upon", "us", "very", "via", "was", "we", "well", "were", "what",
    "whatever", "when", "whence", "whenever", "where", "whereafter", "whereas", "whereby",
    "wherein", "whereupon", "wherever", "whether", "which", "while", "whither", "who",
    "whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without",
    "would", "yet", "you", "your", "yours", "yourself", "yourselves",];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_folding() {
        assert_eq!(tokenize("Concrete"), tokenize("concrete"));
        assert_eq!(tokenize("CONCRETE Bridge"), vec!["concrete", "bridge"]);
    }

    #[test]
    fn test_split_on_punctuation_runs() {
        assert_eq!(tokenize("re-bar"), vec!["re", "bar"]);
        assert_eq!(tokenize("steel/glass -- timber"), vec!["steel", "glass", "timber"]);
        assert_eq!(tokenize("LEED_AP, OSHA30"), vec!["leed", "ap", "osha30"]);
    }

    #[test]
    fn test_blank_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t\n").is_empty());
        assert!(tokenize("--- !!").is_empty());
    }

    #[test]
    fn test_analyze_drops_stop_words_and_short_tokens() {
        assert_eq!(
            analyze("The bridge and a tunnel in NYC, x"),
            vec!["bridge", "tunnel", "nyc"]
        );
    }

    #[test]
    fn test_stop_words_sorted() {
        assert!(STOP_WORDS.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(is_stop_word("the"));
        assert!(!is_stop_word("masonry"));
    }
}
