use std::collections::HashSet;

/// Upper bound on the number of tokens derived from one query.
pub const MAX_QUERY_TOKENS: usize = 48;

const MIN_TOKEN_CHARS: usize = 3;
const QUOTES: &[char] = &['"', '`'];

const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "all", "also", "and", "any", "are", "because", "been",
    "before", "being", "below", "between", "both", "but", "can", "cannot", "could", "did",
    "does", "doing", "down", "during", "each", "few", "for", "from", "further", "had", "has",
    "have", "having", "her", "here", "hers", "him", "his", "how", "into", "its", "itself",
    "just", "more", "most", "not", "now", "off", "once", "only", "other", "our", "ours", "out",
    "over", "own", "same", "she", "should", "some", "such", "than", "that", "the", "their",
    "theirs", "them", "then", "there", "these", "they", "this", "those", "through", "too",
    "under", "until", "very", "was", "were", "what", "when", "where", "which", "while", "who",
    "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
];

/// A trimmed query and the tokens it is matched by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
    tokens: Vec<String>,
    needles: Vec<String>,
}

impl Query {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim().to_string();
        let tokens = tokenize(&text);
        let needles = tokens.iter().map(|t| t.to_lowercase()).collect();
        Self {
            text,
            tokens,
            needles,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Tokens in discovery order, quoted phrases first.
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Lowercased tokens used for case-insensitive matching.
    #[must_use]
    pub fn needles(&self) -> &[String] {
        &self.needles
    }

    #[must_use]
    pub fn is_searchable(&self) -> bool {
        !self.tokens.is_empty()
    }
}

/// Derive the token set of a free-text query.
///
/// Quoted phrases (double quotes or backticks) come first, verbatim. The rest
/// of the text is split on anything that is not a letter, digit or one of
/// `_:./-`; stop-words and tokens shorter than three characters are dropped.
/// Tokens are deduplicated case-insensitively and capped at
/// [`MAX_QUERY_TOKENS`].
#[must_use]
pub fn tokenize(raw: &str) -> Vec<String> {
    let (phrases, rest) = split_quoted(raw.trim());

    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    let mut push = |token: &str, out: &mut Vec<String>| {
        if out.len() >= MAX_QUERY_TOKENS {
            return;
        }
        if seen.insert(token.to_lowercase()) {
            out.push(token.to_string());
        }
    };

    for phrase in &phrases {
        let phrase = phrase.trim();
        if phrase.chars().count() >= MIN_TOKEN_CHARS {
            push(phrase, &mut out);
        }
    }

    for word in rest.split(|c: char| !is_token_char(c)) {
        let word = word.trim_matches(|c: char| matches!(c, '.' | ':' | '-' | '/'));
        if word.chars().count() < MIN_TOKEN_CHARS || is_stopword(word) {
            continue;
        }
        push(word, &mut out);
    }

    out
}

fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '.' | '/' | '-')
}

fn is_stopword(token: &str) -> bool {
    let lowered = token.to_lowercase();
    STOPWORDS.iter().any(|w| *w == lowered)
}

/// Pull quoted phrases out of `query`, returning them and the remaining text.
///
/// An unterminated quote is treated as plain text.
fn split_quoted(query: &str) -> (Vec<String>, String) {
    let mut phrases = Vec::new();
    let mut rest = String::with_capacity(query.len());
    let mut open: Option<(char, usize)> = None;

    for (idx, ch) in query.char_indices() {
        match open {
            None if QUOTES.contains(&ch) => open = Some((ch, idx + ch.len_utf8())),
            None => rest.push(ch),
            Some((quote, start)) if ch == quote => {
                phrases.push(query[start..idx].to_string());
                rest.push(' ');
                open = None;
            }
            Some(_) => {}
        }
    }
    if let Some((_, start)) = open {
        rest.push(' ');
        rest.push_str(&query[start..]);
    }

    (phrases, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn quoted_phrases_come_first_and_stay_verbatim() {
        let tokens = tokenize(r#"where is "max_connections limit" configured in `tidb.toml`"#);
        assert_eq!(
            tokens,
            vec!["max_connections limit", "tidb.toml", "configured"]
        );
    }

    #[test]
    fn drops_stopwords_and_short_tokens() {
        let tokens = tokenize("How does the PD scheduler balance regions?");
        assert_eq!(tokens, vec!["scheduler", "balance", "regions"]);
    }

    #[test]
    fn keeps_path_and_namespace_characters() {
        let tokens = tokenize("see pkg/executor/adapter.go and std::sync::Mutex.");
        assert_eq!(
            tokens,
            vec!["see", "pkg/executor/adapter.go", "std::sync::Mutex"]
        );
    }

    #[test]
    fn dedupes_case_insensitively_keeping_first_spelling() {
        let tokens = tokenize("ParseConfig parseconfig PARSECONFIG \"parseConfig\"");
        assert_eq!(tokens, vec!["parseConfig"]);
    }

    #[test]
    fn handles_unicode_words() {
        let tokens = tokenize("настройка планировщика в TiDB");
        assert_eq!(tokens, vec!["настройка", "планировщика", "TiDB"]);
    }

    #[test]
    fn unterminated_quote_falls_back_to_words() {
        let tokens = tokenize("\"ParseConfig error");
        assert_eq!(tokens, vec!["ParseConfig", "error"]);
    }

    #[test]
    fn empty_and_noise_queries_have_no_tokens() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
        assert!(tokenize("is it on? \"ab\"").is_empty());
        assert!(!Query::parse("what is the").is_searchable());
    }

    #[test]
    fn caps_token_count() {
        let raw: Vec<String> = (0..100).map(|i| format!("token{i}")).collect();
        let tokens = tokenize(&raw.join(" "));
        assert_eq!(tokens.len(), MAX_QUERY_TOKENS);
        assert_eq!(tokens[0], "token0");
        assert_eq!(tokens[MAX_QUERY_TOKENS - 1], "token47");
    }

    #[test]
    fn query_exposes_lowercase_needles() {
        let query = Query::parse("  ParseConfig  ");
        assert_eq!(query.text(), "ParseConfig");
        assert_eq!(query.needles(), &["parseconfig".to_string()]);
    }

    proptest! {
        #[test]
        fn proptest_tokens_are_bounded_and_unique(raw in "[A-Za-z0-9_ .:/\"`-]{0,400}") {
            let tokens = tokenize(&raw);
            prop_assert!(tokens.len() <= MAX_QUERY_TOKENS);
            let mut seen = HashSet::new();
            for token in &tokens {
                prop_assert!(token.trim().chars().count() >= MIN_TOKEN_CHARS);
                prop_assert!(seen.insert(token.to_lowercase()));
            }
        }

        #[test]
        fn proptest_quoted_identifier_is_first(value in "[A-Za-z][A-Za-z0-9_]{2,31}") {
            let raw = format!("find \"{value}\" usage please");
            let tokens = tokenize(&raw);
            prop_assert_eq!(tokens.first().cloned(), Some(value));
        }
    }
}
