//! Tokenizer strategies built as tantivy analyzers.
//!
//! Every chain starts with [`AsciiAlnumTokenizer`] and [`LowerCaser`];
//! [`StemmingTokenizer`] adds a [`StopWordFilter`] and [`TrailingSFilter`].

use ragdb_core::traits::Tokenizer;
use tantivy::tokenizer::{LowerCaser, StopWordFilter, TextAnalyzer, Token, TokenFilter, TokenStream};

/// Question words and function words that carry no lexical signal.
pub const STOP_WORDS: &[&str] = &[
    "what", "does", "do", "is", "are", "the", "a", "an", "for", "in", "of", "to", "and",
];

/// Splits text into maximal runs of ASCII letters and digits.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsciiAlnumTokenizer;

pub struct AsciiAlnumStream<'a> {
    text: &'a str,
    cursor: usize,
    token: Token,
}

impl tantivy::tokenizer::Tokenizer for AsciiAlnumTokenizer {
    type TokenStream<'a> = AsciiAlnumStream<'a>;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> AsciiAlnumStream<'a> {
        AsciiAlnumStream { text, cursor: 0, token: Token::default() }
    }
}

impl TokenStream for AsciiAlnumStream<'_> {
    fn advance(&mut self) -> bool {
        let bytes = self.text.as_bytes();
        let Some(start) = (self.cursor..bytes.len()).find(|&i| bytes[i].is_ascii_alphanumeric()) else {
            self.cursor = bytes.len();
            return false;
        };
        let end = (start..bytes.len()).find(|&i| !bytes[i].is_ascii_alphanumeric()).unwrap_or(bytes.len());
        self.cursor = end;
        // ASCII bytes always sit on char boundaries.
        self.token.text.clear();
        self.token.text.push_str(&self.text[start..end]);
        self.token.offset_from = start;
        self.token.offset_to = end;
        self.token.position = self.token.position.wrapping_add(1);
        true
    }

    fn token(&self) -> &Token {
        &self.token
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.token
    }
}

/// Strips one trailing "s" from tokens longer than three characters
/// ("stands" -> "stand").
///
/// The stemmer is crude ("class" -> "clas", "indexes" -> "indexe"); use
/// another [`Tokenizer`] for real stemming or lemmatization.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrailingSFilter;

#[derive(Clone)]
pub struct TrailingSWrapper<T>(T);

pub struct TrailingSStream<S>(S);

impl TokenFilter for TrailingSFilter {
    type Tokenizer<T: tantivy::tokenizer::Tokenizer> = TrailingSWrapper<T>;

    fn transform<T: tantivy::tokenizer::Tokenizer>(self, tokenizer: T) -> TrailingSWrapper<T> {
        TrailingSWrapper(tokenizer)
    }
}

impl<T: tantivy::tokenizer::Tokenizer> tantivy::tokenizer::Tokenizer for TrailingSWrapper<T> {
    type TokenStream<'a> = TrailingSStream<T::TokenStream<'a>>;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> Self::TokenStream<'a> {
        TrailingSStream(self.0.token_stream(text))
    }
}

impl<S: TokenStream> TokenStream for TrailingSStream<S> {
    fn advance(&mut self) -> bool {
        if !self.0.advance() {
            return false;
        }
        let text = &mut self.0.token_mut().text;
        if text.len() > 3 && text.ends_with('s') {
            text.pop();
        }
        true
    }

    fn token(&self) -> &Token {
        self.0.token()
    }

    fn token_mut(&mut self) -> &mut Token {
        self.0.token_mut()
    }
}

fn run_analyzer(analyzer: &TextAnalyzer, text: &str) -> Vec<String> {
    let mut analyzer = analyzer.clone();
    let mut stream = analyzer.token_stream(text);
    let mut tokens = Vec::new();
    while stream.advance() {
        tokens.push(stream.token().text.clone());
    }
    tokens
}

/// Plain alphanumeric tokenizer: no stop words, no stemming.
#[derive(Clone)]
pub struct SimpleTokenizer {
    analyzer: TextAnalyzer,
}

impl Default for SimpleTokenizer {
    fn default() -> Self {
        Self { analyzer: TextAnalyzer::builder(AsciiAlnumTokenizer).filter(LowerCaser).build() }
    }
}

impl SimpleTokenizer {
    pub fn new() -> Self { Self::default() }
}

impl Tokenizer for SimpleTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        run_analyzer(&self.analyzer, text)
    }
}

/// Alphanumeric tokenizer that drops stop words and applies [`TrailingSFilter`].
#[derive(Clone)]
pub struct StemmingTokenizer {
    stop_words: Vec<String>,
    analyzer: TextAnalyzer,
}

impl Default for StemmingTokenizer {
    fn default() -> Self {
        Self::with_stop_words(STOP_WORDS.iter().copied())
    }
}

impl StemmingTokenizer {
    pub fn new() -> Self { Self::default() }

    pub fn with_stop_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stop_words: Vec<String> = words.into_iter().map(Into::into).collect();
        let analyzer = stemming_analyzer(&stop_words, true);
        Self { stop_words, analyzer }
    }

    pub fn without_stemming(self) -> Self {
        let analyzer = stemming_analyzer(&self.stop_words, false);
        Self { analyzer, ..self }
    }
}

fn stemming_analyzer(stop_words: &[String], strip_plural: bool) -> TextAnalyzer {
    let builder = TextAnalyzer::builder(AsciiAlnumTokenizer)
        .filter(LowerCaser)
        .filter(StopWordFilter::remove(stop_words.iter().cloned()));
    if strip_plural {
        builder.filter(TrailingSFilter).build()
    } else {
        builder.build()
    }
}

impl Tokenizer for StemmingTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        run_analyzer(&self.analyzer, text)
    }
}
