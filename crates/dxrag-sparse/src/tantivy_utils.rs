use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{TextAnalyzer, Token, TokenStream, Tokenizer};
use tantivy::Index;

pub const TOKENIZER_NAME: &str = "protocol_whitespace";

/// Stripped from both ends of every token; dots inside ICD codes survive.
const EDGE_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '(', ')', '[', ']'];

/// Lowercased whitespace tokens with surrounding punctuation removed.
pub fn tokenize(text: &str) -> Vec<String> {
    spans(text).map(|(_, t)| t.to_lowercase()).collect()
}

/// `(byte offset, token)` pairs over the original text, empty tokens dropped.
fn spans(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let base = text.as_ptr() as usize;
    text.split_whitespace().filter_map(move |word| {
        let trimmed = word.trim_matches(EDGE_PUNCTUATION);
        (!trimmed.is_empty()).then(|| (trimmed.as_ptr() as usize - base, trimmed))
    })
}

#[derive(Clone, Default)]
pub struct ProtocolTokenizer;

pub struct ProtocolTokenStream {
    tokens: Vec<Token>,
    next: usize,
}

impl Tokenizer for ProtocolTokenizer {
    type TokenStream<'a> = ProtocolTokenStream;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> Self::TokenStream<'a> {
        let tokens = spans(text)
            .enumerate()
            .map(|(position, (offset, raw))| Token {
                offset_from: offset,
                offset_to: offset + raw.len(),
                position,
                text: raw.to_lowercase(),
                position_length: 1,
            })
            .collect();
        ProtocolTokenStream { tokens, next: 0 }
    }
}

impl TokenStream for ProtocolTokenStream {
    fn advance(&mut self) -> bool {
        if self.next < self.tokens.len() {
            self.next += 1;
            true
        } else {
            false
        }
    }

    fn token(&self) -> &Token {
        &self.tokens[self.next - 1]
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.tokens[self.next - 1]
    }
}

pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();
    schema_builder.add_text_field("protocol_id", STRING | STORED);
    schema_builder.add_text_field("source_file", STORED);
    schema_builder.add_text_field("title", STORED);
    schema_builder.add_u64_field("chunk_index", STORED);
    schema_builder.add_text_field("icd_codes", STRING | STORED);
    let text_field_indexing = TextFieldIndexing::default()
        .set_tokenizer(TOKENIZER_NAME)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let text_options = TextOptions::default().set_indexing_options(text_field_indexing).set_stored();
    schema_builder.add_text_field("text", text_options);
    schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
    index.tokenizers().register(TOKENIZER_NAME, TextAnalyzer::builder(ProtocolTokenizer).build());
}
