// Copyright 2025 The Strata Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tokenizers mapping stored bytes to the token sequences the diff engine
//! runs on.
//!
//! Diffing bytes directly gives character-level patches; interning lines or
//! words first gives coarser, usually smaller patches. A tokenizer must be
//! deterministic and bijective over everything it has encoded, since stored
//! patches refer to its ids forever. The interning tokenizers guarantee
//! this by only ever appending to their table.

use bstr::BString;
use indexmap::IndexSet;
use thiserror::Error;

use crate::patch::PatchToken;

/// A decoded token id that the tokenizer never issued. Indicates a corrupt
/// patch or a tokenizer not matching the store.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("token id {token} is not in the tokenizer table")]
pub struct DecodeError {
    pub token: u64,
}

/// Bidirectional mapping between byte content and token sequences.
pub trait Tokenizer {
    type Token: PatchToken;

    /// Encodes content, extending the tokenizer's state as needed.
    fn encode(&mut self, content: &[u8]) -> Vec<Self::Token>;

    /// Decodes a token sequence produced by this tokenizer.
    fn decode(&self, tokens: &[Self::Token]) -> Result<BString, DecodeError>;
}

/// The identity tokenizer: every byte is its own token.
#[derive(Clone, Copy, Debug, Default)]
pub struct Bytes;

impl Tokenizer for Bytes {
    type Token = u8;

    fn encode(&mut self, content: &[u8]) -> Vec<u8> {
        content.to_vec()
    }

    fn decode(&self, tokens: &[u8]) -> Result<BString, DecodeError> {
        Ok(BString::from(tokens))
    }
}

/// Interns the pieces of `content` around `separator`, appending new pieces
/// to the table. The piece's table index is its id.
fn encode_split(table: &mut IndexSet<BString>, content: &[u8], separator: u8) -> Vec<u32> {
    content
        .split(|&byte| byte == separator)
        .map(|piece| {
            let (index, _) = table.insert_full(BString::from(piece));
            u32::try_from(index).expect("interning table overflow")
        })
        .collect()
}

/// Joins the pieces named by `tokens` with `separator`.
fn decode_join(
    table: &IndexSet<BString>,
    tokens: &[u32],
    separator: u8,
) -> Result<BString, DecodeError> {
    let mut out = BString::default();
    for (position, &token) in tokens.iter().enumerate() {
        let piece = table.get_index(token as usize).ok_or(DecodeError {
            token: u64::from(token),
        })?;
        if position > 0 {
            out.push(separator);
        }
        out.extend_from_slice(piece);
    }
    Ok(out)
}

/// Tokenizes on line boundaries: one id per distinct line.
#[derive(Clone, Debug, Default)]
pub struct Lines {
    table: IndexSet<BString>,
}

impl Tokenizer for Lines {
    type Token = u32;

    fn encode(&mut self, content: &[u8]) -> Vec<u32> {
        encode_split(&mut self.table, content, b'\n')
    }

    fn decode(&self, tokens: &[u32]) -> Result<BString, DecodeError> {
        decode_join(&self.table, tokens, b'\n')
    }
}

/// Tokenizes on spaces: one id per distinct word.
#[derive(Clone, Debug, Default)]
pub struct Words {
    table: IndexSet<BString>,
}

impl Tokenizer for Words {
    type Token = u32;

    fn encode(&mut self, content: &[u8]) -> Vec<u32> {
        encode_split(&mut self.table, content, b' ')
    }

    fn decode(&self, tokens: &[u32]) -> Result<BString, DecodeError> {
        decode_join(&self.table, tokens, b' ')
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(""; "empty")]
    #[test_case("one line"; "no separator")]
    #[test_case("a\nb\nc"; "several lines")]
    #[test_case("a\nb\n"; "trailing newline")]
    #[test_case("\n\n"; "only newlines")]
    fn test_lines_round_trip(content: &str) {
        let mut tokenizer = Lines::default();
        let tokens = tokenizer.encode(content.as_bytes());
        assert_eq!(tokenizer.decode(&tokens).unwrap(), content);
    }

    #[test]
    fn test_words_round_trip() {
        let mut tokenizer = Words::default();
        for content in ["", "word", "several words here", " leading and  double"] {
            let tokens = tokenizer.encode(content.as_bytes());
            assert_eq!(tokenizer.decode(&tokens).unwrap(), content);
        }
    }

    #[test]
    fn test_bytes_round_trip() {
        let mut tokenizer = Bytes;
        let content: Vec<u8> = (0..=255).collect();
        let tokens = tokenizer.encode(&content);
        assert_eq!(tokenizer.decode(&tokens).unwrap(), content);
    }

    #[test]
    fn test_ids_are_stable_across_encodes() {
        let mut tokenizer = Lines::default();
        let first = tokenizer.encode(b"shared\nunique one");
        let second = tokenizer.encode(b"shared\nunique two");
        assert_eq!(first[0], second[0]);
        assert_ne!(first[1], second[1]);
        // Earlier encodings still decode after the table grew.
        assert_eq!(tokenizer.decode(&first).unwrap(), "shared\nunique one");
    }

    #[test]
    fn test_repeated_lines_share_an_id() {
        let mut tokenizer = Lines::default();
        let tokens = tokenizer.encode(b"same\nsame\nsame");
        assert_eq!(tokens, [0, 0, 0]);
    }

    #[test]
    fn test_decode_unknown_id() {
        let mut tokenizer = Lines::default();
        let tokens = tokenizer.encode(b"only\nfour\nids\nhere");
        assert_eq!(
            tokenizer.decode(&[tokens[0], 1000]),
            Err(DecodeError { token: 1000 })
        );
    }
}
