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

//! Stripped patches and their wire encoding.
//!
//! A stripped patch is a one-directional projection of a reduced changeset
//! (see [`crate::diff`]): a sequence of slices into a base sequence,
//! interleaved with materialized token runs. Applying the patch against the
//! base reconstructs the target sequence. Patches are persisted in a compact
//! binary form built on SQLite-style variable-length integers.

use std::fmt::Debug;
use std::hash::Hash;
use std::ops::Range;

use thiserror::Error;

use crate::diff::ReducedItem;

/// Error decoding or applying a serialized patch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    /// The byte stream ended in the middle of an encoded item.
    #[error("premature end of patch stream")]
    PrematureEnd,
    /// A decoded token id does not fit the token type.
    #[error("token id {0} exceeds the 32-bit token range")]
    TokenRange(u64),
    /// A slice item points outside the base sequence.
    #[error("patch slice {start}..{stop} out of bounds of base (len {len})")]
    SliceOutOfBounds {
        start: usize,
        stop: usize,
        len: usize,
    },
}

/// A token that can be written to and read back from a serialized patch.
///
/// Byte tokens are stored as themselves, so a patch over bytes is a plain
/// byte layout. Interned ids are stored as varints.
pub trait PatchToken: Copy + Eq + Hash + Debug {
    fn write(&self, out: &mut Vec<u8>);
    fn read(input: &mut &[u8]) -> Result<Self, PatchError>;
}

impl PatchToken for u8 {
    fn write(&self, out: &mut Vec<u8>) {
        out.push(*self);
    }

    fn read(input: &mut &[u8]) -> Result<Self, PatchError> {
        let (&byte, rest) = input.split_first().ok_or(PatchError::PrematureEnd)?;
        *input = rest;
        Ok(byte)
    }
}

impl PatchToken for u32 {
    fn write(&self, out: &mut Vec<u8>) {
        write_varint(out, u64::from(*self));
    }

    fn read(input: &mut &[u8]) -> Result<Self, PatchError> {
        let value = read_varint(input)?;
        Self::try_from(value).map_err(|_| PatchError::TokenRange(value))
    }
}

/// One item of a stripped patch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatchItem<T> {
    /// Copy `base[start..stop]` to the output.
    Slice(Range<usize>),
    /// Emit these tokens verbatim.
    Tokens(Vec<T>),
}

/// Projects a reduced changeset into the patch that rebuilds the modified
/// sequence from the original.
pub fn strip_forward<T>(reduced: Vec<ReducedItem<T>>) -> Vec<PatchItem<T>> {
    reduced
        .into_iter()
        .map(|item| match item {
            ReducedItem::Common { original, .. } => PatchItem::Slice(original),
            ReducedItem::Change { insert, .. } => PatchItem::Tokens(insert),
        })
        .collect()
}

/// Projects a reduced changeset into the patch that rebuilds the original
/// sequence from the modified.
pub fn strip_reverse<T>(reduced: Vec<ReducedItem<T>>) -> Vec<PatchItem<T>> {
    reduced
        .into_iter()
        .map(|item| match item {
            ReducedItem::Common { modified, .. } => PatchItem::Slice(modified),
            ReducedItem::Change { delete, .. } => PatchItem::Tokens(delete),
        })
        .collect()
}

/// Applies a stripped patch against its base sequence, producing the
/// target sequence.
pub fn apply<T: PatchToken>(patch: &[PatchItem<T>], base: &[T]) -> Result<Vec<T>, PatchError> {
    let mut output = Vec::new();
    for item in patch {
        match item {
            PatchItem::Slice(range) => {
                let slice =
                    base.get(range.clone())
                        .ok_or_else(|| PatchError::SliceOutOfBounds {
                            start: range.start,
                            stop: range.end,
                            len: base.len(),
                        })?;
                output.extend_from_slice(slice);
            }
            PatchItem::Tokens(run) => output.extend_from_slice(run),
        }
    }
    Ok(output)
}

/// Serializes a stripped patch.
///
/// The layout alternates strictly between token-run and slice segments,
/// starting with a token-run: a token-run is `varint(count)` followed by the
/// tokens, a slice is `varint(start) varint(stop)`. Zero-length padding
/// segments keep the alternation when the natural sequence would put two
/// like segments next to each other, and are dropped again on decode.
pub fn serialize<T: PatchToken>(patch: &[PatchItem<T>]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut expect_tokens = true;
    for item in patch {
        match item {
            PatchItem::Tokens(run) => {
                if !expect_tokens {
                    // Empty slice to get back in phase.
                    write_varint(&mut out, 0);
                    write_varint(&mut out, 0);
                }
                write_varint(&mut out, run.len() as u64);
                for token in run {
                    token.write(&mut out);
                }
                expect_tokens = false;
            }
            PatchItem::Slice(range) => {
                if expect_tokens {
                    // Empty token-run to get back in phase.
                    write_varint(&mut out, 0);
                }
                write_varint(&mut out, range.start as u64);
                write_varint(&mut out, range.end as u64);
                expect_tokens = true;
            }
        }
    }
    out
}

/// Decodes a serialized patch, dropping the zero-length padding segments.
pub fn deserialize<T: PatchToken>(mut input: &[u8]) -> Result<Vec<PatchItem<T>>, PatchError> {
    let mut items = Vec::new();
    let mut expect_tokens = true;
    while !input.is_empty() {
        if expect_tokens {
            let count = read_varint(&mut input)? as usize;
            if count > 0 {
                let mut run = Vec::with_capacity(count);
                for _ in 0..count {
                    run.push(T::read(&mut input)?);
                }
                items.push(PatchItem::Tokens(run));
            }
            expect_tokens = false;
        } else {
            let start = read_varint(&mut input)? as usize;
            let stop = read_varint(&mut input)? as usize;
            if start != stop {
                items.push(PatchItem::Slice(start..stop));
            }
            expect_tokens = true;
        }
    }
    Ok(items)
}

/// Writes a token sequence with no framing; the inverse of
/// [`decode_tokens`]. For byte tokens this is the identity.
pub fn encode_tokens<T: PatchToken>(tokens: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        token.write(&mut out);
    }
    out
}

/// Reads tokens until the input is exhausted.
pub fn decode_tokens<T: PatchToken>(mut input: &[u8]) -> Result<Vec<T>, PatchError> {
    let mut tokens = Vec::with_capacity(input.len());
    while !input.is_empty() {
        tokens.push(T::read(&mut input)?);
    }
    Ok(tokens)
}

/// Variable-length integer encoding used by SQLite: one to nine bytes,
/// ordered byte-wise the same as numerically.
pub fn write_varint(out: &mut Vec<u8>, value: u64) {
    if value <= 240 {
        out.push(value as u8);
    } else if value <= 2287 {
        let excess = value - 240;
        out.push(241 + (excess / 256) as u8);
        out.push((excess % 256) as u8);
    } else if value <= 67823 {
        let excess = (value - 2288) as u16;
        out.push(249);
        out.extend_from_slice(&excess.to_be_bytes());
    } else {
        let payload = value.to_be_bytes();
        let skip = value.leading_zeros() as usize / 8;
        // Tag 250..=255 marks a 3..=8 byte big-endian payload.
        out.push((255 - skip) as u8);
        out.extend_from_slice(&payload[skip..]);
    }
}

/// Decodes one varint from the front of `input`, advancing it.
pub fn read_varint(input: &mut &[u8]) -> Result<u64, PatchError> {
    let (&a0, rest) = input.split_first().ok_or(PatchError::PrematureEnd)?;
    match a0 {
        0..=240 => {
            *input = rest;
            Ok(u64::from(a0))
        }
        241..=248 => {
            let (&a1, rest) = rest.split_first().ok_or(PatchError::PrematureEnd)?;
            *input = rest;
            Ok(240 + 256 * u64::from(a0 - 241) + u64::from(a1))
        }
        249 => {
            let payload = rest.get(..2).ok_or(PatchError::PrematureEnd)?;
            *input = &rest[2..];
            Ok(2288 + u64::from(u16::from_be_bytes([payload[0], payload[1]])))
        }
        250..=255 => {
            let count = usize::from(a0 - 247);
            let payload = rest.get(..count).ok_or(PatchError::PrematureEnd)?;
            *input = &rest[count..];
            let mut bytes = [0_u8; 8];
            bytes[8 - count..].copy_from_slice(payload);
            Ok(u64::from_be_bytes(bytes))
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn varint(value: u64) -> Vec<u8> {
        let mut out = Vec::new();
        write_varint(&mut out, value);
        out
    }

    #[test_case(0, 1)]
    #[test_case(240, 1)]
    #[test_case(241, 2)]
    #[test_case(2287, 2)]
    #[test_case(2288, 3)]
    #[test_case(67823, 3)]
    #[test_case(67824, 4)]
    #[test_case((1 << 24) - 1, 4)]
    #[test_case(1 << 24, 5)]
    #[test_case((1 << 32) - 1, 5)]
    #[test_case((1 << 40) - 1, 6)]
    #[test_case((1 << 48) - 1, 7)]
    #[test_case((1 << 56) - 1, 8)]
    #[test_case(u64::MAX, 9)]
    fn test_varint_round_trip(value: u64, encoded_len: usize) {
        let encoded = varint(value);
        assert_eq!(encoded.len(), encoded_len);
        let mut input = encoded.as_slice();
        assert_eq!(read_varint(&mut input), Ok(value));
        assert!(input.is_empty());
    }

    #[test]
    fn test_varint_known_encodings() {
        assert_eq!(varint(0), [0x00]);
        assert_eq!(varint(240), [0xf0]);
        assert_eq!(varint(241), [0xf1, 0x01]);
        assert_eq!(varint(2287), [0xf8, 0xff]);
        assert_eq!(varint(2288), [0xf9, 0x00, 0x00]);
        assert_eq!(varint(67823), [0xf9, 0xff, 0xff]);
        assert_eq!(varint(67824), [0xfa, 0x01, 0x08, 0xf0]);
    }

    #[test]
    fn test_varint_ordering_is_bytewise() {
        let values = [0, 1, 240, 241, 2287, 2288, 67823, 67824, u64::MAX];
        for pair in values.windows(2) {
            assert!(varint(pair[0]) < varint(pair[1]));
        }
    }

    #[test]
    fn test_varint_premature_end() {
        for bad in [&[241_u8][..], &[249, 0], &[250, 1, 2], &[255, 0]] {
            let mut input = bad;
            assert_eq!(read_varint(&mut input), Err(PatchError::PrematureEnd));
        }
    }

    #[test]
    fn test_patch_round_trip_starting_with_tokens() {
        let patch = vec![
            PatchItem::Tokens(b"hello".to_vec()),
            PatchItem::Slice(3..10),
            PatchItem::Tokens(b"x".to_vec()),
        ];
        let encoded = serialize(&patch);
        assert_eq!(deserialize::<u8>(&encoded).unwrap(), patch);
    }

    #[test]
    fn test_patch_round_trip_starting_with_slice() {
        let patch = vec![
            PatchItem::Slice(0..4),
            PatchItem::Tokens(b"ab".to_vec()),
            PatchItem::Slice(6..9),
        ];
        let encoded = serialize(&patch);
        // A zero-length token-run is inserted up front to keep the layout
        // starting with a token-run.
        assert_eq!(encoded[0], 0);
        assert_eq!(deserialize::<u8>(&encoded).unwrap(), patch);
    }

    #[test]
    fn test_patch_round_trip_adjacent_like_items() {
        let patch = vec![
            PatchItem::Tokens(b"a".to_vec()),
            PatchItem::Tokens(b"b".to_vec()),
            PatchItem::Slice(0..1),
            PatchItem::Slice(1..2),
        ];
        let encoded = serialize(&patch);
        assert_eq!(deserialize::<u8>(&encoded).unwrap(), patch);
    }

    #[test]
    fn test_patch_round_trip_interned_ids() {
        let patch = vec![
            PatchItem::Tokens(vec![0_u32, 70000, u32::MAX]),
            PatchItem::Slice(2..5),
        ];
        let encoded = serialize(&patch);
        assert_eq!(deserialize::<u32>(&encoded).unwrap(), patch);
    }

    #[test]
    fn test_patch_deserialize_truncated() {
        let patch = vec![PatchItem::Tokens(b"hello".to_vec())];
        let encoded = serialize(&patch);
        assert_eq!(
            deserialize::<u8>(&encoded[..encoded.len() - 1]),
            Err(PatchError::PrematureEnd)
        );
    }

    #[test]
    fn test_apply_slices_and_runs() {
        let base = b"the quick brown fox";
        let patch = vec![
            PatchItem::Slice(0..4),
            PatchItem::Tokens(b"slow ".to_vec()),
            PatchItem::Slice(10..19),
        ];
        assert_eq!(apply(&patch, base).unwrap(), b"the slow brown fox");
    }

    #[test]
    fn test_apply_out_of_bounds_slice() {
        let patch: Vec<PatchItem<u8>> = vec![PatchItem::Slice(2..9)];
        assert_eq!(
            apply(&patch, b"abc"),
            Err(PatchError::SliceOutOfBounds {
                start: 2,
                stop: 9,
                len: 3,
            })
        );
    }

    #[test]
    fn test_token_stream_round_trip() {
        let bytes: Vec<u8> = (0..=255).collect();
        assert_eq!(encode_tokens(&bytes), bytes);
        assert_eq!(decode_tokens::<u8>(&bytes).unwrap(), bytes);

        let ids = vec![0_u32, 1, 255, 256, 70000, u32::MAX];
        let encoded = encode_tokens(&ids);
        assert_eq!(decode_tokens::<u32>(&encoded).unwrap(), ids);
    }
}
