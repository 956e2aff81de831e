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

#![forbid(unsafe_code)]

//! Content-addressable version storage for text, built on substring diffs.
//!
//! The pieces, bottom up:
//!
//! - [`suffix_automaton`]: linear-time substring and longest-common-substring
//!   queries over token sequences.
//! - [`diff`]: recursive decomposition of two sequences into common and
//!   differing regions, and the streams derived from it.
//! - [`merge`]: three-way merge with explicit conflict regions.
//! - [`patch`]: one-directional patches and their binary serialization.
//! - [`version_tree`] and [`store`]: a store keeping one verbatim head per
//!   branch and every other version as a reverse patch, with the tree
//!   reshaped on insertion so retrieval paths stay short.
//! - [`tokenizer`]: pluggable byte/line/word tokenization in front of the
//!   diff engine.
//!
//! Everything is synchronous and single-threaded; a store owns all of its
//! state and diffs are pure functions of their inputs.

pub mod diff;
pub mod merge;
pub mod patch;
pub mod store;
pub mod suffix_automaton;
pub mod tokenizer;
pub mod version_tree;
