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

//! The version store: every added version is retrievable byte-exact, but
//! only the current head of each branch is kept verbatim.
//!
//! All other versions are stored as reverse patches: when a new version is
//! added on top of an existing head, the old head's content is re-expressed
//! as a patch against the new version and the head bytes are dropped. The
//! spanning tree (see [`crate::version_tree`]) is reshaped on every add by
//! promoting a *split* node to hang directly off the new head, which keeps
//! the patch chains walked on retrieval short.

use std::collections::HashMap;
use std::fmt;
use std::fmt::Debug;

use bstr::BString;
use bstr::ByteSlice as _;
use thiserror::Error;

use crate::diff::Changeset;
use crate::patch;
use crate::patch::PatchError;
use crate::patch::PatchItem;
use crate::tokenizer::Bytes;
use crate::tokenizer::DecodeError;
use crate::tokenizer::Tokenizer;
use crate::version_tree::VersionTree;

/// Caller-supplied identifier of a stored version.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(BString);

impl Tag {
    pub fn new(value: impl Into<BString>) -> Self {
        Self(value.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_tuple("Tag").field(&self.0).finish()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.0.as_bstr())
    }
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Tag {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&[u8]> for Tag {
    fn from(value: &[u8]) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("version {0} already exists")]
    TagExists(Tag),
    #[error("base version {0} does not exist")]
    UnknownBase(Tag),
    #[error("no content or patch stored for {0}")]
    MissingVersionData(Tag),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Size information for a stored version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionInfo {
    /// The version this one was derived from, as declared on `add`.
    pub base: Option<Tag>,
    /// Tokens kept verbatim for this version: its full length for a head,
    /// the materialized token runs of its patch otherwise.
    pub token_count: usize,
    /// Patch items reconstructing this version; 0 for a head.
    pub change_count: usize,
}

/// A store of document versions, generic over the tokenizer that maps
/// stored bytes to diffable tokens.
///
/// Exactly one of the head map and the patch map holds any stored tag.
/// Heads hold the wire encoding of the version's token sequence; patches
/// hold a serialized patch against the parent's tokens. A single store is
/// not reentrant-safe; wrap it externally for concurrent use.
pub struct VersionStore<C: Tokenizer = Bytes> {
    tokenizer: C,
    tree: VersionTree<Tag>,
    heads: HashMap<Tag, Vec<u8>>,
    diffs: HashMap<Tag, Vec<u8>>,
}

impl VersionStore {
    /// Creates a store that diffs and stores raw bytes.
    pub fn new() -> Self {
        Self::with_tokenizer(Bytes)
    }
}

impl Default for VersionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Tokenizer> VersionStore<C> {
    /// Creates a store that encodes content through `tokenizer` before
    /// diffing and storing it.
    pub fn with_tokenizer(tokenizer: C) -> Self {
        Self {
            tokenizer,
            tree: VersionTree::new(),
            heads: HashMap::new(),
            diffs: HashMap::new(),
        }
    }

    pub fn contains(&self, tag: &Tag) -> bool {
        self.tree.contains(tag)
    }

    /// Adds a version. With `base` given, the new version becomes the head
    /// of that branch and the old head (plus a promoted split node) are
    /// re-stored as patches against it.
    ///
    /// Not atomic: on error the store may hold partial state for `tag`.
    #[tracing::instrument(skip(self, content))]
    pub fn add(&mut self, tag: Tag, content: &[u8], base: Option<&Tag>) -> Result<(), StoreError> {
        if self.tree.contains(&tag) {
            return Err(StoreError::TagExists(tag));
        }
        if let Some(base) = base {
            if !self.tree.contains(base) {
                return Err(StoreError::UnknownBase(base.clone()));
            }
        }

        let tokens = self.tokenizer.encode(content);
        self.heads.insert(tag.clone(), patch::encode_tokens(&tokens));
        self.tree.add(tag.clone(), base);

        let Some(head) = base else {
            return Ok(());
        };

        // Reshape: the mid-chain split node becomes a direct child of the
        // new head, capping the length of future retrieval paths.
        let (split, _) = self
            .tree
            .get_split(head)
            .expect("base was checked to exist");
        if split != *head {
            let split_tokens = self.retrieve_tokens(&split)?;
            self.store_patch(&split, &tokens, &split_tokens);
            self.tree.change_parent(&split, &tag);
            self.heads.remove(&split);
            tracing::debug!(split = %split, head = %head, "promoted split node");
        }

        // The old head itself becomes a patch against the new version.
        let head_tokens = self.retrieve_tokens(head)?;
        self.store_patch(head, &tokens, &head_tokens);
        self.tree.change_parent(head, &tag);
        self.heads.remove(head);
        Ok(())
    }

    /// Retrieves a version's content, or `None` for an unknown tag.
    pub fn get(&self, tag: &Tag) -> Result<Option<BString>, StoreError> {
        if !self.tree.contains(tag) {
            return Ok(None);
        }
        let tokens = self.retrieve_tokens(tag)?;
        Ok(Some(self.tokenizer.decode(&tokens)?))
    }

    /// Reports how a version is stored, or `None` for an unknown tag.
    pub fn version_info(&self, tag: &Tag) -> Result<Option<VersionInfo>, StoreError> {
        if !self.tree.contains(tag) {
            return Ok(None);
        }
        let base = self.tree.base_version(tag).cloned();
        let info = if let Some(bytes) = self.heads.get(tag) {
            VersionInfo {
                base,
                token_count: patch::decode_tokens::<C::Token>(bytes)?.len(),
                change_count: 0,
            }
        } else {
            let bytes = self
                .diffs
                .get(tag)
                .ok_or_else(|| StoreError::MissingVersionData(tag.clone()))?;
            let items: Vec<PatchItem<C::Token>> = patch::deserialize(bytes)?;
            let token_count = items
                .iter()
                .map(|item| match item {
                    PatchItem::Tokens(run) => run.len(),
                    PatchItem::Slice(_) => 0,
                })
                .sum();
            VersionInfo {
                base,
                token_count,
                change_count: items.len(),
            }
        };
        Ok(Some(info))
    }

    /// Diffs `from_tokens` to `to_tokens` and stores the resulting patch
    /// under `tag`.
    fn store_patch(&mut self, tag: &Tag, from_tokens: &[C::Token], to_tokens: &[C::Token]) {
        let changeset = Changeset::build(from_tokens, to_tokens);
        let reduced = changeset.reduced(from_tokens, to_tokens);
        let stripped = patch::strip_forward(reduced);
        self.diffs.insert(tag.clone(), patch::serialize(&stripped));
    }

    /// Reconstructs any stored version's token sequence: directly for a
    /// head, by walking its patch chain from the root otherwise.
    fn retrieve_tokens(&self, tag: &Tag) -> Result<Vec<C::Token>, StoreError> {
        if self.heads.contains_key(tag) {
            self.tokens_of_head(tag)
        } else {
            let path = self
                .tree
                .path_to(tag)
                .ok_or_else(|| StoreError::MissingVersionData(tag.clone()))?;
            self.retrieve_along(&path)
        }
    }

    fn tokens_of_head(&self, tag: &Tag) -> Result<Vec<C::Token>, StoreError> {
        let bytes = self
            .heads
            .get(tag)
            .ok_or_else(|| StoreError::MissingVersionData(tag.clone()))?;
        Ok(patch::decode_tokens(bytes)?)
    }

    /// Reconstructs the version at the end of `path` by applying each
    /// stored patch in turn, starting from the head at `path[0]`.
    fn retrieve_along(&self, path: &[Tag]) -> Result<Vec<C::Token>, StoreError> {
        let (root, rest) = path
            .split_first()
            .expect("a tree path is never empty");
        let mut tokens = self.tokens_of_head(root)?;
        for tag in rest {
            let bytes = self
                .diffs
                .get(tag)
                .ok_or_else(|| StoreError::MissingVersionData(tag.clone()))?;
            let items: Vec<PatchItem<C::Token>> = patch::deserialize(bytes)?;
            tokens = patch::apply(&items, &tokens)?;
        }
        tracing::debug!(tag = %path[path.len() - 1], path_len = path.len(), "reconstructed version");
        Ok(tokens)
    }
}
