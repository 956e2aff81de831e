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

//! Structural diffs of token sequences.
//!
//! Two sequences are decomposed by recursively locating their longest
//! common substring: the match becomes an interior node of a [`Changeset`]
//! tree and the parts before and after it are decomposed in turn. The
//! leaves hold regions with nothing in common. This is a greedy
//! decomposition over common substrings, not a minimal edit script, which
//! keeps it linear-ish on natural text and gives long verbatim copy
//! regions, the shape the patch store wants.
//!
//! An in-order walk of the tree linearises it into one of three streams:
//! merge fragments, a presentable diff, or a reduced stream of slice pairs
//! suitable for stripping into a patch.

use std::hash::Hash;
use std::ops::Range;

use crate::suffix_automaton::SuffixAutomaton;

/// Recursive decomposition of two sequences into alternating common and
/// differing regions. Holds only ranges into the caller's slices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Changeset {
    /// Two regions with no substring in common (either may be empty).
    Leaf {
        original: Range<usize>,
        modified: Range<usize>,
    },
    /// A common substring with the decompositions of what surrounds it.
    Common {
        common_original: Range<usize>,
        common_modified: Range<usize>,
        prefix: Box<Changeset>,
        suffix: Box<Changeset>,
    },
}

impl Changeset {
    /// Decomposes `original` and `modified`.
    pub fn build<T: Copy + Eq + Hash>(original: &[T], modified: &[T]) -> Self {
        build_range(original, modified, 0..original.len(), 0..modified.len())
    }

    fn walk(&self) -> InOrder<'_> {
        InOrder {
            stack: vec![Step::Descend(self)],
        }
    }

    /// Streams the tree as copy/change fragments, dropping empty leaves.
    pub fn fragments<'a, T>(
        &'a self,
        original: &'a [T],
        modified: &'a [T],
    ) -> impl Iterator<Item = Fragment<'a, T>> {
        self.walk().filter_map(move |visit| match visit {
            Visit::Common { original: range, .. } => Some(Fragment::Copy {
                content: &original[range.clone()],
            }),
            Visit::Leaf {
                original: orig,
                modified: modi,
            } => {
                if orig.is_empty() && modi.is_empty() {
                    None
                } else {
                    Some(Fragment::Change {
                        insert: &modified[modi.clone()],
                        delete: &original[orig.clone()],
                    })
                }
            }
        })
    }

    /// Streams the tree as owned diff items.
    pub fn diff_items<T: Clone>(&self, original: &[T], modified: &[T]) -> Vec<DiffItem<T>> {
        self.walk()
            .filter_map(|visit| match visit {
                Visit::Common { original: range, .. } => {
                    Some(DiffItem::Common(original[range.clone()].to_vec()))
                }
                Visit::Leaf {
                    original: orig,
                    modified: modi,
                } => {
                    if orig.is_empty() && modi.is_empty() {
                        None
                    } else {
                        Some(DiffItem::Change(
                            modified[modi.clone()].to_vec(),
                            original[orig.clone()].to_vec(),
                        ))
                    }
                }
            })
            .collect()
    }

    /// Streams the tree with common regions as slice pairs instead of
    /// materialized tokens. This is the form patches are stripped from.
    pub fn reduced<T: Clone>(&self, original: &[T], modified: &[T]) -> Vec<ReducedItem<T>> {
        self.walk()
            .filter_map(|visit| match visit {
                Visit::Common {
                    original: orig,
                    modified: modi,
                } => Some(ReducedItem::Common {
                    original: orig.clone(),
                    modified: modi.clone(),
                }),
                Visit::Leaf {
                    original: orig,
                    modified: modi,
                } => {
                    if orig.is_empty() && modi.is_empty() {
                        None
                    } else {
                        Some(ReducedItem::Change {
                            insert: modified[modi.clone()].to_vec(),
                            delete: original[orig.clone()].to_vec(),
                        })
                    }
                }
            })
            .collect()
    }
}

/// Decomposes a sub-range pair. The suffix side of each match is handled
/// by looping rather than recursing, so only prefix decompositions consume
/// stack; the spine is folded back into a tree at the end.
fn build_range<T: Copy + Eq + Hash>(
    original: &[T],
    modified: &[T],
    mut orig: Range<usize>,
    mut modi: Range<usize>,
) -> Changeset {
    let mut spine = Vec::new();
    loop {
        let automaton = SuffixAutomaton::build(original[orig.clone()].iter().copied());
        let lcs = automaton.find_lcs(&modified[modi.clone()]);
        if lcs.len == 0 {
            let mut node = Changeset::Leaf {
                original: orig,
                modified: modi,
            };
            while let Some((common_original, common_modified, prefix)) = spine.pop() {
                node = Changeset::Common {
                    common_original,
                    common_modified,
                    prefix: Box::new(prefix),
                    suffix: Box::new(node),
                };
            }
            return node;
        }

        let common_original = orig.start + lcs.start_a..orig.start + lcs.start_a + lcs.len;
        let common_modified = modi.start + lcs.start_b..modi.start + lcs.start_b + lcs.len;
        let prefix = build_range(
            original,
            modified,
            orig.start..common_original.start,
            modi.start..common_modified.start,
        );
        spine.push((common_original.clone(), common_modified.clone(), prefix));
        orig = common_original.end..orig.end;
        modi = common_modified.end..modi.end;
    }
}

/// In-order visit of one tree node.
enum Visit<'a> {
    Leaf {
        original: &'a Range<usize>,
        modified: &'a Range<usize>,
    },
    Common {
        original: &'a Range<usize>,
        modified: &'a Range<usize>,
    },
}

enum Step<'a> {
    Descend(&'a Changeset),
    Emit(&'a Changeset),
}

/// Explicit-stack in-order traversal; the trees of large inputs are too
/// deep to walk recursively.
struct InOrder<'a> {
    stack: Vec<Step<'a>>,
}

impl<'a> Iterator for InOrder<'a> {
    type Item = Visit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(step) = self.stack.pop() {
            match step {
                Step::Descend(node @ Changeset::Common { prefix, suffix, .. }) => {
                    self.stack.push(Step::Descend(suffix.as_ref()));
                    self.stack.push(Step::Emit(node));
                    self.stack.push(Step::Descend(prefix.as_ref()));
                }
                Step::Descend(leaf @ Changeset::Leaf { .. }) => {
                    self.stack.push(Step::Emit(leaf));
                }
                Step::Emit(Changeset::Leaf { original, modified }) => {
                    return Some(Visit::Leaf { original, modified });
                }
                Step::Emit(Changeset::Common {
                    common_original,
                    common_modified,
                    ..
                }) => {
                    return Some(Visit::Common {
                        original: common_original,
                        modified: common_modified,
                    });
                }
            }
        }
        None
    }
}

/// One piece of a linearised changeset, borrowed from the diffed inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fragment<'a, T> {
    /// A region shared by both sequences.
    Copy { content: &'a [T] },
    /// `insert` replaces `delete`; either may be empty, not both.
    Change { insert: &'a [T], delete: &'a [T] },
}

/// One piece of a diff or merge result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffItem<T> {
    /// Tokens present on both sides (diff), or on all branches (merge).
    Common(Vec<T>),
    /// Differing region: `(modified, original)` for a diff; for a merge,
    /// the two versions of a conflict (see [`crate::merge::merge`]).
    Change(Vec<T>, Vec<T>),
}

/// One piece of a reduced changeset stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReducedItem<T> {
    /// A shared region, as slices into the original and the modified.
    Common {
        original: Range<usize>,
        modified: Range<usize>,
    },
    Change { insert: Vec<T>, delete: Vec<T> },
}

/// Diffs two sequences, yielding unchanged runs and `(modified, original)`
/// change pairs whose join reconstructs either input.
pub fn diff<T: Copy + Eq + Hash>(original: &[T], modified: &[T]) -> Vec<DiffItem<T>> {
    Changeset::build(original, modified).diff_items(original, modified)
}

/// Reconstructs the modified sequence from a diff stream.
pub fn apply_forward<T: Clone>(items: &[DiffItem<T>]) -> Vec<T> {
    let mut output = Vec::new();
    for item in items {
        match item {
            DiffItem::Common(run) => output.extend_from_slice(run),
            DiffItem::Change(insert, _) => output.extend_from_slice(insert),
        }
    }
    output
}

/// Reconstructs the original sequence from a diff stream.
pub fn apply_reverse<T: Clone>(items: &[DiffItem<T>]) -> Vec<T> {
    let mut output = Vec::new();
    for item in items {
        match item {
            DiffItem::Common(run) => output.extend_from_slice(run),
            DiffItem::Change(_, delete) => output.extend_from_slice(delete),
        }
    }
    output
}
