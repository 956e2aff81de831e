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

//! Three-way merge of two branches against their common parent.
//!
//! Each branch is diffed against the parent and linearised into copy and
//! change fragments; both fragment streams cover the parent completely, so
//! they can be consumed in lockstep, splitting whichever fragment is longer
//! at each step. Where exactly one branch modifies a region the change
//! stands; where both do, a conflict fragment records the two versions.
//!
//! A merge never fails. The raw fragment stream then goes through two
//! consolidation passes: conflict groups are re-diffed against each other,
//! which turns content common to both versions back into resolved output
//! (shrinking the reported conflict), and finally adjacent fragments of the
//! same kind are collapsed into single items.

use std::hash::Hash;
use std::mem;

use crate::diff::Changeset;
use crate::diff::DiffItem;
use crate::diff::Fragment;

/// Merges `branch0` and `branch1`, both derived from `parent`.
///
/// Yields resolved token runs and conflict pairs holding the two versions
/// of each disputed region. Where both branches changed the same region
/// the pair is `(branch0, branch1)`; where one branch's change overruns a
/// region the other left alone, the changing branch's insertion comes
/// first. A merge with no content yields one empty run.
pub fn merge<T: Copy + Eq + Hash>(
    parent: &[T],
    branch0: &[T],
    branch1: &[T],
) -> Vec<DiffItem<T>> {
    let changeset0 = Changeset::build(parent, branch0);
    let changeset1 = Changeset::build(parent, branch1);
    let mut stack0: Vec<Fragment<T>> = changeset0.fragments(parent, branch0).collect();
    let mut stack1: Vec<Fragment<T>> = changeset1.fragments(parent, branch1).collect();
    stack0.reverse();
    stack1.reverse();
    let merged = interleave(stack0, stack1);
    collapse(refactor_conflicts(merged))
}

/// Raw merge output before consolidation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Merged<'a, T> {
    Copy(&'a [T]),
    Change { insert: &'a [T], delete: &'a [T] },
    Conflict { left: &'a [T], right: &'a [T] },
}

/// Parent tokens covered by a fragment.
fn parent_len<T>(fragment: &Fragment<'_, T>) -> usize {
    match fragment {
        Fragment::Copy { content } => content.len(),
        Fragment::Change { delete, .. } => delete.len(),
    }
}

/// Splits a fragment for conflict emission: the head is the fragment's
/// branch-side content over the first `len` parent tokens, the tail covers
/// whatever parent tokens remain.
fn conflict_split<'a, T>(
    fragment: Fragment<'a, T>,
    len: usize,
) -> (&'a [T], Option<Fragment<'a, T>>) {
    match fragment {
        Fragment::Copy { content } => {
            let tail = (content.len() > len).then(|| Fragment::Copy {
                content: &content[len..],
            });
            (&content[..len], tail)
        }
        Fragment::Change { insert, delete } => {
            let tail = (delete.len() > len).then(|| Fragment::Change {
                insert: &[],
                delete: &delete[len..],
            });
            (insert, tail)
        }
    }
}

/// Consumes the two fragment stacks (topmost fragment first) in lockstep
/// over the parent sequence.
fn interleave<'a, T: Copy + Eq + Hash>(
    mut stack0: Vec<Fragment<'a, T>>,
    mut stack1: Vec<Fragment<'a, T>>,
) -> Vec<Merged<'a, T>> {
    let mut output = Vec::new();
    let mut within_conflict = false;

    while let (Some(&f0), Some(&f1)) = (stack0.last(), stack1.last()) {
        stack0.pop();
        stack1.pop();
        match (f0, f1) {
            (Fragment::Copy { content: c0 }, Fragment::Copy { content: c1 }) => {
                within_conflict = false;
                let len = c0.len().min(c1.len());
                output.push(Merged::Copy(&c0[..len]));
                if c0.len() > len {
                    stack0.push(Fragment::Copy {
                        content: &c0[len..],
                    });
                }
                if c1.len() > len {
                    stack1.push(Fragment::Copy {
                        content: &c1[len..],
                    });
                }
            }
            (f0, f1) if within_conflict => {
                // An open conflict swallows whatever follows on both sides
                // until the branches agree on a copied region again.
                let len = parent_len(&f0).min(parent_len(&f1));
                let (left, tail0) = conflict_split(f0, len);
                let (right, tail1) = conflict_split(f1, len);
                output.push(Merged::Conflict { left, right });
                if let Some(tail) = tail0 {
                    stack0.push(tail);
                }
                if let Some(tail) = tail1 {
                    stack1.push(tail);
                }
            }
            (
                Fragment::Change {
                    insert: insert0,
                    delete: delete0,
                },
                Fragment::Change {
                    insert: insert1,
                    delete: delete1,
                },
            ) => {
                if delete0.is_empty() && insert1.is_empty() {
                    // A pure insertion on one side and a pure deletion on
                    // the other commute; requeue them as one change.
                    stack1.push(Fragment::Change {
                        insert: insert0,
                        delete: delete1,
                    });
                } else if insert0.is_empty() && delete1.is_empty() {
                    stack0.push(Fragment::Change {
                        insert: insert1,
                        delete: delete0,
                    });
                } else if insert0 == insert1 && delete0 == delete1 {
                    // Both branches made the identical change.
                    output.push(Merged::Change {
                        insert: insert0,
                        delete: delete0,
                    });
                } else {
                    let len = delete0.len().min(delete1.len());
                    output.push(Merged::Conflict {
                        left: insert0,
                        right: insert1,
                    });
                    if delete0.len() > len {
                        stack0.push(Fragment::Change {
                            insert: &[],
                            delete: &delete0[len..],
                        });
                    }
                    if delete1.len() > len {
                        stack1.push(Fragment::Change {
                            insert: &[],
                            delete: &delete1[len..],
                        });
                    }
                    within_conflict = true;
                }
            }
            (Fragment::Copy { content }, Fragment::Change { insert, delete }) => {
                let len = content.len().min(delete.len());
                if delete.len() == len {
                    // Only one branch touches the copied region; the change
                    // stands.
                    output.push(Merged::Change { insert, delete });
                    if content.len() > len {
                        stack0.push(Fragment::Copy {
                            content: &content[len..],
                        });
                    }
                } else {
                    // The change overruns the copy; the conflict reports
                    // the insertion first, whichever branch it came from.
                    output.push(Merged::Conflict {
                        left: insert,
                        right: &content[..len],
                    });
                    stack1.push(Fragment::Change {
                        insert: &[],
                        delete: &delete[len..],
                    });
                }
            }
            (Fragment::Change { insert, delete }, Fragment::Copy { content }) => {
                let len = content.len().min(delete.len());
                if delete.len() == len {
                    output.push(Merged::Change { insert, delete });
                    if content.len() > len {
                        stack1.push(Fragment::Copy {
                            content: &content[len..],
                        });
                    }
                } else {
                    output.push(Merged::Conflict {
                        left: insert,
                        right: &content[..len],
                    });
                    stack0.push(Fragment::Change {
                        insert: &[],
                        delete: &delete[len..],
                    });
                }
            }
        }
    }

    // One stream may end with trailing fragments, typically insertions
    // past the last agreed region. Inside a conflict they extend it
    // one-sided; otherwise they pass through.
    for fragment in stack0.into_iter().rev() {
        if within_conflict {
            let (left, _) = conflict_split(fragment, parent_len(&fragment));
            output.push(Merged::Conflict { left, right: &[] });
        } else {
            output.push(merged_as_is(fragment));
        }
    }
    for fragment in stack1.into_iter().rev() {
        if within_conflict {
            let (right, _) = conflict_split(fragment, parent_len(&fragment));
            output.push(Merged::Conflict { left: &[], right });
        } else {
            output.push(merged_as_is(fragment));
        }
    }

    output
}

fn merged_as_is<'a, T>(fragment: Fragment<'a, T>) -> Merged<'a, T> {
    match fragment {
        Fragment::Copy { content } => Merged::Copy(content),
        Fragment::Change { insert, delete } => Merged::Change { insert, delete },
    }
}

/// Consolidated merge output.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Piece<T> {
    Copy(Vec<T>),
    Change { insert: Vec<T> },
    Conflict { left: Vec<T>, right: Vec<T> },
}

/// First consolidation pass: re-diff each contiguous conflict group.
///
/// The two concatenated conflict sides often share content (the branches
/// disagreed about a region but not about all of it); diffing one side
/// against the other turns the shared parts into resolved copies and leaves
/// smaller conflicts.
fn refactor_conflicts<T: Copy + Eq + Hash>(merged: Vec<Merged<'_, T>>) -> Vec<Piece<T>> {
    let mut pieces = Vec::new();
    let mut iter = merged.into_iter().peekable();
    while let Some(item) = iter.next() {
        match item {
            Merged::Copy(content) => pieces.push(Piece::Copy(content.to_vec())),
            Merged::Change { insert, .. } => pieces.push(Piece::Change {
                insert: insert.to_vec(),
            }),
            Merged::Conflict { left, right } => {
                let mut lefts = left.to_vec();
                let mut rights = right.to_vec();
                while let Some(&Merged::Conflict { left, right }) = iter.peek() {
                    lefts.extend_from_slice(left);
                    rights.extend_from_slice(right);
                    iter.next();
                }
                let changeset = Changeset::build(&rights, &lefts);
                for fragment in changeset.fragments(&rights, &lefts) {
                    match fragment {
                        Fragment::Copy { content } => {
                            pieces.push(Piece::Copy(content.to_vec()));
                        }
                        Fragment::Change { insert, delete } => {
                            pieces.push(Piece::Conflict {
                                left: insert.to_vec(),
                                right: delete.to_vec(),
                            });
                        }
                    }
                }
            }
        }
    }
    pieces
}

/// Second consolidation pass: collapse adjacent pieces of the same kind
/// into single items.
fn collapse<T: Clone>(pieces: Vec<Piece<T>>) -> Vec<DiffItem<T>> {
    let mut items = Vec::new();
    let mut run: Vec<T> = Vec::new();
    let mut conflict: Option<(Vec<T>, Vec<T>)> = None;
    for piece in pieces {
        match piece {
            Piece::Conflict { left, right } => {
                if !run.is_empty() {
                    items.push(DiffItem::Common(mem::take(&mut run)));
                }
                let (lefts, rights) = conflict.get_or_insert_with(Default::default);
                lefts.extend(left);
                rights.extend(right);
            }
            Piece::Copy(content) => {
                if let Some((left, right)) = conflict.take() {
                    items.push(DiffItem::Change(left, right));
                }
                run.extend(content);
            }
            Piece::Change { insert } => {
                if let Some((left, right)) = conflict.take() {
                    items.push(DiffItem::Change(left, right));
                }
                run.extend(insert);
            }
        }
    }
    if let Some((left, right)) = conflict.take() {
        items.push(DiffItem::Change(left, right));
    }
    if !run.is_empty() {
        items.push(DiffItem::Common(run));
    }
    if items.is_empty() {
        items.push(DiffItem::Common(vec![]));
    }
    items
}
