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

//! Suffix automaton over generic token sequences.
//!
//! The automaton recognises exactly the substrings of the sequence it was
//! built from, in at most `2N - 1` states. Construction is incremental and
//! amortized linear, following the classical online algorithm; see
//! <https://cp-algorithms.com/string/suffix-automaton.html>. On top of the
//! automaton this module answers substring membership, occurrence
//! enumeration, and longest-common-substring queries, including the
//! multi-sequence variant used to compare whole families of versions.

use std::collections::HashMap;
use std::hash::Hash;

use smallvec::SmallVec;

/// Index of a state in the automaton's arena.
///
/// All cross-references between states (transitions, suffix links, reverse
/// links) are ids into one `Vec`, which keeps the link structure free of
/// ownership cycles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct StateId(u32);

const ROOT: StateId = StateId(0);

#[derive(Clone, Debug)]
struct State<S> {
    /// Length of the longest substring in this state's class.
    len: usize,
    /// First position (exclusive) at which a substring of this state can
    /// end in the source sequence.
    first_endpos: usize,
    link: Option<StateId>,
    transitions: HashMap<S, StateId>,
    /// Reachable by consuming a whole suffix of the source.
    is_terminal: bool,
    /// Children in the suffix-link tree.
    reverse_links: SmallVec<[StateId; 2]>,
}

impl<S> State<S> {
    fn new(len: usize, first_endpos: usize) -> Self {
        Self {
            len,
            first_endpos,
            link: None,
            transitions: HashMap::new(),
            is_terminal: false,
            reverse_links: SmallVec::new(),
        }
    }
}

/// Location of a common substring of two sequences.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommonSubstring {
    /// Start of the first occurrence in the automaton's source sequence.
    pub start_a: usize,
    /// Start of the match in the queried sequence.
    pub start_b: usize,
    pub len: usize,
}

/// Suffix automaton of one token sequence.
pub struct SuffixAutomaton<S> {
    states: Vec<State<S>>,
    last: StateId,
}

impl<S: Copy + Eq + Hash> SuffixAutomaton<S> {
    /// Builds the automaton of `symbols`.
    pub fn build(symbols: impl IntoIterator<Item = S>) -> Self {
        let mut automaton = Self {
            states: vec![State::new(0, 0)],
            last: ROOT,
        };
        for symbol in symbols {
            automaton.extend(symbol);
        }
        automaton.mark_terminals();
        automaton.add_reverse_links();
        automaton
    }

    fn state(&self, id: StateId) -> &State<S> {
        &self.states[id.0 as usize]
    }

    fn state_mut(&mut self, id: StateId) -> &mut State<S> {
        &mut self.states[id.0 as usize]
    }

    fn new_state(&mut self, state: State<S>) -> StateId {
        let id = StateId(self.states.len() as u32);
        self.states.push(state);
        id
    }

    /// Extends the automaton to additionally recognise the substrings of
    /// `source + [symbol]`.
    fn extend(&mut self, symbol: S) {
        let new_len = self.state(self.last).len + 1;
        let cur = self.new_state(State::new(new_len, new_len));

        // Walk suffix links from the previous last state, adding the new
        // transition everywhere it is missing.
        let mut previous = None;
        let mut current = Some(self.last);
        while let Some(p) = current {
            if self.state(p).transitions.contains_key(&symbol) {
                break;
            }
            self.state_mut(p).transitions.insert(symbol, cur);
            previous = Some(p);
            current = self.state(p).link;
        }

        match current {
            None => {
                // Fell off the root: the symbol is new to the automaton.
                self.state_mut(cur).link = previous;
            }
            Some(p) => {
                let q = self.state(p).transitions[&symbol];
                if self.state(q).len == self.state(p).len + 1 {
                    self.state_mut(cur).link = Some(q);
                } else {
                    let clone = self.insert_clone(symbol, p, q);
                    self.state_mut(cur).link = Some(clone);
                }
            }
        }

        self.last = cur;
    }

    /// Splits state `q` reached over `symbol` from `p` by cloning it at
    /// length `p.len + 1`, retargeting the ancestors of `p` to the clone.
    fn insert_clone(&mut self, symbol: S, p: StateId, q: StateId) -> StateId {
        let clone_state = State {
            len: self.state(p).len + 1,
            first_endpos: self.state(q).first_endpos,
            link: self.state(q).link,
            transitions: self.state(q).transitions.clone(),
            is_terminal: false,
            reverse_links: SmallVec::new(),
        };
        let clone = self.new_state(clone_state);
        self.state_mut(q).link = Some(clone);

        let mut current = Some(p);
        while let Some(c) = current {
            if self.state(c).transitions.get(&symbol) != Some(&q) {
                break;
            }
            self.state_mut(c).transitions.insert(symbol, clone);
            current = self.state(c).link;
        }
        clone
    }

    fn mark_terminals(&mut self) {
        let mut current = Some(self.last);
        while let Some(id) = current {
            self.state_mut(id).is_terminal = true;
            current = self.state(id).link;
        }
    }

    fn add_reverse_links(&mut self) {
        for id in 0..self.states.len() {
            if let Some(link) = self.states[id].link {
                self.state_mut(link).reverse_links.push(StateId(id as u32));
            }
        }
    }

    fn match_state(&self, query: &[S]) -> Option<StateId> {
        let mut current = ROOT;
        for symbol in query {
            current = *self.state(current).transitions.get(symbol)?;
        }
        Some(current)
    }

    /// Whether `query` is a substring of the source sequence.
    pub fn contains(&self, query: &[S]) -> bool {
        self.match_state(query).is_some()
    }

    /// Returns the start of the first occurrence of `query` in the source
    /// sequence, or `None` if it is not a substring.
    pub fn find_substring(&self, query: &[S]) -> Option<usize> {
        let state = self.match_state(query)?;
        Some(self.state(state).first_endpos - query.len())
    }

    /// Returns the starts of all occurrences of `query`, sorted.
    pub fn find_substring_all(&self, query: &[S]) -> Vec<usize> {
        let Some(state) = self.match_state(query) else {
            return vec![];
        };
        self.start_positions(state, query.len())
    }

    /// Start positions of every occurrence of a length-`len` substring in
    /// `state`'s class: the suffix-link subtree below the state holds every
    /// end position.
    fn start_positions(&self, state: StateId, len: usize) -> Vec<usize> {
        let mut positions = Vec::new();
        let mut to_visit = vec![state];
        while let Some(current) = to_visit.pop() {
            positions.push(self.state(current).first_endpos - len);
            to_visit.extend(self.state(current).reverse_links.iter().copied());
        }
        positions.sort_unstable();
        positions.dedup();
        positions
    }

    /// Finds the longest substring common to the source sequence and
    /// `other`, scanning `other` once and climbing suffix links on
    /// mismatches.
    pub fn find_lcs(&self, other: &[S]) -> CommonSubstring {
        let mut longest = 0;
        let mut longest_endpos_a = 0;
        let mut longest_endpos_b = 0;

        let mut current = ROOT;
        let mut match_len = 0;
        for (position, symbol) in other.iter().enumerate() {
            let mut next = self.state(current).transitions.get(symbol).copied();
            while next.is_none() {
                let Some(link) = self.state(current).link else {
                    break;
                };
                current = link;
                match_len = self.state(current).len;
                next = self.state(current).transitions.get(symbol).copied();
            }
            if let Some(next) = next {
                match_len += 1;
                current = next;
            }
            if match_len > longest {
                longest = match_len;
                longest_endpos_a = self.state(current).first_endpos;
                longest_endpos_b = position + 1;
            }
        }

        CommonSubstring {
            start_a: longest_endpos_a - longest,
            start_b: longest_endpos_b - longest,
            len: longest,
        }
    }

    /// Enumerates every suffix of the source sequence, in no particular
    /// order. Exponential on pathological inputs; test use only.
    #[cfg(test)]
    fn suffixes(&self) -> Vec<Vec<S>> {
        let mut result = Vec::new();
        let mut stack = vec![(ROOT, Vec::new())];
        while let Some((id, prefix)) = stack.pop() {
            if self.state(id).is_terminal {
                result.push(prefix.clone());
            }
            for (&symbol, &target) in &self.state(id).transitions {
                let mut extended = prefix.clone();
                extended.push(symbol);
                stack.push((target, extended));
            }
        }
        result
    }
}

/// Symbol fed to a multi-sequence automaton: a caller token, or the
/// sentinel terminating input number `i`. Separators compare unequal to
/// every token, so no match can span two inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Symbol<T> {
    Token(T),
    Separator(u32),
}

/// Finds the longest substring common to every input sequence.
///
/// Returns the position of its first occurrence in each input, and its
/// length. The empty substring is common to everything, so zero inputs or
/// disjoint inputs yield length 0 at position 0.
///
/// All inputs are concatenated, separated by per-input sentinels, into one
/// automaton; a state is common to input `i` exactly when the suffix-link
/// class can reach the sentinel of `i`. Membership is propagated bottom-up
/// over the transition DAG with an explicit stack, since the automaton of a
/// large input is far too deep for recursion.
pub fn longest_common_substring<T: Copy + Eq + Hash>(inputs: &[&[T]]) -> (Vec<usize>, usize) {
    assert!(inputs.len() <= 64, "at most 64 input sequences");
    if inputs.is_empty() {
        return (vec![], 0);
    }

    let symbols = inputs.iter().enumerate().flat_map(|(index, input)| {
        input
            .iter()
            .map(|&token| Symbol::Token(token))
            .chain(std::iter::once(Symbol::Separator(index as u32)))
    });
    let automaton = SuffixAutomaton::build(symbols);

    let full: u64 = if inputs.len() == 64 {
        u64::MAX
    } else {
        (1 << inputs.len()) - 1
    };
    let mut membership: Vec<Option<u64>> = vec![None; automaton.states.len()];
    let mut best = ROOT;
    let mut best_len = 0;

    let mut stack = vec![ROOT];
    while let Some(&top) = stack.last() {
        if membership[top.0 as usize].is_some() {
            stack.pop();
            continue;
        }
        let state = automaton.state(top);
        let unresolved: Vec<StateId> = state
            .transitions
            .values()
            .filter(|target| membership[target.0 as usize].is_none())
            .copied()
            .collect();
        if unresolved.is_empty() {
            let mut mask = 0;
            for (symbol, target) in &state.transitions {
                match symbol {
                    Symbol::Separator(index) => mask |= 1 << index,
                    Symbol::Token(_) => {
                        mask |= membership[target.0 as usize].unwrap_or(0);
                    }
                }
            }
            membership[top.0 as usize] = Some(mask);
            if mask == full && state.len > best_len {
                best = top;
                best_len = state.len;
            }
            stack.pop();
        } else {
            stack.extend(unresolved);
        }
    }

    if best_len == 0 {
        return (vec![0; inputs.len()], 0);
    }

    // Map first-occurrence positions in the concatenation back into each
    // input by subtracting the input's cumulative offset.
    let positions = automaton.start_positions(best, best_len);
    let mut input_positions = Vec::with_capacity(inputs.len());
    let mut offset = 0;
    for input in inputs {
        let position = positions
            .iter()
            .find(|&&position| position >= offset)
            .expect("a full-membership state occurs in every input");
        input_positions.push(position - offset);
        offset += input.len() + 1;
    }
    (input_positions, best_len)
}

/// Finds every occurrence of `needle` in `haystack`.
pub fn find_substring_positions<T: Copy + Eq + Hash>(haystack: &[T], needle: &[T]) -> Vec<usize> {
    SuffixAutomaton::build(haystack.iter().copied()).find_substring_all(needle)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use itertools::Itertools as _;
    use rand::Rng as _;
    use rand::SeedableRng as _;
    use rand_chacha::ChaCha8Rng;
    use test_case::test_case;

    use super::*;

    fn automaton_of(source: &str) -> SuffixAutomaton<u8> {
        SuffixAutomaton::build(source.bytes())
    }

    #[test_case(""; "empty")]
    #[test_case("abcbc"; "short")]
    #[test_case("bananas"; "repetitive")]
    #[test_case("mississippi"; "nested repeats")]
    fn test_recognises_exactly_the_substrings(source: &str) {
        let automaton = automaton_of(source);
        assert!(automaton.states.len() <= (2 * source.len()).max(1));
        for start in 0..=source.len() {
            for stop in start..=source.len() {
                let substring = &source.as_bytes()[start..stop];
                let found = automaton.find_substring(substring).unwrap();
                assert_eq!(
                    &source.as_bytes()[found..found + substring.len()],
                    substring
                );
            }
        }
        for absent in ["x", "aa", "ban x", "cbcb"] {
            if !source.contains(absent) {
                assert_eq!(automaton.find_substring(absent.as_bytes()), None);
            }
        }
    }

    #[test]
    fn test_suffixes_enumeration() {
        for source in ["", "a", "abcbc", "bananas"] {
            let automaton = automaton_of(source);
            let expected: BTreeSet<Vec<u8>> = (0..=source.len())
                .map(|start| source.as_bytes()[start..].to_vec())
                .collect();
            let actual: BTreeSet<Vec<u8>> = automaton.suffixes().into_iter().collect();
            assert_eq!(actual, expected, "suffix set of {source:?}");
        }
    }

    #[test]
    fn test_find_substring_all_occurrences() {
        let automaton = automaton_of("abcabcabc");
        assert_eq!(automaton.find_substring_all(b"abc"), [0, 3, 6]);
        assert_eq!(automaton.find_substring_all(b"bca"), [1, 4]);
        assert_eq!(automaton.find_substring_all(b"abcabcabc"), [0]);
        assert_eq!(automaton.find_substring_all(b"cab"), [2, 5]);
        assert!(automaton.find_substring_all(b"cc").is_empty());
    }

    #[test]
    fn test_find_substring_all_with_overlaps() {
        let automaton = automaton_of("aaaa");
        assert_eq!(automaton.find_substring_all(b"aa"), [0, 1, 2]);
    }

    #[test_case("abcdefg", "xyzcdeq", "cde"; "interior match")]
    #[test_case("abc", "abc", "abc"; "identical")]
    #[test_case("abc", "xyz", ""; "disjoint")]
    #[test_case("", "xyz", ""; "empty source")]
    #[test_case("banana", "an", "an"; "needle inside")]
    fn test_find_lcs(a: &str, b: &str, expected: &str) {
        let lcs = automaton_of(a).find_lcs(b.as_bytes());
        assert_eq!(lcs.len, expected.len());
        assert_eq!(&a.as_bytes()[lcs.start_a..lcs.start_a + lcs.len], expected.as_bytes());
        assert_eq!(&b.as_bytes()[lcs.start_b..lcs.start_b + lcs.len], expected.as_bytes());
    }

    /// The returned match must be common and locally maximal: it can be
    /// extended in neither direction.
    #[test]
    fn test_find_lcs_is_locally_maximal_on_random_inputs() {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        for _ in 0..200 {
            let a: Vec<u8> = (0..rng.random_range(0..30))
                .map(|_| rng.random_range(b'a'..=b'd'))
                .collect();
            let b: Vec<u8> = (0..rng.random_range(0..30))
                .map(|_| rng.random_range(b'a'..=b'd'))
                .collect();
            let lcs = SuffixAutomaton::build(a.iter().copied()).find_lcs(&b);
            assert_eq!(
                a[lcs.start_a..lcs.start_a + lcs.len],
                b[lcs.start_b..lcs.start_b + lcs.len]
            );
            // No longer common substring exists.
            let longest_common = (0..=a.len())
                .cartesian_product(0..=b.len())
                .map(|(i, j)| {
                    std::iter::zip(&a[i..], &b[j..])
                        .take_while(|(x, y)| x == y)
                        .count()
                })
                .max()
                .unwrap_or(0);
            assert_eq!(lcs.len, longest_common);
        }
    }

    #[test]
    fn test_longest_common_substring_of_many() {
        let inputs: Vec<&[u8]> = vec![b"the quick brown fox", b"a quick brew", b"quit quick"];
        let (positions, len) = longest_common_substring(&inputs);
        assert_eq!(len, b" quick".len());
        for (input, position) in std::iter::zip(&inputs, &positions) {
            assert_eq!(&input[*position..*position + len], &b" quick"[..]);
        }
    }

    #[test]
    fn test_longest_common_substring_disjoint_inputs() {
        let inputs: Vec<&[u8]> = vec![b"abc", b"xyz"];
        assert_eq!(longest_common_substring(&inputs), (vec![0, 0], 0));
    }

    #[test]
    fn test_longest_common_substring_no_inputs() {
        let inputs: Vec<&[u8]> = vec![];
        assert_eq!(longest_common_substring(&inputs), (vec![], 0));
    }

    #[test]
    fn test_longest_common_substring_single_input() {
        let inputs: Vec<&[u8]> = vec![b"banana"];
        assert_eq!(longest_common_substring(&inputs), (vec![0], 6));
    }

    #[test]
    fn test_longest_common_substring_repeated_content() {
        // The sentinels keep a match from spanning input boundaries.
        let inputs: Vec<&[u8]> = vec![b"abab", b"bab a", b"xbaby"];
        let (positions, len) = longest_common_substring(&inputs);
        assert_eq!(len, 3);
        for (input, position) in std::iter::zip(&inputs, &positions) {
            assert_eq!(&input[*position..*position + len], &b"bab"[..]);
        }
    }

    #[test]
    fn test_find_substring_positions_wrapper() {
        assert_eq!(find_substring_positions(b"mississippi", b"ss"), [2, 5]);
        assert!(find_substring_positions(b"mississippi", b"zz").is_empty());
    }
}
