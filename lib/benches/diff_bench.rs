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

use std::hint::black_box;

use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;
use rand::Rng as _;
use rand::SeedableRng as _;
use rand_chacha::ChaCha8Rng;
use strata_lib::diff::diff;
use strata_lib::merge::merge;
use strata_lib::store::Tag;
use strata_lib::store::VersionStore;

/// A synthetic document of repetitive prose-like lines.
fn document(lines: usize, seed: u64) -> Vec<u8> {
    let words: &[&[u8]] = &[b"alpha", b"beta", b"gamma", b"delta", b"epsilon"];
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut content = Vec::new();
    for _ in 0..lines {
        for _ in 0..8 {
            content.extend_from_slice(words[rng.random_range(0..words.len())]);
            content.push(b' ');
        }
        content.push(b'\n');
    }
    content
}

/// Applies `count` random single-byte edits.
fn mutate(content: &[u8], count: usize, seed: u64) -> Vec<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut mutated = content.to_vec();
    for _ in 0..count {
        let position = rng.random_range(0..mutated.len());
        match rng.random_range(0..3) {
            0 => mutated[position] = rng.random_range(b'a'..=b'z'),
            1 => {
                mutated.insert(position, rng.random_range(b'a'..=b'z'));
            }
            _ => {
                mutated.remove(position);
            }
        }
    }
    mutated
}

fn bench_diff(c: &mut Criterion) {
    let original = document(200, 1);
    let modified = mutate(&original, 20, 2);
    c.bench_function("diff_mutated_document", |b| {
        b.iter(|| diff(black_box(&original), black_box(&modified)));
    });
}

fn bench_merge(c: &mut Criterion) {
    let parent = document(200, 3);
    let branch0 = mutate(&parent, 20, 4);
    let branch1 = mutate(&parent, 20, 5);
    c.bench_function("merge_mutated_branches", |b| {
        b.iter(|| merge(black_box(&parent), black_box(&branch0), black_box(&branch1)));
    });
}

fn bench_store(c: &mut Criterion) {
    let mut revisions = vec![document(100, 6)];
    for index in 0..50 {
        let next = mutate(revisions.last().unwrap(), 10, 7 + index);
        revisions.push(next);
    }
    c.bench_function("store_add_and_get_50_revisions", |b| {
        b.iter(|| {
            let mut store = VersionStore::new();
            let mut base: Option<Tag> = None;
            for (index, content) in revisions.iter().enumerate() {
                let tag = Tag::new(format!("v{index}"));
                store.add(tag.clone(), content, base.as_ref()).unwrap();
                base = Some(tag);
            }
            for index in 0..revisions.len() {
                black_box(store.get(&Tag::new(format!("v{index}"))).unwrap());
            }
        });
    });
}

criterion_group!(benches, bench_diff, bench_merge, bench_store);
criterion_main!(benches);
