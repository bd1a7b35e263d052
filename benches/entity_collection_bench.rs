use atomic_entities::{EntityCollection, MatchMode};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use hashbrown::HashSet;
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn pick_10k(n: usize) -> Vec<usize> {
    let mut sel = std::collections::HashSet::with_capacity(10_000);
    let mut s = 0x9e3779b97f4a7c15u64;
    while sel.len() < 10_000 {
        s = s.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
        sel.insert((s as usize) % n);
    }
    sel.into_iter().collect()
}

fn bench_add_100k(c: &mut Criterion) {
    c.bench_function("collection::add_fresh_100k", |b| {
        b.iter_batched(
            EntityCollection::<String>::new,
            |mut s| {
                for x in lcg(1).take(100_000) {
                    s.add(key(x));
                }
                black_box(s)
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("collection::add_fresh_100k_full_equality", |b| {
        b.iter_batched(
            || EntityCollection::<String>::new().with_match_mode(MatchMode::FullEquality),
            |mut s| {
                for x in lcg(1).take(100_000) {
                    s.add(key(x));
                }
                black_box(s)
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("hashbrown::insert_fresh_100k", |b| {
        b.iter_batched(
            HashSet::<String>::new,
            |mut s| {
                for x in lcg(1).take(100_000) {
                    s.insert(key(x));
                }
                black_box(s)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_add_presized_100k(c: &mut Criterion) {
    c.bench_function("collection::add_presized_100k", |b| {
        b.iter_batched(
            || EntityCollection::<String>::with_capacity(100_000),
            |mut s| {
                for x in lcg(2).take(100_000) {
                    s.add(key(x));
                }
                black_box(s)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_remove_random_10k(c: &mut Criterion) {
    c.bench_function("collection::remove_random_10k_of_110k", |b| {
        b.iter_batched(
            || {
                let keys: Vec<String> = lcg(5).take(110_000).map(key).collect();
                let s: EntityCollection<String> = keys.iter().cloned().collect();
                let to_remove: Vec<String> = pick_10k(keys.len())
                    .into_iter()
                    .map(|i| keys[i].clone())
                    .collect();
                (s, to_remove)
            },
            |(mut s, to_remove)| {
                for k in &to_remove {
                    s.remove(k);
                }
                black_box(s)
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("hashbrown::remove_random_10k_of_110k", |b| {
        b.iter_batched(
            || {
                let keys: Vec<String> = lcg(5).take(110_000).map(key).collect();
                let s: HashSet<String> = keys.iter().cloned().collect();
                let to_remove: Vec<String> = pick_10k(keys.len())
                    .into_iter()
                    .map(|i| keys[i].clone())
                    .collect();
                (s, to_remove)
            },
            |(mut s, to_remove)| {
                for k in &to_remove {
                    s.remove(k);
                }
                black_box(s)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_contains(c: &mut Criterion) {
    let keys: Vec<String> = lcg(7).take(100_000).map(key).collect();
    let queries: Vec<String> = pick_10k(keys.len()).into_iter().map(|i| keys[i].clone()).collect();

    c.bench_function("collection::contains_hit_10k_on_100k", |b| {
        let s: EntityCollection<String> = keys.iter().cloned().collect();
        b.iter(|| {
            for k in &queries {
                black_box(s.contains(k));
            }
        })
    });

    c.bench_function("collection::contains_miss_10k_on_100k", |b| {
        let s: EntityCollection<String> = keys.iter().cloned().collect();
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            for _ in 0..10_000 {
                let k = key(miss.next().unwrap());
                black_box(s.contains(&k));
            }
        })
    });

    c.bench_function("hashbrown::contains_hit_10k_on_100k", |b| {
        let s: HashSet<String> = keys.iter().cloned().collect();
        b.iter(|| {
            for k in &queries {
                black_box(s.contains(k));
            }
        })
    });
}

fn bench_iter_100k(c: &mut Criterion) {
    c.bench_function("collection::iter_all_100k", |b| {
        let s: EntityCollection<u64> = lcg(999).take(100_000).collect();
        b.iter(|| {
            let mut sum = 0u64;
            for v in s.iter() {
                sum = sum.wrapping_add(*v);
            }
            black_box(sum)
        })
    });

    c.bench_function("collection::iter_after_churn_100k", |b| {
        // Interleaved removals scatter the order list across the arena.
        let mut s: EntityCollection<u64> = lcg(1001).take(150_000).collect();
        let doomed: Vec<u64> = s.iter().copied().step_by(3).collect();
        for v in &doomed {
            s.remove(v);
        }
        b.iter(|| {
            let mut sum = 0u64;
            for v in s.iter() {
                sum = sum.wrapping_add(*v);
            }
            black_box(sum)
        })
    });

    c.bench_function("hashbrown::iter_all_100k", |b| {
        let s: HashSet<u64> = lcg(999).take(100_000).collect();
        b.iter(|| {
            let mut sum = 0u64;
            for v in s.iter() {
                sum = sum.wrapping_add(*v);
            }
            black_box(sum)
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(12)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches_insert;
    config = bench_config();
    targets = bench_add_100k, bench_add_presized_100k
}
criterion_group! {
    name = benches_ops;
    config = bench_config();
    targets = bench_remove_random_10k,
              bench_contains,
              bench_iter_100k
}
criterion_main!(benches_insert, benches_ops);
