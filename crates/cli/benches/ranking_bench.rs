use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ranking::RankingIndex;

const N_USERS: usize = 100_000;

fn build_index(n: usize) -> RankingIndex {
    let mut rng = StdRng::seed_from_u64(99);
    let mut index = RankingIndex::new();
    for i in 0..n {
        index.upsert(&format!("user{:06}", i), rng.gen_range(0..1_000_000), (i + 1) as u64);
    }
    index
}

fn upsert_benchmark(c: &mut Criterion) {
    c.bench_function("ranking_upsert_10k_into_100k", |b| {
        b.iter_batched(
            || (build_index(N_USERS), StdRng::seed_from_u64(7)),
            |(mut index, mut rng)| {
                for i in 0..10_000u64 {
                    let user = format!("user{:06}", rng.gen_range(0..N_USERS));
                    index.upsert(&user, rng.gen_range(0..1_000_000), N_USERS as u64 + i + 1);
                }
            },
            BatchSize::LargeInput,
        );
    });
}

fn rank_of_benchmark(c: &mut Criterion) {
    let index = build_index(N_USERS);
    let mut rng = StdRng::seed_from_u64(13);
    c.bench_function("ranking_rank_of_100k", |b| {
        b.iter(|| {
            let user = format!("user{:06}", rng.gen_range(0..N_USERS));
            black_box(index.rank_of(&user));
        });
    });
}

fn top_k_benchmark(c: &mut Criterion) {
    let index = build_index(N_USERS);
    c.bench_function("ranking_top_100_of_100k", |b| {
        b.iter(|| black_box(index.top_k(100)));
    });
}

criterion_group!(
    benches,
    upsert_benchmark,
    rank_of_benchmark,
    top_k_benchmark
);
criterion_main!(benches);
