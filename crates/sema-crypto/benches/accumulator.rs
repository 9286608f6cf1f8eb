use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use sema_crypto::{default_zero_value, hasher_for, MembershipAccumulator};
use sema_types::{FieldElement, HashScheme};

fn filled_tree(scheme: HashScheme, leaves: u64) -> MembershipAccumulator {
    let mut tree = MembershipAccumulator::new(20, 5, default_zero_value(), hasher_for(scheme))
        .expect("valid parameters");
    for i in 0..leaves {
        tree.insert(&FieldElement::from_u64(i + 1)).expect("capacity");
    }
    tree
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("accumulator_insert_d20_k5");
    for scheme in [HashScheme::Poseidon, HashScheme::Blake3] {
        group.bench_function(scheme.to_string(), |b| {
            b.iter_batched(
                || filled_tree(scheme, 100),
                |mut tree| tree.insert(black_box(&FieldElement::from_u64(424242))),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_path(c: &mut Criterion) {
    let tree = filled_tree(HashScheme::Poseidon, 500);
    c.bench_function("accumulator_path_d20_k5", |b| {
        b.iter(|| tree.path(black_box(250)))
    });
}

criterion_group!(benches, bench_insert, bench_path);
criterion_main!(benches);
