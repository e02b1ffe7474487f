//! Keyed list reconciliation benchmarks against the in-memory host.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use rasen_core::component::{each, mount_root};
use rasen_core::graph::GraphRuntime;
use rasen_core::host::{text, MemoryHost};
use rasen_core::reactive::{configure, Ref};

const LEN: usize = 1_000;

fn mounted(items: Vec<usize>) -> (Ref<Vec<usize>>, MemoryHost, rasen_core::MountHandle) {
    let source = Ref::new(items).expect("runtime configured");
    let host = MemoryHost::new();
    let view = each(source.clone(), |item: Ref<usize>, _| {
        text(item.get_untracked().to_string())
    });
    let root = mount_root(view, &host).expect("mount");
    (source, host, root)
}

/// Deterministic shuffle so runs are comparable.
fn shuffled(len: usize) -> Vec<usize> {
    let mut items: Vec<usize> = (0..len).collect();
    let mut state = 0x2545_f491_u64;
    for i in (1..len).rev() {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        items.swap(i, (state % (i as u64 + 1)) as usize);
    }
    items
}

fn bench_reconcile(c: &mut Criterion) {
    configure(GraphRuntime::new());

    c.bench_function("each/shuffle_1000", |b| {
        let next = shuffled(LEN);
        b.iter_batched(
            || mounted((0..LEN).collect()),
            |(source, host, root)| {
                source.set(black_box(next.clone()));
                (source, host, root)
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("each/append_100", |b| {
        let next: Vec<usize> = (0..LEN + 100).collect();
        b.iter_batched(
            || mounted((0..LEN).collect()),
            |(source, host, root)| {
                source.set(black_box(next.clone()));
                (source, host, root)
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("each/rotate_1000", |b| {
        let mut next: Vec<usize> = (0..LEN).collect();
        next.rotate_right(1);
        b.iter_batched(
            || mounted((0..LEN).collect()),
            |(source, host, root)| {
                source.set(black_box(next.clone()));
                (source, host, root)
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_reconcile);
criterion_main!(benches);
