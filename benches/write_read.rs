use criterion::{criterion_group, criterion_main, Criterion};

use blockvault::config::default_hash;
use blockvault::{Blockstore, FileStore, StoreOptions};

fn bench_write_read(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut options = StoreOptions::new(dir.path());
    options.max_file_length = 64 * 1024 * 1024;
    let store = FileStore::open(options).expect("open");

    let payload = vec![0xA5u8; 4096];
    let mut counter = 0u64;
    c.bench_function("write_block_4k", |b| {
        b.iter(|| {
            let mut hash = [0u8; 32];
            hash[..8].copy_from_slice(&counter.to_le_bytes());
            counter += 1;
            store.write_block(&hash, &payload).expect("write");
        })
    });

    let hash = default_hash(&payload);
    store.write_block(&hash, &payload).expect("write");
    c.bench_function("read_block_4k", |b| {
        b.iter(|| store.read_block(&hash).expect("read"))
    });
}

criterion_group!(benches, bench_write_read);
criterion_main!(benches);
