use std::sync::Arc;
use std::thread;

use blockvault::config::default_hash;
use blockvault::{Blockstore, FileStore, RecordType, StoreOptions};
use tempfile::tempdir;

fn merkle_payload(fill: u8) -> Vec<u8> {
    // Merkle bodies lead with the hash they are keyed by.
    let body = vec![fill; 96];
    let mut data = default_hash(&body).to_vec();
    data.extend_from_slice(&body);
    data
}

#[test]
fn writes_to_different_types_run_in_parallel() {
    let dir = tempdir().expect("tempdir");
    let options = StoreOptions::new(dir.path());
    let store = Arc::new(FileStore::open(options).expect("open"));

    let handles: Vec<_> = RecordType::ALL
        .into_iter()
        .map(|rt| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for fill in 0..4u8 {
                    let data = match rt {
                        RecordType::Merkle => merkle_payload(fill),
                        _ => vec![fill; 128],
                    };
                    let hash = match rt {
                        RecordType::Merkle => data[..32].try_into().expect("slice length"),
                        _ => default_hash(&data),
                    };
                    assert!(store.write(rt, &hash, &data).expect("write"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("join");
    }

    for rt in RecordType::ALL {
        for fill in 0..4u8 {
            let data = match rt {
                RecordType::Merkle => merkle_payload(fill),
                _ => vec![fill; 128],
            };
            let hash = match rt {
                RecordType::Merkle => data[..32].try_into().expect("slice length"),
                _ => default_hash(&data),
            };
            assert!(store.has(rt, &hash).expect("has"));
            assert_eq!(store.read(rt, &hash, 0, None).expect("read"), Some(data));
        }
    }

    // Each type segments independently.
    assert!(dir.path().join("blk00000.dat").exists());
    assert!(dir.path().join("blu00000.dat").exists());
    assert!(dir.path().join("blm00000.dat").exists());
}
