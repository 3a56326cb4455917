use hnswdb_core::hnsw::{HnswConfig, HnswIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

fn random_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..dim).map(|_| rng.gen::<f32>()).collect())
        .collect()
}

#[test]
fn test_concurrent_adds_8x100() {
    let index = Arc::new(HnswIndex::new(HnswConfig::new(16).with_seed(42)).unwrap());

    let handles: Vec<_> = (0..8u64)
        .map(|t| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                random_vectors(100, 16, t)
                    .iter()
                    .map(|v| index.add(v).unwrap())
                    .collect::<Vec<usize>>()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for h in handles {
        for id in h.join().unwrap() {
            assert!(ids.insert(id), "id {id} assigned twice");
        }
    }

    assert_eq!(index.len(), 800);
    assert_eq!(ids, (0..800).collect::<HashSet<usize>>());
    index.validate().unwrap();

    // Every vector is still reachable as its own nearest neighbor
    for t in 0..8u64 {
        for v in random_vectors(100, 16, t).iter().step_by(10) {
            let hits = index.search(v, 1, 100).unwrap();
            assert_eq!(hits[0].distance, 0.0);
            assert_eq!(index.vector(hits[0].id).as_deref(), Some(v.as_slice()));
        }
    }
}

#[test]
fn test_search_during_inserts() {
    let index = HnswIndex::new(HnswConfig::new(8).with_m(8).with_seed(9)).unwrap();
    index.add_batch(&random_vectors(100, 8, 9)).unwrap();
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        for t in 0..4u64 {
            let index = &index;
            s.spawn(move || {
                for v in random_vectors(150, 8, 100 + t) {
                    index.add(&v).unwrap();
                }
            });
        }
        for t in 0..4u64 {
            let index = &index;
            let done = &done;
            s.spawn(move || {
                let queries = random_vectors(50, 8, 200 + t);
                let mut rounds = 0;
                while !done.load(Ordering::Acquire) || rounds == 0 {
                    for q in &queries {
                        let hits = index.search(q, 5, 20).unwrap();
                        assert_eq!(hits.len(), 5);
                        for pair in hits.windows(2) {
                            assert!(pair[0].distance <= pair[1].distance);
                        }
                    }
                    rounds += 1;
                    if rounds > 20 {
                        break;
                    }
                }
            });
        }
        s.spawn(|| {
            while index.len() < 700 {
                thread::yield_now();
            }
            done.store(true, Ordering::Release);
        });
    });

    assert_eq!(index.len(), 700);
    index.validate().unwrap();
}

#[test]
fn test_concurrent_first_inserts_single_entry_point() {
    for round in 0..20u64 {
        let index = HnswIndex::new(HnswConfig::new(4).with_seed(round)).unwrap();
        thread::scope(|s| {
            for t in 0..4u64 {
                let index = &index;
                s.spawn(move || {
                    for v in random_vectors(3, 4, round * 10 + t) {
                        index.add(&v).unwrap();
                    }
                });
            }
        });
        assert_eq!(index.len(), 12);
        index.validate().unwrap();
    }
}

#[test]
fn test_index_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<HnswIndex>();
}
