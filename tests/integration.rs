use bitsketch::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn fv2(x: f32, y: f32) -> FeatureVector {
    FeatureVector::from([("x", x), ("y", y)])
}

fn random_feature_vector(rng: &mut StdRng, dims: usize) -> FeatureVector {
    let normal = Normal::new(0.0f32, 1.0).unwrap();
    (0..dims)
        .map(|d| (format!("dim{d}"), normal.sample(rng)))
        .collect()
}

fn euclidean(a: &FeatureVector, b: &FeatureVector) -> f32 {
    let mut sum = 0.0f32;
    for (k, x) in a.iter() {
        let d = x - b.get(k).unwrap_or(0.0);
        sum += d * d;
    }
    for (k, y) in b.iter() {
        if a.get(k).is_none() {
            sum += y * y;
        }
    }
    sum.sqrt()
}

fn deterministic_vector(seed: u64, bit_num: usize) -> BitVector {
    let mut rng = StdRng::seed_from_u64(seed);
    let words = (0..bit_num.div_ceil(WORD_BITS)).map(|_| rng.gen()).collect();
    BitVector::from_words(words, bit_num).unwrap()
}

const WIDTHS: &[usize] = &[1, 2, 3, 4, 7, 8, 16, 31, 32, 63, 64, 65, 127, 128];

// ---------------------------------------------------------------------------
// 1. Packed array round trip across every layout
// ---------------------------------------------------------------------------

#[test]
fn test_packed_array_round_trip() {
    for &b in WIDTHS {
        let n = 257;
        let mut a = PackedArray::new(b).unwrap();
        a.resize(n).unwrap();
        for i in 0..n {
            a.set(i, &deterministic_vector(i as u64, b)).unwrap();
        }
        for i in 0..n {
            assert_eq!(
                a.get(i).unwrap(),
                deterministic_vector(i as u64, b),
                "width {b} row {i}"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Hamming distance agrees with get + xor
// ---------------------------------------------------------------------------

#[test]
fn test_hamming_distance_matches_xor_popcount() {
    for &b in WIDTHS {
        let mut a = PackedArray::new(b).unwrap();
        a.resize(64).unwrap();
        for i in 0..64 {
            a.set(i, &deterministic_vector(1_000 + i as u64, b)).unwrap();
        }
        let probe = deterministic_vector(42, b);
        for i in 0..64 {
            let expected = a.get(i).unwrap().into_owned().xor(&probe).unwrap().count_ones();
            assert_eq!(a.hamming_distance(i, &probe).unwrap(), expected, "width {b}");
        }
    }
}

// ---------------------------------------------------------------------------
// 3. Packed array serialization
// ---------------------------------------------------------------------------

#[test]
fn test_packed_array_save_load() {
    init_tracing();
    for &b in WIDTHS {
        let mut a = PackedArray::new(b).unwrap();
        a.resize(77).unwrap();
        for i in (0..77).step_by(3) {
            a.set(i, &deterministic_vector(i as u64, b)).unwrap();
        }
        let mut buf = Vec::new();
        a.save(&mut buf).unwrap();
        let loaded = PackedArray::load(buf.as_slice()).unwrap();
        assert_eq!(loaded.len(), a.len());
        assert_eq!(loaded.bit_num(), a.bit_num());
        assert_eq!(loaded.layout(), a.layout());
        for i in 0..77 {
            assert_eq!(loaded.get(i).unwrap(), a.get(i).unwrap());
        }
    }
}

#[test]
fn test_packed_array_bad_version() {
    let mut buf = Vec::new();
    PackedArray::new(8).unwrap().save(&mut buf).unwrap();
    buf[0] = 99;
    let err = PackedArray::load(buf.as_slice()).unwrap_err();
    assert!(
        matches!(err, Error::UnsupportedFormatVersion(99)),
        "expected UnsupportedFormatVersion, got: {err:?}"
    );
}

// ---------------------------------------------------------------------------
// 4. Width mismatch errors
// ---------------------------------------------------------------------------

#[test]
fn test_width_mismatch() {
    let mut a = PackedArray::new(16).unwrap();
    a.resize(4).unwrap();
    let wrong = BitVector::new(17).unwrap();
    let err = a.set(0, &wrong).unwrap_err();
    assert!(
        matches!(err, Error::BitWidthMismatch { expected: 16, got: 17 }),
        "expected BitWidthMismatch, got: {err:?}"
    );
    let err = a.hamming_distance(0, &wrong).unwrap_err();
    assert!(matches!(err, Error::BitWidthMismatch { .. }));
}

// ---------------------------------------------------------------------------
// 5. Sketch order independence
// ---------------------------------------------------------------------------

#[test]
fn test_sketch_order_independent() {
    let a = FeatureVector::from([("a", 1.0), ("b", 2.0)]);
    let b = FeatureVector::from([("b", 2.0), ("a", 1.0)]);
    assert_eq!(
        hash::cosine_lsh(&a, 64).unwrap(),
        hash::cosine_lsh(&b, 64).unwrap()
    );
}

// ---------------------------------------------------------------------------
// 6. Ranking: exact match first with distance ~0
// ---------------------------------------------------------------------------

#[test]
fn test_exact_match_ranked_first() {
    init_tracing();
    let mut index = EuclidLsh::builder().hash_num(64).build().unwrap();
    index.set_row(1, &fv2(1.0, 1.0)).unwrap();
    index.set_row(2, &fv2(3.0, -2.0)).unwrap();
    index.set_row(3, &fv2(-5.0, 4.0)).unwrap();

    let results = index.query_by_vector(&fv2(3.0, -2.0), 3).unwrap();
    assert_eq!(results[0].id, 2);
    assert!(results[0].distance < 1e-3, "self distance should be ~0");

    let results = index.query_by_row(2, 1).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, 2);
    assert!(results[0].distance < 1e-3);
}

// ---------------------------------------------------------------------------
// 7. Estimated distances track true distances
// ---------------------------------------------------------------------------

#[test]
fn test_estimates_track_true_distance() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut index = EuclidLsh::builder().hash_num(1024).build().unwrap();
    let vectors: Vec<FeatureVector> = (0..50).map(|_| random_feature_vector(&mut rng, 16)).collect();
    for (i, v) in vectors.iter().enumerate() {
        index.set_row(i + 1, v).unwrap();
    }

    let query = &vectors[10];
    let results = index.query_by_vector(query, vectors.len()).unwrap();
    assert_eq!(results.len(), vectors.len());
    assert_eq!(results[0].id, 11);

    let mut total_rel_err = 0.0f32;
    for r in &results[1..] {
        let truth = euclidean(query, &vectors[r.id - 1]);
        total_rel_err += ((r.distance - truth) / truth).abs();
    }
    let mean_rel_err = total_rel_err / (results.len() - 1) as f32;
    assert!(mean_rel_err < 0.15, "mean relative error too high: {mean_rel_err}");
}

// ---------------------------------------------------------------------------
// 8. Near neighbors are recalled
// ---------------------------------------------------------------------------

#[test]
fn test_perturbed_query_finds_source_row() {
    let mut rng = StdRng::seed_from_u64(99);
    let mut index = EuclidLsh::builder().hash_num(256).build().unwrap();
    let vectors: Vec<FeatureVector> = (0..200).map(|_| random_feature_vector(&mut rng, 32)).collect();
    for (i, v) in vectors.iter().enumerate() {
        index.set_row(i + 1, v).unwrap();
    }

    let mut hits = 0;
    for target in 0..20 {
        let noisy: FeatureVector = vectors[target]
            .iter()
            .map(|(k, x)| (k.to_string(), x + rng.gen_range(-0.05..0.05)))
            .collect();
        let results = index.query_by_vector(&noisy, 5).unwrap();
        if results.iter().any(|r| r.id == target + 1) {
            hits += 1;
        }
    }
    assert!(hits >= 18, "recall@5 too low: {hits}/20");
}

// ---------------------------------------------------------------------------
// 9. Index persistence
// ---------------------------------------------------------------------------

#[test]
fn test_index_save_load_preserves_answers() {
    init_tracing();
    let mut rng = StdRng::seed_from_u64(3);
    let mut index = EuclidLsh::builder().hash_num(100).build().unwrap();
    for id in 1..=40 {
        index.set_row(id, &random_feature_vector(&mut rng, 8)).unwrap();
    }
    let mut buf = Vec::new();
    index.save(&mut buf).unwrap();
    let loaded = EuclidLsh::load(buf.as_slice()).unwrap();

    assert_eq!(loaded.len(), 40);
    assert_eq!(loaded.hash_num(), 100);
    for id in [1, 17, 40] {
        assert_eq!(loaded.query_by_row(id, 10).unwrap(), index.query_by_row(id, 10).unwrap());
    }
}

#[test]
fn test_index_bad_version() {
    let mut buf = Vec::new();
    EuclidLsh::builder().build().unwrap().save(&mut buf).unwrap();
    buf[0] = 99;
    assert!(matches!(
        EuclidLsh::load(buf.as_slice()),
        Err(Error::UnsupportedFormatVersion(99))
    ));
}

// ---------------------------------------------------------------------------
// 10. Sparse ids and gaps
// ---------------------------------------------------------------------------

#[test]
fn test_sparse_ids_leave_zero_rows() {
    let mut index = EuclidLsh::builder().hash_num(64).build().unwrap();
    index.set_row(100, &fv2(2.0, 0.0)).unwrap();
    assert_eq!(index.len(), 100);

    // Gap rows have norm 0, so their estimated distance is the query norm.
    let results = index.query_by_vector(&fv2(0.0, 3.0), 100).unwrap();
    assert_eq!(results.len(), 100);
    let gap = results.iter().find(|r| r.id == 1).unwrap();
    assert!((gap.distance - 3.0).abs() < 1e-6);
}

// ---------------------------------------------------------------------------
// 11. Tuning
// ---------------------------------------------------------------------------

#[test]
fn test_suggested_width_builds_index() {
    let s = suggest_hash_num(0.1);
    let index = EuclidLsh::builder().hash_num(s.hash_num).build().unwrap();
    assert_eq!(index.stats().layout, s.layout);
    assert!(s.worst_case_angle_error <= 0.1);
}
