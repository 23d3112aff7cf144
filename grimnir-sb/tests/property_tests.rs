//! Invariants checked across many seeds and pool shapes

mod helpers;

use grimnir_common::Track;
use grimnir_sb::catalog::Library;
use grimnir_sb::normalize::normalize_at;
use grimnir_sb::{build_sequence, CandidatePools, RuleDocument, SequenceDocument, SequenceResult};
use helpers::{owned, request, request_with_sequence, service, track, MINUTE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

/// Pool of `count` tracks between 2 and 6 minutes with a handful of artists
fn random_pool(count: usize, seed: u64) -> Vec<Track> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let mut t = track(
                &format!("t{}", i),
                &format!("Artist {}", rng.gen_range(0..6)),
                if rng.gen_bool(0.5) { "Rock" } else { "Jazz" },
                rng.gen_range(120_000..360_000),
            );
            t.bpm = rng.gen_range(60.0..180.0);
            t
        })
        .collect()
}

fn run(rules: serde_json::Value, pools: &CandidatePools, seed: u64) -> SequenceResult {
    let config = normalize_at(&RuleDocument::from_value(rules), &SequenceDocument::new(), 2026);
    build_sequence(&config, pools, &mut StdRng::seed_from_u64(seed))
}

#[test]
fn test_total_never_exceeds_upper_bound_after_first_placement() {
    for seed in 0..30 {
        let pools = CandidatePools {
            music: random_pool(40, seed),
            ..Default::default()
        };
        let result = run(json!({"targetMinutes": 30, "durationAccuracy": 5}), &pools, seed);

        assert!(!result.is_empty());
        assert!(result.total_ms <= 30 * MINUTE + 5_000, "seed {} overshot", seed);
        let underfilled =
            result.has_warning(|w| matches!(w, grimnir_sb::SequenceWarning::Underfilled { .. }));
        assert_eq!(underfilled, result.total_ms < 30 * MINUTE - 5_000);
    }
}

#[test]
fn test_no_immediate_repeats_in_loop_mode() {
    for seed in 0..20 {
        let pools = CandidatePools {
            music: random_pool(4, seed),
            ..Default::default()
        };
        let result = run(json!({"targetMinutes": 60, "allowRepeats": true}), &pools, seed);

        assert!(result.placements.len() > 4, "loop mode should cycle the pool");
        for pair in result.placements.windows(2) {
            assert_ne!(pair[0].track.id, pair[1].track.id, "seed {}", seed);
        }
    }
}

#[test]
fn test_loop_mode_recency_window() {
    // Six tracks: window is min(3, 6 / 2) = 3 placements
    let pools = CandidatePools {
        music: (0..6)
            .map(|i| track(&format!("t{}", i), &format!("A{}", i), "Pop", 3 * MINUTE))
            .collect(),
        ..Default::default()
    };
    let result = run(json!({"targetMinutes": 90, "allowRepeats": true}), &pools, 8);

    let ids: Vec<&str> = result.placements.iter().map(|p| p.track.id.as_str()).collect();
    for (i, id) in ids.iter().enumerate() {
        for back in 1..=3.min(i) {
            assert_ne!(ids[i - back], *id, "{} repeated within 3 placements", id);
        }
    }
    assert_eq!(result.total_ms, 90 * MINUTE);
}

#[test]
fn test_same_seed_is_reproducible() {
    let pools = CandidatePools {
        music: random_pool(30, 42),
        interstitials: vec![track("ad", "Sponsor", "Ads", 30_000)],
        fallback: random_pool(5, 43)
            .into_iter()
            .map(|mut t| {
                t.id = format!("fb-{}", t.id);
                t
            })
            .collect(),
    };
    let rules = json!({
        "targetMinutes": 45,
        "separationEnabled": true,
        "separation": {"artist": 10},
        "interstitials": {"enabled": true, "genre": "Ads", "every": 3}
    });

    let first = run(rules.clone(), &pools, 1234);
    let second = run(rules, &pools, 1234);
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_separation_holds_when_clean_candidates_exist() {
    // Twelve artists with three tracks each: at most six artists are inside
    // the gap at any time, so a clean pick always remains
    let pools = CandidatePools {
        music: (0..36)
            .map(|i| track(&format!("t{}", i), &format!("A{}", i % 12), "Pop", 3 * MINUTE))
            .collect(),
        ..Default::default()
    };
    let result = run(
        json!({"targetMinutes": 60, "separationEnabled": true, "separation": {"artist": 20}}),
        &pools,
        77,
    );

    for (i, a) in result.placements.iter().enumerate() {
        for b in &result.placements[i + 1..] {
            if a.track.artist == b.track.artist {
                assert!(b.starts_at_ms - a.starts_at_ms >= 20 * MINUTE);
            }
        }
    }
    assert!(!result.has_warning(|w| *w == grimnir_sb::SequenceWarning::SeparationRelaxed));
}

#[test]
fn test_energy_curve_shapes_order() {
    let calm: Vec<Track> = (0..5)
        .map(|i| {
            let mut t = track(&format!("calm{}", i), &format!("C{}", i), "Pop", 4 * MINUTE);
            t.bpm = 65.0;
            t
        })
        .collect();
    let loud: Vec<Track> = (0..5)
        .map(|i| {
            let mut t = track(&format!("loud{}", i), &format!("L{}", i), "Pop", 4 * MINUTE);
            t.bpm = 175.0;
            t
        })
        .collect();
    let pools = CandidatePools {
        music: calm.into_iter().chain(loud).collect(),
        ..Default::default()
    };
    let config = normalize_at(
        &RuleDocument::from_value(json!({"targetMinutes": 16})),
        &SequenceDocument::from_value(json!({"energyEnabled": true, "energyCurve": [0, 0, 100, 100]})),
        2026,
    );
    let result = build_sequence(&config, &pools, &mut StdRng::seed_from_u64(3));

    let bpms: Vec<f64> = result.placements.iter().map(|p| p.track.bpm).collect();
    assert_eq!(bpms, vec![65.0, 65.0, 175.0, 175.0]);
}

#[tokio::test]
async fn test_variants_match_individual_seeds() {
    let library = Library {
        items: random_pool(40, 5).into_iter().map(owned).collect(),
        ..Default::default()
    };
    let service = service(library);
    let rules = json!({"targetMinutes": 30});

    let variants = service.preview_variants(&request(rules.clone(), 100), 4).await.unwrap();
    assert_eq!(variants.len(), 4);

    // Variant i matches a single preview seeded with base + i
    for (i, variant) in variants.iter().enumerate() {
        let single = service.preview(&request(rules.clone(), 100 + i as u64)).await.unwrap();
        assert_eq!(&single, variant);
    }
}

#[tokio::test]
async fn test_zero_variants() {
    let variants = service(Library::default())
        .preview_variants(&request_with_sequence(json!({}), json!({}), 0), 0)
        .await
        .unwrap();
    assert!(variants.is_empty());
}
