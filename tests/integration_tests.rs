//! End-to-end tests of the tracking pipeline
//!
//! Each test builds a barrel detector, an event and one or more strategies,
//! runs the full seed-fit-extend-merge chain and checks the surviving
//! candidates.

mod helpers;

use std::sync::Arc;

use helpers::{barrel_strategy, detector, digest, found_tracks, ideal_strategy, outside_in_strategy, straight_track};
use nalgebra::Point3;
use seedtrack::common::synthetic::{generate_event, random_tracks, EventConfig, TruthTrack};
use seedtrack::{
    find_tracks, ConfigError, FitOrder, FitOutcome, Hit, HitId, HitIndex, LayerId, MergePolicy, RecordingDiagnostics,
    RejectionReason, SeedFinder, SeedStrategy, SeedTracker, SequenceKey, StateStatus, StrategyList, TrackingError,
    TrajectoryFitter,
};

//=============================================================================
// Single tracks
//=============================================================================

#[test]
fn test_straight_track_end_to_end() {
    let g = detector();
    let hits = straight_track(4, 0.4, 0.1);

    let tracks = find_tracks(&hits, &[ideal_strategy("barrel")], &g).unwrap();

    assert_eq!(tracks.len(), 1);
    let track = &tracks[0];
    assert_eq!(track.hits(), &[HitId(0), HitId(1), HitId(2), HitId(3)]);
    assert!(track.is_valid());
    assert!(track.chisq() < 1e-6, "chisq = {}", track.chisq());
    assert_eq!(track.confirm_hits(), 1);

    let last = track.final_state().unwrap();
    assert_eq!(last.status, StateStatus::Optimal);
    assert_eq!(last.surface.layer, LayerId(4));
    assert!((last.tan_lambda() - 0.1).abs() < 1e-6);
    assert!(last.qpt().abs() < 1e-6);
    assert!(track.history().is_monotonic());
}

#[test]
fn test_extension_layer_is_optional() {
    let g = detector();
    let strategy = barrel_strategy("barrel", FitOrder::Forward);

    let five = find_tracks(&straight_track(5, -1.2, 0.3), &[strategy.clone()], &g).unwrap();
    assert_eq!(five.len(), 1);
    assert_eq!(five[0].num_hits(), 5);

    let four = find_tracks(&straight_track(4, -1.2, 0.3), &[strategy], &g).unwrap();
    assert_eq!(four.len(), 1);
    assert_eq!(four[0].num_hits(), 4);
}

#[test]
fn test_backward_strategy_end_to_end() {
    let g = detector();
    let strategy = outside_in_strategy("outside-in");
    let hits = straight_track(5, 2.5, -0.2);

    let tracks = find_tracks(&hits, &[strategy], &g).unwrap();

    assert_eq!(tracks.len(), 1);
    let track = &tracks[0];
    assert_eq!(track.hits(), &[HitId(4), HitId(3), HitId(2), HitId(1), HitId(0)]);
    assert_eq!(track.seed_state().unwrap().surface.layer, LayerId(5));
    assert_eq!(track.final_state().unwrap().surface.layer, LayerId(1));
    let paths = track.history().path_lengths();
    assert!(paths.windows(2).all(|w| w[1] <= w[0]), "paths = {:?}", paths);
}

//=============================================================================
// Noise and rejections
//=============================================================================

#[test]
fn test_displaced_noise_hit_is_rejected() {
    let g = detector();
    let mut hits = straight_track(4, 0.0, 0.0);
    // 2 mm off the track in r·φ on the second layer
    hits.push(Hit::with_resolution(LayerId(2), Point3::new(59.97, 2.0, 0.0), 0.01, 0.05));

    let sink = Arc::new(RecordingDiagnostics::new());
    let tracker = SeedTracker::new(&g, vec![ideal_strategy("barrel")])
        .unwrap()
        .with_diagnostics(Arc::clone(&sink));
    let tracks = tracker.find_tracks(&hits);

    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].hits(), &[HitId(0), HitId(1), HitId(2), HitId(3)]);
    assert!(sink
        .triplet_rejections()
        .contains(&([HitId(0), HitId(4), HitId(2)], RejectionReason::RadiusTooSmall)));
    assert!(sink.fit_failures().is_empty());
}

#[test]
fn test_close_noise_hit_loses_the_merge() {
    let g = detector();
    let mut hits = straight_track(4, 0.0, 0.0);
    // 3σ off the track in r·φ on the second layer, close enough to seed and confirm
    hits.push(Hit::with_resolution(LayerId(2), Point3::new(60.0, 0.03, 0.0), 0.01, 0.05));

    let sink = Arc::new(RecordingDiagnostics::new());
    let tracker = SeedTracker::new(&g, vec![ideal_strategy("barrel")])
        .unwrap()
        .with_diagnostics(Arc::clone(&sink));
    let (tracks, summary) = tracker.find_tracks_with_summary(&hits);

    assert_eq!(summary.extended, 2);
    assert_eq!(summary.merged_away, 1);
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].hits(), &[HitId(0), HitId(1), HitId(2), HitId(3)]);
    assert_eq!(
        sink.merge_decisions(),
        vec![(SequenceKey::new(0, 0), SequenceKey::new(0, 1))]
    );
}

#[test]
fn test_tracks_survive_random_noise() {
    let g = detector();
    let truth = random_tracks(5, (2.0, 10.0), 0.8, 3);
    let event = generate_event(
        &g,
        &truth,
        &EventConfig {
            noise_per_layer: 10,
            seed: 5,
            ..EventConfig::default()
        },
    );
    assert_eq!(event.noise_count(), 50);

    let tracks = find_tracks(&event.hits, &[barrel_strategy("barrel", FitOrder::Forward)], &g).unwrap();

    assert!(found_tracks(&event, &tracks) >= 4, "found {} of 5", found_tracks(&event, &tracks));
    assert!(tracks.iter().all(|t| t.num_hits() >= 4));
    for (i, a) in tracks.iter().enumerate() {
        for b in &tracks[i + 1..] {
            assert!(!a.shares_hit_with(b));
        }
    }
}

//=============================================================================
// Curved tracks
//=============================================================================

#[test]
fn test_curved_tracks_with_smearing() {
    let g = detector();
    let truth = random_tracks(8, (2.0, 10.0), 1.0, 11);
    let event = generate_event(
        &g,
        &truth,
        &EventConfig {
            smear: true,
            ..EventConfig::default()
        },
    );

    let tracks = find_tracks(&event.hits, &[barrel_strategy("barrel", FitOrder::Forward)], &g).unwrap();

    let found = found_tracks(&event, &tracks);
    assert!(found >= 6, "found {} of 8", found);
    for track in tracks.iter().filter(|t| t.is_true_seed(&event.hits)) {
        let particle = track.truth_particle(&event.hits).unwrap().0 as usize;
        let truth_sign = truth[particle].qpt.signum();
        let fitted = track.final_state().unwrap();
        assert_eq!(fitted.qpt().signum(), truth_sign, "charge flipped for track {}", particle);
    }
}

#[test]
fn test_single_helix_momentum() {
    let g = detector();
    let truth = [TruthTrack::helix(0.3, 0.2, 0.5)];
    let event = generate_event(&g, &truth, &EventConfig::default());

    let strategy = SeedStrategy::builder("barrel")
        .seed_layer(1)
        .seed_layer(2)
        .seed_layer(3)
        .confirm_layer(4)
        .extend_layer(5)
        .min_hits(4)
        .energy_loss(seedtrack::EnergyLossKind::Disabled)
        .build()
        .unwrap();
    let tracks = find_tracks(&event.hits, &[strategy], &g).unwrap();

    assert_eq!(tracks.len(), 1);
    let fitted = tracks[0].final_state().unwrap();
    assert!((fitted.qpt() - 0.5).abs() < 0.05, "q/pT = {}", fitted.qpt());
    assert!((fitted.tan_lambda() - 0.2).abs() < 1e-3);
}

//=============================================================================
// Fitter atomicity
//=============================================================================

#[test]
fn test_rejected_hit_leaves_candidate_unchanged() {
    let g = detector();
    let strategy = ideal_strategy("barrel");
    let mut hits = straight_track(4, 0.9, 0.0);
    hits[3].position.z += 2.0;
    let index = HitIndex::build(&hits);

    let mut fitted = SeedFinder::new(&g, &strategy, 0).find(&index);
    assert_eq!(fitted.len(), 1);
    let mut candidate = fitted.remove(0);
    let before = candidate.clone();

    let fitter = TrajectoryFitter::new(&g, &strategy);
    let outcome = fitter.add_hit(&mut candidate, HitId(3), &hits);
    assert!(matches!(outcome, FitOutcome::ChisqExceeded { accepted_hits: 3 }));
    assert_eq!(candidate, before);

    let outcome = fitter.extend(&mut candidate, &index);
    assert_eq!(outcome, FitOutcome::InsufficientHits { found: 0, required: 1 });
    assert_eq!(candidate, before);
}

//=============================================================================
// Iterative tracking
//=============================================================================

/// Seed on layers 2-4, confirm on 5.
fn outer_strategy(name: &str) -> SeedStrategy {
    SeedStrategy::builder(name)
        .seed_layer(2)
        .seed_layer(3)
        .seed_layer(4)
        .confirm_layer(5)
        .min_hits(4)
        .energy_loss(seedtrack::EnergyLossKind::Disabled)
        .build()
        .unwrap()
}

#[test]
fn test_iterative_passes_share_no_hits() {
    let g = detector();
    let mut hits = straight_track(5, 0.3, 0.1);
    // second track has no hit on the innermost layer
    hits.extend(straight_track(5, -1.5, -0.1).into_iter().skip(1));

    let iterative = SeedTracker::iterative(
        &g,
        vec![vec![barrel_strategy("inner", FitOrder::Forward)], vec![outer_strategy("outer")]],
    )
    .unwrap();
    let (tracks, summary) = iterative.find_tracks_with_summary(&hits);

    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].strategy(), "inner");
    assert_eq!(tracks[0].hits(), &[HitId(0), HitId(1), HitId(2), HitId(3), HitId(4)]);
    assert_eq!(tracks[1].strategy(), "outer");
    assert_eq!(tracks[1].hits(), &[HitId(5), HitId(6), HitId(7), HitId(8)]);
    assert_eq!(tracks[1].key(), SequenceKey::new(1, 0));
    assert!(!tracks[0].shares_hit_with(&tracks[1]));
    assert_eq!(summary.seeds, 2);
    assert_eq!(summary.merged_away, 0);

    // in a single pass the outer strategy also finds the first track
    let single = SeedTracker::new(&g, vec![barrel_strategy("inner", FitOrder::Forward), outer_strategy("outer")]).unwrap();
    let (same, summary) = single.find_tracks_with_summary(&hits);
    assert_eq!(digest(&same), digest(&tracks));
    assert_eq!(summary.seeds, 3);
    assert_eq!(summary.merged_away, 1);
}

//=============================================================================
// Configuration
//=============================================================================

const STRATEGIES_JSON: &str = r#"{
    "strategies": [
        {
            "name": "inner",
            "layers": [
                {"layer": 1, "role": "seed"},
                {"layer": 2, "role": "seed"},
                {"layer": 3, "role": "seed"},
                {"layer": 4, "role": "confirm"},
                {"layer": 5, "role": "extend"}
            ],
            "min_hits": 4,
            "energy_loss": {"model": "disabled"}
        },
        {
            "name": "outer",
            "layers": [
                {"layer": 2, "role": "seed"},
                {"layer": 3, "role": "seed"},
                {"layer": 4, "role": "seed"},
                {"layer": 5, "role": "confirm"}
            ],
            "min_hits": 4,
            "energy_loss": {"model": "disabled"}
        }
    ]
}"#;

#[test]
fn test_strategies_from_json_are_merged() {
    let g = detector();
    let list = StrategyList::from_json_str(STRATEGIES_JSON).unwrap();
    assert_eq!(list.len(), 2);

    let sink = Arc::new(RecordingDiagnostics::new());
    let tracker = SeedTracker::new(&g, list.into_inner())
        .unwrap()
        .with_diagnostics(Arc::clone(&sink));
    let (tracks, summary) = tracker.find_tracks_with_summary(&straight_track(5, 1.7, 0.05));

    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].strategy(), "inner");
    assert_eq!(tracks[0].num_hits(), 5);
    assert_eq!(summary.merged_away, 1);
    assert_eq!(
        sink.merge_decisions(),
        vec![(SequenceKey::new(0, 0), SequenceKey::new(1, 0))]
    );
}

#[test]
fn test_merge_policy_choice() {
    let g = detector();
    let mut hits = straight_track(5, 1.7, 0.05);
    // outermost hit pulled by 3σ in z
    hits[4].position.z += 0.15;
    let list = StrategyList::from_json_str(STRATEGIES_JSON).unwrap();

    let most_hits = SeedTracker::new(&g, list.clone().into_inner()).unwrap();
    let tracks = most_hits.find_tracks(&hits);
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].strategy(), "inner");

    let best_chisq = SeedTracker::new(&g, list.into_inner())
        .unwrap()
        .with_merge_policy(MergePolicy::BestChisq);
    assert_eq!(best_chisq.merge_policy(), MergePolicy::BestChisq);
    let tracks = best_chisq.find_tracks(&hits);
    assert_eq!(tracks.len(), 1);
    assert!(tracks[0].chisq_per_dof() <= most_hits.find_tracks(&hits)[0].chisq_per_dof());
}

#[test]
fn test_invalid_configurations() {
    let g = detector();

    let bad = STRATEGIES_JSON.replace("\"min_hits\": 4", "\"min_hits\": 1");
    assert!(matches!(StrategyList::from_json_str(&bad), Err(ConfigError::Parse { .. })));

    let unknown = SeedStrategy::builder("far")
        .seed_layer(4)
        .seed_layer(5)
        .confirm_layer(6)
        .min_hits(3)
        .build()
        .unwrap();
    let err = find_tracks(&straight_track(5, 0.0, 0.0), &[unknown], &g).unwrap_err();
    assert_eq!(
        err,
        TrackingError::Config(ConfigError::UnknownLayer {
            strategy: "far".into(),
            layer: LayerId(6)
        })
    );

    assert!(matches!(find_tracks(&[], &[], &g), Err(TrackingError::Config(ConfigError::NoStrategies))));
}

#[test]
fn test_repeated_runs_are_identical() {
    let g = detector();
    let truth = random_tracks(10, (2.0, 10.0), 1.0, 21);
    let event = generate_event(
        &g,
        &truth,
        &EventConfig {
            smear: true,
            noise_per_layer: 5,
            ..EventConfig::default()
        },
    );
    let tracker = SeedTracker::new(&g, vec![barrel_strategy("barrel", FitOrder::Forward)]).unwrap();

    let first = tracker.find_tracks(&event.hits);
    let second = tracker.find_tracks(&event.hits);
    assert_eq!(digest(&first), digest(&second));
}
