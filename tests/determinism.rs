//! Reproducibility of the pipeline
//!
//! The surviving candidates, their order and their χ² must not depend on
//! the run, the strategy position of duplicates or the worker thread count.

mod helpers;

use helpers::{barrel_strategy, detector, digest, outside_in_strategy};
use seedtrack::common::synthetic::{generate_event, random_tracks, EventConfig, SyntheticEvent};
use seedtrack::{BarrelGeometry, FitOrder, SeedTracker};

fn busy_event(g: &BarrelGeometry) -> SyntheticEvent {
    let truth = random_tracks(25, (1.5, 20.0), 1.2, 99);
    generate_event(
        g,
        &truth,
        &EventConfig {
            smear: true,
            noise_per_layer: 20,
            seed: 1234,
            ..EventConfig::default()
        },
    )
}

#[test]
fn test_same_event_same_result() {
    let g = detector();
    let event = busy_event(&g);
    let tracker = SeedTracker::new(
        &g,
        vec![
            barrel_strategy("forward", FitOrder::Forward),
            barrel_strategy("again", FitOrder::Forward),
        ],
    )
    .unwrap();

    let (first, s1) = tracker.find_tracks_with_summary(&event.hits);
    let (second, s2) = tracker.find_tracks_with_summary(&event.hits);

    assert!(!first.is_empty());
    assert_eq!(digest(&first), digest(&second));
    assert_eq!(s1, s2);
    // the duplicate strategy never wins a tie
    assert!(first.iter().all(|c| c.key().strategy == 0));
    assert_eq!(s1.merged_away, s1.extended - s1.tracks);
}

#[test]
fn test_output_is_sorted_best_first() {
    let g = detector();
    let event = busy_event(&g);
    let tracker = SeedTracker::new(&g, vec![barrel_strategy("forward", FitOrder::Forward)]).unwrap();

    let tracks = tracker.find_tracks(&event.hits);
    let policy = tracker.merge_policy();
    assert!(tracks
        .windows(2)
        .all(|w| policy.compare(&w[0], &w[1]) == std::cmp::Ordering::Less));
}

#[cfg(feature = "rayon")]
#[test]
fn test_thread_count_does_not_change_result() {
    let g = detector();
    let event = busy_event(&g);
    let tracker = SeedTracker::new(
        &g,
        vec![
            barrel_strategy("forward", FitOrder::Forward),
            outside_in_strategy("backward"),
        ],
    )
    .unwrap();

    let run = |threads: usize| {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build().unwrap();
        pool.install(|| tracker.find_tracks_with_summary(&event.hits))
    };

    let (single, s1) = run(1);
    let (multi, s4) = run(4);
    assert_eq!(digest(&single), digest(&multi));
    assert_eq!(single, multi);
    assert_eq!(s1, s4);
}
