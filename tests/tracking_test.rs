use ndarray::{Array1, array};
use object_tracker_rs::tracker::Rect;
use object_tracker_rs::{
    AssociationEngine, ClassTable, DeepSortTracker, Detection, TrackLifecycleView, TrackView,
    TrackerConfig,
};

fn det(x: f32, y: f32, feature: Array1<f32>) -> Detection {
    Detection::new(Rect::new(x, y, 40.0, 80.0), 0.9, "person", feature)
}

fn step(tracker: &mut DeepSortTracker, detections: &[Detection]) {
    tracker.predict();
    tracker.update(detections);
}

#[test]
fn test_basic_tracking() {
    let mut tracker = DeepSortTracker::new(TrackerConfig::default());

    // Frames 1-3: one object walking right; confirmed on the third hit.
    for i in 0..3 {
        step(&mut tracker, &[det(100.0 + 5.0 * i as f32, 100.0, array![1.0, 0.0])]);
        assert_eq!(tracker.tracks().len(), 1);
        assert_eq!(tracker.tracks()[0].is_confirmed(), i == 2);
    }
    let id = tracker.tracks()[0].track_id();

    // Frame 4: object disappears, the confirmed track coasts
    step(&mut tracker, &[]);
    assert_eq!(tracker.tracks().len(), 1);
    assert_eq!(tracker.tracks()[0].time_since_update(), 1);

    // Frame 5: object reappears further along and is re-identified
    step(&mut tracker, &[det(122.0, 100.0, array![1.0, 0.0])]);
    assert_eq!(tracker.tracks().len(), 1);
    assert_eq!(tracker.tracks()[0].track_id(), id);
    assert_eq!(tracker.tracks()[0].time_since_update(), 0);
}

#[test]
fn test_tentative_track_deleted_on_miss() {
    let mut tracker = DeepSortTracker::new(TrackerConfig::default());
    step(&mut tracker, &[det(0.0, 0.0, array![1.0, 0.0])]);
    step(&mut tracker, &[]);
    assert!(tracker.tracks().is_empty());

    // A new object gets a fresh id; ids are never reused.
    step(&mut tracker, &[det(0.0, 0.0, array![1.0, 0.0])]);
    assert_eq!(tracker.tracks()[0].track_id(), 2);
}

#[test]
fn test_two_objects_keep_their_identities() {
    let config = TrackerConfig {
        n_init: 1,
        ..Default::default()
    };
    let mut tracker = DeepSortTracker::new(config);
    for i in 0..6 {
        let dx = 3.0 * i as f32;
        step(
            &mut tracker,
            &[
                det(50.0 + dx, 50.0, array![1.0, 0.0]),
                det(400.0 - dx, 60.0, array![0.0, 1.0]),
            ],
        );
    }
    let tracks = tracker.tracks();
    assert_eq!(tracks.len(), 2);
    let left = tracks.iter().find(|t| t.to_tlbr()[0] < 200.0).unwrap();
    let right = tracks.iter().find(|t| t.to_tlbr()[0] > 200.0).unwrap();
    assert_eq!(left.track_id(), 1);
    assert_eq!(right.track_id(), 2);
}

#[test]
fn test_visibility_follows_staleness() {
    let classes = ClassTable::coco();
    let view = TrackLifecycleView::new(&classes, 5);
    let config = TrackerConfig {
        n_init: 1,
        max_age: 30,
        ..Default::default()
    };
    let mut tracker = DeepSortTracker::new(config);
    step(&mut tracker, &[det(10.0, 10.0, array![1.0, 0.0])]);
    assert_eq!(view.visible(tracker.tracks()).unwrap().len(), 1);

    for missed in 1..=7 {
        step(&mut tracker, &[]);
        let visible = view.visible(tracker.tracks()).unwrap();
        assert_eq!(visible.is_empty(), missed > 5, "after {missed} misses");
        for v in &visible {
            assert_eq!(v.class_index, classes.index_of("person").unwrap());
        }
    }
    // Hidden but still alive in the engine.
    assert_eq!(tracker.tracks().len(), 1);
}
