//! Visibility policy over the association engine's tracks.

use crate::classes::ClassTable;
use crate::error::{Error, Result};
use crate::tracker::TrackView;

/// Default staleness limit for output.
pub const MAX_STALENESS: u32 = 5;

/// A track selected for output on the current frame.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleTrack {
    /// `[x1, y1, x2, y2]`
    pub bbox: [f32; 4],
    pub track_id: u64,
    pub class_index: usize,
}

/// Selects the tracks eligible for rendering and logging.
///
/// A track is visible when it is confirmed and has been unmatched for at most
/// `max_staleness` frames. Engine order is preserved.
pub struct TrackLifecycleView<'a> {
    classes: &'a ClassTable,
    max_staleness: u32,
}

impl<'a> TrackLifecycleView<'a> {
    pub fn new(classes: &'a ClassTable, max_staleness: u32) -> Self {
        Self {
            classes,
            max_staleness,
        }
    }

    pub fn is_visible<T: TrackView>(&self, track: &T) -> bool {
        track.is_confirmed() && track.time_since_update() <= self.max_staleness
    }

    pub fn visible<T: TrackView>(&self, tracks: &[T]) -> Result<Vec<VisibleTrack>> {
        tracks
            .iter()
            .filter(|t| self.is_visible(*t))
            .map(|t| {
                let class_index = self
                    .classes
                    .index_of(t.class_name())
                    .ok_or_else(|| Error::UnknownClass(t.class_name().to_string()))?;
                Ok(VisibleTrack {
                    bbox: t.to_tlbr(),
                    track_id: t.track_id(),
                    class_index,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub {
        id: u64,
        class: &'static str,
        confirmed: bool,
        stale: u32,
    }

    impl TrackView for Stub {
        fn track_id(&self) -> u64 {
            self.id
        }
        fn class_name(&self) -> &str {
            self.class
        }
        fn is_confirmed(&self) -> bool {
            self.confirmed
        }
        fn time_since_update(&self) -> u32 {
            self.stale
        }
        fn to_tlbr(&self) -> [f32; 4] {
            [0.0, 0.0, 10.0, 10.0]
        }
    }

    fn stub(id: u64, confirmed: bool, stale: u32) -> Stub {
        Stub {
            id,
            class: "car",
            confirmed,
            stale,
        }
    }

    #[test]
    fn test_only_confirmed_and_fresh_tracks_are_visible() {
        let classes = ClassTable::coco();
        let view = TrackLifecycleView::new(&classes, MAX_STALENESS);
        let tracks = vec![
            stub(4, true, 0),
            stub(1, false, 0),
            stub(2, true, 5),
            stub(3, true, 6),
            stub(5, true, 2),
        ];
        let ids: Vec<u64> = view
            .visible(&tracks)
            .unwrap()
            .iter()
            .map(|t| t.track_id)
            .collect();
        assert_eq!(ids, vec![4, 2, 5]);
        for t in view.visible(&tracks).unwrap() {
            let source = tracks.iter().find(|s| s.id == t.track_id).unwrap();
            assert!(source.confirmed && source.stale <= MAX_STALENESS);
            assert_eq!(t.class_index, 2);
        }
    }

    #[test]
    fn test_unknown_class_is_fatal() {
        let classes = ClassTable::from_names(["person"]).unwrap();
        let view = TrackLifecycleView::new(&classes, MAX_STALENESS);
        let err = view.visible(&[stub(1, true, 0)]).unwrap_err();
        assert!(err.is_fatal());

        // Hidden tracks are not looked up.
        assert!(view.visible(&[stub(1, false, 0)]).unwrap().is_empty());
    }
}
