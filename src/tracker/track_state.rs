/// Track lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Newly created, not enough matches yet to be trusted
    #[default]
    Tentative,
    /// Matched often enough to be reported
    Confirmed,
    /// Scheduled for removal from the active set
    Deleted,
}
