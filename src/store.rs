use std::collections::BTreeMap;

use crate::models::{Checkin, CheckinId, NewCheckin, TraceWarningMatch};

/// Read access to persisted checkins and their warning matches.
pub trait CheckinStore {
    fn checkins(&self) -> Vec<Checkin>;

    fn matches_for_checkin(&self, checkin_id: CheckinId) -> Vec<TraceWarningMatch>;
}

impl<S: CheckinStore + ?Sized> CheckinStore for &S {
    fn checkins(&self) -> Vec<Checkin> {
        (**self).checkins()
    }

    fn matches_for_checkin(&self, checkin_id: CheckinId) -> Vec<TraceWarningMatch> {
        (**self).matches_for_checkin(checkin_id)
    }
}

/// Event store kept in memory. Also serves as the snapshot loaded from Postgres.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventStore {
    checkins: BTreeMap<CheckinId, Checkin>,
    matches: Vec<TraceWarningMatch>,
    next_checkin_id: CheckinId,
    next_match_id: i64,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_checkin(&mut self, checkin: NewCheckin) -> CheckinId {
        self.next_checkin_id += 1;
        let id = self.next_checkin_id;
        self.checkins.insert(
            id,
            Checkin {
                id,
                trace_location_id: checkin.trace_location_id,
                description: checkin.description,
                start: checkin.start,
                end: checkin.end,
                submitted: checkin.submitted,
            },
        );
        id
    }

    /// Inserts a checkin that already has an identifier, e.g. one read from Postgres.
    pub fn insert_checkin(&mut self, checkin: Checkin) {
        self.next_checkin_id = self.next_checkin_id.max(checkin.id);
        self.checkins.insert(checkin.id, checkin);
    }

    /// Stores a match, assigning an id when the match has none.
    pub fn create_trace_warning_match(&mut self, mut warning_match: TraceWarningMatch) -> i64 {
        if warning_match.id <= 0 {
            self.next_match_id += 1;
            warning_match.id = self.next_match_id;
        } else {
            self.next_match_id = self.next_match_id.max(warning_match.id);
        }
        let id = warning_match.id;
        self.matches.push(warning_match);
        id
    }

    /// Returns false when the checkin does not exist.
    pub fn mark_submitted(&mut self, checkin_id: CheckinId) -> bool {
        match self.checkins.get_mut(&checkin_id) {
            Some(checkin) => {
                checkin.submitted = true;
                true
            }
            None => false,
        }
    }
}

impl CheckinStore for InMemoryEventStore {
    fn checkins(&self) -> Vec<Checkin> {
        self.checkins.values().cloned().collect()
    }

    fn matches_for_checkin(&self, checkin_id: CheckinId) -> Vec<TraceWarningMatch> {
        self.matches
            .iter()
            .filter(|warning_match| warning_match.checkin_id == checkin_id)
            .cloned()
            .collect()
    }
}
