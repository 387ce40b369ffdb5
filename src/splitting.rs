use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};

use crate::models::{Checkin, CheckinSegment};

/// Splits checkins at the midnights of a fixed-offset calendar.
///
/// The offset never changes, so a zone observing daylight saving time is
/// only approximated on transition days. The default calendar is UTC.
#[derive(Debug, Clone, Copy)]
pub struct CheckinSplitter {
    offset: FixedOffset,
}

impl Default for CheckinSplitter {
    fn default() -> Self {
        Self::utc()
    }
}

impl CheckinSplitter {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    pub fn local_date(&self, timestamp: DateTime<Utc>) -> NaiveDate {
        timestamp.with_timezone(&self.offset).date_naive()
    }

    fn midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        let local = date.and_time(NaiveTime::MIN);
        let utc = local - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        DateTime::from_naive_utc_and_offset(utc, Utc)
    }

    /// Partitions `[start, end)` into one segment per calendar day, in order.
    pub fn split(&self, checkin: &Checkin) -> Vec<CheckinSegment> {
        let mut segments = Vec::new();
        if checkin.end <= checkin.start {
            return segments;
        }

        let mut start = checkin.start;
        let mut date = self.local_date(start);

        while start < checkin.end {
            let next_midnight = date.succ_opt().map(|next| (next, self.midnight(next)));
            let (end, next) = match next_midnight {
                Some((next, midnight)) if midnight < checkin.end => (midnight, Some(next)),
                _ => (checkin.end, None),
            };

            segments.push(CheckinSegment {
                checkin_id: checkin.id,
                date,
                start,
                end,
            });

            match next {
                Some(next) => {
                    start = end;
                    date = next;
                }
                None => break,
            }
        }

        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn checkin(start: DateTime<Utc>, end: DateTime<Utc>) -> Checkin {
        Checkin {
            id: 7,
            trace_location_id: Uuid::nil(),
            description: "Bakery".to_string(),
            start,
            end,
            submitted: false,
        }
    }

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 3, day, hour, minute, 0).unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, day).unwrap()
    }

    #[test]
    fn same_day_checkin_is_one_segment() {
        let segments = CheckinSplitter::utc().split(&checkin(at(4, 8, 30), at(4, 9, 30)));
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].date, date(4));
        assert_eq!(segments[0].start, at(4, 8, 30));
        assert_eq!(segments[0].end, at(4, 9, 30));
        assert_eq!(segments[0].checkin_id, 7);
    }

    #[test]
    fn splits_exactly_at_midnight() {
        let segments = CheckinSplitter::utc().split(&checkin(at(4, 22, 0), at(6, 1, 0)));
        let bounds: Vec<_> = segments.iter().map(|s| (s.date, s.start, s.end)).collect();
        assert_eq!(
            bounds,
            vec![
                (date(4), at(4, 22, 0), at(5, 0, 0)),
                (date(5), at(5, 0, 0), at(6, 0, 0)),
                (date(6), at(6, 0, 0), at(6, 1, 0)),
            ]
        );
    }

    #[test]
    fn ending_at_midnight_adds_no_empty_segment() {
        let segments = CheckinSplitter::utc().split(&checkin(at(4, 22, 0), at(5, 0, 0)));
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].end, at(5, 0, 0));
    }

    #[test]
    fn empty_and_negative_intervals_produce_nothing() {
        let splitter = CheckinSplitter::utc();
        assert!(splitter.split(&checkin(at(4, 9, 0), at(4, 9, 0))).is_empty());
        assert!(splitter.split(&checkin(at(4, 10, 0), at(4, 9, 0))).is_empty());
    }

    #[test]
    fn segments_partition_the_checkin() {
        let stay = checkin(at(1, 13, 17), at(9, 4, 41));
        let segments = CheckinSplitter::utc().split(&stay);

        assert_eq!(segments.first().map(|s| s.start), Some(stay.start));
        assert_eq!(segments.last().map(|s| s.end), Some(stay.end));
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        let total: i64 = segments.iter().map(|s| (s.end - s.start).num_seconds()).sum();
        assert_eq!(total, (stay.end - stay.start).num_seconds());
    }

    #[test]
    fn default_calendar_splits_on_utc_days() {
        let splitter = CheckinSplitter::default();
        assert_eq!(splitter.local_date(at(4, 23, 59)), date(4));

        let segments = splitter.split(&checkin(at(4, 23, 0), at(5, 1, 0)));
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].start, at(5, 0, 0));
    }

    #[test]
    fn day_boundaries_follow_the_calendar_offset() {
        let berlin = CheckinSplitter::new(FixedOffset::east_opt(3600).unwrap());
        // 22:30Z is 23:30 local; local midnight is 23:00Z.
        let segments = berlin.split(&checkin(at(4, 22, 30), at(4, 23, 30)));

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].date, date(4));
        assert_eq!(segments[0].end, at(4, 23, 0));
        assert_eq!(segments[1].date, date(5));
        assert_eq!(segments[1].start, at(4, 23, 0));
    }
}
