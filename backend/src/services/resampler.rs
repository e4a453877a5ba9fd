use crate::models::Reading;
use chrono::{DateTime, Duration, NaiveDateTime, Timelike, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;

/// How readings are thinned out to the requested cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingPolicy {
    /// Keep the first reading, then every reading at least `step` after the
    /// last kept one. Gaps follow the data, not the clock.
    Spaced,
    /// Walk minute slots from the floored window start in `step` increments
    /// and emit the first reading seen in each slot's minute.
    Aligned {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Down-samples an ascending reading series in the operating timezone.
#[derive(Debug, Clone, Copy)]
pub struct Resampler {
    tz: Tz,
}

impl Resampler {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Wall-clock time of an instant in the operating timezone.
    pub fn local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.tz).naive_local()
    }

    /// `readings` must be ordered by `created_at` ascending; the output keeps
    /// that order and borrows from the input.
    pub fn resample<'a>(
        &self,
        readings: &'a [Reading],
        step: Duration,
        policy: SamplingPolicy,
    ) -> Vec<&'a Reading> {
        match policy {
            SamplingPolicy::Spaced => self.spaced(readings, step),
            SamplingPolicy::Aligned { start, end } => self.aligned(readings, step, start, end),
        }
    }

    /// Spacing is measured on instants, so a repeated local hour after a
    /// DST fall-back is not swallowed.
    fn spaced<'a>(&self, readings: &'a [Reading], step: Duration) -> Vec<&'a Reading> {
        let mut kept = Vec::new();
        let mut last: Option<DateTime<Utc>> = None;

        for reading in readings {
            let at = reading.created_at;
            let keep = match last {
                None => true,
                Some(prev) => at >= prev + step,
            };
            if keep {
                kept.push(reading);
                last = Some(at);
            }
        }
        kept
    }

    fn aligned<'a>(
        &self,
        readings: &'a [Reading],
        step: Duration,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<&'a Reading> {
        let mut per_minute: BTreeMap<NaiveDateTime, &'a Reading> = BTreeMap::new();
        for reading in readings {
            per_minute
                .entry(floor_minute(self.local(reading.created_at)))
                .or_insert(reading);
        }

        let origin = floor_minute(self.local(start));
        let end_local = self.local(end);
        if origin > end_local {
            return Vec::new();
        }
        let step_minutes = step.num_minutes().max(1);

        // Only occupied minutes are visited; a slot is any minute a whole
        // number of steps after the floored start.
        per_minute
            .range(origin..=end_local)
            .filter(|(minute, _)| (**minute - origin).num_minutes() % step_minutes == 0)
            .map(|(_, reading)| *reading)
            .collect()
    }
}

pub fn floor_minute(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    const TZ: Tz = chrono_tz::Asia::Kolkata;

    fn local(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        let naive = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap();
        TZ.from_local_datetime(&naive).unwrap().with_timezone(&Utc)
    }

    fn reading(id: i32, at: DateTime<Utc>) -> Reading {
        let wall = at.with_timezone(&TZ).naive_local();
        Reading {
            id,
            chamber: "ch1".to_string(),
            date: wall.date(),
            time: wall.time(),
            temperature: Some(20.0 + id as f64),
            humidity: Some(50.0),
            pressure: None,
            co2: Some(400.0),
            created_at: at,
        }
    }

    fn every_quarter_hour(hours: u32) -> Vec<Reading> {
        (0..hours * 4 + 1)
            .map(|i| reading(i as i32, local(i / 4, (i % 4) * 15, 7)))
            .collect()
    }

    fn ids(rows: &[&Reading]) -> Vec<i32> {
        rows.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_spaced_keeps_first_and_respects_step() {
        let readings = vec![
            reading(1, local(10, 0, 0)),
            reading(2, local(10, 2, 0)),
            reading(3, local(10, 5, 0)),
            reading(4, local(10, 7, 0)),
            reading(5, local(10, 10, 30)),
        ];
        let resampler = Resampler::new(TZ);
        let kept = resampler.resample(&readings, Duration::minutes(5), SamplingPolicy::Spaced);

        assert_eq!(ids(&kept), vec![1, 3, 5]);
        for pair in kept.windows(2) {
            assert!(pair[1].created_at - pair[0].created_at >= Duration::minutes(5));
        }
    }

    #[test]
    fn test_spaced_gaps_follow_data_not_clock() {
        let readings = vec![
            reading(1, local(10, 0, 0)),
            reading(2, local(10, 13, 0)),
            reading(3, local(10, 14, 0)),
            reading(4, local(10, 18, 0)),
        ];
        let kept = Resampler::new(TZ).resample(&readings, Duration::minutes(5), SamplingPolicy::Spaced);
        assert_eq!(ids(&kept), vec![1, 2, 4]);
    }

    #[test]
    fn test_spaced_same_minute_keeps_both_only_when_step_allows() {
        let readings = vec![reading(1, local(9, 0, 5)), reading(2, local(9, 0, 50))];
        let resampler = Resampler::new(TZ);

        let one_min = resampler.resample(&readings, Duration::minutes(1), SamplingPolicy::Spaced);
        assert_eq!(ids(&one_min), vec![1]);
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        let resampler = Resampler::new(TZ);
        assert!(resampler.resample(&[], Duration::minutes(1), SamplingPolicy::Spaced).is_empty());
        let policy = SamplingPolicy::Aligned {
            start: local(0, 0, 0),
            end: local(23, 59, 59),
        };
        assert!(resampler.resample(&[], Duration::minutes(1), policy).is_empty());
    }

    #[test]
    fn test_aligned_two_hour_cadence_over_ten_hours() {
        let readings = every_quarter_hour(10);
        let policy = SamplingPolicy::Aligned {
            start: local(0, 0, 0),
            end: local(10, 0, 59),
        };
        let resampler = Resampler::new(TZ);
        let kept = resampler.resample(&readings, Duration::hours(2), policy);

        assert_eq!(kept.len(), 6);
        let hours: Vec<u32> = kept.iter().map(|r| r.time.hour()).collect();
        assert_eq!(hours, vec![0, 2, 4, 6, 8, 10]);
        for pair in kept.windows(2) {
            assert_eq!(
                resampler.local(pair[1].created_at) - resampler.local(pair[0].created_at),
                Duration::hours(2)
            );
        }
    }

    #[test]
    fn test_aligned_slots_are_relative_to_window_start() {
        let readings = every_quarter_hour(10);
        let start = local(0, 15, 0);
        let policy = SamplingPolicy::Aligned {
            start,
            end: local(10, 0, 59),
        };
        let resampler = Resampler::new(TZ);
        let kept = resampler.resample(&readings, Duration::hours(2), policy);

        // 00:15, 02:15, 04:15, 06:15, 08:15; 10:15 is past the end.
        assert_eq!(kept.len(), 5);
        let origin = floor_minute(resampler.local(start));
        for row in &kept {
            let offset = floor_minute(resampler.local(row.created_at)) - origin;
            assert_eq!(offset.num_minutes() % 120, 0);
        }
    }

    #[test]
    fn test_aligned_first_seen_wins_within_minute() {
        let readings = vec![
            reading(1, local(9, 0, 5)),
            reading(2, local(9, 0, 50)),
            reading(3, local(9, 1, 10)),
        ];
        let policy = SamplingPolicy::Aligned {
            start: local(9, 0, 0),
            end: local(9, 1, 59),
        };
        let kept = Resampler::new(TZ).resample(&readings, Duration::minutes(1), policy);
        assert_eq!(ids(&kept), vec![1, 3]);
    }

    #[test]
    fn test_aligned_skips_empty_slots_without_placeholders() {
        let readings = vec![reading(1, local(9, 0, 0)), reading(2, local(9, 20, 0))];
        let policy = SamplingPolicy::Aligned {
            start: local(9, 0, 0),
            end: local(9, 30, 59),
        };
        let kept = Resampler::new(TZ).resample(&readings, Duration::minutes(5), policy);
        assert_eq!(ids(&kept), vec![1, 2]);
    }

    #[test]
    fn test_aligned_off_grid_readings_are_dropped() {
        let readings = vec![reading(1, local(9, 1, 0)), reading(2, local(9, 3, 0))];
        let policy = SamplingPolicy::Aligned {
            start: local(9, 0, 0),
            end: local(9, 10, 59),
        };
        let kept = Resampler::new(TZ).resample(&readings, Duration::minutes(5), policy);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_aligned_uses_local_minutes_not_utc() {
        // Kolkata is UTC+05:30, so local minute slots differ from UTC hour marks.
        let at = Utc.with_ymd_and_hms(2024, 3, 10, 4, 30, 20).unwrap();
        let readings = vec![reading(1, at)];
        let policy = SamplingPolicy::Aligned {
            start: local(10, 0, 0),
            end: local(10, 0, 59),
        };
        let kept = Resampler::new(TZ).resample(&readings, Duration::hours(1), policy);
        assert_eq!(ids(&kept), vec![1]);
    }

    #[test]
    fn test_null_measurements_pass_through() {
        let mut r = reading(1, local(9, 0, 0));
        r.temperature = None;
        r.co2 = None;
        let readings = vec![r];
        let kept = Resampler::new(TZ).resample(&readings, Duration::minutes(1), SamplingPolicy::Spaced);
        assert_eq!(kept[0].temperature, None);
        assert_eq!(kept[0].co2, None);
    }

    #[test]
    fn test_resample_is_idempotent() {
        let readings = every_quarter_hour(3);
        let resampler = Resampler::new(TZ);
        let policy = SamplingPolicy::Aligned {
            start: local(0, 0, 0),
            end: local(3, 0, 59),
        };
        let first = ids(&resampler.resample(&readings, Duration::minutes(30), policy));
        let second = ids(&resampler.resample(&readings, Duration::minutes(30), policy));
        assert_eq!(first, second);
    }

    #[test]
    fn test_spaced_keeps_repeated_hour_after_fall_back() {
        // Madrid leaves CEST at 03:00 local on 2024-10-27, replaying 02:00-02:59.
        let madrid = chrono_tz::Europe::Madrid;
        let first = Utc.with_ymd_and_hms(2024, 10, 27, 0, 0, 0).unwrap();
        let readings: Vec<Reading> = (0..25)
            .map(|i| reading(i, first + Duration::minutes(5 * i as i64)))
            .collect();

        let resampler = Resampler::new(madrid);
        let kept = resampler.resample(&readings, Duration::minutes(5), SamplingPolicy::Spaced);

        assert_eq!(kept.len(), 25);
        let repeated = kept
            .iter()
            .filter(|r| resampler.local(r.created_at).hour() == 2)
            .count();
        assert_eq!(repeated, 24);
    }

    #[test]
    fn test_aligned_long_window_with_single_reading() {
        let readings = vec![reading(1, local(9, 0, 30))];
        let end = Utc.with_ymd_and_hms(2044, 3, 10, 3, 30, 59).unwrap();
        let policy = SamplingPolicy::Aligned {
            start: local(9, 0, 0),
            end,
        };
        let kept = Resampler::new(TZ).resample(&readings, Duration::minutes(1), policy);
        assert_eq!(ids(&kept), vec![1]);

        let far = SamplingPolicy::Aligned {
            start: local(9, 0, 0),
            end: Utc.with_ymd_and_hms(200_000, 1, 1, 0, 0, 0).unwrap(),
        };
        let kept = Resampler::new(TZ).resample(&readings, Duration::minutes(1), far);
        assert_eq!(ids(&kept), vec![1]);
    }

    #[test]
    fn test_aligned_inverted_window_is_empty() {
        let readings = vec![reading(1, local(9, 0, 0))];
        let policy = SamplingPolicy::Aligned {
            start: local(10, 0, 0),
            end: local(9, 0, 0),
        };
        assert!(Resampler::new(TZ)
            .resample(&readings, Duration::minutes(1), policy)
            .is_empty());
    }

    #[test]
    fn test_floor_minute() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_nano_opt(12, 34, 56, 789)
            .unwrap();
        let floored = floor_minute(dt);
        assert_eq!(floored.second(), 0);
        assert_eq!(floored.nanosecond(), 0);
        assert_eq!(floored.minute(), 34);
    }
}
