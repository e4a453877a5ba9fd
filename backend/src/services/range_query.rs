use crate::{
    errors::ServiceError,
    models::{Chamber, Reading},
    services::{
        access::AccessGate,
        reading_store::ReadingStore,
        resampler::{Resampler, SamplingPolicy},
        span::parse_span,
    },
};
use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

const WINDOW_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Spaced,
    Aligned,
}

/// Clock precision of the `time` column in shaped rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    Minutes,
    Seconds,
}

impl TimeFormat {
    fn pattern(&self) -> &'static str {
        match self {
            TimeFormat::Minutes => "%H:%M",
            TimeFormat::Seconds => "%H:%M:%S",
        }
    }
}

/// An explicit local-time window, already resolved to storage instants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub start_local: NaiveDateTime,
    /// Padded to the last microsecond of the requested end minute.
    pub end_local: NaiveDateTime,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// One down-sampled row, as served to tables, charts and exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampledRow {
    pub date: String,
    pub time: String,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
    pub co2: Option<f64>,
}

impl ResampledRow {
    pub fn from_reading(reading: &Reading, tz: Tz, format: TimeFormat) -> Self {
        let local = reading.created_at.with_timezone(&tz);
        Self {
            date: local.format("%Y-%m-%d").to_string(),
            time: local.format(format.pattern()).to_string(),
            temperature: reading.temperature,
            pressure: reading.pressure,
            humidity: reading.humidity,
            co2: reading.co2,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct RangeQuery<'a> {
    pub chamber: &'a str,
    pub start: Option<&'a str>,
    pub end: Option<&'a str>,
    pub every: Option<&'a str>,
    pub policy: Option<PolicyKind>,
}

#[derive(Debug, Clone)]
pub struct RangeResult {
    pub chamber: Chamber,
    pub window: Option<Window>,
    pub step: Duration,
    pub policy: PolicyKind,
    /// Ascending by time.
    pub rows: Vec<ResampledRow>,
}

/// Column-oriented view for charting.
#[derive(Debug, Default, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub temperature: Vec<Option<f64>>,
    pub pressure: Vec<Option<f64>>,
    pub humidity: Vec<Option<f64>>,
    pub co2: Vec<Option<f64>>,
}

impl ChartSeries {
    pub fn from_rows(rows: &[ResampledRow]) -> Self {
        let mut series = ChartSeries::default();
        for row in rows {
            series.labels.push(format!("{} {}", row.date, row.time));
            series.temperature.push(row.temperature);
            series.pressure.push(row.pressure);
            series.humidity.push(row.humidity);
            series.co2.push(row.co2);
        }
        series
    }
}

/// Parse a local wall-clock string such as `2024-03-10T09:30` or
/// `2024-03-10T09:30:15`.
pub fn parse_local(input: &str) -> Option<NaiveDateTime> {
    let trimmed = input.trim();
    WINDOW_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
}

pub fn parse_window(start: &str, end: &str, tz: Tz) -> Result<Window, ServiceError> {
    let (Some(start_local), Some(end_local)) = (parse_local(start), parse_local(end)) else {
        return Err(ServiceError::validation("Invalid datetime format"));
    };

    // Include the whole last minute.
    let end_local = end_local
        .with_second(59)
        .and_then(|d| d.with_nanosecond(999_999_000))
        .unwrap_or(end_local);

    if start_local > end_local {
        return Err(ServiceError::validation("Start must not be after End"));
    }

    let start = match tz.from_local_datetime(&start_local) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
        LocalResult::None => return Err(nonexistent(start_local, tz)),
    };
    let end = match tz.from_local_datetime(&end_local) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(_, dt) => dt,
        LocalResult::None => return Err(nonexistent(end_local, tz)),
    };

    Ok(Window {
        start_local,
        end_local,
        start: start.with_timezone(&Utc),
        end: end.with_timezone(&Utc),
    })
}

fn nonexistent(local: NaiveDateTime, tz: Tz) -> ServiceError {
    ServiceError::Validation(format!("{} does not exist in {}", local, tz.name()))
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

/// Validates access, fetches a chamber's readings and down-samples them.
pub struct RangeQueryService<'a> {
    store: &'a dyn ReadingStore,
    gate: &'a dyn AccessGate,
    resampler: Resampler,
}

impl<'a> RangeQueryService<'a> {
    pub fn new(store: &'a dyn ReadingStore, gate: &'a dyn AccessGate, tz: Tz) -> Self {
        Self {
            store,
            gate,
            resampler: Resampler::new(tz),
        }
    }

    pub fn authorize(&self, user_id: i32, chamber: &str) -> Result<Chamber, ServiceError> {
        let chamber: Chamber = chamber.parse()?;
        if !self.gate.has_access(user_id, chamber)? {
            log::warn!("User {} denied access to {}", user_id, chamber);
            return Err(ServiceError::AccessDenied);
        }
        Ok(chamber)
    }

    /// Without a window every stored reading is considered and spaced
    /// sampling applies; with one, only the window is fetched and aligned
    /// sampling applies. `query.policy` overrides the default.
    pub fn get_range(&self, user_id: i32, query: &RangeQuery) -> Result<RangeResult, ServiceError> {
        let chamber = self.authorize(user_id, query.chamber)?;
        self.range_for(chamber, query)
    }

    /// Like [`get_range`](Self::get_range) but the window is mandatory.
    pub fn get_export(&self, user_id: i32, query: &RangeQuery) -> Result<RangeResult, ServiceError> {
        let chamber = self.authorize(user_id, query.chamber)?;
        if present(query.start).is_none() || present(query.end).is_none() {
            return Err(ServiceError::validation("Start and End datetime required"));
        }
        self.range_for(chamber, query)
    }

    fn range_for(&self, chamber: Chamber, query: &RangeQuery) -> Result<RangeResult, ServiceError> {
        let step = parse_span(query.every);
        let tz = self.resampler.timezone();

        let window = match (present(query.start), present(query.end)) {
            (Some(start), Some(end)) => Some(parse_window(start, end, tz)?),
            (None, None) => None,
            _ => return Err(ServiceError::validation("Start and End datetime required")),
        };

        let kind = query.policy.unwrap_or(match window {
            Some(_) => PolicyKind::Aligned,
            None => PolicyKind::Spaced,
        });

        let readings = match &window {
            Some(w) => {
                log::debug!(
                    "{} window {} -> {} every {}m ({:?})",
                    chamber,
                    w.start_local,
                    w.end_local,
                    step.num_minutes(),
                    kind
                );
                let rows = self.store.query_range(chamber, w.start, w.end)?;
                if rows.is_empty() {
                    log::info!("{}: no data in window {} -> {}", chamber, w.start_local, w.end_local);
                    return Err(ServiceError::NoDataInWindow);
                }
                rows
            }
            None => self.store.query_all(chamber)?,
        };

        let policy = match (kind, &window) {
            (PolicyKind::Spaced, _) => SamplingPolicy::Spaced,
            (PolicyKind::Aligned, Some(w)) => SamplingPolicy::Aligned {
                start: w.start,
                end: w.end,
            },
            (PolicyKind::Aligned, None) => {
                return Err(ServiceError::validation(
                    "Aligned sampling requires a start and end window",
                ));
            }
        };

        let format = if window.is_some() {
            TimeFormat::Seconds
        } else {
            TimeFormat::Minutes
        };

        let rows = self
            .resampler
            .resample(&readings, step, policy)
            .into_iter()
            .map(|r| ResampledRow::from_reading(r, tz, format))
            .collect();

        Ok(RangeResult {
            chamber,
            window,
            step,
            policy: kind,
            rows,
        })
    }
}
