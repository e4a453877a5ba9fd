use crate::{
    errors::ServiceError,
    models::{Chamber, NewReading, Reading},
    services::reading_store::ReadingStore,
};
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::Value;

pub const REQUIRED_FIELDS: [&str; 4] = ["temperature", "pressure", "humidity", "co2"];

const TEMPERATURE_RANGE: (f64, f64) = (-50.0, 150.0);
const HUMIDITY_RANGE: (f64, f64) = (0.0, 100.0);

/// Validated device payload, ready to be stamped and stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurements {
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
    pub co2: Option<f64>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
}

#[derive(Debug, Serialize)]
pub struct IngestReceipt {
    pub status: &'static str,
    pub chamber: Chamber,
    pub id: i32,
    pub date: String,
    pub time: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct LastReading {
    pub id: i32,
    pub date: String,
    pub time: String,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
    pub co2: Option<f64>,
    pub created_at: String,
}

/// True for `application/json`, ignoring parameters such as `charset`.
pub fn is_json_content_type(header: Option<&str>) -> bool {
    header
        .and_then(|h| h.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

fn coerce_number(field: &str, value: &Value) -> Result<Option<f64>, ServiceError> {
    let number = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(ServiceError::Validation(format!(
            "Field {} must be numeric",
            field
        ))),
    }
}

fn check_range(field: &str, value: Option<f64>, (lo, hi): (f64, f64)) -> Result<(), ServiceError> {
    match value {
        Some(v) if v < lo || v > hi => Err(ServiceError::Validation(format!(
            "Field {} out of range [{}, {}]",
            field, lo, hi
        ))),
        _ => Ok(()),
    }
}

fn optional_str<'a>(payload: &'a serde_json::Map<String, Value>, key: &str) -> Result<Option<&'a str>, ServiceError> {
    match payload.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim())),
        Some(_) => Err(ServiceError::Validation(format!("Field {} must be a string", key))),
    }
}

/// Check a raw JSON body. Nothing is written when this fails.
pub fn parse_payload(body: &[u8]) -> Result<Measurements, ServiceError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|_| ServiceError::validation("Invalid JSON"))?;
    let Value::Object(payload) = value else {
        return Err(ServiceError::validation("JSON body must be an object"));
    };

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|f| !payload.contains_key(*f))
        .collect();
    if !missing.is_empty() {
        return Err(ServiceError::Validation(format!(
            "Missing fields: {}",
            missing.join(", ")
        )));
    }

    let temperature = coerce_number("temperature", &payload["temperature"])?;
    let pressure = coerce_number("pressure", &payload["pressure"])?;
    let humidity = coerce_number("humidity", &payload["humidity"])?;
    let co2 = coerce_number("co2", &payload["co2"])?;
    check_range("temperature", temperature, TEMPERATURE_RANGE)?;
    check_range("humidity", humidity, HUMIDITY_RANGE)?;

    let date = optional_str(&payload, "date")?
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| ServiceError::validation("Invalid date, expected YYYY-MM-DD"))
        })
        .transpose()?;
    let time = optional_str(&payload, "time")?
        .map(|s| {
            NaiveTime::parse_from_str(s, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .map_err(|_| ServiceError::validation("Invalid time, expected HH:MM[:SS]"))
        })
        .transpose()?;

    Ok(Measurements {
        temperature,
        pressure,
        humidity,
        co2,
        date,
        time,
    })
}

/// Stamp measurements with the server clock. Missing date/time come from the
/// operating timezone, floored to the second.
pub fn stamp(chamber: Chamber, m: Measurements, now: DateTime<Utc>, tz: Tz) -> NewReading {
    let local = now.with_timezone(&tz).naive_local();
    let local_time = local.time().with_nanosecond(0).unwrap_or(local.time());
    NewReading {
        chamber: chamber.as_str().to_string(),
        date: m.date.unwrap_or(local.date()),
        time: m.time.unwrap_or(local_time),
        temperature: m.temperature,
        humidity: m.humidity,
        pressure: m.pressure,
        co2: m.co2,
        created_at: now,
    }
}

pub fn local_iso(instant: DateTime<Utc>, tz: Tz) -> String {
    instant
        .with_timezone(&tz)
        .to_rfc3339_opts(SecondsFormat::Secs, false)
}

pub struct IngestService<'a> {
    store: &'a dyn ReadingStore,
    tz: Tz,
}

impl<'a> IngestService<'a> {
    pub fn new(store: &'a dyn ReadingStore, tz: Tz) -> Self {
        Self { store, tz }
    }

    pub fn ingest(
        &self,
        chamber: &str,
        content_type: Option<&str>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<IngestReceipt, ServiceError> {
        let chamber: Chamber = chamber.parse()?;
        if !is_json_content_type(content_type) {
            return Err(ServiceError::validation(
                "Content-Type must be application/json",
            ));
        }

        let measurements = parse_payload(body)?;
        let reading = self.store.insert(stamp(chamber, measurements, now, self.tz))?;

        log::info!(
            "Stored reading {} for {} at {} {}",
            reading.id,
            chamber,
            reading.date,
            reading.time
        );

        Ok(IngestReceipt {
            status: "ok",
            chamber,
            id: reading.id,
            date: reading.date.format("%Y-%m-%d").to_string(),
            time: reading.time.format("%H:%M:%S").to_string(),
            created_at: local_iso(reading.created_at, self.tz),
        })
    }

    pub fn last(&self, chamber: &str) -> Result<(Chamber, Option<LastReading>), ServiceError> {
        let chamber: Chamber = chamber.parse()?;
        let last = self.store.latest(chamber)?.map(|r| self.describe(&r));
        Ok((chamber, last))
    }

    fn describe(&self, r: &Reading) -> LastReading {
        LastReading {
            id: r.id,
            date: r.date.format("%Y-%m-%d").to_string(),
            time: r.time.format("%H:%M:%S").to_string(),
            temperature: r.temperature,
            pressure: r.pressure,
            humidity: r.humidity,
            co2: r.co2,
            created_at: local_iso(r.created_at, self.tz),
        }
    }
}
