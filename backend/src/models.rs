use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ServiceError;

/// Monitored chambers. Each one owns its own reading series and access list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chamber {
    Ch1,
    Ch2,
    Ch3,
}

impl Chamber {
    pub const ALL: [Chamber; 3] = [Chamber::Ch1, Chamber::Ch2, Chamber::Ch3];

    pub fn as_str(&self) -> &'static str {
        match self {
            Chamber::Ch1 => "ch1",
            Chamber::Ch2 => "ch2",
            Chamber::Ch3 => "ch3",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Chamber::Ch1 => "Chamber 1",
            Chamber::Ch2 => "Chamber 2",
            Chamber::Ch3 => "Chamber 3",
        }
    }
}

impl fmt::Display for Chamber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chamber {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ch1" => Ok(Chamber::Ch1),
            "ch2" => Ok(Chamber::Ch2),
            "ch3" => Ok(Chamber::Ch3),
            other => Err(ServiceError::InvalidChamber(other.to_string())),
        }
    }
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::readings)]
pub struct Reading {
    pub id: i32,
    pub chamber: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub temperature: Option<f64>, // °C
    pub humidity: Option<f64>,    // %
    pub pressure: Option<f64>,    // hPa
    pub co2: Option<f64>,         // ppm
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::readings)]
pub struct NewReading {
    pub chamber: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub co2: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub password_hash: String,
    pub is_superuser: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub is_superuser: bool,
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = crate::schema::chamber_access)]
pub struct ChamberAccess {
    pub id: i32,
    pub user_id: i32,
    pub chamber: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::chamber_access)]
pub struct NewChamberAccess<'a> {
    pub user_id: i32,
    pub chamber: &'a str,
}
