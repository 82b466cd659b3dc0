use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;

/// Reference point for regulation values expressed as a time of day
static MIDNIGHT: Lazy<NaiveTime> =
    Lazy::new(|| NaiveTime::from_hms_opt(0, 0, 0).expect("midnight"));

/// Format used for date-times in the seed CSVs and on the command line
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";
const REGULATION_TIME_FORMAT: &str = "%H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Default, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn from_str(s: &str) -> Self {
                Self(s.trim().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

macro_rules! numeric_id {
    ($name:ident) => {
        #[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(PlaneId);
string_id!(AirlineId);
string_id!(FlightId);

numeric_id!(AirportId);
numeric_id!(RegulationId);
numeric_id!(SeatId);
numeric_id!(TicketId);
numeric_id!(ProfileId);
numeric_id!(UserId);

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("{path}:{line}: expected {expected} columns, found {found}")]
    Columns {
        path: String,
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("{path}:{line}: invalid {column}: {reason}")]
    Value {
        path: String,
        line: usize,
        column: &'static str,
        reason: String,
    },
    #[error("regulation {name} has invalid value {value:?}")]
    RegulationValue { name: String, value: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Split every non-blank line of a seed CSV into its columns
fn read_rows(path: &str, columns: usize) -> Result<Vec<(usize, Vec<String>)>, ParseError> {
    let csv_bytes = std::fs::read(path)?;
    let mut rows = vec![];

    for (i, line) in String::from_utf8(csv_bytes)?.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let values = line
            .split(", ")
            .map(|v| v.trim().to_string())
            .collect::<Vec<_>>();
        if values.len() != columns {
            return Err(ParseError::Columns {
                path: path.to_string(),
                line: i + 1,
                expected: columns,
                found: values.len(),
            });
        }
        rows.push((i + 1, values));
    }

    Ok(rows)
}

fn parse_column<T>(path: &str, line: usize, column: &'static str, raw: &str) -> Result<T, ParseError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    raw.parse::<T>().map_err(|e| ParseError::Value {
        path: path.to_string(),
        line,
        column,
        reason: e.to_string(),
    })
}

fn parse_date_time(
    path: &str,
    line: usize,
    column: &'static str,
    raw: &str,
) -> Result<NaiveDateTime, ParseError> {
    NaiveDateTime::parse_from_str(raw, DATE_TIME_FORMAT).map_err(|e| ParseError::Value {
        path: path.to_string(),
        line,
        column,
        reason: e.to_string(),
    })
}

fn optional(raw: String) -> Option<String> {
    (!raw.is_empty()).then_some(raw)
}

/// An `Airport` served by the catalog, either as a route endpoint or a stop
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct Airport {
    pub id: AirportId,
    pub name: String,
    /// City or country the airport serves
    pub location: String,
    pub image: Option<String>,
}

impl Airport {
    pub fn from_csv(path: &str) -> Result<Vec<Self>, ParseError> {
        read_rows(path, 4)?
            .into_iter()
            .map(|(line, mut values)| {
                Ok(Self {
                    id: AirportId(parse_column(path, line, "id", &values[0])?),
                    name: std::mem::take(&mut values[1]),
                    location: std::mem::take(&mut values[2]),
                    image: optional(std::mem::take(&mut values[3])),
                })
            })
            .collect()
    }
}

#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct Airplane {
    pub id: PlaneId,
    pub name: String,
    pub manufacturer: String,
    /// Number of seats generated for each flight using this plane
    pub total_seat: u32,
    pub image: Option<String>,
}

impl Airplane {
    pub fn from_csv(path: &str) -> Result<Vec<Self>, ParseError> {
        read_rows(path, 5)?
            .into_iter()
            .map(|(line, mut values)| {
                Ok(Self {
                    id: PlaneId::from_str(&values[0]),
                    name: std::mem::take(&mut values[1]),
                    manufacturer: std::mem::take(&mut values[2]),
                    total_seat: parse_column(path, line, "total_seat", &values[3])?,
                    image: optional(std::mem::take(&mut values[4])),
                })
            })
            .collect()
    }
}

/// An `Airline` is a route between two airports, flights are scheduled on it
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct Airline {
    pub id: AirlineId,
    pub name: String,
    pub from_airport: AirportId,
    pub to_airport: AirportId,
}

impl Airline {
    pub fn from_csv(path: &str) -> Result<Vec<Self>, ParseError> {
        read_rows(path, 4)?
            .into_iter()
            .map(|(line, mut values)| {
                Ok(Self {
                    id: AirlineId::from_str(&values[0]),
                    name: std::mem::take(&mut values[1]),
                    from_airport: AirportId(parse_column(path, line, "from_airport", &values[2])?),
                    to_airport: AirportId(parse_column(path, line, "to_airport", &values[3])?),
                })
            })
            .collect()
    }

    /// Whether the airport is one of the route's endpoints
    pub fn serves(&self, airport: AirportId) -> bool {
        self.from_airport == airport || self.to_airport == airport
    }
}

/// A scheduled instance of an `Airline` route flown by a single plane
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct Flight {
    pub id: FlightId,
    pub name: String,
    pub departing_at: NaiveDateTime,
    pub arriving_at: NaiveDateTime,
    pub plane: PlaneId,
    pub airline: AirlineId,
    /// Regulations the flight was validated against
    pub regulations: Vec<RegulationId>,
}

impl Flight {
    /// Columns: id, name, departing_at, arriving_at, plane, airline, regulations (`;` separated)
    pub fn from_csv(path: &str) -> Result<Vec<Self>, ParseError> {
        read_rows(path, 7)?
            .into_iter()
            .map(|(line, mut values)| {
                let regulations = values[6]
                    .split(';')
                    .filter(|r| !r.is_empty())
                    .map(|r| parse_column(path, line, "regulations", r).map(RegulationId))
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Self {
                    id: FlightId::from_str(&values[0]),
                    name: std::mem::take(&mut values[1]),
                    departing_at: parse_date_time(path, line, "departing_at", &values[2])?,
                    arriving_at: parse_date_time(path, line, "arriving_at", &values[3])?,
                    plane: PlaneId::from_str(&values[4]),
                    airline: AirlineId::from_str(&values[5]),
                    regulations,
                })
            })
            .collect()
    }

    pub fn duration(&self) -> Duration {
        self.arriving_at - self.departing_at
    }

    /// Whether the flight is in the air at any point of the given window
    pub fn overlaps(&self, departing_at: NaiveDateTime, arriving_at: NaiveDateTime) -> bool {
        !(arriving_at < self.departing_at || self.arriving_at < departing_at)
    }
}

/// An intermediate airport a `Flight` passes through
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct StopStation {
    pub flight: FlightId,
    pub airport: AirportId,
    pub name: String,
    pub stop_time_begin: NaiveDateTime,
    pub stop_time_finish: NaiveDateTime,
    pub description: String,
    /// Stop-duration regulations the stop was validated against
    pub regulations: Vec<RegulationId>,
}

impl StopStation {
    /// Columns: flight, airport, name, begin, finish, description, regulations (`;` separated)
    pub fn from_csv(path: &str) -> Result<Vec<Self>, ParseError> {
        read_rows(path, 7)?
            .into_iter()
            .map(|(line, mut values)| {
                let regulations = values[6]
                    .split(';')
                    .filter(|r| !r.is_empty())
                    .map(|r| parse_column(path, line, "regulations", r).map(RegulationId))
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Self {
                    flight: FlightId::from_str(&values[0]),
                    airport: AirportId(parse_column(path, line, "airport", &values[1])?),
                    name: std::mem::take(&mut values[2]),
                    stop_time_begin: parse_date_time(path, line, "stop_time_begin", &values[3])?,
                    stop_time_finish: parse_date_time(path, line, "stop_time_finish", &values[4])?,
                    description: std::mem::take(&mut values[5]),
                    regulations,
                })
            })
            .collect()
    }

    pub fn duration(&self) -> Duration {
        self.stop_time_finish - self.stop_time_begin
    }
}

/// A named, admin-editable constraint value
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct Regulation {
    pub id: RegulationId,
    pub name: String,
    /// Raw value, either a `H:MM:SS` duration or an amount in VND
    pub value: String,
    pub description: String,
}

impl Regulation {
    pub fn from_csv(path: &str) -> Result<Vec<Self>, ParseError> {
        read_rows(path, 4)?
            .into_iter()
            .map(|(line, mut values)| {
                Ok(Self {
                    id: RegulationId(parse_column(path, line, "id", &values[0])?),
                    name: std::mem::take(&mut values[1]),
                    value: std::mem::take(&mut values[2]),
                    description: std::mem::take(&mut values[3]),
                })
            })
            .collect()
    }

    /// Interprets the value as a time span below one day
    pub fn duration_value(&self) -> Result<Duration, ParseError> {
        NaiveTime::parse_from_str(self.value.trim(), REGULATION_TIME_FORMAT)
            .map(|time| time.signed_duration_since(*MIDNIGHT))
            .map_err(|_| self.invalid_value())
    }

    /// Interprets the value as a non-negative amount in VND
    pub fn amount_value(&self) -> Result<i64, ParseError> {
        self.value
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|amount| *amount >= 0)
            .ok_or_else(|| self.invalid_value())
    }

    fn invalid_value(&self) -> ParseError {
        ParseError::RegulationValue {
            name: self.name.clone(),
            value: self.value.clone(),
        }
    }
}

#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct Seat {
    pub id: SeatId,
    pub name: String,
    pub flight: FlightId,
    pub booked: bool,
}

/// Passenger details recorded for each ticket
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    pub id: ProfileId,
    /// National identity document number
    pub document_id: String,
    pub name: String,
    pub gender: String,
    pub dob: NaiveDate,
    pub email: String,
    pub phone: String,
    pub is_supervisor: bool,
}

impl Profile {
    pub fn parse_dob(raw: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
    }
}

#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct Ticket {
    pub id: TicketId,
    /// Fare class, priced by the regulation of the same name
    pub rank: u8,
    /// Price in VND
    pub price: i64,
    /// When the ticket was sold
    pub date: NaiveDateTime,
    /// Boarding airport
    pub place: Option<AirportId>,
    pub profile: ProfileId,
    pub flight: FlightId,
    pub seat: SeatId,
    /// Account that made the booking
    pub user: Option<UserId>,
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum UserRole {
    #[default]
    User,
    Employee,
    Admin,
}

impl<'a> TryFrom<&'a str> for UserRole {
    type Error = String;

    fn try_from(s: &'a str) -> Result<Self, Self::Error> {
        match s {
            s if s == "User" => Ok(Self::User),
            s if s == "Employee" => Ok(Self::Employee),
            s if s == "Admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role {s:?}")),
        }
    }
}

impl UserRole {
    /// Employees and admins may manage flights and sell at the counter
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Employee | Self::Admin)
    }
}

#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub username: String,
    /// Hex digest of the password, never the password itself
    pub password_digest: String,
    pub active: bool,
    pub joined_date: NaiveDateTime,
    pub role: UserRole,
}

/// A seeded account, the password is hashed by the store when loaded
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct UserSeed {
    pub name: String,
    pub username: String,
    pub password: String,
    pub role: UserRole,
}

impl UserSeed {
    pub fn from_csv(path: &str) -> Result<Vec<Self>, ParseError> {
        read_rows(path, 4)?
            .into_iter()
            .map(|(line, mut values)| {
                let role = UserRole::try_from(values[3].as_str()).map_err(|reason| {
                    ParseError::Value {
                        path: path.to_string(),
                        line,
                        column: "role",
                        reason,
                    }
                })?;

                Ok(Self {
                    name: std::mem::take(&mut values[0]),
                    username: std::mem::take(&mut values[1]),
                    password: std::mem::take(&mut values[2]),
                    role,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn regulation(value: &str) -> Regulation {
        Regulation {
            id: RegulationId(1),
            name: "duration".to_string(),
            value: value.to_string(),
            description: String::new(),
        }
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 12, 1)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .expect("date")
    }

    #[test]
    fn test_duration_value() {
        assert_eq!(regulation("00:30:00").duration_value().ok(), Some(Duration::minutes(30)));
        assert_eq!(regulation("4:00:00").duration_value().ok(), Some(Duration::hours(4)));
        assert_eq!(
            regulation("12:05:30").duration_value().ok(),
            Some(Duration::hours(12) + Duration::minutes(5) + Duration::seconds(30))
        );
        assert!(regulation("25:00:00").duration_value().is_err());
        assert!(regulation("300000").duration_value().is_err());
    }

    #[test]
    fn test_amount_value() {
        assert_eq!(regulation("300000").amount_value().ok(), Some(300_000));
        assert!(regulation("-1").amount_value().is_err());
        assert!(regulation("00:30:00").amount_value().is_err());
    }

    #[test]
    fn test_overlaps() {
        let flight = Flight {
            departing_at: at(13, 0),
            arriving_at: at(14, 0),
            ..Default::default()
        };

        assert!(flight.overlaps(at(13, 30), at(15, 0)));
        assert!(flight.overlaps(at(12, 0), at(13, 0)));
        assert!(flight.overlaps(at(12, 0), at(16, 0)));
        assert!(!flight.overlaps(at(14, 1), at(16, 0)));
        assert!(!flight.overlaps(at(11, 0), at(12, 59)));
    }

    #[test]
    fn test_ids_are_trimmed() {
        assert_eq!(FlightId::from_str(" CB1 ").as_str(), "CB1");
        assert!(FlightId::from_str("   ").is_empty());
    }

    #[test]
    fn test_seed_csvs() -> Result<(), Box<dyn std::error::Error>> {
        let airports = Airport::from_csv("../test_data/airports.csv")?;
        let airlines = Airline::from_csv("../test_data/airlines.csv")?;
        let flights = Flight::from_csv("../test_data/flights.csv")?;
        let regulations = Regulation::from_csv("../test_data/regulations.csv")?;

        assert_eq!(airports.len(), 5);
        assert!(airports[0].image.is_some());
        assert!(airlines
            .iter()
            .all(|a| airports.iter().any(|ap| ap.id == a.from_airport)));
        assert_eq!(flights[0].id.as_str(), "CB1");
        assert_eq!(flights[0].duration(), Duration::hours(1));
        assert!(regulations.iter().any(|r| r.name == "min_stop"));

        Ok(())
    }
}
