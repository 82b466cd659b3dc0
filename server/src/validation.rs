//! Checks run before a flight or one of its stop stations is written.
//!
//! Every check either passes or names the first rule the input breaks. Checks only read
//! from the [`Catalog`], so a failed chain never leaves partial state behind.

use chrono::{Duration, NaiveDateTime};
use schema::{
    AirportId, Catalog, Flight, FlightDraft, FlightId, ParseError, PlaneId, RegulationId,
    StopDraft,
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("flight information is incomplete")]
    IncompleteFlight,
    #[error("flight id {0} already exists")]
    DuplicateFlightId(FlightId),
    #[error("no minimum flight duration regulation (id {0}) is configured")]
    MissingFlightDurationRegulation(RegulationId),
    #[error("flight lasts {actual} minutes, more than {minimum} minutes are required")]
    FlightTooShort { minimum: i64, actual: i64 },
    #[error("plane {plane} is already scheduled on flight {conflict} in this period")]
    PlaneBusy { plane: PlaneId, conflict: FlightId },
    #[error("stop station information is incomplete")]
    IncompleteStop,
    #[error("minimum and maximum stop duration regulations must both be configured")]
    MissingStopRegulation,
    #[error("stop lasts {actual} minutes, it must last between {minimum} and {maximum} minutes")]
    StopDurationOutOfRange {
        minimum: i64,
        maximum: i64,
        actual: i64,
    },
    #[error("stop time does not fit within the flight time")]
    StopOutsideFlight,
    #[error("airline {0:?} does not exist")]
    UnknownAirline(String),
    #[error("airport {0:?} does not exist")]
    UnknownAirport(String),
    #[error("airport {0:?} is already an endpoint of the route")]
    StopOnRoute(String),
    #[error("airport {0:?} is already a stop of this flight")]
    DuplicateStop(String),
    #[error("{0}")]
    InvalidRegulation(String),
}

impl From<ParseError> for ValidationError {
    fn from(e: ParseError) -> Self {
        Self::InvalidRegulation(e.to_string())
    }
}

/// The flight must last strictly longer than the minimum duration regulation
pub fn check_time_flight<C: Catalog>(
    catalog: &C,
    departing_at: NaiveDateTime,
    arriving_at: NaiveDateTime,
    regulation: RegulationId,
) -> Result<(), ValidationError> {
    let minimum = catalog
        .regulation(regulation)
        .ok_or(ValidationError::MissingFlightDurationRegulation(regulation))?
        .duration_value()?;

    let duration = arriving_at - departing_at;
    if duration > minimum {
        Ok(())
    } else {
        Err(ValidationError::FlightTooShort {
            minimum: minimum.num_minutes(),
            actual: duration.num_minutes(),
        })
    }
}

/// The plane must not be flying any other flight in the given window.
/// `exclude` is the flight being edited, whose current schedule doesn't count.
pub fn check_plane_in_flight<C: Catalog>(
    catalog: &C,
    departing_at: NaiveDateTime,
    arriving_at: NaiveDateTime,
    plane: &PlaneId,
    exclude: Option<&FlightId>,
) -> Result<(), ValidationError> {
    match catalog
        .flights_with_plane(plane)
        .filter(|flight| Some(&flight.id) != exclude)
        .find(|flight| flight.overlaps(departing_at, arriving_at))
    {
        Some(conflict) => Err(ValidationError::PlaneBusy {
            plane: plane.clone(),
            conflict: conflict.id.clone(),
        }),
        None => Ok(()),
    }
}

/// Full check of a new flight: completeness, unique id, duration, then plane availability
pub fn check_flight<C: Catalog>(
    catalog: &C,
    draft: &FlightDraft,
    regulation: RegulationId,
) -> Result<(), ValidationError> {
    if draft.id.is_empty() || draft.name.trim().is_empty() {
        return Err(ValidationError::IncompleteFlight);
    }
    if catalog.flight(&draft.id).is_some() {
        return Err(ValidationError::DuplicateFlightId(draft.id.clone()));
    }

    check_time_flight(catalog, draft.departing_at, draft.arriving_at, regulation)?;
    check_plane_in_flight(catalog, draft.departing_at, draft.arriving_at, &draft.plane, None)
}

/// The stop must last within `[min, max]` of the window regulations and happen strictly
/// while the flight is underway
pub fn check_time_stop<C: Catalog>(
    catalog: &C,
    begin: NaiveDateTime,
    finish: NaiveDateTime,
    flight: &Flight,
    window: [RegulationId; 2],
) -> Result<(), ValidationError> {
    let [min_id, max_id] = window;
    let (Some(min), Some(max)) = (catalog.regulation(min_id), catalog.regulation(max_id)) else {
        return Err(ValidationError::MissingStopRegulation);
    };
    let (minimum, maximum): (Duration, Duration) = (min.duration_value()?, max.duration_value()?);

    let duration = finish - begin;
    if duration < minimum || duration > maximum {
        return Err(ValidationError::StopDurationOutOfRange {
            minimum: minimum.num_minutes(),
            maximum: maximum.num_minutes(),
            actual: duration.num_minutes(),
        });
    }

    if begin > flight.departing_at && finish < flight.arriving_at {
        Ok(())
    } else {
        Err(ValidationError::StopOutsideFlight)
    }
}

/// The stop airport must not be a route endpoint nor already a stop of the flight.
/// `exclude` is the airport of the stop being edited. Returns the resolved airport.
pub fn check_airport_in_medium<C: Catalog>(
    catalog: &C,
    airline_name: &str,
    stop_airport_name: &str,
    flight: &FlightId,
    exclude: Option<AirportId>,
) -> Result<AirportId, ValidationError> {
    let airline = catalog
        .airline_by_name(airline_name)
        .ok_or_else(|| ValidationError::UnknownAirline(airline_name.to_string()))?;
    let airport = catalog
        .airport_by_name(stop_airport_name)
        .ok_or_else(|| ValidationError::UnknownAirport(stop_airport_name.to_string()))?;

    if airline.serves(airport.id) {
        return Err(ValidationError::StopOnRoute(airport.name.clone()));
    }

    match catalog.stop_station(flight, airport.id) {
        Some(_) if Some(airport.id) != exclude => {
            Err(ValidationError::DuplicateStop(airport.name.clone()))
        }
        _ => Ok(airport.id),
    }
}

/// Full check of a new stop station: completeness, stop window, then stop airport
pub fn check_stop_station<C: Catalog>(
    catalog: &C,
    stop: &StopDraft,
    airline_name: &str,
    flight: &Flight,
    window: [RegulationId; 2],
) -> Result<AirportId, ValidationError> {
    if stop.name.trim().is_empty() {
        return Err(ValidationError::IncompleteStop);
    }

    check_time_stop(catalog, stop.stop_time_begin, stop.stop_time_finish, flight, window)?;
    check_airport_in_medium(catalog, airline_name, &stop.airport_name, &flight.id, None)
}

#[cfg(test)]
mod test {
    use schema::AirlineId;

    use super::*;
    use crate::store::test::{at, seeded};
    use crate::MemoryStore;

    const DURATION: RegulationId = RegulationId(5);
    const WINDOW: [RegulationId; 2] = [RegulationId(6), RegulationId(7)];

    fn draft(id: &str, plane: &str, departing_at: NaiveDateTime, arriving_at: NaiveDateTime) -> FlightDraft {
        FlightDraft {
            id: FlightId::from_str(id),
            name: format!("Flight {id}"),
            departing_at,
            arriving_at,
            plane: PlaneId::from_str(plane),
            airline_name: "Hà Nội - Hồ Chí Minh".to_string(),
        }
    }

    fn flight(departing_at: NaiveDateTime, arriving_at: NaiveDateTime) -> Flight {
        Flight {
            id: FlightId::from_str("CB7"),
            name: "Flight CB7".to_string(),
            departing_at,
            arriving_at,
            plane: PlaneId::from_str("MB1"),
            airline: AirlineId::from_str("1"),
            regulations: vec![DURATION],
        }
    }

    fn stop(airport: &str, begin: NaiveDateTime, finish: NaiveDateTime) -> StopDraft {
        StopDraft {
            name: "Tram dung".to_string(),
            stop_time_begin: begin,
            stop_time_finish: finish,
            description: String::new(),
            airport_name: airport.to_string(),
        }
    }

    #[test]
    fn test_time_flight() {
        let store = seeded();

        assert_eq!(check_time_flight(&store, at(2, 8, 0), at(2, 9, 0), DURATION), Ok(()));
        assert_eq!(
            check_time_flight(&store, at(2, 8, 0), at(2, 8, 30), DURATION),
            Err(ValidationError::FlightTooShort {
                minimum: 30,
                actual: 30
            })
        );
        assert_eq!(
            check_time_flight(&store, at(2, 8, 0), at(2, 9, 0), RegulationId(99)),
            Err(ValidationError::MissingFlightDurationRegulation(RegulationId(99)))
        );
    }

    #[test]
    fn test_plane_in_flight_checks_every_flight() {
        let store = seeded();
        let plane = PlaneId::from_str("MB2");

        // Overlaps CB2 though CB4, listed after it, is free
        assert_eq!(
            check_plane_in_flight(&store, at(1, 18, 30), at(1, 20, 0), &plane, None),
            Err(ValidationError::PlaneBusy {
                plane: plane.clone(),
                conflict: FlightId::from_str("CB2"),
            })
        );
        assert_eq!(
            check_plane_in_flight(&store, at(1, 19, 1), at(1, 21, 0), &plane, None),
            Ok(())
        );
        assert_eq!(
            check_plane_in_flight(
                &store,
                at(1, 18, 30),
                at(1, 20, 0),
                &plane,
                Some(&FlightId::from_str("CB2"))
            ),
            Ok(())
        );
    }

    #[test]
    fn test_flight_chain_order() {
        let store = seeded();

        assert_eq!(
            check_flight(&store, &draft("", "MB1", at(2, 8, 0), at(2, 9, 0)), DURATION),
            Err(ValidationError::IncompleteFlight)
        );
        // Duplicate id wins over the too-short duration
        assert_eq!(
            check_flight(&store, &draft(" CB1 ", "MB1", at(2, 8, 0), at(2, 8, 10)), DURATION),
            Err(ValidationError::DuplicateFlightId(FlightId::from_str("CB1")))
        );
        assert!(matches!(
            check_flight(&store, &draft("CB7", "MB1", at(1, 13, 30), at(1, 13, 45)), DURATION),
            Err(ValidationError::FlightTooShort { .. })
        ));
        assert!(matches!(
            check_flight(&store, &draft("CB7", "MB1", at(1, 13, 30), at(1, 15, 0)), DURATION),
            Err(ValidationError::PlaneBusy { .. })
        ));
        assert_eq!(
            check_flight(&store, &draft("CB7", "MB1", at(2, 8, 0), at(2, 9, 0)), DURATION),
            Ok(())
        );
    }

    #[test]
    fn test_time_stop() {
        let store = seeded();
        let flight = flight(at(2, 8, 0), at(2, 10, 0));

        assert_eq!(check_time_stop(&store, at(2, 8, 30), at(2, 8, 50), &flight, WINDOW), Ok(()));
        assert_eq!(check_time_stop(&store, at(2, 8, 30), at(2, 9, 0), &flight, WINDOW), Ok(()));
        assert_eq!(
            check_time_stop(&store, at(2, 8, 30), at(2, 8, 45), &flight, WINDOW),
            Err(ValidationError::StopDurationOutOfRange {
                minimum: 20,
                maximum: 30,
                actual: 15
            })
        );
        assert_eq!(
            check_time_stop(&store, at(2, 8, 0), at(2, 8, 25), &flight, WINDOW),
            Err(ValidationError::StopOutsideFlight)
        );
        assert_eq!(
            check_time_stop(
                &store,
                at(2, 8, 30),
                at(2, 8, 50),
                &flight,
                [RegulationId(6), RegulationId(42)]
            ),
            Err(ValidationError::MissingStopRegulation)
        );
    }

    #[test]
    fn test_airport_in_medium() {
        let store = seeded();
        let cb1 = FlightId::from_str("CB1");
        let route = "Hà Nội - Hồ Chí Minh";

        assert_eq!(
            check_airport_in_medium(&store, route, "Sân bay Nội Bài", &cb1, None),
            Err(ValidationError::StopOnRoute("Sân bay Nội Bài".to_string()))
        );
        assert_eq!(
            check_airport_in_medium(&store, route, "Sân bay Phù Cát", &cb1, None),
            Err(ValidationError::DuplicateStop("Sân bay Phù Cát".to_string()))
        );
        assert_eq!(
            check_airport_in_medium(&store, route, "Sân bay Phù Cát", &cb1, Some(AirportId(3))),
            Ok(AirportId(3))
        );
        assert_eq!(
            check_airport_in_medium(&store, route, "Sân bay Narita", &cb1, None),
            Ok(AirportId(4))
        );
        assert_eq!(
            check_airport_in_medium(&store, "Nowhere", "Sân bay Narita", &cb1, None),
            Err(ValidationError::UnknownAirline("Nowhere".to_string()))
        );
    }

    #[test]
    fn test_stop_station_chain_order() {
        let store: MemoryStore = seeded();
        let flight = flight(at(2, 8, 0), at(2, 10, 0));
        let route = "Hà Nội - Hồ Chí Minh";

        let mut incomplete = stop("Sân bay Narita", at(2, 8, 30), at(2, 8, 50));
        incomplete.name = " ".to_string();
        assert_eq!(
            check_stop_station(&store, &incomplete, route, &flight, WINDOW),
            Err(ValidationError::IncompleteStop)
        );
        // Time window is checked before the airport
        assert_eq!(
            check_stop_station(
                &store,
                &stop("Sân bay Nội Bài", at(2, 8, 30), at(2, 8, 35)),
                route,
                &flight,
                WINDOW
            ),
            Err(ValidationError::StopDurationOutOfRange {
                minimum: 20,
                maximum: 30,
                actual: 5
            })
        );
        assert_eq!(
            check_stop_station(
                &store,
                &stop("Sân bay Narita", at(2, 8, 30), at(2, 8, 50)),
                route,
                &flight,
                WINDOW
            ),
            Ok(AirportId(4))
        );
    }
}
