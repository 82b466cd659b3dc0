use std::collections::HashSet;

use schema::{
    AirportId, Catalog, Flight, FlightDetails, FlightDraft, FlightId, StopDraft, StopEdit,
    StopStation,
};

use crate::config::FlightRules;
use crate::store::StoreError;
use crate::validation::{
    check_airport_in_medium, check_flight, check_plane_in_flight, check_stop_station,
    check_time_flight, check_time_stop, ValidationError,
};
use crate::{MemoryStore, ServerError};

/// Every flight in id order, for the management listing
pub fn list_flights(store: &MemoryStore) -> Vec<Flight> {
    store.flights().cloned().collect()
}

pub fn flight_details(store: &MemoryStore, id: &FlightId) -> Result<FlightDetails, ServerError> {
    let flight = store
        .flight(id)
        .cloned()
        .ok_or_else(|| StoreError::UnknownFlight(id.clone()))?;

    Ok(FlightDetails {
        stops: store.stops_of(id).cloned().collect(),
        available_seats: store.available_seats(id),
        flight,
    })
}

fn stop_station(flight: &Flight, airport: AirportId, draft: StopDraft, rules: &FlightRules) -> StopStation {
    StopStation {
        flight: flight.id.clone(),
        airport,
        name: draft.name.trim().to_string(),
        stop_time_begin: draft.stop_time_begin,
        stop_time_finish: draft.stop_time_finish,
        description: draft.description,
        regulations: rules.stop_window.to_vec(),
    }
}

/// Airports must be unique among the stops of one flight
fn ensure_unique_stops(store: &MemoryStore, stops: &[StopStation]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for stop in stops {
        if !seen.insert(stop.airport) {
            let name = store
                .airport(stop.airport)
                .map(|airport| airport.name.clone())
                .unwrap_or_else(|| stop.airport.to_string());
            return Err(ValidationError::DuplicateStop(name));
        }
    }
    Ok(())
}

/// Validates a new flight with its stops and stores them together.
///
/// Nothing is written unless the flight and every stop pass the validation chain.
pub fn create_flight(
    store: &mut MemoryStore,
    rules: &FlightRules,
    draft: FlightDraft,
    stops: Vec<StopDraft>,
) -> Result<FlightDetails, ServerError> {
    check_flight(&*store, &draft, rules.flight_duration)?;
    if store.airplane(&draft.plane).is_none() {
        return Err(StoreError::UnknownPlane(draft.plane).into());
    }
    let airline = store
        .airline_by_name(&draft.airline_name)
        .ok_or_else(|| ValidationError::UnknownAirline(draft.airline_name.clone()))?;

    let flight = Flight {
        id: draft.id,
        name: draft.name.trim().to_string(),
        departing_at: draft.departing_at,
        arriving_at: draft.arriving_at,
        plane: draft.plane,
        airline: airline.id.clone(),
        regulations: vec![rules.flight_duration],
    };

    let stops = stops
        .into_iter()
        .map(|stop| {
            let airport =
                check_stop_station(&*store, &stop, &draft.airline_name, &flight, rules.stop_window)?;
            Ok(stop_station(&flight, airport, stop, rules))
        })
        .collect::<Result<Vec<_>, ValidationError>>()?;
    ensure_unique_stops(store, &stops)?;

    let id = flight.id.clone();
    store.insert_flight(flight)?;
    for stop in stops {
        store.insert_stop(stop);
    }
    log::info!("created flight {id}");

    flight_details(store, &id)
}

/// Validates and applies an edit of a flight and its stops as one change.
///
/// Only the parts that changed are checked again: times rerun the duration check, times or
/// plane rerun plane availability, and a stop is checked again when its own fields or the
/// flight fields it depends on changed. Stops not named in `stop_edits` are kept.
pub fn edit_flight(
    store: &mut MemoryStore,
    rules: &FlightRules,
    id: &FlightId,
    draft: FlightDraft,
    stop_edits: Vec<StopEdit>,
    new_stops: Vec<StopDraft>,
) -> Result<FlightDetails, ServerError> {
    let current = store
        .flight(id)
        .cloned()
        .ok_or_else(|| StoreError::UnknownFlight(id.clone()))?;

    if draft.id.is_empty() || draft.name.trim().is_empty() {
        return Err(ValidationError::IncompleteFlight.into());
    }

    let times_changed =
        draft.departing_at != current.departing_at || draft.arriving_at != current.arriving_at;
    if times_changed {
        check_time_flight(&*store, draft.departing_at, draft.arriving_at, rules.flight_duration)?;
    }
    if times_changed || draft.plane != current.plane {
        if store.airplane(&draft.plane).is_none() {
            return Err(StoreError::UnknownPlane(draft.plane).into());
        }
        check_plane_in_flight(&*store, draft.departing_at, draft.arriving_at, &draft.plane, Some(id))?;
    }
    if &draft.id != id && store.flight(&draft.id).is_some() {
        return Err(ValidationError::DuplicateFlightId(draft.id).into());
    }

    let airline = store
        .airline_by_name(&draft.airline_name)
        .ok_or_else(|| ValidationError::UnknownAirline(draft.airline_name.clone()))?;
    let airline_changed = airline.id != current.airline;

    let updated = Flight {
        id: draft.id.clone(),
        name: draft.name.trim().to_string(),
        departing_at: draft.departing_at,
        arriving_at: draft.arriving_at,
        plane: draft.plane.clone(),
        airline: airline.id.clone(),
        regulations: current.regulations.clone(),
    };

    let mut edits = std::collections::HashMap::new();
    for edit in stop_edits {
        let airport = edit.airport();
        if store.stop_station(id, airport).is_none() {
            return Err(StoreError::UnknownStop(id.clone(), airport).into());
        }
        if edits.insert(airport, edit).is_some() {
            return Err(ServerError::MalformedRequest("more than one edit for the same stop"));
        }
    }

    let mut stops = vec![];
    for existing in store.stops_of(id) {
        match edits.remove(&existing.airport) {
            Some(StopEdit::Delete(_)) => {}

            Some(StopEdit::Update(_, stop)) => {
                if stop.name.trim().is_empty() {
                    return Err(ValidationError::IncompleteStop.into());
                }
                if times_changed
                    || stop.stop_time_begin != existing.stop_time_begin
                    || stop.stop_time_finish != existing.stop_time_finish
                {
                    check_time_stop(
                        &*store,
                        stop.stop_time_begin,
                        stop.stop_time_finish,
                        &updated,
                        rules.stop_window,
                    )?;
                }
                let current_name = store
                    .airport(existing.airport)
                    .map(|airport| airport.name.as_str())
                    .unwrap_or_default();
                let airport = if airline_changed || stop.airport_name.trim() != current_name {
                    check_airport_in_medium(
                        &*store,
                        &draft.airline_name,
                        &stop.airport_name,
                        id,
                        Some(existing.airport),
                    )?
                } else {
                    existing.airport
                };

                stops.push(StopStation {
                    regulations: existing.regulations.clone(),
                    ..stop_station(&updated, airport, stop, rules)
                });
            }

            // Untouched stops still have to fit the new schedule and route
            None => {
                if times_changed {
                    check_time_stop(
                        &*store,
                        existing.stop_time_begin,
                        existing.stop_time_finish,
                        &updated,
                        rules.stop_window,
                    )?;
                }
                if airline_changed {
                    let name = store
                        .airport(existing.airport)
                        .map(|airport| airport.name.clone())
                        .unwrap_or_default();
                    check_airport_in_medium(
                        &*store,
                        &draft.airline_name,
                        &name,
                        id,
                        Some(existing.airport),
                    )?;
                }

                stops.push(StopStation {
                    flight: updated.id.clone(),
                    ..existing.clone()
                });
            }
        }
    }

    for stop in new_stops {
        let airport =
            check_stop_station(&*store, &stop, &draft.airline_name, &updated, rules.stop_window)?;
        stops.push(stop_station(&updated, airport, stop, rules));
    }
    ensure_unique_stops(store, &stops)?;

    let new_id = updated.id.clone();
    store.replace_flight(id, updated, stops)?;
    log::info!("updated flight {id} (now {new_id})");

    flight_details(store, &new_id)
}

pub fn delete_flight(store: &mut MemoryStore, id: &FlightId) -> Result<Flight, ServerError> {
    let flight = store.remove_flight(id)?;
    log::info!("deleted flight {id}");
    Ok(flight)
}
