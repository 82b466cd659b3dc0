use crate::{Airline, Airport, AirportId, Flight, FlightId, PlaneId, Regulation, RegulationId, StopStation};

/// Read access to the flight catalog, as needed by the validation chain
pub trait Catalog {
    /// Flights assigned to a particular plane
    type PlaneFlights<'a>: Iterator<Item = &'a Flight>
    where
        Self: 'a;

    /// Returns the flight with the given id, if any
    fn flight(&self, id: &FlightId) -> Option<&Flight>;

    /// Returns every flight flown by the given plane
    fn flights_with_plane<'a>(&'a self, plane: &'a PlaneId) -> Self::PlaneFlights<'a>;

    fn regulation(&self, id: RegulationId) -> Option<&Regulation>;

    /// Looks up an airline by its exact display name, as submitted by the flight form
    fn airline_by_name(&self, name: &str) -> Option<&Airline>;

    /// Looks up an airport by its exact display name, as submitted by the stop form
    fn airport_by_name(&self, name: &str) -> Option<&Airport>;

    /// Returns the stop a flight makes at an airport, if any
    fn stop_station(&self, flight: &FlightId, airport: AirportId) -> Option<&StopStation>;
}
