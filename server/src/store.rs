use std::collections::{btree_map, BTreeMap, HashMap};
use std::path::Path;

use chrono::NaiveDateTime;
use schema::{
    Airline, AirlineId, Airplane, Airport, AirportId, Catalog, Flight, FlightId, ParseError,
    PlaneId, Profile, ProfileId, Regulation, RegulationId, Seat, SeatId, StopStation, Ticket,
    TicketId, User, UserId, UserSeed,
};

use crate::auth::digest_password;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("flight {0} does not exist")]
    UnknownFlight(FlightId),
    #[error("flight {0} has no stop at airport {1}")]
    UnknownStop(FlightId, AirportId),
    #[error("plane {0} does not exist")]
    UnknownPlane(PlaneId),
    #[error("airline {0} does not exist")]
    UnknownAirline(AirlineId),
    #[error("airport {0} does not exist")]
    UnknownAirport(AirportId),
    #[error("seed data: {0}")]
    Parse(#[from] ParseError),
}

/// In-process catalog, booking and account data.
///
/// Every collection is ordered by key so listings are stable. The store itself does no
/// validation beyond referential checks, callers run the validation chain before mutating.
#[derive(Default, Debug)]
pub struct MemoryStore {
    airports: BTreeMap<AirportId, Airport>,
    airplanes: BTreeMap<PlaneId, Airplane>,
    airlines: BTreeMap<AirlineId, Airline>,
    flights: BTreeMap<FlightId, Flight>,
    stops: BTreeMap<(FlightId, AirportId), StopStation>,
    regulations: BTreeMap<RegulationId, Regulation>,
    seats: BTreeMap<SeatId, Seat>,
    profiles: BTreeMap<ProfileId, Profile>,
    tickets: BTreeMap<TicketId, Ticket>,
    users: BTreeMap<UserId, User>,
    /// Session token to logged-in user
    sessions: HashMap<String, UserId>,
}

/// Returns one past the largest id in use
fn next_key<K: Copy, V>(map: &BTreeMap<K, V>, id: impl Fn(K) -> u32) -> u32 {
    map.keys().next_back().map(|k| id(*k) + 1).unwrap_or(1)
}

impl MemoryStore {
    /// Loads the seed catalog from the CSV files in `dir`
    pub fn from_csv_dir(dir: impl AsRef<Path>, now: NaiveDateTime) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        let path = |file: &str| dir.join(file).to_string_lossy().into_owned();
        let mut store = Self::default();

        for airport in Airport::from_csv(&path("airports.csv"))? {
            store.insert_airport(airport);
        }
        for airplane in Airplane::from_csv(&path("airplanes.csv"))? {
            store.insert_airplane(airplane);
        }
        for airline in Airline::from_csv(&path("airlines.csv"))? {
            for airport in [airline.from_airport, airline.to_airport] {
                if !store.airports.contains_key(&airport) {
                    return Err(StoreError::UnknownAirport(airport));
                }
            }
            store.insert_airline(airline);
        }
        for regulation in Regulation::from_csv(&path("regulations.csv"))? {
            store.regulations.insert(regulation.id, regulation);
        }
        for flight in Flight::from_csv(&path("flights.csv"))? {
            if !store.airlines.contains_key(&flight.airline) {
                return Err(StoreError::UnknownAirline(flight.airline));
            }
            store.insert_flight(flight)?;
        }
        for stop in StopStation::from_csv(&path("stops.csv"))? {
            if !store.flights.contains_key(&stop.flight) {
                return Err(StoreError::UnknownFlight(stop.flight));
            }
            if !store.airports.contains_key(&stop.airport) {
                return Err(StoreError::UnknownAirport(stop.airport));
            }
            store.insert_stop(stop);
        }
        for seed in UserSeed::from_csv(&path("users.csv"))? {
            store.insert_user(User {
                id: UserId::default(),
                name: seed.name,
                username: seed.username,
                password_digest: digest_password(&seed.password),
                active: true,
                joined_date: now,
                role: seed.role,
            });
        }

        log::info!(
            "loaded {} airports, {} airlines, {} flights, {} regulations from {}",
            store.airports.len(),
            store.airlines.len(),
            store.flights.len(),
            store.regulations.len(),
            dir.display()
        );

        Ok(store)
    }

    pub fn airports(&self) -> impl Iterator<Item = &Airport> {
        self.airports.values()
    }

    pub fn airport(&self, id: AirportId) -> Option<&Airport> {
        self.airports.get(&id)
    }

    pub fn airlines(&self) -> impl Iterator<Item = &Airline> {
        self.airlines.values()
    }

    pub fn airline(&self, id: &AirlineId) -> Option<&Airline> {
        self.airlines.get(id)
    }

    pub fn airplanes(&self) -> impl Iterator<Item = &Airplane> {
        self.airplanes.values()
    }

    pub fn airplane(&self, id: &PlaneId) -> Option<&Airplane> {
        self.airplanes.get(id)
    }

    pub fn flights(&self) -> impl Iterator<Item = &Flight> {
        self.flights.values()
    }

    /// Stops of a flight ordered by airport id
    pub fn stops_of<'a>(&'a self, flight: &FlightId) -> impl Iterator<Item = &'a StopStation> {
        self.stops
            .range((flight.clone(), AirportId(0))..=(flight.clone(), AirportId(u32::MAX)))
            .map(|(_, stop)| stop)
    }

    pub fn seats_of<'a>(&'a self, flight: &'a FlightId) -> impl Iterator<Item = &'a Seat> {
        self.seats.values().filter(move |seat| &seat.flight == flight)
    }

    pub fn seat(&self, id: SeatId) -> Option<&Seat> {
        self.seats.get(&id)
    }

    pub fn available_seats(&self, flight: &FlightId) -> u32 {
        self.seats_of(flight).filter(|seat| !seat.booked).count() as u32
    }

    pub fn regulations(&self) -> impl Iterator<Item = &Regulation> {
        self.regulations.values()
    }

    pub fn regulation_by_name(&self, name: &str) -> Option<&Regulation> {
        self.regulations.values().find(|r| r.name == name)
    }

    pub fn tickets(&self) -> impl Iterator<Item = &Ticket> {
        self.tickets.values()
    }

    pub fn profile(&self, id: ProfileId) -> Option<&Profile> {
        self.profiles.get(&id)
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        self.users.values().find(|u| u.username == username)
    }

    fn insert_airport(&mut self, airport: Airport) {
        self.airports.insert(airport.id, airport);
    }

    fn insert_airline(&mut self, airline: Airline) {
        self.airlines.insert(airline.id.clone(), airline);
    }

    fn insert_airplane(&mut self, airplane: Airplane) {
        self.airplanes.insert(airplane.id.clone(), airplane);
    }

    /// Stores the flight and generates one seat per seat of its plane
    pub(crate) fn insert_flight(&mut self, flight: Flight) -> Result<(), StoreError> {
        let total_seat = self
            .airplanes
            .get(&flight.plane)
            .map(|plane| plane.total_seat)
            .ok_or_else(|| StoreError::UnknownPlane(flight.plane.clone()))?;

        let id = flight.id.clone();
        self.flights.insert(id.clone(), flight);
        self.resize_seats(&id, total_seat);

        Ok(())
    }

    /// Replaces a flight and its stops, moving seats and tickets when the id changes
    pub(crate) fn replace_flight(
        &mut self,
        old_id: &FlightId,
        flight: Flight,
        stops: Vec<StopStation>,
    ) -> Result<(), StoreError> {
        let total_seat = self
            .airplanes
            .get(&flight.plane)
            .map(|plane| plane.total_seat)
            .ok_or_else(|| StoreError::UnknownPlane(flight.plane.clone()))?;
        if self.flights.remove(old_id).is_none() {
            return Err(StoreError::UnknownFlight(old_id.clone()));
        }
        self.remove_stops(old_id);

        let new_id = flight.id.clone();
        if &new_id != old_id {
            for seat in self.seats.values_mut().filter(|s| &s.flight == old_id) {
                seat.flight = new_id.clone();
            }
            for ticket in self.tickets.values_mut().filter(|t| &t.flight == old_id) {
                ticket.flight = new_id.clone();
            }
        }

        self.flights.insert(new_id.clone(), flight);
        for stop in stops {
            self.insert_stop(stop);
        }
        self.resize_seats(&new_id, total_seat);

        Ok(())
    }

    /// Removes a flight along with its stops, seats and tickets
    pub(crate) fn remove_flight(&mut self, id: &FlightId) -> Result<Flight, StoreError> {
        let flight = self
            .flights
            .remove(id)
            .ok_or_else(|| StoreError::UnknownFlight(id.clone()))?;

        self.remove_stops(id);
        self.seats.retain(|_, seat| &seat.flight != id);
        self.tickets.retain(|_, ticket| &ticket.flight != id);

        Ok(flight)
    }

    pub(crate) fn insert_stop(&mut self, stop: StopStation) {
        self.stops
            .insert((stop.flight.clone(), stop.airport), stop);
    }

    fn remove_stops(&mut self, flight: &FlightId) {
        self.stops.retain(|(f, _), _| f != flight);
    }

    /// Adds seats up to the plane capacity, or drops surplus seats that were never booked
    fn resize_seats(&mut self, flight: &FlightId, total_seat: u32) {
        let current = self.seats_of(flight).count() as u32;

        if current < total_seat {
            let mut next = next_key(&self.seats, |k| k.0);
            for n in current + 1..=total_seat {
                self.seats.insert(
                    SeatId(next),
                    Seat {
                        id: SeatId(next),
                        name: format!("Seat {n}"),
                        flight: flight.clone(),
                        booked: false,
                    },
                );
                next += 1;
            }
        } else if current > total_seat {
            let surplus = self
                .seats_of(flight)
                .filter(|seat| !seat.booked)
                .map(|seat| seat.id)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .take((current - total_seat) as usize)
                .collect::<Vec<_>>();
            for id in surplus {
                self.seats.remove(&id);
            }
        }
    }

    /// First free seats of a flight in seat order
    pub(crate) fn free_seats(&self, flight: &FlightId, count: usize) -> Vec<SeatId> {
        self.seats_of(flight)
            .filter(|seat| !seat.booked)
            .map(|seat| seat.id)
            .take(count)
            .collect()
    }

    pub(crate) fn book_seat(&mut self, id: SeatId) {
        if let Some(seat) = self.seats.get_mut(&id) {
            seat.booked = true;
        }
    }

    pub(crate) fn insert_profile(&mut self, mut profile: Profile) -> ProfileId {
        profile.id = ProfileId(next_key(&self.profiles, |k| k.0));
        let id = profile.id;
        self.profiles.insert(id, profile);
        id
    }

    pub(crate) fn insert_ticket(&mut self, mut ticket: Ticket) -> Ticket {
        ticket.id = TicketId(next_key(&self.tickets, |k| k.0));
        self.tickets.insert(ticket.id, ticket.clone());
        ticket
    }

    pub(crate) fn insert_regulation(&mut self, mut regulation: Regulation) -> Regulation {
        regulation.id = RegulationId(next_key(&self.regulations, |k| k.0));
        self.regulations.insert(regulation.id, regulation.clone());
        regulation
    }

    pub(crate) fn regulation_mut(&mut self, id: RegulationId) -> Option<&mut Regulation> {
        self.regulations.get_mut(&id)
    }

    pub(crate) fn insert_user(&mut self, mut user: User) -> UserId {
        user.id = UserId(next_key(&self.users, |k| k.0));
        let id = user.id;
        self.users.insert(id, user);
        id
    }

    pub(crate) fn open_session(&mut self, token: String, user: UserId) {
        self.sessions.insert(token, user);
    }

    pub(crate) fn close_session(&mut self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    pub fn session_user(&self, token: &str) -> Option<&User> {
        self.sessions.get(token).and_then(|id| self.user(*id))
    }
}

/// Iterator over the flights flown by one plane
pub struct PlaneFlights<'a> {
    flights: btree_map::Values<'a, FlightId, Flight>,
    plane: &'a PlaneId,
}

impl<'a> Iterator for PlaneFlights<'a> {
    type Item = &'a Flight;

    fn next(&mut self) -> Option<Self::Item> {
        let plane = self.plane;
        self.flights.by_ref().find(|flight| &flight.plane == plane)
    }
}

impl Catalog for MemoryStore {
    type PlaneFlights<'a> = PlaneFlights<'a>;

    fn flight(&self, id: &FlightId) -> Option<&Flight> {
        self.flights.get(id)
    }

    fn flights_with_plane<'a>(&'a self, plane: &'a PlaneId) -> PlaneFlights<'a> {
        PlaneFlights {
            flights: self.flights.values(),
            plane,
        }
    }

    fn regulation(&self, id: RegulationId) -> Option<&Regulation> {
        self.regulations.get(&id)
    }

    fn airline_by_name(&self, name: &str) -> Option<&Airline> {
        self.airlines.values().find(|a| a.name == name.trim())
    }

    fn airport_by_name(&self, name: &str) -> Option<&Airport> {
        self.airports.values().find(|a| a.name == name.trim())
    }

    fn stop_station(&self, flight: &FlightId, airport: AirportId) -> Option<&StopStation> {
        self.stops.get(&(flight.clone(), airport))
    }
}

#[cfg(test)]
pub(crate) mod test {
    use chrono::NaiveDate;

    use super::*;

    pub(crate) const DATA_DIR: &str = "../test_data";

    pub(crate) fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 12, day)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .expect("date")
    }

    pub(crate) fn seeded() -> MemoryStore {
        MemoryStore::from_csv_dir(DATA_DIR, at(1, 0, 0)).expect("seed data")
    }

    #[test]
    fn test_seed() {
        let store = seeded();

        assert_eq!(store.airports().count(), 5);
        assert_eq!(store.flights().count(), 4);
        assert_eq!(store.available_seats(&FlightId::from_str("CB1")), 60);
        assert_eq!(store.stops_of(&FlightId::from_str("CB1")).count(), 1);
        assert_eq!(store.stops_of(&FlightId::from_str("CB2")).count(), 0);
        assert!(store.user_by_username("tan").is_some());
    }

    #[test]
    fn test_flights_with_plane() {
        let store = seeded();
        let plane = PlaneId::from_str("MB2");

        let ids = store
            .flights_with_plane(&plane)
            .map(|f| f.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["CB2", "CB4"]);
    }

    #[test]
    fn test_remove_flight_cascades() -> Result<(), StoreError> {
        let mut store = seeded();
        let id = FlightId::from_str("CB1");

        store.remove_flight(&id)?;

        assert!(store.flight(&id).is_none());
        assert_eq!(store.stops_of(&id).count(), 0);
        assert_eq!(store.seats_of(&id).count(), 0);
        assert!(matches!(store.remove_flight(&id), Err(StoreError::UnknownFlight(_))));

        Ok(())
    }

    #[test]
    fn test_replace_flight_renames_and_resizes() -> Result<(), StoreError> {
        let mut store = seeded();
        let old = FlightId::from_str("CB1");
        let seat = store.free_seats(&old, 1)[0];
        store.book_seat(seat);

        let mut flight = store.flight(&old).cloned().expect("flight");
        flight.id = FlightId::from_str("CB9");
        flight.plane = PlaneId::from_str("MB2");
        store.replace_flight(&old, flight, vec![])?;

        let new = FlightId::from_str("CB9");
        assert!(store.flight(&old).is_none());
        assert_eq!(store.seats_of(&new).count(), 70);
        assert_eq!(store.available_seats(&new), 69);
        assert_eq!(store.seat(seat).map(|s| s.flight.clone()), Some(new));

        Ok(())
    }

    #[test]
    fn test_missing_seed_dir() {
        assert!(matches!(
            MemoryStore::from_csv_dir("./does-not-exist", at(1, 0, 0)),
            Err(StoreError::Parse(ParseError::Io(_)))
        ));
    }
}
