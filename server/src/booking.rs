use chrono::NaiveDateTime;
use schema::{
    AirportId, BookedTicket, Catalog, FlightId, FlightSummary, Passenger, Profile, ProfileId,
    Receipt, Ticket, TicketId, User, UserRole,
};

use crate::store::StoreError;
use crate::{MemoryStore, ServerError};

/// Customers must book at least this long before departure
pub const BOOK_TIME_REGULATION: &str = "book_time";
/// Employees must sell at least this long before departure
pub const SALE_TIME_REGULATION: &str = "sale_time";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BookingError {
    #[error("at least one passenger is required")]
    NoPassengers,
    #[error("passenger {0} is missing name, date of birth, email or phone")]
    IncompletePassenger(usize),
    #[error("no fare is configured for rank {0}")]
    UnknownRank(u8),
    #[error("flight {0} has already departed")]
    Departed(FlightId),
    #[error("tickets for flight {flight} must be booked {minutes} minutes before departure")]
    BookingClosed { flight: FlightId, minutes: i64 },
    #[error("only {available} seats are left on flight {flight}")]
    SoldOut { flight: FlightId, available: u32 },
    #[error("{0}")]
    InvalidRegulation(String),
}

/// Flights on airlines whose name contains the keyword, optionally limited to a route
pub fn search_flights(
    store: &MemoryStore,
    keyword: &str,
    from_airport: Option<AirportId>,
    to_airport: Option<AirportId>,
) -> Vec<FlightSummary> {
    let keyword = keyword.trim().to_lowercase();
    let mut flights = store
        .flights()
        .filter_map(|flight| {
            let airline = store.airline(&flight.airline)?;
            let matches = airline.name.to_lowercase().contains(&keyword)
                && from_airport.map_or(true, |id| airline.from_airport == id)
                && to_airport.map_or(true, |id| airline.to_airport == id);

            matches.then(|| FlightSummary {
                flight: flight.clone(),
                airline_name: airline.name.clone(),
                available_seats: store.available_seats(&flight.id),
            })
        })
        .collect::<Vec<_>>();

    flights.sort_by_key(|summary| summary.flight.departing_at);
    flights
}

fn profile_of(index: usize, passenger: Passenger) -> Result<Profile, BookingError> {
    let dob = Profile::parse_dob(&passenger.dob);
    let (Some(dob), false, false, false) = (
        dob,
        passenger.name.trim().is_empty(),
        passenger.email.trim().is_empty(),
        passenger.phone.trim().is_empty(),
    ) else {
        return Err(BookingError::IncompletePassenger(index));
    };

    Ok(Profile {
        id: ProfileId::default(),
        document_id: passenger.document_id.trim().to_string(),
        name: passenger.name.trim().to_string(),
        gender: passenger.gender.trim().to_string(),
        dob,
        email: passenger.email.trim().to_string(),
        phone: passenger.phone.trim().to_string(),
        is_supervisor: false,
    })
}

/// Books one seat per passenger on a flight, all or nothing.
///
/// Customers are held to the `book_time` window, staff selling at the counter to the
/// `sale_time` window. The fare of each ticket is the regulation named after its rank.
pub fn book_tickets(
    store: &mut MemoryStore,
    user: &User,
    flight_id: &FlightId,
    rank: u8,
    passengers: Vec<Passenger>,
    now: NaiveDateTime,
) -> Result<Receipt, ServerError> {
    let flight = store
        .flight(flight_id)
        .cloned()
        .ok_or_else(|| StoreError::UnknownFlight(flight_id.clone()))?;

    if passengers.is_empty() {
        return Err(BookingError::NoPassengers.into());
    }
    if flight.departing_at <= now {
        return Err(BookingError::Departed(flight.id).into());
    }

    let window = match user.role {
        UserRole::User => BOOK_TIME_REGULATION,
        UserRole::Employee | UserRole::Admin => SALE_TIME_REGULATION,
    };
    if let Some(regulation) = store.regulation_by_name(window) {
        let lead = regulation
            .duration_value()
            .map_err(|e| BookingError::InvalidRegulation(e.to_string()))?;
        if flight.departing_at - now < lead {
            return Err(BookingError::BookingClosed {
                flight: flight.id,
                minutes: lead.num_minutes(),
            }
            .into());
        }
    }

    let price = store
        .regulation_by_name(&rank.to_string())
        .ok_or(BookingError::UnknownRank(rank))?
        .amount_value()
        .map_err(|e| BookingError::InvalidRegulation(e.to_string()))?;

    let profiles = passengers
        .into_iter()
        .enumerate()
        .map(|(i, passenger)| profile_of(i, passenger))
        .collect::<Result<Vec<_>, _>>()?;

    let seats = store.free_seats(&flight.id, profiles.len());
    if seats.len() < profiles.len() {
        return Err(BookingError::SoldOut {
            flight: flight.id,
            available: seats.len() as u32,
        }
        .into());
    }

    let place = store.airline(&flight.airline).map(|airline| airline.from_airport);
    let mut tickets = vec![];
    for (profile, seat) in profiles.into_iter().zip(seats) {
        let profile = store.insert_profile(profile);
        store.book_seat(seat);
        let ticket = store.insert_ticket(Ticket {
            id: TicketId::default(),
            rank,
            price,
            date: now,
            place,
            profile,
            flight: flight.id.clone(),
            seat,
            user: Some(user.id),
        });
        tickets.push(booked(store, ticket));
    }
    log::info!(
        "user {} booked {} tickets on flight {}",
        user.username,
        tickets.len(),
        flight.id
    );

    Ok(Receipt::new(tickets))
}

fn booked(store: &MemoryStore, ticket: Ticket) -> BookedTicket {
    let seat_name = store
        .seat(ticket.seat)
        .map(|seat| seat.name.clone())
        .unwrap_or_default();
    BookedTicket { ticket, seat_name }
}

/// Tickets booked by the user, or every ticket for admins
pub fn tickets_for(store: &MemoryStore, user: &User) -> Vec<BookedTicket> {
    store
        .tickets()
        .filter(|ticket| user.role == UserRole::Admin || ticket.user == Some(user.id))
        .cloned()
        .map(|ticket| booked(store, ticket))
        .collect()
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::store::test::{at, seeded};

    pub(crate) fn passenger(name: &str) -> Passenger {
        Passenger {
            document_id: "01231".to_string(),
            name: name.to_string(),
            gender: "nam".to_string(),
            dob: "2002-01-01".to_string(),
            email: "an1100@gmail.com".to_string(),
            phone: "0176448394".to_string(),
        }
    }

    fn user(store: &MemoryStore, username: &str) -> User {
        store.user_by_username(username).cloned().expect("user")
    }

    #[test]
    fn test_search_flights() {
        let store = seeded();

        let all = search_flights(&store, "", None, None);
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].flight.id.as_str(), "CB3");

        let binh_dinh = search_flights(&store, "bình định", None, None)
            .into_iter()
            .map(|s| s.flight.id.to_string())
            .collect::<Vec<_>>();
        assert_eq!(binh_dinh, vec!["CB3", "CB2", "CB4"]);

        let from_hanoi = search_flights(&store, "", Some(AirportId(1)), Some(AirportId(3)));
        assert_eq!(from_hanoi.len(), 1);
        assert_eq!(from_hanoi[0].airline_name, "Hà Nội - Bình Định");
    }

    #[test]
    fn test_customer_booking() -> Result<(), ServerError> {
        let mut store = seeded();
        let mai = user(&store, "mai");
        let cb1 = FlightId::from_str("CB1");

        let receipt = book_tickets(
            &mut store,
            &mai,
            &cb1,
            1,
            vec![passenger("An"), passenger("Binh")],
            at(1, 0, 30),
        )?;

        assert_eq!(receipt.total_quantity, 2);
        assert_eq!(receipt.total_amount, 600_000);
        assert_eq!(receipt.tickets[0].seat_name, "Seat 1");
        assert_eq!(receipt.tickets[1].seat_name, "Seat 2");
        assert_eq!(receipt.tickets[0].ticket.place, Some(AirportId(1)));
        assert_eq!(
            store.profile(receipt.tickets[1].ticket.profile).map(|p| p.name.as_str()),
            Some("Binh")
        );
        assert_eq!(store.available_seats(&cb1), 58);
        assert_eq!(tickets_for(&store, &mai).len(), 2);

        Ok(())
    }

    #[test]
    fn test_booking_windows() -> Result<(), ServerError> {
        let mut store = seeded();
        let mai = user(&store, "mai");
        let son = user(&store, "son");
        let cb1 = FlightId::from_str("CB1");

        // 11 hours before departure: too late for customers, fine at the counter
        let result = book_tickets(&mut store, &mai, &cb1, 2, vec![passenger("An")], at(1, 2, 0));
        assert!(matches!(
            result,
            Err(ServerError::Booking(BookingError::BookingClosed { minutes: 720, .. }))
        ));

        let receipt = book_tickets(&mut store, &son, &cb1, 2, vec![passenger("An")], at(1, 2, 0))?;
        assert_eq!(receipt.total_amount, 200_000);

        let result = book_tickets(&mut store, &son, &cb1, 2, vec![passenger("An")], at(1, 13, 0));
        assert!(matches!(
            result,
            Err(ServerError::Booking(BookingError::Departed(_)))
        ));

        Ok(())
    }

    #[test]
    fn test_missing_window_means_no_restriction() -> Result<(), ServerError> {
        let mut store = seeded();
        let mai = user(&store, "mai");
        let window = store
            .regulation_by_name(BOOK_TIME_REGULATION)
            .map(|r| r.id)
            .expect("book_time");
        if let Some(regulation) = store.regulation_mut(window) {
            regulation.name = "book_time_retired".to_string();
        }

        // One hour before departure is well inside the usual 12 hour window
        let receipt = book_tickets(
            &mut store,
            &mai,
            &FlightId::from_str("CB1"),
            1,
            vec![passenger("An")],
            at(1, 12, 0),
        )?;
        assert_eq!(receipt.total_quantity, 1);

        Ok(())
    }

    #[test]
    fn test_booking_rejections_store_nothing() {
        let mut store = seeded();
        let mai = user(&store, "mai");
        let cb1 = FlightId::from_str("CB1");

        let mut incomplete = passenger("Binh");
        incomplete.dob = "01/11/2001".to_string();
        let result = book_tickets(
            &mut store,
            &mai,
            &cb1,
            1,
            vec![passenger("An"), incomplete],
            at(1, 0, 0),
        );
        assert!(matches!(
            result,
            Err(ServerError::Booking(BookingError::IncompletePassenger(1)))
        ));

        let result = book_tickets(&mut store, &mai, &cb1, 3, vec![passenger("An")], at(1, 0, 0));
        assert!(matches!(
            result,
            Err(ServerError::Booking(BookingError::UnknownRank(3)))
        ));

        assert_eq!(store.available_seats(&cb1), 60);
        assert_eq!(store.tickets().count(), 0);
    }

    #[test]
    fn test_sold_out() {
        let mut store = seeded();
        let son = user(&store, "son");
        let cb3 = FlightId::from_str("CB3");
        let passengers = (0..66).map(|i| passenger(&format!("P{i}"))).collect();

        let result = book_tickets(&mut store, &son, &cb3, 2, passengers, at(1, 0, 0));
        assert!(matches!(
            result,
            Err(ServerError::Booking(BookingError::SoldOut { available: 65, .. }))
        ));
    }

    #[test]
    fn test_admin_sees_all_tickets() -> Result<(), ServerError> {
        let mut store = seeded();
        let mai = user(&store, "mai");
        let son = user(&store, "son");
        let tan = user(&store, "tan");

        book_tickets(&mut store, &mai, &FlightId::from_str("CB2"), 1, vec![passenger("An")], at(1, 0, 0))?;

        assert_eq!(tickets_for(&store, &son).len(), 0);
        assert_eq!(tickets_for(&store, &tan).len(), 1);

        Ok(())
    }
}
