//! Request and response shapes shared by the server and its clients

use chrono::NaiveDateTime;

use crate::{AirlineId, AirportId, Flight, FlightId, PlaneId, StopStation, Ticket, UserRole};

/// Flight fields as submitted by the management form, the airline is referenced by name
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct FlightDraft {
    pub id: FlightId,
    pub name: String,
    pub departing_at: NaiveDateTime,
    pub arriving_at: NaiveDateTime,
    pub plane: PlaneId,
    pub airline_name: String,
}

/// Stop station fields as submitted by the management form
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct StopDraft {
    pub name: String,
    pub stop_time_begin: NaiveDateTime,
    pub stop_time_finish: NaiveDateTime,
    pub description: String,
    pub airport_name: String,
}

/// Change requested for an existing stop of an edited flight
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopEdit {
    Delete(AirportId),
    Update(AirportId, StopDraft),
}

impl StopEdit {
    /// Airport the stop was registered at before the edit
    pub fn airport(&self) -> AirportId {
        match self {
            Self::Delete(airport) | Self::Update(airport, _) => *airport,
        }
    }
}

#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct Passenger {
    pub document_id: String,
    pub name: String,
    pub gender: String,
    /// Date of birth as `YYYY-MM-DD`
    pub dob: String,
    pub email: String,
    pub phone: String,
}

#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct FlightDetails {
    pub flight: Flight,
    pub stops: Vec<StopStation>,
    pub available_seats: u32,
}

#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct FlightSummary {
    pub flight: Flight,
    pub airline_name: String,
    pub available_seats: u32,
}

#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct BookedTicket {
    pub ticket: Ticket,
    pub seat_name: String,
}

/// Tickets issued by a single booking together with the cart totals
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub tickets: Vec<BookedTicket>,
    pub total_amount: i64,
    pub total_quantity: u32,
}

impl Receipt {
    pub fn new(tickets: Vec<BookedTicket>) -> Self {
        let total_amount = tickets.iter().map(|t| t.ticket.price).sum();
        let total_quantity = tickets.len() as u32;

        Self {
            tickets,
            total_amount,
            total_quantity,
        }
    }
}

#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct RevenueRow {
    pub airline: AirlineId,
    pub airline_name: String,
    /// `None` when no ticket was sold on the airline
    pub revenue: Option<i64>,
    /// Number of distinct flights contributing to the row
    pub flight_count: u32,
}

#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct RevenueReport {
    pub rows: Vec<RevenueRow>,
    pub total: i64,
}

impl RevenueReport {
    pub fn new(rows: Vec<RevenueRow>) -> Self {
        let total = rows.iter().filter_map(|row| row.revenue).sum();
        Self { rows, total }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub name: String,
    pub role: UserRole,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlightEventKind {
    Created,
    Updated,
    Deleted,
}

/// Catalog change pushed to flight watchers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlightEvent {
    pub kind: FlightEventKind,
    pub flight: Flight,
}
