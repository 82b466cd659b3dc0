use chrono::{DateTime, NaiveDateTime};
use prost::Message as ProstMessage;

mod catalog;
mod entities;
mod views;

pub mod proto {
    tonic::include_proto!("booking");
}

pub use catalog::Catalog;
pub use entities::{
    Airline, AirlineId, Airplane, Airport, AirportId, Flight, FlightId, ParseError, PlaneId,
    Profile, ProfileId, Regulation, RegulationId, Seat, SeatId, StopStation, Ticket, TicketId,
    User, UserId, UserRole, UserSeed, DATE_TIME_FORMAT,
};
pub use views::{
    BookedTicket, FlightDetails, FlightDraft, FlightEvent, FlightEventKind, FlightSummary,
    Passenger, Receipt, RevenueReport, RevenueRow, Session, StopDraft, StopEdit,
};

pub const SAMPLE_DATA_DIR: &str = "./test_data";

/// Metadata key carrying the session token of a logged-in user
pub const SESSION_TOKEN_KEY: &str = "x-session-token";

pub trait ToFromProto<Proto>: Sized
where
    Proto: ProstMessage,
{
    fn try_from_proto(proto: Proto) -> Option<Self>;
    fn into_proto(self) -> Proto;
}

pub fn to_timestamp(time: NaiveDateTime) -> prost_types::Timestamp {
    let utc = time.and_utc();
    prost_types::Timestamp {
        seconds: utc.timestamp(),
        nanos: utc.timestamp_subsec_nanos() as i32,
    }
}

pub fn from_timestamp(timestamp: Option<prost_types::Timestamp>) -> Option<NaiveDateTime> {
    let timestamp = timestamp?;
    let nanos = u32::try_from(timestamp.nanos).ok()?;
    DateTime::from_timestamp(timestamp.seconds, nanos).map(|utc| utc.naive_utc())
}

fn role_into_proto(role: UserRole) -> proto::Role {
    match role {
        UserRole::User => proto::Role::User,
        UserRole::Employee => proto::Role::Employee,
        UserRole::Admin => proto::Role::Admin,
    }
}

fn role_from_proto(role: proto::Role) -> UserRole {
    match role {
        proto::Role::User => UserRole::User,
        proto::Role::Employee => UserRole::Employee,
        proto::Role::Admin => UserRole::Admin,
    }
}

fn ids_into_proto(ids: Vec<RegulationId>) -> Vec<u32> {
    ids.into_iter().map(|id| id.0).collect()
}

fn ids_from_proto(ids: Vec<u32>) -> Vec<RegulationId> {
    ids.into_iter().map(RegulationId).collect()
}

impl ToFromProto<proto::Airport> for Airport {
    fn into_proto(self) -> proto::Airport {
        proto::Airport {
            id: self.id.0,
            name: self.name,
            location: self.location,
            image: self.image,
        }
    }

    fn try_from_proto(message: proto::Airport) -> Option<Self> {
        Some(Self {
            id: AirportId(message.id),
            name: message.name,
            location: message.location,
            image: message.image,
        })
    }
}

impl ToFromProto<proto::Airline> for Airline {
    fn into_proto(self) -> proto::Airline {
        proto::Airline {
            id: self.id.to_string(),
            name: self.name,
            from_airport: self.from_airport.0,
            to_airport: self.to_airport.0,
        }
    }

    fn try_from_proto(message: proto::Airline) -> Option<Self> {
        Some(Self {
            id: AirlineId::from_str(&message.id),
            name: message.name,
            from_airport: AirportId(message.from_airport),
            to_airport: AirportId(message.to_airport),
        })
    }
}

impl ToFromProto<proto::Airplane> for Airplane {
    fn into_proto(self) -> proto::Airplane {
        proto::Airplane {
            id: self.id.to_string(),
            name: self.name,
            manufacturer: self.manufacturer,
            total_seat: self.total_seat,
            image: self.image,
        }
    }

    fn try_from_proto(message: proto::Airplane) -> Option<Self> {
        Some(Self {
            id: PlaneId::from_str(&message.id),
            name: message.name,
            manufacturer: message.manufacturer,
            total_seat: message.total_seat,
            image: message.image,
        })
    }
}

impl ToFromProto<proto::Flight> for Flight {
    fn into_proto(self) -> proto::Flight {
        proto::Flight {
            id: self.id.to_string(),
            name: self.name,
            departing_at: Some(to_timestamp(self.departing_at)),
            arriving_at: Some(to_timestamp(self.arriving_at)),
            plane: self.plane.to_string(),
            airline: self.airline.to_string(),
            regulations: ids_into_proto(self.regulations),
        }
    }

    fn try_from_proto(message: proto::Flight) -> Option<Self> {
        Some(Self {
            id: FlightId::from_str(&message.id),
            name: message.name,
            departing_at: from_timestamp(message.departing_at)?,
            arriving_at: from_timestamp(message.arriving_at)?,
            plane: PlaneId::from_str(&message.plane),
            airline: AirlineId::from_str(&message.airline),
            regulations: ids_from_proto(message.regulations),
        })
    }
}

impl ToFromProto<proto::StopStation> for StopStation {
    fn into_proto(self) -> proto::StopStation {
        proto::StopStation {
            flight: self.flight.to_string(),
            airport: self.airport.0,
            name: self.name,
            stop_time_begin: Some(to_timestamp(self.stop_time_begin)),
            stop_time_finish: Some(to_timestamp(self.stop_time_finish)),
            description: self.description,
            regulations: ids_into_proto(self.regulations),
        }
    }

    fn try_from_proto(message: proto::StopStation) -> Option<Self> {
        Some(Self {
            flight: FlightId::from_str(&message.flight),
            airport: AirportId(message.airport),
            name: message.name,
            stop_time_begin: from_timestamp(message.stop_time_begin)?,
            stop_time_finish: from_timestamp(message.stop_time_finish)?,
            description: message.description,
            regulations: ids_from_proto(message.regulations),
        })
    }
}

impl ToFromProto<proto::Regulation> for Regulation {
    fn into_proto(self) -> proto::Regulation {
        proto::Regulation {
            id: self.id.0,
            name: self.name,
            value: self.value,
            description: self.description,
        }
    }

    fn try_from_proto(message: proto::Regulation) -> Option<Self> {
        Some(Self {
            id: RegulationId(message.id),
            name: message.name,
            value: message.value,
            description: message.description,
        })
    }
}

impl ToFromProto<proto::FlightDraft> for FlightDraft {
    fn into_proto(self) -> proto::FlightDraft {
        proto::FlightDraft {
            id: self.id.to_string(),
            name: self.name,
            departing_at: Some(to_timestamp(self.departing_at)),
            arriving_at: Some(to_timestamp(self.arriving_at)),
            plane: self.plane.to_string(),
            airline_name: self.airline_name,
        }
    }

    fn try_from_proto(message: proto::FlightDraft) -> Option<Self> {
        Some(Self {
            id: FlightId::from_str(&message.id),
            name: message.name,
            departing_at: from_timestamp(message.departing_at)?,
            arriving_at: from_timestamp(message.arriving_at)?,
            plane: PlaneId::from_str(&message.plane),
            airline_name: message.airline_name,
        })
    }
}

impl ToFromProto<proto::StopDraft> for StopDraft {
    fn into_proto(self) -> proto::StopDraft {
        proto::StopDraft {
            name: self.name,
            stop_time_begin: Some(to_timestamp(self.stop_time_begin)),
            stop_time_finish: Some(to_timestamp(self.stop_time_finish)),
            description: self.description,
            airport_name: self.airport_name,
        }
    }

    fn try_from_proto(message: proto::StopDraft) -> Option<Self> {
        Some(Self {
            name: message.name,
            stop_time_begin: from_timestamp(message.stop_time_begin)?,
            stop_time_finish: from_timestamp(message.stop_time_finish)?,
            description: message.description,
            airport_name: message.airport_name,
        })
    }
}

impl ToFromProto<proto::StopEdit> for StopEdit {
    fn into_proto(self) -> proto::StopEdit {
        match self {
            Self::Delete(airport) => proto::StopEdit {
                airport: airport.0,
                delete: true,
                stop: None,
            },
            Self::Update(airport, stop) => proto::StopEdit {
                airport: airport.0,
                delete: false,
                stop: Some(stop.into_proto()),
            },
        }
    }

    fn try_from_proto(message: proto::StopEdit) -> Option<Self> {
        let airport = AirportId(message.airport);
        if message.delete {
            return Some(Self::Delete(airport));
        }

        Some(Self::Update(airport, StopDraft::try_from_proto(message.stop?)?))
    }
}

impl ToFromProto<proto::Passenger> for Passenger {
    fn into_proto(self) -> proto::Passenger {
        proto::Passenger {
            document_id: self.document_id,
            name: self.name,
            gender: self.gender,
            dob: self.dob,
            email: self.email,
            phone: self.phone,
        }
    }

    fn try_from_proto(message: proto::Passenger) -> Option<Self> {
        Some(Self {
            document_id: message.document_id,
            name: message.name,
            gender: message.gender,
            dob: message.dob,
            email: message.email,
            phone: message.phone,
        })
    }
}

impl ToFromProto<proto::FlightDetails> for FlightDetails {
    fn into_proto(self) -> proto::FlightDetails {
        proto::FlightDetails {
            flight: Some(self.flight.into_proto()),
            stops: self.stops.into_iter().map(StopStation::into_proto).collect(),
            available_seats: self.available_seats,
        }
    }

    fn try_from_proto(message: proto::FlightDetails) -> Option<Self> {
        Some(Self {
            flight: Flight::try_from_proto(message.flight?)?,
            stops: message
                .stops
                .into_iter()
                .filter_map(StopStation::try_from_proto)
                .collect(),
            available_seats: message.available_seats,
        })
    }
}

impl ToFromProto<proto::FlightSummary> for FlightSummary {
    fn into_proto(self) -> proto::FlightSummary {
        proto::FlightSummary {
            flight: Some(self.flight.into_proto()),
            airline_name: self.airline_name,
            available_seats: self.available_seats,
        }
    }

    fn try_from_proto(message: proto::FlightSummary) -> Option<Self> {
        Some(Self {
            flight: Flight::try_from_proto(message.flight?)?,
            airline_name: message.airline_name,
            available_seats: message.available_seats,
        })
    }
}

impl ToFromProto<proto::Ticket> for BookedTicket {
    fn into_proto(self) -> proto::Ticket {
        let ticket = self.ticket;
        proto::Ticket {
            id: ticket.id.0,
            rank: u32::from(ticket.rank),
            price: ticket.price,
            date: Some(to_timestamp(ticket.date)),
            place: ticket.place.map(|place| place.0),
            profile: ticket.profile.0,
            flight: ticket.flight.to_string(),
            seat: ticket.seat.0,
            seat_name: self.seat_name,
        }
    }

    fn try_from_proto(message: proto::Ticket) -> Option<Self> {
        Some(Self {
            ticket: Ticket {
                id: TicketId(message.id),
                rank: u8::try_from(message.rank).ok()?,
                price: message.price,
                date: from_timestamp(message.date)?,
                place: message.place.map(AirportId),
                profile: ProfileId(message.profile),
                flight: FlightId::from_str(&message.flight),
                seat: SeatId(message.seat),
                user: None,
            },
            seat_name: message.seat_name,
        })
    }
}

impl ToFromProto<proto::Receipt> for Receipt {
    fn into_proto(self) -> proto::Receipt {
        proto::Receipt {
            tickets: self.tickets.into_iter().map(BookedTicket::into_proto).collect(),
            total_amount: self.total_amount,
            total_quantity: self.total_quantity,
        }
    }

    fn try_from_proto(message: proto::Receipt) -> Option<Self> {
        Some(Self {
            tickets: message
                .tickets
                .into_iter()
                .filter_map(BookedTicket::try_from_proto)
                .collect(),
            total_amount: message.total_amount,
            total_quantity: message.total_quantity,
        })
    }
}

impl ToFromProto<proto::RevenueReport> for RevenueReport {
    fn into_proto(self) -> proto::RevenueReport {
        proto::RevenueReport {
            rows: self
                .rows
                .into_iter()
                .map(|row| proto::RevenueRow {
                    airline: row.airline.to_string(),
                    airline_name: row.airline_name,
                    revenue: row.revenue,
                    flight_count: row.flight_count,
                })
                .collect(),
            total: self.total,
        }
    }

    fn try_from_proto(message: proto::RevenueReport) -> Option<Self> {
        Some(Self {
            rows: message
                .rows
                .into_iter()
                .map(|row| RevenueRow {
                    airline: AirlineId::from_str(&row.airline),
                    airline_name: row.airline_name,
                    revenue: row.revenue,
                    flight_count: row.flight_count,
                })
                .collect(),
            total: message.total,
        })
    }
}

impl ToFromProto<proto::Session> for Session {
    fn into_proto(self) -> proto::Session {
        proto::Session {
            token: self.token,
            name: self.name,
            role: role_into_proto(self.role).into(),
        }
    }

    fn try_from_proto(message: proto::Session) -> Option<Self> {
        Some(Self {
            role: role_from_proto(message.role()),
            token: message.token,
            name: message.name,
        })
    }
}

impl ToFromProto<proto::FlightEvent> for FlightEvent {
    fn into_proto(self) -> proto::FlightEvent {
        proto::FlightEvent {
            kind: match self.kind {
                FlightEventKind::Created => proto::FlightEventKind::Created.into(),
                FlightEventKind::Updated => proto::FlightEventKind::Updated.into(),
                FlightEventKind::Deleted => proto::FlightEventKind::Deleted.into(),
            },
            flight: Some(self.flight.into_proto()),
        }
    }

    fn try_from_proto(message: proto::FlightEvent) -> Option<Self> {
        Some(Self {
            kind: match message.kind() {
                proto::FlightEventKind::Created => FlightEventKind::Created,
                proto::FlightEventKind::Updated => FlightEventKind::Updated,
                proto::FlightEventKind::Deleted => FlightEventKind::Deleted,
            },
            flight: Flight::try_from_proto(message.flight?)?,
        })
    }
}
