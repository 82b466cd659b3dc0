use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use tonic::metadata::MetadataValue;
use tonic::transport::Channel;
use tonic::{Request, Status, Streaming};

use schema::proto::booking_client::BookingClient;
use schema::{
    proto, BookedTicket, FlightDetails, FlightDraft, FlightEvent, FlightId, FlightSummary,
    Passenger, Receipt, Regulation, RevenueReport, Session, StopDraft, StopEdit, ToFromProto,
};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const CONNECT_ATTEMPTS: usize = 3;

fn decoded<P, T>(message: P) -> Result<T, Status>
where
    P: prost::Message,
    T: ToFromProto<P>,
{
    T::try_from_proto(message).ok_or_else(|| Status::internal("malformed response"))
}

fn decoded_all<P, T>(messages: Vec<P>) -> Result<Vec<T>, Status>
where
    P: prost::Message,
    T: ToFromProto<P>,
{
    messages.into_iter().map(decoded).collect()
}

/// Connection to the booking server carrying the session token, if any
#[derive(Debug, Clone)]
pub struct Client {
    inner: BookingClient<Channel>,
    token: Option<String>,
}

impl Client {
    pub async fn connect(
        server_uri: String,
        token: Option<String>,
    ) -> Result<Self, tonic::transport::Error> {
        let mut attempt = 1;
        loop {
            match BookingClient::connect(server_uri.clone()).await {
                Ok(inner) => return Ok(Self { inner, token }),
                Err(e) if attempt < CONNECT_ATTEMPTS => {
                    log::warn!("connection failed: {:?}", e);
                    attempt += 1;
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn request<T>(&self, message: T) -> Result<Request<T>, Status> {
        let mut request = Request::new(message);
        if let Some(token) = &self.token {
            let value = MetadataValue::try_from(token.as_str())
                .map_err(|_| Status::invalid_argument("session token is not valid ASCII"))?;
            request
                .metadata_mut()
                .insert(schema::SESSION_TOKEN_KEY, value);
        }
        Ok(request)
    }

    pub async fn register(
        &mut self,
        name: String,
        username: String,
        password: String,
        confirm: String,
    ) -> Result<(), Status> {
        let request = self.request(proto::RegisterRequest {
            name,
            username,
            password,
            confirm,
        })?;
        self.inner.register(request).await?;
        Ok(())
    }

    pub async fn login(&mut self, username: String, password: String) -> Result<Session, Status> {
        let request = self.request(proto::LoginRequest { username, password })?;
        decoded(self.inner.login(request).await?.into_inner())
    }

    pub async fn logout(&mut self) -> Result<(), Status> {
        let request = self.request(())?;
        self.inner.logout(request).await?;
        Ok(())
    }

    pub async fn airports(&mut self) -> Result<Vec<schema::Airport>, Status> {
        let request = self.request(())?;
        decoded_all(self.inner.list_airports(request).await?.into_inner().airports)
    }

    pub async fn airlines(&mut self) -> Result<Vec<schema::Airline>, Status> {
        let request = self.request(())?;
        decoded_all(self.inner.list_airlines(request).await?.into_inner().airlines)
    }

    pub async fn airplanes(&mut self) -> Result<Vec<schema::Airplane>, Status> {
        let request = self.request(())?;
        decoded_all(self.inner.list_airplanes(request).await?.into_inner().airplanes)
    }

    pub async fn flights(&mut self) -> Result<Vec<schema::Flight>, Status> {
        let request = self.request(())?;
        decoded_all(self.inner.list_flights(request).await?.into_inner().flights)
    }

    pub async fn search_flights(
        &mut self,
        keyword: String,
        from_airport: Option<u32>,
        to_airport: Option<u32>,
    ) -> Result<Vec<FlightSummary>, Status> {
        let request = self.request(proto::SearchFlightsRequest {
            keyword,
            from_airport,
            to_airport,
        })?;
        decoded_all(self.inner.search_flights(request).await?.into_inner().flights)
    }

    pub async fn flight(&mut self, id: FlightId) -> Result<FlightDetails, Status> {
        let request = self.request(proto::FlightKey { id: id.to_string() })?;
        decoded(self.inner.get_flight(request).await?.into_inner())
    }

    pub async fn create_flight(
        &mut self,
        flight: FlightDraft,
        stops: Vec<StopDraft>,
    ) -> Result<FlightDetails, Status> {
        let request = self.request(proto::CreateFlightRequest {
            flight: Some(flight.into_proto()),
            stops: stops.into_iter().map(ToFromProto::into_proto).collect(),
        })?;
        decoded(self.inner.create_flight(request).await?.into_inner())
    }

    pub async fn edit_flight(
        &mut self,
        id: FlightId,
        flight: FlightDraft,
        stop_edits: Vec<StopEdit>,
        new_stops: Vec<StopDraft>,
    ) -> Result<FlightDetails, Status> {
        let request = self.request(proto::EditFlightRequest {
            id: id.to_string(),
            flight: Some(flight.into_proto()),
            stop_edits: stop_edits.into_iter().map(ToFromProto::into_proto).collect(),
            new_stops: new_stops.into_iter().map(ToFromProto::into_proto).collect(),
        })?;
        decoded(self.inner.edit_flight(request).await?.into_inner())
    }

    pub async fn delete_flight(&mut self, id: FlightId) -> Result<(), Status> {
        let request = self.request(proto::FlightKey { id: id.to_string() })?;
        self.inner.delete_flight(request).await?;
        Ok(())
    }

    pub async fn regulations(&mut self, keyword: String) -> Result<Vec<Regulation>, Status> {
        let request = self.request(proto::RegulationQuery { keyword })?;
        decoded_all(self.inner.list_regulations(request).await?.into_inner().regulations)
    }

    /// Updates the regulation with the given id, or creates one when there is none
    pub async fn set_regulation(&mut self, regulation: Regulation) -> Result<Regulation, Status> {
        let response = if regulation.id.0 == 0 {
            let request = self.request(proto::RegulationDraft {
                name: regulation.name,
                value: regulation.value,
                description: regulation.description,
            })?;
            self.inner.create_regulation(request).await?
        } else {
            let request = self.request(regulation.into_proto())?;
            self.inner.update_regulation(request).await?
        };
        decoded(response.into_inner())
    }

    pub async fn book(
        &mut self,
        flight: FlightId,
        rank: u8,
        passengers: Vec<Passenger>,
    ) -> Result<Receipt, Status> {
        let request = self.request(proto::BookTicketsRequest {
            flight: flight.to_string(),
            rank: rank.into(),
            passengers: passengers.into_iter().map(ToFromProto::into_proto).collect(),
        })?;
        decoded(self.inner.book_tickets(request).await?.into_inner())
    }

    pub async fn tickets(&mut self) -> Result<Vec<BookedTicket>, Status> {
        let request = self.request(())?;
        decoded_all(self.inner.my_tickets(request).await?.into_inner().tickets)
    }

    pub async fn revenue(
        &mut self,
        airline_name: String,
        month: String,
    ) -> Result<RevenueReport, Status> {
        let request = self.request(proto::RevenueQuery {
            airline_name,
            month,
        })?;
        decoded(self.inner.revenue_stats(request).await?.into_inner())
    }

    /// Streams flight changes, subscribing again whenever the server goes away
    pub fn watch(self) -> BoxStream<'static, FlightEvent> {
        futures::stream::unfold(State::Disconnected(self), |mut state| async move {
            loop {
                state = match state {
                    State::Disconnected(mut client) => {
                        match client.inner.watch_flights(()).await {
                            Ok(response) => {
                                log::info!("subscribed");
                                State::Connected(client, response.into_inner())
                            }
                            Err(status) => {
                                log::warn!("subscription failed: {:?}", status);
                                tokio::time::sleep(RECONNECT_DELAY).await;
                                State::Disconnected(client)
                            }
                        }
                    }

                    State::Connected(client, mut events) => match events.next().await {
                        Some(Ok(proto)) => match FlightEvent::try_from_proto(proto) {
                            Some(event) => return Some((event, State::Connected(client, events))),
                            None => {
                                log::warn!("skipping malformed flight event");
                                State::Connected(client, events)
                            }
                        },
                        Some(Err(status)) => {
                            log::info!("disconnected: {}", status.message());
                            State::Disconnected(client)
                        }
                        None => {
                            log::info!("disconnected");
                            State::Disconnected(client)
                        }
                    },
                };
            }
        })
        .boxed()
    }
}

enum State {
    Connected(Client, Streaming<proto::FlightEvent>),
    Disconnected(Client),
}
