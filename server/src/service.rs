use std::pin::Pin;
use std::sync::Arc;

use chrono::NaiveDateTime;
use futures::{Stream, StreamExt};
use schema::proto::booking_server::Booking;
use schema::{
    proto, AirportId, FlightDraft, FlightEvent, FlightEventKind, FlightId, Passenger, Regulation,
    RegulationId, StopDraft, StopEdit, ToFromProto,
};
use tokio::sync::RwLock;
use tonic::{Request, Response, Status};

use crate::auth::{self, Access};
use crate::config::FlightRules;
use crate::events::FlightEvents;
use crate::{booking, flights, regulations, stats, MemoryStore, ServerError};

pub struct BookingService {
    store: Arc<RwLock<MemoryStore>>,
    rules: FlightRules,
    events: FlightEvents,
}

impl BookingService {
    pub fn new(store: MemoryStore, rules: FlightRules, events: FlightEvents) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            rules,
            events,
        }
    }
}

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

fn session_token<T>(request: &Request<T>) -> Option<String> {
    request
        .metadata()
        .get(schema::SESSION_TOKEN_KEY)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn rejected(error: impl Into<ServerError>) -> Status {
    let error = error.into();
    log::warn!("rejected request: {error}");
    error.into()
}

fn decode<P, T: ToFromProto<P>>(message: Option<P>, what: &'static str) -> Result<T, Status>
where
    P: prost::Message,
{
    message
        .and_then(T::try_from_proto)
        .ok_or_else(|| rejected(ServerError::MalformedRequest(what)))
}

fn decode_all<P, T: ToFromProto<P>>(messages: Vec<P>, what: &'static str) -> Result<Vec<T>, Status>
where
    P: prost::Message,
{
    messages
        .into_iter()
        .map(|message| decode(Some(message), what))
        .collect()
}

#[tonic::async_trait]
impl Booking for BookingService {
    type WatchFlightsStream =
        Pin<Box<dyn Stream<Item = Result<proto::FlightEvent, Status>> + Send>>;

    async fn register(&self, request: Request<proto::RegisterRequest>) -> Result<Response<()>, Status> {
        let message = request.into_inner();
        let mut store = self.store.write().await;
        auth::register(
            &mut store,
            &message.name,
            &message.username,
            &message.password,
            &message.confirm,
            now(),
        )
        .map_err(rejected)?;

        Ok(Response::new(()))
    }

    async fn login(
        &self,
        request: Request<proto::LoginRequest>,
    ) -> Result<Response<proto::Session>, Status> {
        let message = request.into_inner();
        let mut store = self.store.write().await;
        let session = auth::login(&mut store, &message.username, &message.password)
            .map_err(rejected)?;

        Ok(Response::new(session.into_proto()))
    }

    async fn logout(&self, request: Request<()>) -> Result<Response<()>, Status> {
        let token = session_token(&request).unwrap_or_default();
        let mut store = self.store.write().await;
        auth::logout(&mut store, &token).map_err(rejected)?;

        Ok(Response::new(()))
    }

    async fn list_airports(&self, _request: Request<()>) -> Result<Response<proto::AirportList>, Status> {
        let store = self.store.read().await;
        let airports = store.airports().cloned().map(ToFromProto::into_proto).collect();

        Ok(Response::new(proto::AirportList { airports }))
    }

    async fn list_airlines(&self, _request: Request<()>) -> Result<Response<proto::AirlineList>, Status> {
        let store = self.store.read().await;
        let airlines = store.airlines().cloned().map(ToFromProto::into_proto).collect();

        Ok(Response::new(proto::AirlineList { airlines }))
    }

    async fn list_airplanes(
        &self,
        _request: Request<()>,
    ) -> Result<Response<proto::AirplaneList>, Status> {
        let store = self.store.read().await;
        let airplanes = store.airplanes().cloned().map(ToFromProto::into_proto).collect();

        Ok(Response::new(proto::AirplaneList { airplanes }))
    }

    async fn list_flights(&self, request: Request<()>) -> Result<Response<proto::FlightList>, Status> {
        let token = session_token(&request);

        let store = self.store.read().await;
        auth::authorize(&store, token.as_deref(), Access::Staff).map_err(rejected)?;
        let flights = flights::list_flights(&store)
            .into_iter()
            .map(ToFromProto::into_proto)
            .collect();

        Ok(Response::new(proto::FlightList { flights }))
    }

    async fn search_flights(
        &self,
        request: Request<proto::SearchFlightsRequest>,
    ) -> Result<Response<proto::FlightSummaryList>, Status> {
        let message = request.into_inner();
        let store = self.store.read().await;
        let flights = booking::search_flights(
            &store,
            &message.keyword,
            message.from_airport.map(AirportId),
            message.to_airport.map(AirportId),
        )
        .into_iter()
        .map(ToFromProto::into_proto)
        .collect();

        Ok(Response::new(proto::FlightSummaryList { flights }))
    }

    async fn get_flight(
        &self,
        request: Request<proto::FlightKey>,
    ) -> Result<Response<proto::FlightDetails>, Status> {
        let id = FlightId::from_str(&request.into_inner().id);
        let store = self.store.read().await;
        let details = flights::flight_details(&store, &id).map_err(rejected)?;

        Ok(Response::new(details.into_proto()))
    }

    async fn create_flight(
        &self,
        request: Request<proto::CreateFlightRequest>,
    ) -> Result<Response<proto::FlightDetails>, Status> {
        let token = session_token(&request);
        let message = request.into_inner();
        let draft: FlightDraft = decode(message.flight, "flight")?;
        let stops: Vec<StopDraft> = decode_all(message.stops, "stop")?;

        let mut store = self.store.write().await;
        auth::authorize(&store, token.as_deref(), Access::Staff).map_err(rejected)?;
        let details = flights::create_flight(&mut store, &self.rules, draft, stops)
            .map_err(rejected)?;

        self.events.publish(FlightEvent {
            kind: FlightEventKind::Created,
            flight: details.flight.clone(),
        });
        Ok(Response::new(details.into_proto()))
    }

    async fn edit_flight(
        &self,
        request: Request<proto::EditFlightRequest>,
    ) -> Result<Response<proto::FlightDetails>, Status> {
        let token = session_token(&request);
        let message = request.into_inner();
        let id = FlightId::from_str(&message.id);
        let draft: FlightDraft = decode(message.flight, "flight")?;
        let stop_edits: Vec<StopEdit> = decode_all(message.stop_edits, "stop edit")?;
        let new_stops: Vec<StopDraft> = decode_all(message.new_stops, "stop")?;

        let mut store = self.store.write().await;
        auth::authorize(&store, token.as_deref(), Access::Staff).map_err(rejected)?;
        let details =
            flights::edit_flight(&mut store, &self.rules, &id, draft, stop_edits, new_stops)
                .map_err(rejected)?;

        self.events.publish(FlightEvent {
            kind: FlightEventKind::Updated,
            flight: details.flight.clone(),
        });
        Ok(Response::new(details.into_proto()))
    }

    async fn delete_flight(&self, request: Request<proto::FlightKey>) -> Result<Response<()>, Status> {
        let token = session_token(&request);
        let id = FlightId::from_str(&request.into_inner().id);

        let mut store = self.store.write().await;
        auth::authorize(&store, token.as_deref(), Access::Staff).map_err(rejected)?;
        let flight = flights::delete_flight(&mut store, &id).map_err(rejected)?;

        self.events.publish(FlightEvent {
            kind: FlightEventKind::Deleted,
            flight,
        });
        Ok(Response::new(()))
    }

    async fn list_regulations(
        &self,
        request: Request<proto::RegulationQuery>,
    ) -> Result<Response<proto::RegulationList>, Status> {
        let token = session_token(&request);
        let keyword = request.into_inner().keyword;

        let store = self.store.read().await;
        auth::authorize(&store, token.as_deref(), Access::Admin).map_err(rejected)?;
        let regulations = regulations::list_regulations(&store, &keyword)
            .into_iter()
            .map(ToFromProto::into_proto)
            .collect();

        Ok(Response::new(proto::RegulationList { regulations }))
    }

    async fn create_regulation(
        &self,
        request: Request<proto::RegulationDraft>,
    ) -> Result<Response<proto::Regulation>, Status> {
        let token = session_token(&request);
        let message = request.into_inner();
        let regulation = Regulation {
            id: RegulationId::default(),
            name: message.name,
            value: message.value,
            description: message.description,
        };

        let mut store = self.store.write().await;
        auth::authorize(&store, token.as_deref(), Access::Admin).map_err(rejected)?;
        let created = regulations::create_regulation(&mut store, regulation).map_err(rejected)?;

        Ok(Response::new(created.into_proto()))
    }

    async fn update_regulation(
        &self,
        request: Request<proto::Regulation>,
    ) -> Result<Response<proto::Regulation>, Status> {
        let token = session_token(&request);
        let regulation: Regulation = decode(Some(request.into_inner()), "regulation")?;

        let mut store = self.store.write().await;
        auth::authorize(&store, token.as_deref(), Access::Admin).map_err(rejected)?;
        let updated = regulations::update_regulation(&mut store, regulation).map_err(rejected)?;

        Ok(Response::new(updated.into_proto()))
    }

    async fn book_tickets(
        &self,
        request: Request<proto::BookTicketsRequest>,
    ) -> Result<Response<proto::Receipt>, Status> {
        let token = session_token(&request);
        let message = request.into_inner();
        let flight = FlightId::from_str(&message.flight);
        let rank = u8::try_from(message.rank)
            .map_err(|_| rejected(ServerError::MalformedRequest("rank")))?;
        let passengers: Vec<Passenger> = decode_all(message.passengers, "passenger")?;

        let mut store = self.store.write().await;
        let user = auth::authorize(&store, token.as_deref(), Access::Member)
            .map_err(rejected)?
            .clone();
        let receipt = booking::book_tickets(&mut store, &user, &flight, rank, passengers, now())
            .map_err(rejected)?;

        Ok(Response::new(receipt.into_proto()))
    }

    async fn my_tickets(&self, request: Request<()>) -> Result<Response<proto::TicketList>, Status> {
        let token = session_token(&request);

        let store = self.store.read().await;
        let user = auth::authorize(&store, token.as_deref(), Access::Member).map_err(rejected)?;
        let tickets = booking::tickets_for(&store, user)
            .into_iter()
            .map(ToFromProto::into_proto)
            .collect();

        Ok(Response::new(proto::TicketList { tickets }))
    }

    async fn revenue_stats(
        &self,
        request: Request<proto::RevenueQuery>,
    ) -> Result<Response<proto::RevenueReport>, Status> {
        let token = session_token(&request);
        let message = request.into_inner();

        let store = self.store.read().await;
        auth::authorize(&store, token.as_deref(), Access::Admin).map_err(rejected)?;
        let report = stats::statistic_revenue_follow_month(
            &store,
            Some(&message.airline_name),
            Some(&message.month),
        )
        .map_err(rejected)?;

        Ok(Response::new(report.into_proto()))
    }

    async fn watch_flights(
        &self,
        _request: Request<()>,
    ) -> Result<Response<Self::WatchFlightsStream>, Status> {
        let (id, rx) = self
            .events
            .subscribe()
            .ok_or_else(|| Status::unavailable("flight events are not running"))?;
        log::info!("received watch request: {id}");

        let stream = rx
            .map(|event| Ok::<proto::FlightEvent, Status>(event.into_proto()))
            .boxed();

        Ok(Response::new(stream))
    }
}

#[cfg(test)]
mod test {
    use tonic::metadata::MetadataValue;
    use tonic::Code;

    use super::*;
    use crate::store::test::seeded;

    fn service() -> BookingService {
        let (events, process) = FlightEvents::new();
        tokio::spawn(process);
        BookingService::new(seeded(), FlightRules::default(), events)
    }

    async fn login(service: &BookingService, username: &str) -> String {
        let session = service
            .login(Request::new(proto::LoginRequest {
                username: username.to_string(),
                password: "1".to_string(),
            }))
            .await
            .expect("login")
            .into_inner();
        session.token
    }

    fn with_token<T>(message: T, token: &str) -> Request<T> {
        let mut request = Request::new(message);
        if let Ok(value) = MetadataValue::try_from(token) {
            request.metadata_mut().insert(schema::SESSION_TOKEN_KEY, value);
        }
        request
    }

    fn draft(id: &str) -> proto::FlightDraft {
        let at = |h| {
            chrono::NaiveDate::from_ymd_opt(2030, 1, 1)
                .and_then(|d| d.and_hms_opt(h, 0, 0))
                .expect("date")
        };
        FlightDraft {
            id: FlightId::from_str(id),
            name: format!("Chuyến bay {id}"),
            departing_at: at(6),
            arriving_at: at(8),
            plane: schema::PlaneId::from_str("MB3"),
            airline_name: "Hà Nội - Hồ Chí Minh".to_string(),
        }
        .into_proto()
    }

    #[tokio::test]
    async fn test_login_roles() {
        let service = service();
        let session = service
            .login(Request::new(proto::LoginRequest {
                username: "tan".to_string(),
                password: "1".to_string(),
            }))
            .await
            .expect("login")
            .into_inner();
        assert_eq!(session.role(), proto::Role::Admin);

        let status = service
            .login(Request::new(proto::LoginRequest {
                username: "tan".to_string(),
                password: "2".to_string(),
            }))
            .await
            .expect_err("bad password");
        assert_eq!(status.code(), Code::Unauthenticated);
    }

    #[tokio::test]
    async fn test_create_flight_requires_staff() {
        let service = service();
        let request = || proto::CreateFlightRequest {
            flight: Some(draft("CB9")),
            stops: vec![],
        };

        let status = service
            .create_flight(Request::new(request()))
            .await
            .expect_err("anonymous");
        assert_eq!(status.code(), Code::Unauthenticated);

        let token = login(&service, "mai").await;
        let status = service
            .create_flight(with_token(request(), &token))
            .await
            .expect_err("customer");
        assert_eq!(status.code(), Code::PermissionDenied);

        let token = login(&service, "son").await;
        let details = service
            .create_flight(with_token(request(), &token))
            .await
            .expect("employee")
            .into_inner();
        assert_eq!(details.available_seats, 65);

        let flights = service
            .list_flights(with_token((), &token))
            .await
            .expect("list")
            .into_inner()
            .flights;
        assert_eq!(flights.len(), 5);
    }

    #[tokio::test]
    async fn test_watchers_see_flight_changes() {
        let service = service();
        let mut watch = service
            .watch_flights(Request::new(()))
            .await
            .expect("watch")
            .into_inner();
        let token = login(&service, "son").await;

        service
            .create_flight(with_token(
                proto::CreateFlightRequest {
                    flight: Some(draft("CB9")),
                    stops: vec![],
                },
                &token,
            ))
            .await
            .expect("create");
        service
            .delete_flight(with_token(proto::FlightKey { id: "CB9".to_string() }, &token))
            .await
            .expect("delete");

        let created = watch.next().await.expect("event").expect("status");
        assert_eq!(created.kind(), proto::FlightEventKind::Created);
        let deleted = watch.next().await.expect("event").expect("status");
        assert_eq!(deleted.kind(), proto::FlightEventKind::Deleted);
        assert_eq!(deleted.flight.map(|f| f.id), Some("CB9".to_string()));
    }

    #[tokio::test]
    async fn test_validation_errors_map_to_status() {
        let service = service();
        let token = login(&service, "son").await;

        let mut short = draft("CB9");
        short.arriving_at = short.departing_at.clone();
        let status = service
            .create_flight(with_token(
                proto::CreateFlightRequest {
                    flight: Some(short),
                    stops: vec![],
                },
                &token,
            ))
            .await
            .expect_err("too short");
        assert_eq!(status.code(), Code::FailedPrecondition);

        let status = service
            .get_flight(Request::new(proto::FlightKey { id: "CB9".to_string() }))
            .await
            .expect_err("missing");
        assert_eq!(status.code(), Code::NotFound);

        let status = service
            .create_flight(with_token(
                proto::CreateFlightRequest {
                    flight: None,
                    stops: vec![],
                },
                &token,
            ))
            .await
            .expect_err("malformed");
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_stats_require_admin() {
        let service = service();
        let query = || proto::RevenueQuery {
            airline_name: String::new(),
            month: String::new(),
        };

        let token = login(&service, "son").await;
        let status = service
            .revenue_stats(with_token(query(), &token))
            .await
            .expect_err("employee");
        assert_eq!(status.code(), Code::PermissionDenied);

        let token = login(&service, "tan").await;
        let report = service
            .revenue_stats(with_token(query(), &token))
            .await
            .expect("admin")
            .into_inner();
        assert_eq!(report.rows.len(), 5);
        assert_eq!(report.total, 0);
    }

    #[tokio::test]
    async fn test_register_then_book() {
        let service = service();
        service
            .register(Request::new(proto::RegisterRequest {
                name: "Lan".to_string(),
                username: "lan".to_string(),
                password: "secret".to_string(),
                confirm: "secret".to_string(),
            }))
            .await
            .expect("register");

        let session = service
            .login(Request::new(proto::LoginRequest {
                username: "lan".to_string(),
                password: "secret".to_string(),
            }))
            .await
            .expect("login")
            .into_inner();
        assert_eq!(session.role(), proto::Role::User);

        let token = session.token;
        let status = service
            .book_tickets(with_token(
                proto::BookTicketsRequest {
                    flight: "CB1".to_string(),
                    rank: 1,
                    passengers: vec![],
                },
                &token,
            ))
            .await
            .expect_err("no passengers");
        assert_eq!(status.code(), Code::InvalidArgument);

        let tickets = service
            .my_tickets(with_token((), &token))
            .await
            .expect("tickets")
            .into_inner();
        assert!(tickets.tickets.is_empty());
    }
}
