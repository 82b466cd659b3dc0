use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use schema::{
    AirportId, FlightDraft, FlightId, Passenger, PlaneId, Regulation, RegulationId, StopDraft,
    StopEdit, DATE_TIME_FORMAT,
};

mod client;
use client::Client;

#[derive(Parser, Debug)]
#[command(name = "booking", version, about = "Command-line client for the flight booking server")]
struct Cli {
    #[arg(long, env = "SERVER_URI", default_value = "http://localhost:50051")]
    server_uri: String,

    /// Session token printed by `booking login`
    #[arg(long, env = "BOOKING_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a customer account
    Register {
        name: String,
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
    },
    Login {
        username: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Airports,
    Airlines,
    Airplanes,
    /// List every flight, staff only
    Flights,
    /// Find flights by airline name, optionally restricted to a route
    Search {
        #[arg(default_value = "")]
        keyword: String,
        #[arg(long)]
        from: Option<u32>,
        #[arg(long)]
        to: Option<u32>,
    },
    Flight {
        id: String,
    },
    CreateFlight {
        #[command(flatten)]
        flight: FlightArgs,
        /// `AIRPORT,BEGIN,FINISH[,NAME]`, times as YYYY-MM-DDTHH:MM
        #[arg(long = "stop", value_parser = parse_stop)]
        stops: Vec<StopDraft>,
    },
    /// Replace the fields of a flight, keeping stops that are not mentioned
    EditFlight {
        /// Current id of the flight
        current: String,
        #[command(flatten)]
        flight: FlightArgs,
        /// `AIRPORT_ID=AIRPORT,BEGIN,FINISH[,NAME]`
        #[arg(long = "update-stop", value_parser = parse_stop_update)]
        updated_stops: Vec<StopEdit>,
        #[arg(long = "delete-stop")]
        deleted_stops: Vec<u32>,
        #[arg(long = "stop", value_parser = parse_stop)]
        new_stops: Vec<StopDraft>,
    },
    DeleteFlight {
        id: String,
    },
    Regulations {
        #[arg(default_value = "")]
        keyword: String,
    },
    /// Update a regulation by id, or create one when no id is given
    SetRegulation {
        name: String,
        value: String,
        #[arg(long)]
        id: Option<u32>,
        #[arg(long, default_value = "")]
        description: String,
    },
    Book {
        flight: String,
        #[arg(long, default_value_t = 1)]
        rank: u8,
        /// `NAME,DOB,EMAIL,PHONE[,DOCUMENT_ID[,GENDER]]`, DOB as YYYY-MM-DD
        #[arg(long = "passenger", value_parser = parse_passenger, required = true)]
        passengers: Vec<Passenger>,
    },
    Tickets,
    /// Revenue per airline, filtered when both airline and month are given
    Stats {
        #[arg(long, default_value = "")]
        airline: String,
        /// YYYY-MM
        #[arg(long, default_value = "")]
        month: String,
    },
    /// Print flight changes as they happen
    Watch,
}

#[derive(Args, Debug)]
struct FlightArgs {
    id: String,
    #[arg(long)]
    name: String,
    #[arg(long, value_parser = parse_time)]
    departing: NaiveDateTime,
    #[arg(long, value_parser = parse_time)]
    arriving: NaiveDateTime,
    #[arg(long)]
    plane: String,
    /// Airline name, e.g. "Hà Nội - Hồ Chí Minh"
    #[arg(long)]
    airline: String,
}

impl From<FlightArgs> for FlightDraft {
    fn from(args: FlightArgs) -> Self {
        Self {
            id: FlightId::from_str(&args.id),
            name: args.name,
            departing_at: args.departing,
            arriving_at: args.arriving,
            plane: PlaneId::from_str(&args.plane),
            airline_name: args.airline,
        }
    }
}

fn parse_time(raw: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(raw.trim(), DATE_TIME_FORMAT)
        .map_err(|e| format!("{raw:?} is not a YYYY-MM-DDTHH:MM time: {e}"))
}

fn parse_stop(raw: &str) -> Result<StopDraft, String> {
    let fields = raw.split(',').map(str::trim).collect::<Vec<_>>();
    let [airport, begin, finish, rest @ ..] = fields.as_slice() else {
        return Err(format!("{raw:?} is not AIRPORT,BEGIN,FINISH[,NAME]"));
    };

    Ok(StopDraft {
        name: rest.first().unwrap_or(airport).to_string(),
        stop_time_begin: parse_time(begin)?,
        stop_time_finish: parse_time(finish)?,
        description: String::new(),
        airport_name: airport.to_string(),
    })
}

fn parse_stop_update(raw: &str) -> Result<StopEdit, String> {
    let (airport, stop) = raw
        .split_once('=')
        .ok_or_else(|| format!("{raw:?} is not AIRPORT_ID=STOP"))?;
    let airport = airport
        .trim()
        .parse()
        .map_err(|e| format!("{airport:?} is not an airport id: {e}"))?;

    Ok(StopEdit::Update(AirportId(airport), parse_stop(stop)?))
}

fn parse_passenger(raw: &str) -> Result<Passenger, String> {
    let fields = raw.split(',').map(str::trim).collect::<Vec<_>>();
    let [name, dob, email, phone, rest @ ..] = fields.as_slice() else {
        return Err(format!("{raw:?} is not NAME,DOB,EMAIL,PHONE[,DOCUMENT_ID[,GENDER]]"));
    };

    Ok(Passenger {
        document_id: rest.first().copied().unwrap_or_default().to_string(),
        name: name.to_string(),
        gender: rest.get(1).copied().unwrap_or_default().to_string(),
        dob: dob.to_string(),
        email: email.to_string(),
        phone: phone.to_string(),
    })
}

fn print_flight(details: &schema::FlightDetails) {
    let flight = &details.flight;
    println!(
        "{} {:?}: {} -> {} on plane {}, airline {}, {} seats left",
        flight.id,
        flight.name,
        flight.departing_at.format(DATE_TIME_FORMAT),
        flight.arriving_at.format(DATE_TIME_FORMAT),
        flight.plane,
        flight.airline,
        details.available_seats
    );
    for stop in &details.stops {
        println!(
            "  stop {:?} at airport {}: {} -> {}",
            stop.name,
            stop.airport,
            stop.stop_time_begin.format(DATE_TIME_FORMAT),
            stop.stop_time_finish.format(DATE_TIME_FORMAT)
        );
    }
}

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let mut client = Client::connect(cli.server_uri, cli.token).await?;

    match cli.command {
        Command::Register {
            name,
            username,
            password,
            confirm,
        } => {
            client.register(name, username.clone(), password, confirm).await?;
            println!("registered {username}");
        }
        Command::Login { username, password } => {
            let session = client.login(username, password).await?;
            println!("logged in as {} ({:?})", session.name, session.role);
            println!("export BOOKING_TOKEN={}", session.token);
        }
        Command::Logout => {
            client.logout().await?;
            println!("logged out");
        }
        Command::Airports => {
            for airport in client.airports().await? {
                println!("{} {} ({})", airport.id, airport.name, airport.location);
            }
        }
        Command::Airlines => {
            for airline in client.airlines().await? {
                println!(
                    "{} {}: airport {} -> airport {}",
                    airline.id, airline.name, airline.from_airport, airline.to_airport
                );
            }
        }
        Command::Airplanes => {
            for plane in client.airplanes().await? {
                println!("{} {} ({} seats)", plane.id, plane.name, plane.total_seat);
            }
        }
        Command::Flights => {
            for flight in client.flights().await? {
                println!(
                    "{} {:?}: {} -> {} on plane {}, airline {}",
                    flight.id,
                    flight.name,
                    flight.departing_at.format(DATE_TIME_FORMAT),
                    flight.arriving_at.format(DATE_TIME_FORMAT),
                    flight.plane,
                    flight.airline
                );
            }
        }
        Command::Search { keyword, from, to } => {
            for summary in client.search_flights(keyword, from, to).await? {
                println!(
                    "{} {}: {} -> {}, {} seats left",
                    summary.flight.id,
                    summary.airline_name,
                    summary.flight.departing_at.format(DATE_TIME_FORMAT),
                    summary.flight.arriving_at.format(DATE_TIME_FORMAT),
                    summary.available_seats
                );
            }
        }
        Command::Flight { id } => {
            print_flight(&client.flight(FlightId::from_str(&id)).await?);
        }
        Command::CreateFlight { flight, stops } => {
            print_flight(&client.create_flight(flight.into(), stops).await?);
        }
        Command::EditFlight {
            current,
            flight,
            updated_stops,
            deleted_stops,
            new_stops,
        } => {
            let stop_edits = updated_stops
                .into_iter()
                .chain(
                    deleted_stops
                        .into_iter()
                        .map(|airport| StopEdit::Delete(AirportId(airport))),
                )
                .collect();
            let details = client
                .edit_flight(FlightId::from_str(&current), flight.into(), stop_edits, new_stops)
                .await?;
            print_flight(&details);
        }
        Command::DeleteFlight { id } => {
            client.delete_flight(FlightId::from_str(&id)).await?;
            println!("deleted flight {id}");
        }
        Command::Regulations { keyword } => {
            for regulation in client.regulations(keyword).await? {
                println!(
                    "{} {} = {} ({})",
                    regulation.id, regulation.name, regulation.value, regulation.description
                );
            }
        }
        Command::SetRegulation {
            name,
            value,
            id,
            description,
        } => {
            let regulation = client
                .set_regulation(Regulation {
                    id: RegulationId(id.unwrap_or_default()),
                    name,
                    value,
                    description,
                })
                .await?;
            println!("{} {} = {}", regulation.id, regulation.name, regulation.value);
        }
        Command::Book {
            flight,
            rank,
            passengers,
        } => {
            let receipt = client
                .book(FlightId::from_str(&flight), rank, passengers)
                .await?;
            for booked in &receipt.tickets {
                println!(
                    "ticket {} on {}, {}: {}",
                    booked.ticket.id, booked.ticket.flight, booked.seat_name, booked.ticket.price
                );
            }
            println!(
                "{} tickets, {} total",
                receipt.total_quantity, receipt.total_amount
            );
        }
        Command::Tickets => {
            for booked in client.tickets().await? {
                println!(
                    "ticket {} on {}, {}, rank {}: {} (booked {})",
                    booked.ticket.id,
                    booked.ticket.flight,
                    booked.seat_name,
                    booked.ticket.rank,
                    booked.ticket.price,
                    booked.ticket.date.format(DATE_TIME_FORMAT)
                );
            }
        }
        Command::Stats { airline, month } => {
            let report = client.revenue(airline, month).await?;
            for row in &report.rows {
                let revenue = row
                    .revenue
                    .map(|revenue| revenue.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{} {}: {} over {} flights",
                    row.airline, row.airline_name, revenue, row.flight_count
                );
            }
            println!("total {}", report.total);
        }
        Command::Watch => {
            let mut events = client.watch();
            while let Some(event) = events.next().await {
                println!(
                    "{:?} {} {:?}",
                    event.kind, event.flight.id, event.flight.name
                );
            }
        }
    }

    Ok(())
}
