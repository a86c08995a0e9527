use anyhow::Context;
use carpool_auth::AuthError;
use carpool_backend_api::{
    build_router,
    routes::models::{CreateRideRequest, CreateVehicleRequest, ListRidesQuery, Location},
    services::{ride, vehicle},
    AppState,
};
use carpool_backend_runtime::{shutdown_signal, telemetry, BackendServices};
use carpool_config::{load as load_config, AppConfig};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

const SEED_PASSWORD: &str = "carpool-demo";

#[derive(Parser)]
#[command(name = "carpool-backend")]
#[command(about = "Carpool backend (serves HTTP by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Insert a demo driver, passenger, vehicle and ride
    SeedData,
    /// Print row counts and upcoming rides
    DumpData,
    /// Delete every domain row, keeping the schema
    ClearData,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing().context("failed to initialise tracing")?;

    let config = load_config().context("failed to load configuration")?;
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(&config, services).await,
        Commands::SeedData => seed_data(&services).await,
        Commands::DumpData => dump_data(&services).await,
        Commands::ClearData => clear_data(&services).await,
    }
}

async fn run_server(config: &AppConfig, services: BackendServices) -> anyhow::Result<()> {
    info!("starting carpool backend");

    let state = AppState::new(services.db_pool, services.authenticator, services.maps)
        .with_matching(config.matching.clone())
        .with_impact(config.impact.clone());
    let app = build_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    info!("backend shut down");
    Ok(())
}

async fn seed_data(services: &BackendServices) -> anyhow::Result<()> {
    let authenticator = &services.authenticator;

    let driver = match authenticator
        .register_with_password("driver@carpool.local", SEED_PASSWORD, Some("Dora"), Some("Driver"))
        .await
    {
        Ok(user) => user,
        Err(AuthError::UserExists) => {
            println!("Demo data already present; run clear-data first to reseed");
            return Ok(());
        }
        Err(error) => return Err(error).context("failed to create demo driver"),
    };
    let passenger = authenticator
        .register_with_password("passenger@carpool.local", SEED_PASSWORD, Some("Pat"), Some("Passenger"))
        .await
        .context("failed to create demo passenger")?;

    let car = vehicle::create_vehicle(
        &services.db_pool,
        driver.id,
        CreateVehicleRequest {
            make: "Volkswagen".into(),
            model: "Touran".into(),
            year: Some(2019),
            color: Some("blue".into()),
            license_plate: "ZH 123 456".into(),
            seats: 4,
        },
    )
    .await
    .context("failed to create demo vehicle")?;

    let offered = ride::create_ride(
        &services.db_pool,
        services.maps.as_ref(),
        driver.id,
        CreateRideRequest {
            origin: Location {
                address: "Zürich HB".into(),
                lat: 47.3779,
                lng: 8.5403,
            },
            destination: Location {
                address: "Bern Bahnhof".into(),
                lat: 46.9489,
                lng: 7.4393,
            },
            waypoints: Vec::new(),
            departure_time: (Utc::now() + Duration::days(1)).to_rfc3339(),
            total_seats: 3,
            vehicle_id: Some(car.id.clone()),
            price_per_seat: 15.0,
            notes: Some("Demo ride".into()),
            route: None,
        },
    )
    .await
    .context("failed to create demo ride")?;

    println!("Seeded demo data (password: {SEED_PASSWORD}):");
    println!("- driver    {} driver@carpool.local", driver.public_id);
    println!("- passenger {} passenger@carpool.local", passenger.public_id);
    println!("- vehicle   {} {} {}", car.id, car.make, car.model);
    println!(
        "- ride      {} {} -> {} at {}",
        offered.ride.id,
        offered.ride.origin.address,
        offered.ride.destination.address,
        offered.ride.departure_time
    );
    Ok(())
}

async fn dump_data(services: &BackendServices) -> anyhow::Result<()> {
    let counts = carpool_database::table_counts(&services.db_pool)
        .await
        .context("failed to count rows")?;

    println!("=== TABLES ===");
    println!("{:<22} {:>8}", "Table", "Rows");
    println!("{}", "-".repeat(31));
    for (table, rows) in counts {
        println!("{table:<22} {rows:>8}");
    }

    let rides = ride::list_rides(&services.db_pool, ListRidesQuery::default())
        .await
        .context("failed to list upcoming rides")?;

    println!("\n=== UPCOMING RIDES ===");
    if rides.is_empty() {
        println!("No upcoming rides with free seats");
        return Ok(());
    }

    println!(
        "{:<26} {:<22} {:<24} {:<24} {:>5}",
        "ID", "Departure", "From", "To", "Free"
    );
    println!("{}", "-".repeat(105));
    for ride in rides {
        println!(
            "{:<26} {:<22} {:<24} {:<24} {:>2}/{:<2}",
            ride.id,
            ride.departure_time,
            truncate(&ride.origin.address, 23),
            truncate(&ride.destination.address, 23),
            ride.available_seats,
            ride.total_seats
        );
    }
    Ok(())
}

async fn clear_data(services: &BackendServices) -> anyhow::Result<()> {
    let removed = carpool_database::clear_domain_data(&services.db_pool)
        .await
        .context("failed to clear database")?;
    println!("Database cleared: {removed} rows deleted");
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    short.push_str("...");
    short
}
