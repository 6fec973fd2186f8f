#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI for checking delivery coverage.
//!
//! ```text
//! delivery_zones zones --zones zones.geojson
//! delivery_zones resolve --zones zones.geojson --lat 26.1445 --lng 91.7362 [--json]
//! delivery_zones setup --zones zones.geojson --lat 26.1445 --lng 91.7362 \
//!     [--deny-permission] [--no-gps] [--config setup.toml]
//! ```
//!
//! `setup` runs the same state machine the apps run, against a simulated
//! device at the given coordinate, and prints each status it passes
//! through. With the `postgres` feature, `--database` queries the
//! `delivery_zones` table at `DELIVERY_ZONES_DATABASE_URL` (falling back to
//! `DATABASE_URL`) instead of a `GeoJSON` file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use delivery_zones_location::{LocationProvider, PermissionOutcome, StaticLocationProvider};
use delivery_zones_models::Coordinate;
use delivery_zones_resolver::ZoneResolver;
use delivery_zones_setup::{SessionCache, SetupConfig, SetupStateMachine};
use delivery_zones_spatial::{GeometryStore, InMemoryZoneStore};

#[derive(Parser)]
#[command(name = "delivery_zones", about = "Check delivery coverage for a location")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ZoneSource {
    /// `GeoJSON` `FeatureCollection` of delivery zones
    #[arg(long)]
    zones: Option<PathBuf>,
    /// Query the `PostGIS` database at `DELIVERY_ZONES_DATABASE_URL` instead
    #[arg(long, conflicts_with = "zones")]
    database: bool,
}

#[derive(Args)]
struct Location {
    /// Latitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,
    /// Longitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    lng: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// List zones in a `GeoJSON` file
    Zones {
        /// `GeoJSON` `FeatureCollection` of delivery zones
        #[arg(long)]
        zones: PathBuf,
    },
    /// Resolve a coordinate to its delivery zone
    Resolve {
        #[command(flatten)]
        source: ZoneSource,
        #[command(flatten)]
        location: Location,
        /// Print the validation result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the full location-setup flow for a simulated device
    Setup {
        #[command(flatten)]
        source: ZoneSource,
        #[command(flatten)]
        location: Location,
        /// Answer the permission prompt with "deny"
        #[arg(long)]
        deny_permission: bool,
        /// Simulate a device with location services turned off
        #[arg(long)]
        no_gps: bool,
        /// Setup configuration TOML
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Zones { zones } => {
            let store = load_geojson(&zones)?;

            println!("{:<8} {:<8} NAME", "ID", "ACTIVE");
            println!("{}", "-".repeat(40));
            for zone in store.zones() {
                println!(
                    "{:<8} {:<8} {}",
                    zone.id.0,
                    if zone.is_active { "yes" } else { "no" },
                    zone.name
                );
            }
            println!("\n{} zone(s)", store.len());
        }
        Commands::Resolve {
            source,
            location,
            json,
        } => {
            let coordinate = Coordinate::new(location.lat, location.lng)?;
            let resolver = ZoneResolver::new(open_store(&source).await?);
            let result = resolver.resolve(coordinate).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                match result.matched_zone_id() {
                    Some(zone) => println!("{coordinate} is inside zone {zone}"),
                    None => println!("{coordinate} is not covered by any active zone"),
                }
            }
        }
        Commands::Setup {
            source,
            location,
            deny_permission,
            no_gps,
            config,
        } => {
            let coordinate = Coordinate::new(location.lat, location.lng)?;
            let config = SetupConfig::load(config.as_deref())?;
            let answer = if deny_permission {
                PermissionOutcome::Denied
            } else {
                PermissionOutcome::Granted
            };
            let device: Arc<dyn LocationProvider> = if no_gps {
                Arc::new(StaticLocationProvider::without_fix(answer))
            } else {
                Arc::new(StaticLocationProvider::new(coordinate, answer))
            };

            let machine = SetupStateMachine::new(
                device,
                ZoneResolver::new(open_store(&source).await?),
                Arc::new(SessionCache::new()),
                &config,
            );
            run_setup(&machine).await?;
        }
    }

    Ok(())
}

async fn run_setup(machine: &SetupStateMachine) -> Result<(), Box<dyn std::error::Error>> {
    let mut transitions = machine.subscribe_transitions();

    println!("{}", machine.status().name());
    machine.start().await;
    while let Ok(status) = transitions.try_recv() {
        println!("  -> {}", status.name());
    }

    let status = machine.status();
    println!("\n{}", serde_json::to_string_pretty(&status)?);
    if let Some(destination) = status.destination() {
        println!("\nRoute: {destination}");
    }
    if let Some(message) = status.unavailable_message() {
        println!("{message}");
    }

    Ok(())
}

fn load_geojson(path: &Path) -> Result<InMemoryZoneStore, Box<dyn std::error::Error>> {
    let geojson = std::fs::read_to_string(path)?;
    Ok(InMemoryZoneStore::from_geojson(&geojson)?)
}

async fn open_store(source: &ZoneSource) -> Result<Arc<dyn GeometryStore>, Box<dyn std::error::Error>> {
    if source.database {
        return open_database_store().await;
    }

    let Some(path) = &source.zones else {
        return Err("either --zones <file> or --database is required".into());
    };
    let store = load_geojson(path)?;
    log::info!("Loaded {} zone(s) from {}", store.len(), path.display());
    Ok(Arc::new(store))
}

#[cfg(feature = "postgres")]
async fn open_database_store() -> Result<Arc<dyn GeometryStore>, Box<dyn std::error::Error>> {
    log::info!("Connecting to database...");
    let db = delivery_zones_database::db::connect_from_env().await?;
    delivery_zones_database::run_migrations(db.as_ref()).await?;
    Ok(Arc::new(delivery_zones_database::PostgisZoneStore::new(
        Arc::from(db),
    )))
}

#[cfg(not(feature = "postgres"))]
#[allow(clippy::unused_async)]
async fn open_database_store() -> Result<Arc<dyn GeometryStore>, Box<dyn std::error::Error>> {
    Err("--database requires building with the `postgres` feature".into())
}
