use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use questmap::claim::http::HttpClaimService;
use questmap::claim::workflow::Resolution;
use questmap::claim::{ClaimError, ClaimStatus, ClaimWorkflow};
use questmap::config::{AppConfig, ConfigError};
use questmap::entity::{EntityId, Position};
use questmap::fixtures;
use questmap::geo::{FixedLocation, GeoError, GeolocationProvider, provider_for};
use questmap::map::MarkerSync;
use questmap::map::headless::HeadlessEngine;
use questmap::notify::LogNotifier;
use questmap::session::{Session, SessionEvent};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Claim(#[from] ClaimError),
    #[error(transparent)]
    Geo(#[from] GeoError),
    #[error("token {0} is not on the map")]
    UnknownToken(String),
    #[error("claim did not succeed")]
    ClaimFailed,
}

#[derive(Parser, Debug)]
#[command(name = "questmap", about = "Headless quest map: locate, select a token and claim it")]
struct Cli {
    /// Id of the token to claim.
    #[arg(long, default_value = "1")]
    token: String,

    /// Device latitude; overrides `VIEWER_LATITUDE`.
    #[arg(long, requires = "longitude", allow_hyphen_values = true)]
    latitude: Option<f64>,

    /// Device longitude; overrides `VIEWER_LONGITUDE`.
    #[arg(long, requires = "latitude", allow_hyphen_values = true)]
    longitude: Option<f64>,

    /// Show other players on the map.
    #[arg(long)]
    include_users: bool,

    /// Show loot crates on the map.
    #[arg(long)]
    include_crates: bool,

    /// Select the token but do not submit a claim.
    #[arg(long)]
    no_claim: bool,

    #[arg(long, default_value = "map")]
    container: String,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let geolocation: Box<dyn GeolocationProvider> = match (cli.latitude, cli.longitude) {
        (Some(lat), Some(lon)) => provider_for(Some((lat, lon)))?,
        _ => match config.viewer_location {
            Some(position) => Box::new(FixedLocation(position)),
            None => provider_for(None)?,
        },
    };

    let service = HttpClaimService::new(&config.claim_service_url, config.claim_timeouts)?;
    tracing::info!(endpoint = service.endpoint(), "claim service configured");

    let workflow = ClaimWorkflow::new(config.claimant.clone(), Box::new(LogNotifier), config.claim_timeout());
    let markers = MarkerSync::new(HeadlessEngine::new(), config.map.clone());
    let mut session = Session::new(
        fixtures::viewer(),
        fixtures::entities(cli.include_users, cli.include_crates),
        markers,
        workflow,
        Arc::new(service),
    );

    if let Err(e) = session.mount(&cli.container) {
        tracing::warn!(error = %e, "continuing without a map");
    }

    session.locate(geolocation.as_ref()).await;
    session.drain();
    report_position(session.viewer().position);

    let target = EntityId::token(cli.token.clone());
    if !session.click(&target) {
        // Without a mounted map there is no marker to tap; select directly.
        let entity = session
            .entities()
            .iter()
            .find(|e| e.entity_id() == target)
            .cloned()
            .ok_or_else(|| CliError::UnknownToken(cli.token.clone()))?;
        session.sender().send(SessionEvent::MarkerClicked(entity)).ok();
    }
    session.drain();

    if session.workflow().status() != ClaimStatus::Selected {
        session.unmount();
        return Err(CliError::UnknownToken(cli.token));
    }
    if let Some(entity) = session.workflow().selected() {
        println!("selected {}", entity.display_name());
    }

    let outcome = if cli.no_claim {
        None
    } else {
        session.handle(SessionEvent::ClaimRequested);
        session.await_claim().await
    };
    session.unmount();

    match outcome {
        Some(Resolution::Succeeded(receipt)) => {
            println!("claimed: {} ({})", receipt.reference, receipt.transaction_url);
            Ok(())
        }
        Some(_) => Err(CliError::ClaimFailed),
        None => Ok(()),
    }
}

fn report_position(position: Position) {
    if position == Position::ORIGIN {
        println!("position unknown; using placeholder");
    } else {
        let (lon, lat) = position.lng_lat();
        println!("located at {lat:.5}, {lon:.5}");
    }
}
