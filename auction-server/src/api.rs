use {
    crate::{
        auction,
        bid,
        config::RunOptions,
        server::SHOULD_EXIT,
    },
    anyhow::Result,
    axum::{
        http::StatusCode,
        response::{
            IntoResponse,
            Response,
        },
        routing::get,
        Router,
    },
    clap::crate_version,
    self::ws::SessionRegistry,
    std::sync::{
        atomic::Ordering,
        Arc,
    },
    tokio::time::sleep,
};

pub mod ws;

#[derive(Clone, Debug)]
pub enum RestError {
    /// The request contained invalid parameters.
    BadParameters(String),
    /// The auction was not found.
    AuctionNotFound,
    /// The auction is over; no further sessions are admitted.
    AuctionClosed,
    /// The server cannot currently reach its stores.
    TemporarilyUnavailable,
    /// A catch-all for everything else that can go wrong while processing
    /// the request.
    Unknown,
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        match self {
            RestError::BadParameters(msg) => {
                (StatusCode::BAD_REQUEST, format!("Bad parameters: {}", msg)).into_response()
            }
            RestError::AuctionNotFound => (
                StatusCode::NOT_FOUND,
                "Auction with the specified id was not found",
            )
                .into_response(),
            RestError::AuctionClosed => {
                (StatusCode::FORBIDDEN, "Auction has already ended").into_response()
            }
            RestError::TemporarilyUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "This service is temporarily unavailable",
            )
                .into_response(),
            RestError::Unknown => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unknown error occurred processing the request",
            )
                .into_response(),
        }
    }
}

pub struct ApiState {
    pub lifecycle: auction::service::Service,
    pub bids:      bid::service::Service,
    pub registry:  Arc<SessionRegistry>,
}

async fn root() -> String {
    format!("Auction Server API {}", crate_version!())
}

async fn live() -> StatusCode {
    StatusCode::OK
}

pub async fn start_api(run_options: RunOptions, state: Arc<ApiState>) -> Result<()> {
    let app: Router = Router::new()
        .route("/", get(root))
        .route("/live", get(live))
        .route("/v1/ws/auctions/:auction_id", get(ws::ws_route_handler))
        .with_state(state);

    tracing::info!(listen_addr = %run_options.server.listen_addr, "Starting API server...");
    let listener = tokio::net::TcpListener::bind(&run_options.server.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            while !SHOULD_EXIT.load(Ordering::Acquire) {
                sleep(crate::server::EXIT_CHECK_INTERVAL).await;
            }
            tracing::info!("Shutting down API server...");
        })
        .await?;
    Ok(())
}
