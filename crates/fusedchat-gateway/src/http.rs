use std::future::Future;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{middleware, Extension, Json, Router};
use fusedchat_proto::config::Config;
use fusedchat_proto::protocol::GenerateRequest;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::ai_service::{AiServiceClient, PodcastJob, Relayed};
use crate::assets::AssetStore;
use crate::auth::{require_user, USER_ID_HEADER};
use crate::credentials::{AccessRequestPolicy, CredentialPolicy};
use crate::error::{GatewayError, GatewayResult};
use crate::users::{UserDirectory, UserRecord};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserDirectory>,
    pub credentials: Arc<dyn CredentialPolicy>,
    /// None when no AI service URL is configured.
    pub ai_service: Option<AiServiceClient>,
    pub assets: AssetStore,
}

impl AppState {
    pub fn from_config(config: &Config, users: Arc<dyn UserDirectory>) -> Self {
        let ai_service = match config.ai_service.base_url() {
            Some(url) => match AiServiceClient::new(&url) {
                Ok(client) => Some(client),
                Err(e) => {
                    error!("Invalid AI service URL {:?}: {}", url, e);
                    None
                }
            },
            None => {
                warn!("No AI service URL configured; podcast endpoints will answer 503");
                None
            }
        };

        Self {
            users,
            credentials: Arc::new(AccessRequestPolicy::new(&config.operator)),
            ai_service,
            assets: AssetStore::new(config.storage.assets_dir.clone()),
        }
    }

    fn ai_service(&self) -> GatewayResult<&AiServiceClient> {
        self.ai_service
            .as_ref()
            .ok_or(GatewayError::ServiceUnavailable)
    }
}

pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let protected = Router::new()
        .route("/podcast/generate", post(generate_podcast))
        .route("/podcast/status/:task_id", get(podcast_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user));

    Router::new()
        .route("/", get(root))
        .nest("/api", protected)
        .layer(cors_layer(cors_origin))
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(USER_ID_HEADER)])
        .allow_credentials(true);

    match origin.parse::<HeaderValue>() {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            warn!("Invalid CORS origin {:?}; cross-origin requests disabled", origin);
            layer
        }
    }
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve(
    bind_address: &str,
    port: u16,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", bind_address, port);
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP API server listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("HTTP server closed");
    Ok(())
}

async fn root() -> &'static str {
    "Chatbot Backend API is running..."
}

async fn generate_podcast(
    State(state): State<AppState>,
    Extension(user): Extension<UserRecord>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> GatewayResult<Relayed> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Unreadable generate request: {}", rejection);
            GenerateRequest::default()
        }
    };

    let (server_filename, document_name) = match (
        non_blank(request.server_filename),
        non_blank(request.document_name),
    ) {
        (Some(file), Some(name)) => (file, name),
        _ => return Err(GatewayError::Validation("Missing required fields.".into())),
    };

    let ai_service = state.ai_service()?;

    let (credentials, source) = state.credentials.resolve_credentials(&user);
    if !credentials.has_gemini() {
        return Err(GatewayError::Authorization(
            "A Gemini API key is required for podcast scripting.".into(),
        ));
    }

    let file_path = state
        .assets
        .resolve(&user.username, &document_name, &server_filename)
        .await?;

    info!(
        "Starting podcast for {:?} (user {}, {:?} keys)",
        document_name, user.id, source
    );
    let job = PodcastJob::new(&file_path, &document_name, &credentials);
    ai_service.generate_podcast(&job).await
}

async fn podcast_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> GatewayResult<Relayed> {
    state.ai_service()?.podcast_status(&task_id).await
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
