use axum::{
    http::{header, Method},
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any); // TODO: restrict to the school's app origins in production

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        // Auth endpoints (mixed: some public, some protected)
        .nest("/api/v1/auth", auth_routes(app_state.clone()))
        // Role-scoped endpoints (require JWT + role guard)
        .nest(
            "/api/v1/tutor",
            tutor_routes()
                .route_layer(middleware::from_fn(
                    middlewares::auth::tutor_guard_middleware,
                ))
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        .nest(
            "/api/v1/maestro",
            maestro_routes()
                .route_layer(middleware::from_fn(
                    middlewares::auth::maestro_guard_middleware,
                ))
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        .nest(
            "/admin",
            admin_routes()
                .route_layer(middleware::from_fn(
                    middlewares::auth::admin_guard_middleware,
                ))
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn auth_routes(
    app_state: std::sync::Arc<services::AppState>,
) -> Router<std::sync::Arc<services::AppState>> {
    let public_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/forgot-password", post(handlers::auth::forgot_password));

    let protected_routes = Router::new()
        .route("/me", get(handlers::auth::me))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ));

    public_routes.merge(protected_routes)
}

fn tutor_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/hijos", get(handlers::tutor::list_hijos))
        .route(
            "/hijos/{id}/profesores",
            get(handlers::tutor::list_profesores),
        )
        .route(
            "/profesores/{id}/horarios",
            get(handlers::tutor::list_horarios_profesor),
        )
        .route(
            "/citas",
            get(handlers::tutor::list_citas).post(handlers::tutor::agendar_cita),
        )
        .route(
            "/citas/anteriores",
            get(handlers::tutor::list_citas_anteriores),
        )
        .route("/citas/{id}", patch(handlers::tutor::modificar_cita))
        .route("/citas/{id}/cancelar", post(handlers::tutor::cancelar_cita))
        .route(
            "/citas/{id}/retroalimentacion",
            post(handlers::tutor::retroalimentar_cita),
        )
        .route("/buzon", get(handlers::tutor::buzon))
}

fn maestro_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route(
            "/horarios",
            get(handlers::maestro::list_horarios).put(handlers::maestro::set_horarios),
        )
        .route(
            "/citas/pendientes",
            get(handlers::maestro::citas_pendientes),
        )
        .route(
            "/citas",
            get(handlers::maestro::list_citas).post(handlers::maestro::agendar_cita),
        )
        .route(
            "/citas/anteriores",
            get(handlers::maestro::list_citas_anteriores),
        )
        .route("/citas/{id}", patch(handlers::maestro::modificar_cita))
        .route("/citas/{id}/aceptar", post(handlers::maestro::aceptar_cita))
        .route(
            "/citas/{id}/rechazar",
            post(handlers::maestro::rechazar_cita),
        )
        .route(
            "/citas/{id}/realizada",
            post(handlers::maestro::marcar_realizada),
        )
        .route(
            "/citas/{id}/no-realizada",
            post(handlers::maestro::marcar_no_realizada),
        )
        .route(
            "/citas/{id}/cancelar",
            post(handlers::maestro::cancelar_cita),
        )
        .route("/tutores", get(handlers::maestro::list_tutores))
        .route(
            "/mensajes",
            get(handlers::maestro::list_mensajes).post(handlers::maestro::enviar_mensaje),
        )
        .route(
            "/mensajes/{id}",
            delete(handlers::maestro::eliminar_mensaje),
        )
}

fn admin_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        // User management
        .route(
            "/users",
            get(handlers::admin::list_users).post(handlers::admin::create_user),
        )
        .route(
            "/users/{id}",
            get(handlers::admin::get_user).patch(handlers::admin::update_user),
        )
        .route(
            "/users/{id}/desactivar",
            post(handlers::admin::deactivate_user),
        )
        .route(
            "/users/{id}/reactivar",
            post(handlers::admin::reactivate_user),
        )
        // Appointments
        .route(
            "/citas",
            get(handlers::admin::list_citas).post(handlers::admin::agendar_cita),
        )
        .route("/citas/directora", get(handlers::admin::citas_directora))
        .route(
            "/citas/anteriores",
            get(handlers::admin::list_citas_anteriores),
        )
        .route("/citas/{id}", patch(handlers::admin::modificar_cita))
        .route("/citas/{id}/cancelar", post(handlers::admin::cancelar_cita))
        // Messaging
        .route(
            "/mensajes",
            get(handlers::admin::list_mensajes).post(handlers::admin::enviar_mensaje),
        )
        .route("/mensajes/{id}", delete(handlers::admin::eliminar_mensaje))
}
