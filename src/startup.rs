use crate::configuration::{DatabaseSettings, Settings};
use crate::emails::TeraEmailRenderer;
use crate::release::{NewsletterReleaseScheduler, PgJobQueue, PgReleaseStore};
use crate::routes;
use crate::tokens::{PgTokenIssuer, TokenHasher};
use actix_web::{dev::Server, web, App, HttpServer};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::net::TcpListener;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    pub async fn build(configuration: Settings) -> Result<Self, anyhow::Error> {
        let connection_pool = get_connection_pool(&configuration.database);
        let scheduler = build_scheduler(&configuration, connection_pool)?;

        let address = format!(
            "{}:{}",
            configuration.application.host, configuration.application.port
        );
        let listener = TcpListener::bind(&address)?;
        //Retrieve the port assigned to us by the OS
        let port = listener.local_addr()?.port();
        let server = run(listener, scheduler)?;

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// A more expressive name that makes it clear that this function only returns when the application
    /// is stopped.
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn get_connection_pool(configuration: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(configuration.with_db())
}

/// Wires the Postgres-backed store, token issuer and job queue into a release scheduler.
pub fn build_scheduler(
    configuration: &Settings,
    pool: PgPool,
) -> Result<NewsletterReleaseScheduler<PgReleaseStore>, anyhow::Error> {
    let hasher = TokenHasher::new(configuration.tokens.signing_key.clone());
    let renderer = TeraEmailRenderer::new()?;
    Ok(NewsletterReleaseScheduler::new(
        PgReleaseStore::new(pool),
        Arc::new(PgTokenIssuer::new(hasher)),
        Arc::new(PgJobQueue),
        Arc::new(renderer),
        configuration
            .release_policy()
            .map_err(anyhow::Error::msg)?,
    ))
}

pub fn run(
    listener: TcpListener,
    scheduler: NewsletterReleaseScheduler<PgReleaseStore>,
) -> Result<Server, std::io::Error> {
    let scheduler = web::Data::new(scheduler);
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(routes::health_check))
            .route(
                "/admin/newsletters/{newsletter_id}/release",
                web::post().to(routes::release_newsletter),
            )
            .app_data(scheduler.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
