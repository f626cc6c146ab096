use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use sqlx::{postgres::{PgPoolOptions, PgConnectOptions}, sqlite::{SqlitePoolOptions, SqliteJournalMode, SqliteConnectOptions}};
use sqlx::{PgPool, SqlitePool, ConnectOptions};
use tracing::{info, warn};
use tracing::log::LevelFilter;

use crate::config::Config;
use crate::state::AppState;
use crate::domain::models::user::{Role, User};
use crate::domain::ports::{BookingRepository, ClassRepository, Clock, RefreshTokenRepository, UserRepository};
use crate::domain::services::{
    auth_service::{hash_password, AuthService},
    class_catalog::ClassCatalog,
    reservation_ledger::ReservationLedger,
};
use crate::error::AppError;
use crate::infra::clock::SystemClock;
use crate::infra::repositories::{
    postgres_booking_repo::PostgresBookingRepo, postgres_class_repo::PostgresClassRepo,
    postgres_refresh_token_repo::PostgresRefreshTokenRepo, postgres_user_repo::PostgresUserRepo,
    sqlite_booking_repo::SqliteBookingRepo, sqlite_class_repo::SqliteClassRepo,
    sqlite_refresh_token_repo::SqliteRefreshTokenRepo, sqlite_user_repo::SqliteUserRepo,
};

/// One repository per port, all sharing a pool.
pub struct Repositories {
    pub classes: Arc<dyn ClassRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub users: Arc<dyn UserRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,
}

pub async fn bootstrap_state(config: &Config) -> Result<AppState, AppError> {
    let repos = connect(config).await?;
    let state = assemble_state(config, repos, Arc::new(SystemClock))?;
    seed_admin(config, &state).await?;
    Ok(state)
}

/// Picks the backend from the `DATABASE_URL` scheme and runs its migrations.
pub async fn connect(config: &Config) -> Result<Repositories, AppError> {
    let database_url = &config.database_url;
    let lock_timeout = Duration::from_millis(config.lock_timeout_ms);

    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        info!("Initializing PostgreSQL connection...");

        let mut opts: PgConnectOptions = database_url.parse()?;
        opts = opts.log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(lock_timeout * 2)
            .connect_with(opts)
            .await?;

        run_postgres_migrations(&pool).await?;

        Ok(Repositories {
            classes: Arc::new(PostgresClassRepo::new(pool.clone(), lock_timeout)),
            bookings: Arc::new(PostgresBookingRepo::new(pool.clone(), lock_timeout)),
            users: Arc::new(PostgresUserRepo::new(pool.clone())),
            refresh_tokens: Arc::new(PostgresRefreshTokenRepo::new(pool)),
        })
    } else {
        info!("Initializing SQLite connection with WAL Mode...");

        let opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(lock_timeout)
            .log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(lock_timeout * 2)
            .connect_with(opts)
            .await?;

        run_sqlite_migrations(&pool).await?;

        Ok(Repositories {
            classes: Arc::new(SqliteClassRepo::new(pool.clone())),
            bookings: Arc::new(SqliteBookingRepo::new(pool.clone())),
            users: Arc::new(SqliteUserRepo::new(pool.clone())),
            refresh_tokens: Arc::new(SqliteRefreshTokenRepo::new(pool)),
        })
    }
}

pub fn assemble_state(config: &Config, repos: Repositories, clock: Arc<dyn Clock>) -> Result<AppState, AppError> {
    let default_timezone: chrono_tz::Tz = config.default_timezone.parse().map_err(|_| {
        AppError::InternalWithMsg(format!("Unknown DEFAULT_TIMEZONE '{}'", config.default_timezone))
    })?;

    let auth_service = Arc::new(AuthService::new(repos.refresh_tokens, config.clone())?);
    let catalog = Arc::new(ClassCatalog::new(repos.classes.clone(), clock.clone()));
    let ledger = Arc::new(ReservationLedger::new(repos.bookings, repos.classes, clock));

    Ok(AppState {
        config: config.clone(),
        default_timezone,
        catalog,
        ledger,
        user_repo: repos.users,
        auth_service,
    })
}

/// Creates the configured admin account on first start.
async fn seed_admin(config: &Config, state: &AppState) -> Result<(), AppError> {
    let (Some(username), Some(email), Some(password)) =
        (&config.admin_username, &config.admin_email, &config.admin_password)
    else {
        return Ok(());
    };

    if state.user_repo.find_by_username(username).await?.is_some() {
        return Ok(());
    }
    if state.user_repo.find_by_email(email).await?.is_some() {
        warn!("Bootstrap admin skipped: email {} already registered", email);
        return Ok(());
    }

    let user = User::new(username.clone(), email.clone(), hash_password(password)?, Role::Admin);
    let created = state.user_repo.create(&user).await?;
    info!(user_id = %created.id, "Bootstrap admin created");
    Ok(())
}

async fn run_postgres_migrations(pool: &PgPool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations/postgres")
        .run(pool)
        .await
        .map_err(|e| AppError::InternalWithMsg(format!("Postgres migrations failed: {e}")))
}

async fn run_sqlite_migrations(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations/sqlite")
        .run(pool)
        .await
        .map_err(|e| AppError::InternalWithMsg(format!("SQLite migrations failed: {e}")))
}
