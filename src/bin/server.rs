use anyhow::{Context, Result};
use dotenvy::dotenv;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use friendly_reminder::core::Config;
use friendly_reminder::database::Database;
use friendly_reminder::features::{
    ConfirmationWorkflow, CredentialVerifier, LogNotifier, Notifier, RateLimiter,
    ReminderScheduler, SmtpNotifier, SubscriptionService, TokenIssuer,
};
use friendly_reminder::http::{self, AppState};

/// How often expired pending registrations are purged.
const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env().context("failed to load configuration")?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting reminder server...");

    let database = Database::new(&config.database_path)
        .await
        .with_context(|| format!("failed to open database at {}", config.database_path))?;

    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => {
            info!("📧 Sending mail through {}:{}", smtp.host, smtp.port);
            Arc::new(SmtpNotifier::new(smtp).context("invalid SMTP configuration")?)
        }
        None => {
            warn!("SMTP_HOST not set, emails will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let issuer = Arc::new(
        TokenIssuer::new(config.jwt_secret.as_bytes(), config.token_ttl)
            .context("invalid JWT_SECRET")?,
    );

    let accounts = Arc::new(database.clone());
    let registration = ConfirmationWorkflow::new(
        accounts.clone(),
        accounts.clone(),
        notifier.clone(),
        config.confirm_url(),
    )
    .with_rate_limiter(RateLimiter::new(
        config.registration_rate_limit,
        config.registration_rate_window,
    ));
    let state = AppState::new(
        registration,
        CredentialVerifier::new(accounts.clone(), issuer),
        SubscriptionService::new(accounts.clone()),
        accounts.clone(),
    );

    let cancel = CancellationToken::new();

    // Reminder dispatcher
    let scheduler = ReminderScheduler::new(
        accounts.clone(),
        accounts.clone(),
        notifier,
        config.reminder_interval,
    );
    let scheduler_cancel = cancel.clone();
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(scheduler_cancel).await;
    });

    // Stale pending-registration sweep
    let sweeper_state = state.clone();
    let sweeper_cancel = cancel.clone();
    let ttl = config.pending_registration_ttl;
    let sweeper_handle = tokio::spawn(async move {
        sweeper_state
            .registration
            .run_sweeper(ttl, SWEEP_INTERVAL, sweeper_cancel)
            .await;
    });

    // Ctrl-C cancels everything
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => error!("Failed to listen for Ctrl-C: {e}"),
        }
        signal_cancel.cancel();
    });

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let served = http::serve(
        listener,
        http::router(state, &config.api_prefix),
        cancel.clone(),
    )
    .await;

    // Stop background loops even if the server failed on its own
    cancel.cancel();
    if let Err(e) = scheduler_handle.await {
        error!("Reminder dispatcher panicked: {e}");
    }
    if let Err(e) = sweeper_handle.await {
        error!("Registration sweeper panicked: {e}");
    }

    served.context("HTTP server failed")?;
    info!("Goodbye");
    Ok(())
}
