use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use sqlx::MySqlPool;
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use hr_payroll::config::Config;
use hr_payroll::db::{init_db, run_migrations};
use hr_payroll::docs::ApiDoc;
use hr_payroll::routes;
use hr_payroll::services::deadline_check::{run_daily_scheduler, run_deadline_check};
use hr_payroll::services::notifier::{MessagingClient, NotificationQueue, run_worker};
use hr_payroll::utils::email_filter;

#[derive(Parser)]
#[command(name = "hr-payroll", version, about = "HR, payroll and attendance backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API and the daily deadline scheduler (default)
    Serve,
    /// Run the task deadline check once and exit
    CheckDeadlines {
        /// Day to check as, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Apply database migrations and exit
    Migrate,
}

#[get("/")]
async fn index() -> impl Responder {
    "HR payroll API is running"
}

fn init_tracing(config: &Config) -> WorkerGuard {
    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    guard
}

/// Starts the notification worker; the returned queue feeds it.
fn start_notifier(config: &Config) -> Result<(NotificationQueue, JoinHandle<()>)> {
    let client = MessagingClient::new(config).context("Failed to build messaging client")?;
    let (queue, receiver) = NotificationQueue::new(config.messaging_channel, &config.default_country_code);
    let worker = actix_web::rt::spawn(run_worker(client, receiver));
    Ok((queue, worker))
}

async fn check_deadlines(config: &Config, pool: &MySqlPool, date: Option<NaiveDate>) -> Result<()> {
    let today = date.unwrap_or_else(|| Local::now().date_naive());
    let (queue, worker) = start_notifier(config)?;

    let report = run_deadline_check(pool, &queue, today, config.deadline_reminder_days).await?;

    // closing the queue lets the worker drain and stop
    drop(queue);
    worker.await.context("Notification worker panicked")?;

    println!(
        "Deadline check for {today}: {} checked, {} marked overdue, {} overdue notices, {} reminders",
        report.checked, report.marked_overdue, report.overdue_notifications, report.reminders
    );
    Ok(())
}

async fn serve(config: Config, pool: MySqlPool) -> Result<()> {
    run_migrations(&pool).await?;

    let (queue, _worker) = start_notifier(&config)?;

    let pool_for_filter_warmup = pool.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = email_filter::warmup_email_filter(&pool_for_filter_warmup, 100).await {
            error!(error = %e, "Failed to warmup email filter");
        }
    });

    actix_web::rt::spawn(run_daily_scheduler(
        pool.clone(),
        queue.clone(),
        config.deadline_check_hour,
        config.deadline_reminder_days,
    ));

    // Clone values for the closure (avoid move issues)
    let server_addr = config.server_addr.clone();
    info!(%server_addr, "Server starting...");

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(queue.clone()))
            .service(index)
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config.clone()))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}

#[actix_web::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    let _guard = init_tracing(&config);

    let pool = init_db(&config.database_url).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, pool).await,
        Command::CheckDeadlines { date } => check_deadlines(&config, &pool, date).await,
        Command::Migrate => run_migrations(&pool).await,
    }
}
