//! db-pager - run SQL against SQLite, PostgreSQL or MySQL and page through
//! the result.

use db_pager::cli::Cli;
use db_pager::config::{Config, URL_ENV_VAR};
use db_pager::db::{self, Driver};
use db_pager::error::Result;
use db_pager::output;
use db_pager::query::{Paginator, Query, PAGE_SIZE};
use db_pager::logging::{self, LogTarget};
use db_pager::shell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    logging::init(if cli.is_one_shot() {
        LogTarget::Stderr
    } else {
        LogTarget::File
    });

    match run(cli).await {
        Ok(true) => {}
        // The statement failed; its error was printed as the result.
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}: {}", e.category(), e);
            eprintln!("{}: {}", e.category(), e);
            std::process::exit(1);
        }
    }
}

/// Returns false when a one-shot statement ended in an error.
async fn run(cli: Cli) -> Result<bool> {
    if let Err(e) = dotenvy::dotenv() {
        debug!("No .env file loaded: {e}");
    }

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let connection_string = config.resolve_connection_string(
        cli.connection_string.as_deref(),
        cli.connection_name(),
        std::env::var(URL_ENV_VAR).ok(),
    )?;
    let page_size = cli.page_size.or(config.page_size).unwrap_or(PAGE_SIZE);

    let mut driver = db::open(&connection_string).await?;

    let result = match cli.execute.as_deref() {
        Some(sql) => run_once(driver.as_ref(), sql, page_size, &cli).await,
        None => shell::run(driver.as_ref(), page_size, cli.format)
            .await
            .map(|()| true),
    };

    driver.close().await;
    result
}

/// Executes one statement and prints its first page, or all rows with `--all`.
async fn run_once(driver: &dyn Driver, sql: &str, page_size: usize, cli: &Cli) -> Result<bool> {
    let mut query = Query::new(driver, sql)?;
    query.execute().await;

    if cli.all {
        let cancel = CancellationToken::new();
        let watcher = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            }
        });

        let collected = query.collect_all(&cancel).await;
        watcher.abort();
        query.close().await;

        let collected = collected?;
        println!(
            "{}",
            output::render_all(cli.format, &query.keys(), &collected.rows, collected.complete)
        );
        Ok(query.error().is_none())
    } else {
        let mut pager = Paginator::with_page_size(query, page_size);
        pager.next_page().await;
        println!("{}", shell::render(&pager, cli.format));

        let succeeded = pager.query().error().is_none();
        pager.close().await;
        Ok(succeeded)
    }
}
