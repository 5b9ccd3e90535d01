use std::sync::Arc;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::Parser;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pickview::affiliate::AffiliateClient;
use pickview::cli::{Cli, Commands};
use pickview::config::Config;
use pickview::database::Database;
use pickview::guide::OpenAiGuideWriter;
use pickview::models::KeywordTask;
use pickview::pick_finder::PickFinder;
use pickview::reviews::FeedbackClient;
use pickview::scraper::ProductScraper;
use pickview::scrapers;
use pickview::summarizer::OpenAiSummarizer;
use pickview::traits::SheetStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let database = Arc::new(Database::new(&config.database_url).await?);

    match cli.command {
        Commands::Run { date } => {
            let finder = build_finder(&config, database)?;
            let report = finder.run_for_date(date.unwrap_or_else(today)).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Schedule => schedule(&config, database).await?,
        Commands::AddTask { date, keyword } => {
            let task = KeywordTask::new(date.unwrap_or_else(today), keyword.trim());
            anyhow::ensure!(!task.keyword.is_empty(), "Keyword must not be empty");

            if database.add_task(&task).await? {
                info!(date = %task.date, keyword = %task.keyword, "Task added");
            } else {
                info!(date = %task.date, keyword = %task.keyword, "Task already exists");
            }
        }
        Commands::Results { date } => {
            for row in database.results_for_date(date.unwrap_or_else(today)).await? {
                println!("{}", serde_json::to_string(&row)?);
            }
        }
        Commands::Guides { date } => {
            for guide in database.guides_for_date(date.unwrap_or_else(today)).await? {
                println!("{}", serde_json::to_string(&guide)?);
            }
        }
    }

    Ok(())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn build_finder(config: &Config, store: Arc<Database>) -> Result<PickFinder> {
    let listing = scrapers::listing_config(&config.discovery)?;
    let browser = scrapers::browser_for(&config.discovery)?;
    let scraper = ProductScraper::new(
        browser,
        listing,
        config.discovery.strategy_wait(),
    );

    let reviews = FeedbackClient::new(config.reviews.clone(), &config.discovery.user_agent)?;
    let summarizer = OpenAiSummarizer::new(config.summarizer.clone())?;

    let finder = PickFinder::new(
        scraper,
        Arc::new(reviews),
        Arc::new(summarizer),
        store,
        config.pipeline.clone(),
    );

    let finder = match &config.affiliate {
        Some(affiliate) => {
            info!("Affiliate credentials found, enrichment enabled");
            finder.with_enricher(Arc::new(AffiliateClient::new(affiliate.clone())?))
        }
        None => finder,
    };

    Ok(if config.pipeline.write_guides {
        finder.with_guide_writer(Arc::new(OpenAiGuideWriter::new(config.summarizer.clone())?))
    } else {
        finder
    })
}

async fn schedule(config: &Config, store: Arc<Database>) -> Result<()> {
    let finder = Arc::new(build_finder(config, store)?);

    // Run once immediately
    if let Err(e) = finder.run_for_date(today()).await {
        error!("Error during initial run: {}", e);
    }

    let sched = JobScheduler::new().await?;

    let job_finder = Arc::clone(&finder);
    sched
        .add(Job::new_async(config.schedule_cron.as_str(), move |_uuid, _l| {
            let finder = Arc::clone(&job_finder);
            Box::pin(async move {
                if let Err(e) = finder.run_for_date(today()).await {
                    error!("Error during scheduled run: {}", e);
                }
            })
        })?)
        .await?;

    info!(cron = %config.schedule_cron, "Scheduler started");
    sched.start().await?;

    // Keep the program running
    loop {
        tokio::time::sleep(tokio::time::Duration::from_secs(30)).await;
    }
}
