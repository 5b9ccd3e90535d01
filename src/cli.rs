use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pickview")]
#[command(about = "Finds top products per keyword and summarizes their reviews", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process the tasks scheduled for a date once
    Run {
        /// Task date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Run today's tasks now and then on SCHEDULE_CRON
    Schedule,
    /// Add a keyword to the task list
    AddTask {
        /// Task date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Search keyword
        #[arg(short, long)]
        keyword: String,
    },
    /// Print stored results as JSON lines
    Results {
        /// Result date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Print stored buying guides as JSON lines
    Guides {
        /// Guide date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
}
