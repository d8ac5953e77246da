use clap::{Parser, Subcommand};
use crawlbox::jobs::{FetchCharacterJob, FetchCharacterRangeJob, Job};
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "crawlbox")]
#[command(about = "Self-feeding character crawler", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to config/crawlbox.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the worker pool together with the HTTP surface
    Fetcher(FetcherArgs),
    /// Enqueue fetch jobs into the local queue
    Fetch {
        #[command(subcommand)]
        target: FetchTarget,
    },
}

#[derive(clap::Args, Debug)]
pub struct FetcherArgs {
    /// Override `worker.concurrency`
    #[arg(long)]
    pub concurrency: Option<NonZeroUsize>,

    /// Override `server.bind_addr`
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[derive(Subcommand, Debug)]
pub enum FetchTarget {
    /// One job per character id, starting at `id`
    Char {
        id: i64,
        #[arg(default_value_t = 1)]
        num: u32,
        /// Bypass the response cache
        #[arg(long)]
        force: bool,
    },
    /// A single range job that expands itself in chunks
    Range { start: i64, count: u32 },
}

impl FetchTarget {
    pub fn jobs(&self) -> Vec<Job> {
        match *self {
            FetchTarget::Char { id, num, force } => (0..i64::from(num))
                .map_while(|offset| id.checked_add(offset))
                .map(|id| {
                    if force {
                        FetchCharacterJob::forced(id).into()
                    } else {
                        FetchCharacterJob::new(id).into()
                    }
                })
                .collect(),
            FetchTarget::Range { start, count } => {
                vec![FetchCharacterRangeJob { start, count }.into()]
            }
        }
    }
}
