use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use blogroller::{viewer, Blogroll, BlogrollOptions, LoadStrategy, MemorySurface};

#[derive(Parser)]
#[command(name = "blogroller")]
#[command(about = "Blogroll reader for feed aggregator proxies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    /// Fetch every feed's latest post and paginate locally
    FanOut,
    /// Page through the feeds-shaped aggregate
    AllLatest,
    /// Page through the server-sorted digest
    Digest,
}

impl From<Strategy> for LoadStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::FanOut => LoadStrategy::FanOut,
            Strategy::AllLatest => LoadStrategy::AllLatest,
            Strategy::Digest => LoadStrategy::Digest,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Browse the blogroll in a terminal UI
    View {
        #[arg(short, long)]
        proxy_url: String,
        #[arg(short, long)]
        label: String,
        #[arg(short, long, default_value_t = 10)]
        batch_size: usize,
        #[arg(short, long, value_enum, default_value_t = Strategy::Digest)]
        strategy: Strategy,
        #[arg(short, long, default_value_t = 5)]
        concurrency: usize,
    },
    /// Print the blogroll to stdout
    List {
        #[arg(short, long)]
        proxy_url: String,
        #[arg(short, long)]
        label: String,
        #[arg(short, long, default_value_t = 10)]
        batch_size: usize,
        #[arg(short, long, value_enum, default_value_t = Strategy::Digest)]
        strategy: Strategy,
        #[arg(short, long, default_value_t = 5)]
        concurrency: usize,
        /// Stop after this many pages (default: all)
        #[arg(long)]
        pages: Option<usize>,
    },
}

fn build_options(
    proxy_url: String,
    label: String,
    batch_size: usize,
    strategy: Strategy,
    concurrency: usize,
) -> BlogrollOptions {
    BlogrollOptions::new(proxy_url, label)
        .with_batch_size(batch_size)
        .with_strategy(strategy.into())
        .with_concurrency(concurrency)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::View {
            proxy_url,
            label,
            batch_size,
            strategy,
            concurrency,
        } => {
            let options = build_options(proxy_url, label, batch_size, strategy, concurrency);
            let mut blogroll = Blogroll::connect(options, MemorySurface::default())?;
            blogroll.load_feeds().await;
            viewer::run_viewer(&mut blogroll).await?;
        }
        Commands::List {
            proxy_url,
            label,
            batch_size,
            strategy,
            concurrency,
            pages,
        } => {
            let options = build_options(proxy_url, label, batch_size, strategy, concurrency);
            let mut blogroll = Blogroll::connect(options, MemorySurface::default())?;
            blogroll.load_feeds().await;

            let cap = pages.unwrap_or(usize::MAX);
            let mut fetched = 1;
            while blogroll.has_more_feeds() && fetched < cap {
                blogroll.show_more().await;
                fetched += 1;
            }

            let surface = blogroll.surface();
            if let Some(notice) = surface.notice() {
                println!("{}", notice.message());
                return Ok(());
            }

            println!(
                "{} post(s) for label '{}':",
                surface.items().len(),
                blogroll.config().category_label
            );
            for item in surface.items() {
                println!();
                println!("{}", item.feed_title);
                println!("  {}", item.post_title);
                println!("  {} • {}", item.reading_time, item.relative_date);
                println!("  {}", item.post_url);
            }
        }
    }

    Ok(())
}
