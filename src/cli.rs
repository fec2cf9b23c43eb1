use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Collect links, scrape every listing, then normalize.
    Run(RunArgs),
    /// Scroll the result feed and write a `products_*.json` links file.
    Collect(CollectArgs),
    /// Scrape the listings of a links file into the raw record log.
    Details(DetailsArgs),
    /// Rewrite a raw record log into the canonical schema.
    Normalize(NormalizeArgs),
}

#[derive(Debug, Clone, Args)]
pub struct BrowserArgs {
    /// Show the browser window.
    #[arg(long)]
    pub headed: bool,

    /// YAML selector profile overriding the built-in selectors.
    #[arg(long)]
    pub profile: Option<String>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Search keyword, e.g. "cafe rabat".
    #[arg(long)]
    pub keyword: String,

    /// Output file key. Derived from the keyword when omitted.
    #[arg(long)]
    pub key: Option<String>,

    /// Output directory shared by every stage.
    #[arg(long, default_value = "out")]
    pub out: String,

    /// Reuse the newest existing links file instead of scrolling the feed.
    #[arg(long)]
    pub skip_collect: bool,

    /// Maximum scroll commands before collection stops.
    #[arg(long, default_value_t = 60)]
    pub max_scroll_loops: u32,

    #[command(flatten)]
    pub browser: BrowserArgs,
}

#[derive(Debug, Args)]
pub struct CollectArgs {
    /// Search keyword, e.g. "cafe rabat".
    #[arg(long)]
    pub keyword: String,

    /// Output directory for the links file.
    #[arg(long, default_value = "out")]
    pub out: String,

    /// Maximum scroll commands before collection stops.
    #[arg(long, default_value_t = 60)]
    pub max_scroll_loops: u32,

    /// Keep anchors of every class, not only the first anchor's.
    #[arg(long)]
    pub no_class_filter: bool,

    #[command(flatten)]
    pub browser: BrowserArgs,
}

#[derive(Debug, Args)]
pub struct DetailsArgs {
    /// Search keyword the links were collected for.
    #[arg(long)]
    pub keyword: String,

    /// Output file key. Derived from the keyword when omitted.
    #[arg(long)]
    pub key: Option<String>,

    /// Output directory holding the links file and the record log.
    #[arg(long, default_value = "out")]
    pub out: String,

    /// Links file to scrape. Defaults to the newest `products_*.json` in `--out`.
    #[arg(long)]
    pub links: Option<String>,

    #[command(flatten)]
    pub browser: BrowserArgs,
}

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    /// Raw record log (JSON array).
    #[arg(long)]
    pub input: String,

    /// Output file. Printed to stdout when omitted.
    #[arg(long)]
    pub out: Option<String>,
}
