use std::path::PathBuf;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use xhs_scrape::browser::BrowserSession;
use xhs_scrape::config::ScrapeConfig;
use xhs_scrape::error::Result;
use xhs_scrape::export;
use xhs_scrape::note::link::extract_note_url;
use xhs_scrape::note::model::{CommentRecord, NotePost};
use xhs_scrape::scrape::{collect_comments, NotePage};

const USAGE: &str = "usage: xhs_scrape [--headed] [--out FILE] <note url or share text>";

#[derive(Debug, PartialEq)]
struct CliArgs {
    headed: bool,
    out: Option<PathBuf>,
    input: String,
}

fn parse_args(args: impl Iterator<Item = String>) -> Option<CliArgs> {
    let mut headed = false;
    let mut out: Option<PathBuf> = None;
    let mut input: Option<String> = None;

    let mut args = args;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--headed" => headed = true,
            "--out" => out = Some(PathBuf::from(args.next()?)),
            // Share text can contain spaces; join everything positional.
            _ => {
                input = Some(match input {
                    Some(prev) => format!("{} {}", prev, arg),
                    None => arg,
                })
            }
        }
    }

    Some(CliArgs {
        headed,
        out,
        input: input?,
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let Some(args) = parse_args(std::env::args().skip(1)) else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    if let Err(e) = run(&args.input, args.headed, args.out).await {
        error!(error = %e, "scrape failed");
        std::process::exit(1);
    }
}

async fn run(input: &str, headed: bool, out: Option<PathBuf>) -> Result<()> {
    let url = extract_note_url(input)?;

    let mut config = ScrapeConfig::default();
    if headed {
        config.headless = false;
    }
    config.validate()?;

    let mut session = BrowserSession::launch(&config).await?;
    let scraped = scrape_note(&session, &config, &url).await;
    let closed = session.close().await;
    let (post, comments) = scraped?;
    closed?;

    let collected: usize = comments.iter().map(|c| 1 + c.replies.len()).sum();
    info!(title = %post.title, collected, "scrape complete");

    match out {
        Some(path) => {
            export::write_json(&path, &post, &comments)?;
            info!(path = %path.display(), "wrote export");
        }
        None => {
            let document = export::ExportDocument {
                post: &post,
                comments: export::flatten_rows(&comments),
            };
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
    }
    Ok(())
}

async fn scrape_note(
    session: &BrowserSession,
    config: &ScrapeConfig,
    url: &str,
) -> Result<(NotePost, Vec<CommentRecord>)> {
    let page = NotePage::open(session, config, url).await?;
    let post = page.read_post().await?;
    let mut surface = page;
    let comments = collect_comments(&mut surface, config).await?;
    Ok((post, comments))
}
