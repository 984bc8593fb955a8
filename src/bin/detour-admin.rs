use anyhow::{bail, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use detour::config::{Config, DatabaseBackend};
use detour::models::{NewFallbackCandidate, NewTargetLink};
use detour::routing::{next_candidate, normalize_list, RotationCursor};
use detour::storage::{PostgresStorage, SqliteStorage, Storage};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "detour-admin")]
#[command(about = "Detour link and fallback management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage target links
    Links {
        #[command(subcommand)]
        action: LinkAction,
    },
    /// Manage the fallback rotation pool
    Fallbacks {
        #[command(subcommand)]
        action: FallbackAction,
    },
    /// Show which fallback a visitor would be rotated to next
    Rotate {
        /// Visitor country name, e.g. "Germany"
        #[arg(long, default_value = "")]
        country: String,
        /// Last index shown to the visitor
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        cursor: i64,
    },
    /// List recorded clicks, newest first
    Clicks {
        /// Only clicks on this link
        #[arg(long)]
        link: Option<i64>,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[derive(Subcommand)]
enum LinkAction {
    /// Create a target link
    Add {
        url: String,
        #[arg(long)]
        title: Option<String>,
        /// Comma-separated allowed countries; omit for worldwide
        #[arg(long, value_delimiter = ',')]
        countries: Vec<String>,
        /// Destination for visitors outside the allowed countries
        #[arg(long)]
        fallback_link: Option<String>,
    },
    /// List target links
    List {
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
}

#[derive(Subcommand)]
enum FallbackAction {
    /// Add a URL to the rotation pool
    Add {
        url: String,
        /// Comma-separated allowed countries; omit for unrestricted
        #[arg(long, value_delimiter = ',')]
        countries: Vec<String>,
        #[arg(long, default_value_t = 0)]
        order: i64,
        /// Add the candidate without putting it in rotation
        #[arg(long)]
        inactive: bool,
    },
    /// List the rotation pool in rotation order
    List,
}

fn require_http(url: &str) -> Result<()> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("'{}' is not an absolute http(s) URL", url);
    }
    Ok(())
}

fn format_time(secs: i64) -> String {
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

fn format_countries(countries: &[String]) -> String {
    if countries.is_empty() {
        "(any)".to_string()
    } else {
        countries.join(",")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => Arc::new(
            SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
        DatabaseBackend::Postgres => Arc::new(
            PostgresStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
    };

    // Ensure database is initialized
    storage.init().await?;

    match cli.command {
        Commands::Links {
            action:
                LinkAction::Add {
                    url,
                    title,
                    countries,
                    fallback_link,
                },
        } => {
            require_http(&url)?;
            if let Some(fallback) = fallback_link.as_deref() {
                require_http(fallback)?;
            }
            let link = storage
                .create_link(&NewTargetLink {
                    title,
                    original_link: url,
                    country_permissions: normalize_list(&countries),
                    fallback_link,
                })
                .await?;
            println!("✓ Created link {} -> {}", link.id, link.original_link);
            println!("  Visitor URL: /go?id={}", link.id);
        }
        Commands::Links {
            action: LinkAction::List { limit },
        } => {
            let links = storage.list_links(limit.clamp(1, 500), 0).await?;
            if links.is_empty() {
                println!("No links found.");
            } else {
                println!("{:<6} {:<40} {:<30} {}", "ID", "URL", "Countries", "Created");
                println!("{}", "-".repeat(100));
                for link in links {
                    println!(
                        "{:<6} {:<40} {:<30} {}",
                        link.id,
                        link.original_link,
                        format_countries(&link.country_permissions),
                        format_time(link.created_at)
                    );
                }
            }
        }
        Commands::Fallbacks {
            action:
                FallbackAction::Add {
                    url,
                    countries,
                    order,
                    inactive,
                },
        } => {
            require_http(&url)?;
            let candidate = storage
                .create_candidate(&NewFallbackCandidate {
                    url,
                    allowed_countries: normalize_list(&countries),
                    display_order: order,
                    is_active: !inactive,
                })
                .await?;
            println!(
                "✓ Added fallback {} -> {} (order {})",
                candidate.id, candidate.url, candidate.display_order
            );
        }
        Commands::Fallbacks {
            action: FallbackAction::List,
        } => {
            let pool = storage.list_candidates(false).await?;
            if pool.is_empty() {
                println!("The fallback pool is empty.");
            } else {
                println!("{:<6} {:<6} {:<7} {:<40} {}", "ID", "Order", "Active", "URL", "Countries");
                println!("{}", "-".repeat(100));
                for candidate in pool {
                    println!(
                        "{:<6} {:<6} {:<7} {:<40} {}",
                        candidate.id,
                        candidate.display_order,
                        if candidate.is_active { "yes" } else { "no" },
                        candidate.url,
                        format_countries(&candidate.allowed_countries)
                    );
                }
            }
        }
        Commands::Rotate { country, cursor } => {
            let pool = storage.list_candidates(true).await?;
            let rotation = next_candidate(&pool, &country, RotationCursor(cursor));
            match rotation.next {
                Some(candidate) => println!(
                    "→ {} (candidate {}, next cursor {})",
                    candidate.url, candidate.id, rotation.next_index
                ),
                None => println!(
                    "⚠ No active fallback is available for '{}'; visitors see the region notice",
                    country
                ),
            }
        }
        Commands::Clicks { link, limit } => {
            let limit = limit.clamp(1, 500);
            let (total, clicks) = tokio::try_join!(
                storage.count_clicks(link),
                storage.list_clicks(link, limit, 0),
            )?;
            println!("{} click(s) recorded, showing {}", total, clicks.len());
            println!(
                "{:<20} {:<6} {:<8} {:<20} {}",
                "Time", "Link", "Device", "Country", "Session"
            );
            println!("{}", "-".repeat(100));
            for click in clicks {
                println!(
                    "{:<20} {:<6} {:<8} {:<20} {}",
                    format_time(click.created_at),
                    click.link_id,
                    click.device_type.as_str(),
                    click.country.as_deref().unwrap_or("-"),
                    click.session_id
                );
            }
        }
    }

    Ok(())
}
