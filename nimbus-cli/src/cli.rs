use std::sync::Arc;

use anyhow::{Context, anyhow};
use chrono::Local;
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Select};
use nimbus_core::{
    Aggregator, Config, GeminiClient, Location, Planner, ProviderId, RefreshOutcome, Theme,
    WeatherSnapshot, WeatherStore,
    planner::{self, SUGGESTIONS},
    provider::{Geocoder, openweather::OpenWeatherClient},
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "nimbus", version, about = "Weather assistant CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the API key for a provider.
    Configure {
        /// Provider short name: openweather, openuv, waqi or gemini.
        provider: String,
    },

    /// Show current weather, UV and air quality for a location.
    Show {
        /// "City,Country"; defaults to the first configured location.
        location: Option<String>,

        /// Add an AI-written one-line summary.
        #[arg(long)]
        summary: bool,
    },

    /// Look up places by name.
    Search {
        query: String,

        #[arg(long, default_value_t = 5)]
        limit: u8,
    },

    /// Ask the activity planner a question about the weather.
    Ask {
        /// Question to ask; pick from suggestions when omitted.
        question: Option<String>,

        #[arg(long)]
        location: Option<String>,
    },

    /// UV and air-quality readings with health tips.
    Health {
        location: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Show { location, summary } => {
                let config = Config::load()?;
                let store = build_store(&config)?;
                let snapshot = fetch(&store, pick_location(&config, location)?).await?;
                print_snapshot(&snapshot, store.state().theme);

                if summary {
                    let gemini = gemini_client(&config)?;
                    match planner::one_shot(&gemini, planner::summary_prompt(&snapshot)).await {
                        Ok(text) => println!("\n{}", text.trim()),
                        Err(err) => tracing::warn!(error = %err, "summary unavailable"),
                    }
                }
                Ok(())
            }
            Command::Search { query, limit } => {
                let config = Config::load()?;
                let client = OpenWeatherClient::new(config.require_api_key(ProviderId::OpenWeather)?);
                let matches = client.geocode(&query, limit).await?;

                if matches.is_empty() {
                    println!("No places found for '{query}'.");
                }
                for m in matches {
                    println!(
                        "{:<40} {:>9.4} {:>10.4}   nimbus show \"{},{}\"",
                        m.label(),
                        m.lat,
                        m.lon,
                        m.name,
                        m.country
                    );
                }
                Ok(())
            }
            Command::Ask { question, location } => {
                let question = match question {
                    Some(q) => q,
                    None => Select::new("What would you like to ask?", SUGGESTIONS.to_vec())
                        .prompt()?
                        .to_string(),
                };

                let config = Config::load()?;
                let store = build_store(&config)?;
                let gemini = gemini_client(&config)?;

                // Without weather the planner still answers, just without context.
                let snapshot = match fetch(&store, pick_location(&config, location)?).await {
                    Ok(snapshot) => Some(snapshot),
                    Err(err) => {
                        eprintln!("Weather unavailable ({err}); answering without it.");
                        None
                    }
                };

                let mut planner = Planner::new(Arc::new(gemini));
                let answer = planner
                    .ask(&question, snapshot.as_deref())
                    .await
                    .context("Sorry, I had trouble reaching the planner. Please try again.")?;
                println!("{}", answer.trim());
                Ok(())
            }
            Command::Health { location } => {
                let config = Config::load()?;
                let store = build_store(&config)?;
                let gemini = gemini_client(&config)?;
                let snapshot = fetch(&store, pick_location(&config, location)?).await?;

                println!("Health for {}", snapshot.display_name());

                match &snapshot.uv {
                    Some(uv) => {
                        println!("\nUV index: {:.0} ({})", uv.index, uv.level());
                        print_tip(&gemini, planner::uv_tip_prompt(uv)).await;
                    }
                    None => println!("\nUV index: not configured"),
                }

                match &snapshot.air_quality {
                    Some(air) => {
                        println!("\nAir quality: {} ({})", air.aqi, air.level);
                        print_tip(&gemini, planner::air_quality_tip_prompt(air)).await;
                    }
                    None => println!("\nAir quality: no data from the nearest station"),
                }
                Ok(())
            }
        }
    }
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    let key = Password::new(&format!("{id} API key:"))
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()?;

    let key = key.trim().to_string();
    if key.is_empty() {
        return Err(anyhow!("API key must not be empty"));
    }

    config.upsert_provider_api_key(id, key);
    config.save()?;
    println!("Saved {id} key to {}", Config::config_file_path()?.display());
    Ok(())
}

/// Missing required keys fail here, before any request is made.
fn build_store(config: &Config) -> anyhow::Result<WeatherStore> {
    Ok(WeatherStore::new(Aggregator::from_config(config)?))
}

fn gemini_client(config: &Config) -> anyhow::Result<GeminiClient> {
    Ok(GeminiClient::new(
        config.require_api_key(ProviderId::Gemini)?,
        config.gemini_model.clone(),
    ))
}

fn pick_location(config: &Config, arg: Option<String>) -> anyhow::Result<Location> {
    match arg {
        Some(raw) => Ok(Location::parse(&raw)?),
        None => config
            .location_book()?
            .primary()
            .cloned()
            .ok_or_else(|| anyhow!("No location given and none configured in `locations`.")),
    }
}

async fn fetch(store: &WeatherStore, location: Location) -> anyhow::Result<Arc<WeatherSnapshot>> {
    store.set_active_location(location);
    match store.refresh().await {
        RefreshOutcome::Fetched(snapshot) | RefreshOutcome::AlreadyCurrent(snapshot) => Ok(snapshot),
        RefreshOutcome::Failed(err) => Err(err.into()),
        RefreshOutcome::NoActiveLocation | RefreshOutcome::Discarded => {
            Err(anyhow!("Weather refresh did not complete"))
        }
    }
}

async fn print_tip(gemini: &GeminiClient, prompt: String) {
    match planner::one_shot(gemini, prompt).await {
        Ok(tip) => println!("  {}", tip.trim()),
        Err(err) => {
            tracing::warn!(error = %err, "health tip unavailable");
            println!("  Could not get AI insight.");
        }
    }
}

fn print_snapshot(snapshot: &WeatherSnapshot, theme: Theme) {
    println!("{} ({})", snapshot.reported_name, snapshot.display_name());
    println!(
        "  {:.0}°C, feels like {:.0}°C, humidity {}%",
        snapshot.temperature_c, snapshot.feels_like_c, snapshot.humidity_pct
    );
    if let Some(condition) = &snapshot.condition {
        println!("  {} ({})", condition.description, condition.code);
    }

    if let Some(uv) = &snapshot.uv {
        let peak = uv
            .max_time_utc()
            .map(|t| format!(" at {}", t.with_timezone(&Local).format("%H:%M")))
            .unwrap_or_default();
        println!(
            "  UV {:.1} ({}), peaking at {:.1}{}",
            uv.index,
            uv.level(),
            uv.max,
            peak
        );
    }
    if let Some(air) = &snapshot.air_quality {
        println!("  AQI {} ({}) from {}", air.aqi, air.level, air.station);
    }

    println!(
        "  theme: {}, fetched {}",
        theme,
        snapshot.fetched_at.with_timezone(&Local).format("%H:%M:%S")
    );
}
