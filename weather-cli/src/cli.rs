use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use weather_core::{
    CityId, CityManager, Config, FileStore, KeyValueStore, MemoryStore, Notice, client_from_config,
    load_detail, parse_coordinates,
};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-dashboard", version, about = "Track cities and their weather")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key (and optional language) in the config file.
    Configure,

    /// Add a city to the dashboard. The city is only added if the weather service knows it.
    Add {
        /// City name as you'd type it, e.g. "Kyiv".
        name: String,
    },

    /// Remove a city from the dashboard.
    Remove {
        /// City name (case-insensitive).
        city: String,
    },

    /// Refresh one city, or every city when none is given.
    Refresh {
        city: Option<String>,
    },

    /// Show all tracked cities.
    List {
        /// Show the stored data without refreshing first.
        #[arg(long)]
        no_refresh: bool,
    },

    /// Show the 3-hourly forecast for a tracked city or explicit coordinates.
    Forecast {
        /// Tracked city name.
        #[arg(conflicts_with_all = ["lat", "lon"], required_unless_present_all = ["lat", "lon"])]
        city: Option<String>,

        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<String>,

        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<String>,

        /// Number of days to show.
        #[arg(long, default_value_t = 1)]
        days: usize,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure()?,
            Command::Add { name } => {
                let manager = open_manager(&Config::load()?)?;
                let outcome = manager.add(&name).await;
                let notice = Notice::for_add(&name, &outcome);
                if notice.is_error() {
                    eprintln!("{}", render::notice(&notice));
                } else {
                    println!("{}", render::notice(&notice));
                }
                if let Ok(cities) = outcome {
                    let id = CityId::from_name(&name);
                    if let Some(city) = cities.iter().find(|c| c.id == id) {
                        println!("{}", render::card(city));
                    }
                }
            }
            Command::Remove { city } => {
                let manager = open_manager(&Config::load()?)?;
                let id = CityId::from_name(&city);
                if manager.get(&id).is_none() {
                    println!("City \"{}\" is not on the dashboard.", city.trim());
                } else {
                    manager.remove(&id);
                    println!("Removed \"{}\".", city.trim());
                }
            }
            Command::Refresh { city: Some(city) } => {
                let manager = open_manager(&Config::load()?)?;
                let id = CityId::from_name(&city);
                if manager.get(&id).is_none() {
                    bail!("City \"{}\" is not on the dashboard.", city.trim());
                }
                let cities = manager.refresh_one(&id).await;
                if let Some(city) = cities.iter().find(|c| c.id == id) {
                    println!("{}", render::card(city));
                }
            }
            Command::Refresh { city: None } => {
                let manager = open_manager(&Config::load()?)?;
                let cities = manager.refresh_all().await;
                println!("{}", render::dashboard(&cities));
            }
            Command::List { no_refresh } => {
                let manager = open_manager(&Config::load()?)?;
                // Like a page reload: bring every card up to date before showing it.
                let cities = if no_refresh || manager.is_empty() {
                    manager.cities()
                } else {
                    manager.refresh_all().await
                };
                println!("{}", render::dashboard(&cities));
            }
            Command::Forecast {
                city,
                lat,
                lon,
                days,
            } => {
                let config = Config::load()?;
                let coords = match (city, lat, lon) {
                    (Some(city), _, _) => {
                        let manager = open_manager(&config)?;
                        let id = CityId::from_name(&city);
                        let tracked = manager.get(&id).with_context(|| {
                            format!("City \"{}\" is not on the dashboard.", city.trim())
                        })?;
                        tracked.detail_route().with_context(|| {
                            format!(
                                "No coordinates known for \"{0}\" yet. \
                                 Hint: run `weather-dashboard refresh {0}`.",
                                tracked.display_name
                            )
                        })?
                    }
                    (None, Some(lat), Some(lon)) => parse_coordinates(&lat, &lon)?,
                    _ => bail!("Give a city name or both --lat and --lon."),
                };

                let client = client_from_config(&config)?;
                let mut view = load_detail(client.as_ref(), coords)
                    .await
                    .context("Error while loading forecast")?;
                view.show_days(days);
                println!("{}", render::forecast(&view));
            }
        }

        Ok(())
    }
}

fn open_manager(config: &Config) -> anyhow::Result<CityManager> {
    let client = client_from_config(config)?;

    let store: Arc<dyn KeyValueStore> = match config.resolve_data_dir() {
        Ok(dir) => {
            let store = FileStore::new(dir);
            tracing::debug!(dir = %store.dir().display(), "Using file store");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "No data directory; cities will not be saved");
            Arc::new(MemoryStore::new())
        }
    };

    Ok(CityManager::load(client, store))
}

fn configure() -> anyhow::Result<()> {
    // Only what is on disk; an environment override must not be written back.
    // A broken file is replaced rather than blocking the fix.
    let mut config = Config::load_file_or_default()?;

    let api_key = inquire::Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .prompt()
        .context("Failed to read API key")?;
    config.set_api_key(api_key);

    let lang = inquire::Text::new("Language for descriptions (optional, e.g. en, ua):")
        .with_default(config.lang.as_deref().unwrap_or(""))
        .prompt()
        .context("Failed to read language")?;
    config.lang = Some(lang.trim().to_string()).filter(|l| !l.is_empty());

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    if !config.is_configured() {
        println!("Warning: no API key stored; weather requests will fail until one is set.");
    }

    Ok(())
}
