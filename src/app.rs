//! Interactive session for cafescout
//!
//! This module contains the session state machine: it scrapes and stores the
//! state directory, walks the user from state to city, looks up and stores
//! the city's cafes, and runs the analysis menu. Input and output are generic
//! so the whole session can be driven from tests.

use std::io::{BufRead, Write};
use thiserror::Error;
use tracing::{info, warn};

use crate::cache::{CacheStore, FetchError, FetchMediator, Transport};
use crate::charts::{self, ChartError};
use crate::cli::{
    parse_city_number, parse_menu_choice, parse_rating, parse_state_choice, resolve_city, Choice,
    CliError, MenuChoice,
};
use crate::config::AppConfig;
use crate::data::{BusinessRecord, BusinessSearch, CityDirectory, ScrapeError, StateCities};
use crate::stats;
use crate::storage::{Database, StorageError};

/// Errors that can end the session or abort one action
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Chart(#[from] ChartError),

    #[error(transparent)]
    Cli(#[from] CliError),

    /// Reading the prompt or writing output failed
    #[error("Terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The directory page produced no states
    #[error("No states found in the city directory")]
    EmptyDirectory,
}

/// Where the session currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState {
    /// Waiting for a state name
    SelectState,
    /// Waiting for a city number within the state
    SelectCity(String),
    /// Analysis menu for a city
    CityMenu(String),
    /// The user asked to leave
    Exit,
}

/// Interactive session over a transport and a pair of streams
pub struct App<T: Transport, R: BufRead, W: Write> {
    /// Current session state
    pub state: AppState,
    config: AppConfig,
    mediator: FetchMediator<T>,
    db: Database,
    directory: CityDirectory,
    search: BusinessSearch,
    states: StateCities,
    input: R,
    output: W,
}

impl<T: Transport, R: BufRead, W: Write> App<T, R, W> {
    /// Loads the cache, opens the database and prepares the clients
    pub fn new(config: AppConfig, transport: T, input: R, output: W) -> Result<Self, AppError> {
        let store = CacheStore::load(&config.cache_file);
        info!(entries = store.len(), path = %config.cache_file.display(), "Cache ready");
        let db = Database::open(&config.database)?;

        Ok(Self {
            state: AppState::SelectState,
            mediator: FetchMediator::new(store, transport),
            db,
            directory: CityDirectory::new(&config.directory_url, &config.directory_origin),
            search: BusinessSearch::new(&config.search_url).with_term(&config.search_term),
            states: StateCities::default(),
            config,
            input,
            output,
        })
    }

    /// Returns the fetch mediator (cache statistics, store)
    pub fn mediator(&self) -> &FetchMediator<T> {
        &self.mediator
    }

    /// Returns the database handle
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Consumes the app and returns the output stream
    pub fn into_output(self) -> W {
        self.output
    }

    /// Scrapes the state directory and stores its cities
    pub async fn load_directory(&mut self) -> Result<&StateCities, AppError> {
        let states = self.directory.fetch_state_cities(&mut self.mediator).await?;
        if states.is_empty() {
            return Err(AppError::EmptyDirectory);
        }
        let inserted = self.db.save_cities(&states)?;
        info!(states = states.len(), inserted, "City directory stored");
        self.states = states;
        Ok(&self.states)
    }

    /// Looks up the cafes in `city` and stores them
    pub async fn load_city(&mut self, city: &str) -> Result<Vec<BusinessRecord>, AppError> {
        let businesses = self.search.businesses_in(&mut self.mediator, city).await?;
        let inserted = self.db.save_businesses(&businesses)?;
        info!(city, found = businesses.len(), inserted, "Cafes stored");
        Ok(businesses)
    }

    /// Runs the session until the user exits or input ends
    pub async fn run(&mut self) -> Result<(), AppError> {
        self.load_directory().await?;
        self.apply_initial_selection().await?;

        loop {
            self.state = match self.state.clone() {
                AppState::SelectState => self.prompt_state()?,
                AppState::SelectCity(state) => self.prompt_city(&state).await?,
                AppState::CityMenu(city) => self.prompt_menu(&city)?,
                AppState::Exit => break,
            };
        }

        let stats = self.mediator.stats();
        info!(hits = stats.hits, misses = stats.misses, "Session finished");
        Ok(())
    }

    /// Applies --state and --city
    async fn apply_initial_selection(&mut self) -> Result<(), AppError> {
        let Some(state_input) = self.config.initial_state.clone() else {
            return Ok(());
        };
        let state = match parse_state_choice(&state_input, &self.states)? {
            Choice::Value(state) => state,
            Choice::Exit => {
                self.state = AppState::Exit;
                return Ok(());
            }
        };

        self.state = match self.config.initial_city.clone() {
            Some(city_input) => {
                let city = resolve_city(&city_input, &state, &self.states)?;
                self.enter_city(&city).await?
            }
            None => AppState::SelectCity(state),
        };
        Ok(())
    }

    fn prompt_state(&mut self) -> Result<AppState, AppError> {
        let choice = ask(
            &mut self.input,
            &mut self.output,
            "Enter a state name (e.g. Michigan, michigan) or \"exit\": ",
            |line| parse_state_choice(line, &self.states),
        )?;
        Ok(match choice {
            Choice::Value(state) => AppState::SelectCity(state),
            Choice::Exit => AppState::Exit,
        })
    }

    async fn prompt_city(&mut self, state: &str) -> Result<AppState, AppError> {
        let cities: Vec<String> = self.states.cities(state).unwrap_or_default().to_vec();
        if cities.is_empty() {
            writeln!(self.output, "[Error] No cities listed for {}", state)?;
            return Ok(AppState::SelectState);
        }

        heading(&mut self.output, "Major Cities in this State.")?;
        for (i, city) in cities.iter().enumerate() {
            writeln!(self.output, "{}. {}", i + 1, city)?;
        }

        let question = format!(
            "To see different Cafes, please enter a city number from [1, {}] or \"exit\": ",
            cities.len()
        );
        let choice = ask(&mut self.input, &mut self.output, &question, |line| {
            parse_city_number(line, cities.len())
        })?;

        match choice {
            Choice::Value(index) => self.enter_city(&cities[index]).await,
            Choice::Exit => Ok(AppState::Exit),
        }
    }

    /// Loads and lists the cafes in `city`; lookup failures return to state selection
    async fn enter_city(&mut self, city: &str) -> Result<AppState, AppError> {
        let businesses = match self.load_city(city).await {
            Ok(businesses) => businesses,
            Err(e @ (AppError::Fetch(_) | AppError::Storage(_))) => {
                warn!(city, error = %e, "City lookup failed");
                writeln!(self.output, "[Error] Could not load cafes for {}: {}", city, e)?;
                writeln!(self.output)?;
                return Ok(AppState::SelectState);
            }
            Err(e) => return Err(e),
        };

        heading(&mut self.output, "Major Cafes in this city.")?;
        if businesses.is_empty() {
            writeln!(self.output, "No cafes found.")?;
        }
        for (i, business) in businesses.iter().enumerate() {
            writeln!(self.output, "{}. {}", i + 1, business)?;
        }
        Ok(AppState::CityMenu(city.to_string()))
    }

    fn prompt_menu(&mut self, city: &str) -> Result<AppState, AppError> {
        heading(&mut self.output, "Data processing or visualization")?;
        for (i, choice) in MenuChoice::all().iter().enumerate() {
            writeln!(self.output, "{}. {}", i + 1, choice.label())?;
        }

        let choice = ask(
            &mut self.input,
            &mut self.output,
            "Enter a choice to process/visualize data or 'exit': ",
            parse_menu_choice,
        )?;

        let choice = match choice {
            Choice::Value(MenuChoice::NewCity) => return Ok(AppState::SelectState),
            Choice::Value(choice) => choice,
            Choice::Exit => return Ok(AppState::Exit),
        };

        match self.run_action(city, choice) {
            Ok(true) => Ok(AppState::CityMenu(city.to_string())),
            Ok(false) => Ok(AppState::Exit),
            Err(e @ (AppError::Storage(_) | AppError::Chart(_))) => {
                warn!(city, error = %e, "Menu action failed");
                writeln!(self.output, "[Error] {}", e)?;
                Ok(AppState::CityMenu(city.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Runs one analysis; returns false if the user exited from a sub-prompt
    fn run_action(&mut self, city: &str, choice: MenuChoice) -> Result<bool, AppError> {
        let slug = charts::chart_slug(city);

        match choice {
            MenuChoice::AverageRating => {
                let rows = self.db.businesses_in_city(city)?;
                writeln!(self.output, "{}", stats::average_report(city, stats::average_rating(&rows)))?;
            }
            MenuChoice::BestCafe => {
                let rows = self.db.businesses_in_city(city)?;
                match stats::best_business(&rows) {
                    Some(best) => writeln!(self.output, "{}", stats::recommendation_report(best))?,
                    None => writeln!(self.output, "{}", stats::framed(&format!("No cafes stored for {}.", city)))?,
                }
            }
            MenuChoice::CafeMap => {
                let rows = self.db.businesses_in_city(city)?;
                let map = charts::business_map(city, &rows, self.config.mapbox_token.as_deref());
                let path = charts::write_chart(&self.config.output_dir, &format!("map_{}", slug), &map)?;
                self.announce(&format!("Cafes businesses map of {} city has generated!", city), &path)?;
            }
            MenuChoice::RatingDensity => {
                let rows = self.db.businesses_in_city(city)?;
                match charts::rating_density(city, &rows) {
                    Some(density) => {
                        let path = charts::write_chart(
                            &self.config.output_dir,
                            &format!("rating_density_{}", slug),
                            &density,
                        )?;
                        self.announce(&format!("Kde plot of rating in {} city", city), &path)?;
                    }
                    None => writeln!(self.output, "{}", stats::framed(&format!("Oops, no rated cafe in {}.", city)))?,
                }
            }
            MenuChoice::ReviewScatter => {
                let rows = self.db.businesses_in_city(city)?;
                let scatter = charts::review_scatter(city, &rows);
                let path = charts::write_chart(
                    &self.config.output_dir,
                    &format!("review_scatter_{}", slug),
                    &scatter,
                )?;
                self.announce(
                    &format!("Scatter plot of review number versus rating in {} city", city),
                    &path,
                )?;
            }
            MenuChoice::PricePie => {
                let rating = match ask(
                    &mut self.input,
                    &mut self.output,
                    "Please input a rating you are interested in [0.0,5.0], e.g. 4.5: ",
                    parse_rating,
                )? {
                    Choice::Value(rating) => rating,
                    Choice::Exit => return Ok(false),
                };
                let rows = self.db.businesses_with_rating(city, rating)?;
                match charts::price_pie(city, rating, &rows) {
                    Some(pie) => {
                        let path = charts::write_chart(
                            &self.config.output_dir,
                            &format!("price_pie_{}_{}", slug, rating),
                            &pie,
                        )?;
                        self.announce(&format!("Price levels of {} rated cafes in {} city", rating, city), &path)?;
                    }
                    None => writeln!(self.output, "{}", stats::framed(&format!("Oops, no cafe has {} rating.", rating)))?,
                }
            }
            MenuChoice::NewCity => {}
        }
        Ok(true)
    }

    fn announce(&mut self, title: &str, path: &std::path::Path) -> Result<(), AppError> {
        writeln!(self.output, "{}", stats::framed(title))?;
        writeln!(self.output, "Chart data written to {}", path.display())?;
        Ok(())
    }
}

/// Prompts until `parse` accepts a line; end of input counts as exit
fn ask<V, R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
    parse: impl Fn(&str) -> Result<Choice<V>, CliError>,
) -> Result<Choice<V>, AppError> {
    loop {
        write!(output, "{}", question)?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(Choice::Exit);
        }

        match parse(&line) {
            Ok(choice) => return Ok(choice),
            Err(e) => {
                writeln!(output, "[Error] {}", e)?;
                writeln!(output)?;
            }
        }
    }
}

/// Prints `title` between two dashed rules
fn heading<W: Write>(output: &mut W, title: &str) -> std::io::Result<()> {
    let rule = "-".repeat(title.chars().count());
    writeln!(output, "{}", rule)?;
    writeln!(output, "{}", title)?;
    writeln!(output, "{}", rule)
}
