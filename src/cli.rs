//! Command-line interface parsing for cafescout
//!
//! This module handles parsing of CLI arguments using clap, and the
//! validation of each answer typed at the interactive prompts. Every prompt
//! accepts `exit` to leave the program.

use clap::{ArgAction, Parser};
use std::path::PathBuf;
use thiserror::Error;

use crate::data::StateCities;

/// Word that ends the session at any prompt
pub const EXIT_WORD: &str = "exit";

/// Error types for CLI argument and prompt parsing
#[derive(Debug, Error, PartialEq)]
pub enum CliError {
    /// The state name is not in the scraped directory
    #[error("Enter proper state name")]
    UnknownState(String),

    /// The city number is outside the listed range
    #[error("Enter proper city number from [1, {max}]")]
    InvalidCityNumber { input: String, max: usize },

    /// The menu choice is not one of the listed options
    #[error("Enter proper number from [1, {}]", MenuChoice::all().len())]
    InvalidMenuChoice(String),

    /// The rating is not a number in [0.0, 5.0]
    #[error("Input is not a rating in [0.0, 5.0]: '{0}'")]
    InvalidRating(String),

    /// A city passed with --city is not listed for the chosen state
    #[error("City '{city}' is not listed for {state}")]
    UnknownCity { city: String, state: String },

    /// --city was given without --state
    #[error("--city requires --state")]
    CityWithoutState,
}

/// Cafescout - find coffee shops in U.S. cities and summarize them
#[derive(Parser, Debug)]
#[command(name = "cafescout")]
#[command(about = "Coffee shop discovery with cached lookups, ratings and charts")]
#[command(version)]
pub struct Cli {
    /// Path of the JSON request cache (default: data directory)
    #[arg(long, value_name = "FILE")]
    pub cache_file: Option<PathBuf>,

    /// Path of the SQLite database (default: data directory)
    #[arg(long, value_name = "FILE")]
    pub database: Option<PathBuf>,

    /// Directory where chart files are written (default: data directory)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// API key for the business-search service
    #[arg(long, env = "YELP_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Access token embedded in map charts
    #[arg(long, env = "MAPBOX_TOKEN", hide_env_values = true)]
    pub mapbox_token: Option<String>,

    /// Start with this state selected
    ///
    /// Examples:
    ///   cafescout --state michigan
    ///   cafescout --state michigan --city "Ann Arbor"
    #[arg(long, value_name = "STATE")]
    pub state: Option<String>,

    /// Start with this city selected (requires --state)
    #[arg(long, value_name = "CITY")]
    pub city: Option<String>,

    /// Increase log verbosity (default info shows cache hits and fetches; -v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Checks flag combinations that clap cannot express
    pub fn validate(&self) -> Result<(), CliError> {
        if self.city.is_some() && self.state.is_none() {
            return Err(CliError::CityWithoutState);
        }
        Ok(())
    }
}

/// An answer to a prompt: a valid value, or a request to leave
#[derive(Debug, Clone, PartialEq)]
pub enum Choice<T> {
    Value(T),
    Exit,
}

/// Options of the analysis menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    /// Average rating of the cafes in the city
    AverageRating,
    /// Best cafe by rating, then review count
    BestCafe,
    /// Map of the cafes
    CafeMap,
    /// Kernel density of ratings
    RatingDensity,
    /// Rating against review count
    ReviewScatter,
    /// Price tiers among cafes with a chosen rating
    PricePie,
    /// Go back to state selection
    NewCity,
}

impl MenuChoice {
    /// All options in menu order
    pub fn all() -> &'static [MenuChoice] {
        &[
            MenuChoice::AverageRating,
            MenuChoice::BestCafe,
            MenuChoice::CafeMap,
            MenuChoice::RatingDensity,
            MenuChoice::ReviewScatter,
            MenuChoice::PricePie,
            MenuChoice::NewCity,
        ]
    }

    /// Menu text for the option
    pub fn label(&self) -> &'static str {
        match self {
            MenuChoice::AverageRating => "Average rating of the cafes we queried.",
            MenuChoice::BestCafe => "The best cafe we recommend.",
            MenuChoice::CafeMap => "Cafes businesses map in this city.",
            MenuChoice::RatingDensity => "Kernel density distribution of rating of cafes in this city.",
            MenuChoice::ReviewScatter => "Scatter plot of rating and review number of cafes in this city.",
            MenuChoice::PricePie => "Plot price pie chart based on rating.",
            MenuChoice::NewCity => "Choose a new city.",
        }
    }

    /// Option for a 1-based menu number
    pub fn from_number(number: usize) -> Option<MenuChoice> {
        number
            .checked_sub(1)
            .and_then(|i| Self::all().get(i))
            .copied()
    }
}

fn is_exit(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case(EXIT_WORD)
}

/// Parses a state name, matched case-insensitively against the directory
///
/// # Returns
/// * `Ok(Choice::Value(state))` with the lower-cased state name
/// * `Ok(Choice::Exit)` if the input is `exit`
/// * `Err(CliError::UnknownState)` if the state is not listed
pub fn parse_state_choice(input: &str, states: &StateCities) -> Result<Choice<String>, CliError> {
    if is_exit(input) {
        return Ok(Choice::Exit);
    }
    let state = input.trim().to_lowercase();
    if states.contains_state(&state) {
        Ok(Choice::Value(state))
    } else {
        Err(CliError::UnknownState(input.trim().to_string()))
    }
}

/// Parses a 1-based city number into a 0-based index below `count`
pub fn parse_city_number(input: &str, count: usize) -> Result<Choice<usize>, CliError> {
    if is_exit(input) {
        return Ok(Choice::Exit);
    }
    match input.trim().parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Ok(Choice::Value(n - 1)),
        _ => Err(CliError::InvalidCityNumber {
            input: input.trim().to_string(),
            max: count,
        }),
    }
}

/// Parses a 1-based analysis menu number
pub fn parse_menu_choice(input: &str) -> Result<Choice<MenuChoice>, CliError> {
    if is_exit(input) {
        return Ok(Choice::Exit);
    }
    input
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(MenuChoice::from_number)
        .map(Choice::Value)
        .ok_or_else(|| CliError::InvalidMenuChoice(input.trim().to_string()))
}

/// Parses a rating in [0.0, 5.0]
pub fn parse_rating(input: &str) -> Result<Choice<f64>, CliError> {
    if is_exit(input) {
        return Ok(Choice::Exit);
    }
    match input.trim().parse::<f64>() {
        Ok(r) if (0.0..=5.0).contains(&r) => Ok(Choice::Value(r)),
        _ => Err(CliError::InvalidRating(input.trim().to_string())),
    }
}

/// Resolves a city name given with --city against the state's listing
///
/// Matching ignores case; the listed spelling is returned.
pub fn resolve_city(city: &str, state: &str, states: &StateCities) -> Result<String, CliError> {
    states
        .cities(state)
        .and_then(|cities| {
            cities
                .iter()
                .find(|c| c.eq_ignore_ascii_case(city.trim()))
                .cloned()
        })
        .ok_or_else(|| CliError::UnknownCity {
            city: city.to_string(),
            state: state.to_string(),
        })
}
