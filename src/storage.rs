//! SQLite storage for cities and businesses
//!
//! Records are built by extraction and persisted here with explicit calls.
//! Every statement is parameterized. Inserts ignore rows that already exist,
//! so rerunning a search against a warm cache does not duplicate data.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::data::{BusinessRecord, StateCities};

const CREATE_TABLES: &str = r#"
    PRAGMA foreign_keys = ON;
    CREATE TABLE IF NOT EXISTS "Cities" (
        "Id"    INTEGER PRIMARY KEY AUTOINCREMENT UNIQUE,
        "City"  TEXT NOT NULL,
        "State" TEXT NOT NULL,
        UNIQUE ("City", "State")
    );
    CREATE TABLE IF NOT EXISTS "Businesses" (
        "Id"            INTEGER PRIMARY KEY AUTOINCREMENT UNIQUE,
        "Name"          TEXT NOT NULL,
        "City"          TEXT NOT NULL,
        "CityId"        INTEGER,
        "Address"       TEXT NOT NULL,
        "Latitude"      REAL,
        "Longitude"     REAL,
        "Price"         TEXT NOT NULL,
        "Image_url"     TEXT NOT NULL,
        "Rating"        REAL,
        "Review_number" INTEGER,
        FOREIGN KEY ("CityId") REFERENCES "Cities" ("Id"),
        UNIQUE ("Name", "City", "Address")
    );
"#;

const SELECT_BUSINESS: &str = "SELECT Id, Name, City, CityId, Address, Latitude, Longitude, \
     Price, Image_url, Rating, Review_number FROM Businesses";

/// Errors that can occur when reading or writing the database
#[derive(Debug, Error)]
pub enum StorageError {
    /// A SQLite statement failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The database directory could not be created
    #[error("Failed to create database directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A business row read back from the database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredBusiness {
    pub id: i64,
    pub name: String,
    pub city: String,
    /// Row id of the matching city, if the city was listed
    pub city_id: Option<i64>,
    /// Street address joined with the zip code
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub price: String,
    pub image_url: String,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
}

impl StoredBusiness {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            city: row.get(2)?,
            city_id: row.get(3)?,
            address: row.get(4)?,
            latitude: row.get(5)?,
            longitude: row.get(6)?,
            price: row.get(7)?,
            image_url: row.get(8)?,
            rating: row.get(9)?,
            review_count: row.get(10)?,
        })
    }
}

/// Handle to the cities/businesses database
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (or creates) the database at `path` and ensures the tables exist
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let db = Self {
            conn: Connection::open(path)?,
        };
        db.create_tables()?;
        debug!(path = %path.display(), "Opened database");
        Ok(db)
    }

    /// Opens a private in-memory database with the tables created
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.create_tables()?;
        Ok(db)
    }

    /// Creates both tables if they do not exist yet
    ///
    /// Existing tables are left alone; any other failure is returned.
    pub fn create_tables(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(CREATE_TABLES)?;
        Ok(())
    }

    /// Inserts every (city, state) pair, skipping pairs already stored
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of newly inserted cities
    pub fn save_cities(&mut self, states: &StateCities) -> Result<usize, StorageError> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO Cities (City, State) VALUES (?1, ?2)")?;
            for listing in states.listings() {
                for city in &listing.cities {
                    inserted += stmt.execute(params![city, listing.state])?;
                }
            }
        }
        tx.commit()?;
        debug!(inserted, "Saved cities");
        Ok(inserted)
    }

    /// Returns the id of the first stored city named `city`, ignoring case
    pub fn city_id(&self, city: &str) -> Result<Option<i64>, StorageError> {
        lookup_city_id(&self.conn, city)
    }

    /// Persists one business
    ///
    /// # Returns
    /// * `Ok(true)` - The business was inserted
    /// * `Ok(false)` - An identical business was already stored
    pub fn save_business(&self, business: &BusinessRecord) -> Result<bool, StorageError> {
        insert_business(&self.conn, business)
    }

    /// Persists a batch of businesses in one transaction
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of newly inserted businesses
    pub fn save_businesses(&mut self, businesses: &[BusinessRecord]) -> Result<usize, StorageError> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        for business in businesses {
            if insert_business(&tx, business)? {
                inserted += 1;
            }
        }
        tx.commit()?;
        debug!(inserted, total = businesses.len(), "Saved businesses");
        Ok(inserted)
    }

    /// All stored businesses in `city`, in insertion order
    ///
    /// City names match without regard to ASCII case.
    pub fn businesses_in_city(&self, city: &str) -> Result<Vec<StoredBusiness>, StorageError> {
        let sql = format!("{} WHERE City = ?1 COLLATE NOCASE ORDER BY Id", SELECT_BUSINESS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![city], StoredBusiness::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Stored businesses in `city` with exactly `rating`
    pub fn businesses_with_rating(
        &self,
        city: &str,
        rating: f64,
    ) -> Result<Vec<StoredBusiness>, StorageError> {
        let sql = format!("{} WHERE City = ?1 COLLATE NOCASE AND Rating = ?2 ORDER BY Id", SELECT_BUSINESS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![city, rating], StoredBusiness::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn lookup_city_id(conn: &Connection, city: &str) -> Result<Option<i64>, StorageError> {
    let id = conn
        .query_row(
            "SELECT Id FROM Cities WHERE City = ?1 COLLATE NOCASE ORDER BY Id LIMIT 1",
            params![city],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn insert_business(conn: &Connection, business: &BusinessRecord) -> Result<bool, StorageError> {
    let city_id = lookup_city_id(conn, &business.city)?;
    let changed = conn.execute(
        "INSERT OR IGNORE INTO Businesses \
         (Name, City, CityId, Address, Latitude, Longitude, Price, Image_url, Rating, Review_number) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            business.name,
            business.city,
            city_id,
            business.full_address(),
            business.latitude,
            business.longitude,
            business.price,
            business.image_url,
            business.rating,
            business.review_count,
        ],
    )?;
    Ok(changed > 0)
}
