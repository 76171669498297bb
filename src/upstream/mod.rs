//! # Upstream Module
//!
//! Everything that talks to the VoipMonitor GUI server:
//!
//! - **`session`**: the bypass login that yields a per-cycle session token
//! - **`stats`**: the CDR stats query and its parsed observations
//!
//! Both endpoints are served by the same PHP entry point; only the form
//! payload and query parameters differ.

pub mod session;
pub mod stats;

pub use session::{
    AuthError,
    Session,
};
pub use stats::{
    FetchError,
    FetchStats,
    Observation,
    QueryWindow,
    StatsFetcher,
    NEED_COLUMNS_DEFAULT,
};

/// Single PHP entry point for both login and stats queries.
pub(crate) const SQL_ENDPOINT_PATH: &str = "/php/model/sql.php";
