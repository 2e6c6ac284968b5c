pub mod client;
pub mod code;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod queries;
pub mod token;

pub use client::GraphQlClient;
pub use code::{InvalidReportCode, ReportCode};
pub use config::WclConfig;
pub use error::{ClientError, FetchError};
pub use fetcher::{CursorWalk, ReportFetcher, ReportSource, WalkStep};
pub use models::{ActorMeta, EventPage, FightMeta, RawEvent, ReportMeta};
pub use token::{AccessToken, TokenProvider};
