use thiserror::Error;

use crate::{feed, stations, store};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Store error: {0}")]
    Store(#[from] store::Error),
    #[error("Feed error: {0}")]
    Feed(#[from] feed::Error),
    #[error("Station error: {0}")]
    Stations(#[from] stations::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}
