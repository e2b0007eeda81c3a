use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

pub type MarketResult<T> = Result<T, MarketError>;
