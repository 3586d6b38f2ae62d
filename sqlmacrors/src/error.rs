use thiserror::Error;

pub type Result<T> = std::result::Result<T, MacroError>;

/// Every variant renders the exact text template authors see, so callers can
/// surface `to_string()` verbatim.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MacroError {
    #[error("unknown macro {0:?}")]
    UnknownMacro(String),
    #[error("{0}")]
    Arity(String),
    #[error("{0}")]
    ArgumentParse(String),
    #[error("error parsing interval {0}")]
    Interval(String),
    #[error("{0}")]
    Threshold(String),
    #[error("{0}")]
    Predicate(String),
    #[error("error while parsing query params: {0}")]
    QueryParams(String),
    #[error("error parsing fill value {0}")]
    FillMode(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("json error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for MacroError {
    fn from(err: serde_json::Error) -> Self {
        MacroError::Json(err.to_string())
    }
}
