pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod interval;
pub mod lexer;
pub mod macros;
pub mod predicate;
pub mod time_range;

use crate::context::QueryContext;
use crate::error::Result;

/// Expand `sql` with an engine configured for the named datasource.
pub fn interpolate_for_datasource(
    config: &EngineConfig,
    datasource: &str,
    context: &mut dyn QueryContext,
    range: &TimeRange,
    sql: &str,
) -> Result<String> {
    MacroEngine::from_config(&config.for_datasource(datasource)).interpolate(context, range, sql)
}

pub use config::{EngineConfig, ResolvedEngineConfig};
pub use context::{DataQuery, FillMode};
pub use engine::{MacroCall, MacroEngine};
pub use error::MacroError;
pub use macros::Macro;
pub use predicate::PredicateStyle;
pub use time_range::TimeRange;
