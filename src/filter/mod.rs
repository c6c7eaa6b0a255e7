pub mod parser;
pub mod evaluator;

pub use parser::{parse_filter, parse_filter_at, ComparisonOp, DueValue, FilterTerm, StatusFilter};
pub use evaluator::{filter_tasks, FilterExpr};
