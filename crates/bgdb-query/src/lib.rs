//! bgdb-query - Position filter and query engine
//!
//! Turns a one-line search command into a predicate over stored positions and
//! runs it:
//!
//! ```text
//! "sc>60 tp2>50 b3"  --parse-->  Filter  --compile-->  CompiledQuery  --evaluate-->  Vec<PositionRecord>
//! ```
//!
//! # Command Syntax
//!
//! - **Clauses** are separated by whitespace and combined with AND
//! - **Numeric fields**: `pd>10`, `cv=4`, `w1>=60`, `eq-200,150` (inclusive range)
//! - **Enumerated fields**: `dt=cube`, `co:p1,center`, `di:31,42`
//! - **Text**: `t:"prime vs prime"`, `mv:24/18*` (case-insensitive, `*` wildcard)
//! - **Tags**: `tag:opening/split`; repeated tag clauses must all hold
//! - **Dates**: `da>=2024/03`, `da2023,2024`
//! - **Board patterns**: `b3`, `hb>=5`, `pt20=2o`, `pt19-24>=4`, `pt*>=6`
//! - **Flags**: `nc` (no contact), `cp` (contains the anchor's checkers)
//!
//! # Examples
//!
//! ```
//! use bgdb_domain::{Position, PositionRecord};
//! use bgdb_query::{compile, parse_command, CompileOptions, Evaluator};
//!
//! let filter = parse_command("cv1 pd=0").unwrap();
//! let query = compile(&filter.criteria, &CompileOptions::default()).unwrap();
//! let corpus = vec![PositionRecord::new(1, Position::default())];
//! assert_eq!(Evaluator::new(&query).evaluate(corpus).len(), 1);
//! ```

pub mod compiler;
pub mod criteria;
pub mod error;
pub mod evaluator;
pub mod parser;
pub mod prefilter;

pub use compiler::{
    compile, BoardMatcher, CompileOptions, CompiledQuery, Matcher, Perspective, ResultOrder,
    SortKey,
};
pub use criteria::{
    BoardPattern, Criterion, DateBound, Field, Filter, Operator, Owner, PatternTarget, Value,
    ValueType,
};
pub use error::{CompileError, EvalError, ParseError, ParseErrorKind};
pub use evaluator::{sort_records, Evaluator};
pub use parser::parse_command;
pub use prefilter::{Bounds, Prefilter};
