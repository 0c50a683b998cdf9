// SQL Engine Module
// Clause extraction, parsing, the query model and nested-loop execution

pub mod ast;
pub mod clause;
pub mod executor;
pub mod join;
pub mod lexer;
pub mod parser;
pub mod reader;
pub mod types;

pub use ast::{AlwaysTrue, ColumnRef, Comparator, Condition, ConditionChain, LogicOp, Operand, Parameters, Predicate};
pub use clause::ClauseExtractor;
pub use executor::Command;
pub use join::{JoinIndex, JoinStats, NestedLoopJoin, Odometer};
pub use parser::{parse_query, Parser};
pub use reader::{DataReader, OutputColumn, QueryResult};
pub use types::{Column, JoinRole, LogicalType, Query, Relation};
