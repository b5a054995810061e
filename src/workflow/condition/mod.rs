// SPDX-License-Identifier: MIT

//! Argument predicates for `tool_invoked` triggers
//!
//! Predicates are simple expressions over a tool call's JSON arguments:
//! - `intent == 'search'`
//! - `confidence > 0.8`
//! - `not draft == true`
//! - `source.kind == 'paper' and citations > 3`

mod ast;
mod evaluator;
mod parser;

pub use ast::{CompareOp, Expression, Literal};
pub use evaluator::evaluate;
pub use parser::parse;
