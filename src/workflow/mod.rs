// SPDX-License-Identifier: MIT

//! Declarative workflows and replay-based state derivation

pub mod condition;
pub mod deriver;
pub mod history;
pub mod loader;
pub mod registry;
pub mod transition;
pub mod types;

#[cfg(test)]
mod proptests;
