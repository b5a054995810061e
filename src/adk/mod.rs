// SPDX-License-Identifier: MIT

//! Agent development kit: model providers, tools, errors and the
//! stateful runtime that ties them to a workflow.

pub mod agent;
pub mod error;
pub mod model;
pub mod tool;
