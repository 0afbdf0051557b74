//! `nbassign_core` turns a master assignment notebook into an autograder
//! copy with solutions intact, a student copy with solutions redacted, and
//! one doctest-style test definition per question.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Master notebook
//!   → Classifier (decides each cell's role from its sentinel lines)
//!   → Metadata parser (question, assignment, and test blocks into typed records)
//!   → Redactor (strips solutions and ignored lines from code cells)
//!   → Transformer (single-pass state machine over the cells)
//!   → Assembler (boilerplate cells, locked cells, test files)
//! ```
//!
//! ## Master Notebook Syntax
//!
//! A question starts with a markdown cell holding a fenced metadata block:
//!
//! ````markdown
//! **Question 1.** Assign five to `x`.
//!
//! ```
//! BEGIN QUESTION
//! name: q1
//! points: 2
//! ```
//! ````
//!
//! The next code cell is the solution. Lines ending in `# SOLUTION`, and
//! regions between `# BEGIN SOLUTION` and `# END SOLUTION`, are replaced by
//! `...` in the student copy. Code cells starting with `# TEST` or
//! `# HIDDEN TEST` after the solution become test cases, with the cell's
//! captured output as the expected output.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nbassign_core::{AssignConfig, Notebook, assemble, write_output};
//! use std::path::Path;
//!
//! let master = Notebook::load(Path::new("hw01.ipynb")).unwrap();
//! let output = assemble(&master, AssignConfig::default()).unwrap();
//! write_output(&output, "hw01", Path::new("dist")).unwrap();
//! ```

pub use assemble::*;
pub use cell::*;
pub use classify::Role;
pub use classify::classify;
pub use config::*;
pub use error::*;
pub use metadata::*;
pub use redact::*;
pub use suite::*;
pub use transform::*;

mod assemble;
mod cell;
pub mod classify;
pub mod config;
#[allow(unused_assignments)]
mod error;
mod metadata;
pub(crate) mod patterns;
mod redact;
mod suite;
mod transform;

#[cfg(test)]
mod __fixtures;
