use serde_json::json;

use crate::Cell;
use crate::Notebook;
use crate::TestCase;

pub fn lines(source: &str) -> Vec<String> {
	source.lines().map(String::from).collect()
}

pub fn md(source: &str) -> Cell {
	Cell::markdown(source)
}

pub fn code(source: &str) -> Cell {
	Cell::code(source)
}

/// A code cell whose execution printed `output` as its result.
pub fn code_with_output(source: &str, output: &str) -> Cell {
	let mut cell = Cell::code(source);
	cell.outputs.push(json!({
		"output_type": "execute_result",
		"execution_count": 1,
		"data": { "text/plain": output },
		"metadata": {},
	}));
	cell.execution_count = Some(json!(1));
	cell
}

/// A question cell with a prompt line and the given metadata lines.
pub fn question(metadata: &str) -> Cell {
	md(&format!(
		"**Question.** Answer the following.\n\n```\nBEGIN QUESTION\n{}\n```",
		metadata.trim_end()
	))
}

pub fn test_cell(source: &str, output: &str) -> Cell {
	code_with_output(&format!("# TEST\n{source}"), output)
}

pub fn hidden_test_cell(source: &str, output: &str) -> Cell {
	code_with_output(&format!("# HIDDEN TEST\n{source}"), output)
}

/// `q1` worth two points: one inline solution, one public and one hidden
/// test.
pub fn single_question_cells() -> Vec<Cell> {
	vec![
		md("# Homework 1"),
		question("name: q1\npoints: 2"),
		code("x = 5 # SOLUTION"),
		test_cell("x == 5", "True"),
		hidden_test_cell("type(x) == int", "True"),
	]
}

pub fn single_question_notebook() -> Notebook {
	Notebook::new(single_question_cells())
}

/// A minimal master notebook as it would be stored on disk.
pub const MASTER_JSON: &str = r##"{
 "cells": [
  {
   "cell_type": "markdown",
   "metadata": {},
   "source": ["# Homework 1"]
  },
  {
   "cell_type": "markdown",
   "metadata": {},
   "source": [
    "**Question 1.** Assign five to `x`.\n",
    "\n",
    "```\n",
    "BEGIN QUESTION\n",
    "name: q1\n",
    "points: 2\n",
    "```"
   ]
  },
  {
   "cell_type": "code",
   "execution_count": 1,
   "metadata": { "tags": ["solution"] },
   "outputs": [],
   "source": ["x = 5 # SOLUTION"]
  },
  {
   "cell_type": "code",
   "execution_count": 2,
   "metadata": {},
   "outputs": [
    {
     "data": { "text/plain": ["True"] },
     "execution_count": 2,
     "metadata": {},
     "output_type": "execute_result"
    }
   ],
   "source": ["# TEST\n", "x == 5"]
  }
 ],
 "metadata": {
  "kernelspec": { "display_name": "Python 3", "language": "python", "name": "python3" }
 },
 "nbformat": 4,
 "nbformat_minor": 5
}
"##;

pub fn sample_case(input: &str, expected_output: &str, hidden: bool, points: Option<f64>) -> TestCase {
	TestCase {
		input: input.to_string(),
		expected_output: expected_output.to_string(),
		hidden,
		points,
		success_message: None,
		failure_message: None,
	}
}
