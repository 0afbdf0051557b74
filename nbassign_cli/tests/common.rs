#![allow(dead_code)]

use std::path::Path;
use std::path::PathBuf;

use assert_cmd::Command;
use insta_cmd::get_cargo_bin;
use nbassign_core::AnyResult;
use nbassign_core::Cell;
use nbassign_core::Notebook;
use serde_json::json;

pub fn nbassign_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("nbassign"));
	cmd.env("NO_COLOR", "1");
	cmd.env_remove("RUST_LOG");
	cmd
}

pub fn code_with_output(source: &str, output: &str) -> Cell {
	let mut cell = Cell::code(source);
	cell.outputs.push(json!({
		"output_type": "execute_result",
		"execution_count": 1,
		"data": { "text/plain": output },
		"metadata": {},
	}));
	cell
}

pub fn question(metadata: &str) -> Cell {
	Cell::markdown(format!(
		"**Question.** Answer the following.\n\n```\nBEGIN QUESTION\n{metadata}\n```"
	))
}

/// One question worth two points with a public and a hidden test.
pub fn homework_cells() -> Vec<Cell> {
	vec![
		Cell::markdown("# Homework 1"),
		question("name: q1\npoints: 2"),
		Cell::code("x = 5 # SOLUTION"),
		code_with_output("# TEST\nx == 5", "True"),
		code_with_output("# HIDDEN TEST\ntype(x) == int", "True"),
	]
}

/// Write `cells` as a notebook named `name` inside `dir`.
pub fn write_master(dir: &Path, name: &str, cells: Vec<Cell>) -> AnyResult<PathBuf> {
	let path = dir.join(name);
	std::fs::write(&path, Notebook::new(cells).to_json()?)?;
	Ok(path)
}
