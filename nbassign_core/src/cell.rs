use std::collections::BTreeSet;
use std::path::Path;

use derive_more::Deref;
use derive_more::DerefMut;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::AssignError;
use crate::AssignResult;

/// The notebook format version written to every generated notebook.
pub const NBFORMAT: u32 = 4;
/// The minor format version used when the master does not declare one.
pub const NBFORMAT_MINOR: u32 = 5;

/// The type of a notebook cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
	/// A markdown cell.
	#[serde(rename = "markdown")]
	Text,
	/// A code cell, which may carry captured execution output.
	Code,
	/// A raw cell. Passed through untouched and never treated as a marker.
	Raw,
}

impl std::fmt::Display for CellKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Text => write!(f, "markdown"),
			Self::Code => write!(f, "code"),
			Self::Raw => write!(f, "raw"),
		}
	}
}

/// A single notebook cell.
///
/// Source is held as individual lines without their trailing newlines.
/// Everything the transformer does not understand (cell metadata, raw output
/// objects, execution counts) is kept so that an untouched cell survives a
/// read and write unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCell", into = "RawCell")]
pub struct Cell {
	pub kind: CellKind,
	pub lines: Vec<String>,
	/// Tags from `metadata.tags`.
	pub tags: BTreeSet<String>,
	/// Cell metadata other than `tags`.
	pub metadata: Map<String, Value>,
	/// Raw output objects of a code cell.
	pub outputs: Vec<Value>,
	pub execution_count: Option<Value>,
	id: Option<String>,
}

impl Cell {
	pub fn new(kind: CellKind, lines: Vec<String>) -> Self {
		Self {
			kind,
			lines,
			tags: BTreeSet::new(),
			metadata: Map::new(),
			outputs: Vec::new(),
			execution_count: None,
			id: None,
		}
	}

	/// Create a markdown cell from a source string.
	pub fn markdown(source: impl AsRef<str>) -> Self {
		Self::new(CellKind::Text, split_lines(source.as_ref()))
	}

	/// Create a code cell from a source string.
	pub fn code(source: impl AsRef<str>) -> Self {
		Self::new(CellKind::Code, split_lines(source.as_ref()))
	}

	pub fn is_code(&self) -> bool {
		self.kind == CellKind::Code
	}

	pub fn is_text(&self) -> bool {
		self.kind == CellKind::Text
	}

	/// The cell source joined back into a single string.
	pub fn source(&self) -> String {
		self.lines.join("\n")
	}

	/// Return a copy of this cell holding `lines` instead of its own source.
	pub fn with_lines(&self, lines: Vec<String>) -> Self {
		Self {
			lines,
			..self.clone()
		}
	}

	/// Text captured from the cell's execution: stream output and the
	/// `text/plain` representation of results, concatenated in order.
	/// Returns `None` for cells that are not code or have no textual output.
	pub fn output(&self) -> Option<String> {
		if !self.is_code() {
			return None;
		}

		let mut text = String::new();
		for output in &self.outputs {
			let Some(output_type) = output.get("output_type").and_then(Value::as_str) else {
				continue;
			};

			let fragment = match output_type {
				"stream" => output.get("text"),
				"execute_result" | "display_data" => {
					output.get("data").and_then(|data| data.get("text/plain"))
				}
				_ => None,
			};

			if let Some(fragment) = fragment {
				text.push_str(&multiline_text(fragment));
			}
		}

		(!text.is_empty()).then_some(text)
	}

	/// Drop captured outputs and the execution count.
	pub fn clear_outputs(&mut self) {
		self.outputs.clear();
		if self.is_code() {
			self.execution_count = Some(Value::Null);
		}
	}

	/// Mark the cell read-only for notebook viewers.
	pub fn lock(&mut self) {
		self.metadata.insert("editable".to_string(), Value::Bool(false));
		self.metadata.insert("deletable".to_string(), Value::Bool(false));
	}

	pub fn is_locked(&self) -> bool {
		self.metadata.get("editable") == Some(&Value::Bool(false))
			&& self.metadata.get("deletable") == Some(&Value::Bool(false))
	}

	pub fn with_locked(mut self) -> Self {
		self.lock();
		self
	}
}

/// Split a source string into lines without their newline terminators.
pub fn split_lines(source: &str) -> Vec<String> {
	source.lines().map(String::from).collect()
}

fn multiline_text(value: &Value) -> String {
	match value {
		Value::String(text) => text.clone(),
		Value::Array(parts) => parts.iter().filter_map(Value::as_str).collect(),
		_ => String::new(),
	}
}

/// The on-disk shape of a cell in nbformat 4.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawCell {
	cell_type: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	id: Option<String>,
	#[serde(default)]
	metadata: Map<String, Value>,
	source: RawSource,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	outputs: Option<Vec<Value>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	execution_count: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawSource {
	Text(String),
	Lines(Vec<String>),
}

impl TryFrom<RawCell> for Cell {
	type Error = String;

	fn try_from(raw: RawCell) -> Result<Self, Self::Error> {
		let kind = match raw.cell_type.as_str() {
			"markdown" => CellKind::Text,
			"code" => CellKind::Code,
			"raw" => CellKind::Raw,
			other => return Err(format!("unknown cell type `{other}`")),
		};

		let source = match raw.source {
			RawSource::Text(text) => text,
			RawSource::Lines(lines) => lines.concat(),
		};

		let mut metadata = raw.metadata;
		let tags = match metadata.remove("tags") {
			Some(Value::Array(tags)) => {
				tags.into_iter()
					.filter_map(|tag| tag.as_str().map(String::from))
					.collect()
			}
			_ => BTreeSet::new(),
		};

		Ok(Self {
			kind,
			lines: split_lines(&source),
			tags,
			metadata,
			outputs: raw.outputs.unwrap_or_default(),
			execution_count: raw.execution_count,
			id: raw.id,
		})
	}
}

impl From<Cell> for RawCell {
	fn from(cell: Cell) -> Self {
		let last = cell.lines.len().saturating_sub(1);
		let source = cell
			.lines
			.into_iter()
			.enumerate()
			.map(|(index, line)| if index == last { line } else { format!("{line}\n") })
			.collect();

		let mut metadata = cell.metadata;
		if !cell.tags.is_empty() {
			metadata.insert(
				"tags".to_string(),
				Value::Array(cell.tags.into_iter().map(Value::String).collect()),
			);
		}

		let (outputs, execution_count) = if cell.kind == CellKind::Code {
			(
				Some(cell.outputs),
				Some(cell.execution_count.unwrap_or(Value::Null)),
			)
		} else {
			(None, None)
		};

		Self {
			cell_type: cell.kind.to_string(),
			id: cell.id,
			metadata,
			source: RawSource::Lines(source),
			outputs,
			execution_count,
		}
	}
}

/// An ordered sequence of cells plus notebook-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Deref, DerefMut)]
pub struct Notebook {
	#[deref]
	#[deref_mut]
	pub cells: Vec<Cell>,
	#[serde(default)]
	pub metadata: Map<String, Value>,
	#[serde(default = "default_nbformat")]
	pub nbformat: u32,
	#[serde(default = "default_nbformat_minor")]
	pub nbformat_minor: u32,
}

fn default_nbformat() -> u32 {
	NBFORMAT
}

fn default_nbformat_minor() -> u32 {
	NBFORMAT_MINOR
}

impl Notebook {
	pub fn new(cells: Vec<Cell>) -> Self {
		Self {
			cells,
			metadata: Map::new(),
			nbformat: NBFORMAT,
			nbformat_minor: NBFORMAT_MINOR,
		}
	}

	/// A notebook with the same metadata and format version but different
	/// cells.
	pub fn with_cells(&self, cells: Vec<Cell>) -> Self {
		Self {
			cells,
			metadata: self.metadata.clone(),
			nbformat: self.nbformat,
			nbformat_minor: self.nbformat_minor,
		}
	}

	pub fn from_json(content: impl AsRef<str>) -> AssignResult<Self> {
		let notebook: Notebook = serde_json::from_str(content.as_ref())
			.map_err(|e| AssignError::Notebook(e.to_string()))?;

		if notebook.nbformat != NBFORMAT {
			return Err(AssignError::Notebook(format!(
				"unsupported nbformat version {}",
				notebook.nbformat
			)));
		}

		Ok(notebook)
	}

	pub fn load(path: &Path) -> AssignResult<Self> {
		let content = std::fs::read_to_string(path)?;
		Self::from_json(content)
	}

	/// Serialize with the one-space indentation Jupyter itself writes.
	pub fn to_json(&self) -> AssignResult<String> {
		let mut buffer = Vec::new();
		let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
		let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
		self.serialize(&mut serializer)
			.map_err(|e| AssignError::Notebook(e.to_string()))?;
		buffer.push(b'\n');

		String::from_utf8(buffer).map_err(|e| AssignError::Notebook(e.to_string()))
	}
}
