use crate::AssignError;
use crate::AssignResult;
use crate::Cell;
use crate::CellKind;
use crate::patterns::BEGIN_ASSIGNMENT;
use crate::patterns::BEGIN_QUESTION;
use crate::patterns::BEGIN_TEST_CONFIG;
use crate::patterns::END_TEST_CONFIG;
use crate::patterns::FENCE;
use crate::patterns::MARKDOWN_SOLUTION;
use crate::patterns::TEST_HEADER;
use crate::patterns::ends_with_marker;
use crate::patterns::is_hidden_test_header;

/// The role a cell plays in a master notebook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
	/// A markdown cell holding a `BEGIN ASSIGNMENT` block.
	AssignmentConfig(MetadataBlock),
	/// A markdown cell holding a `BEGIN QUESTION` block.
	QuestionBoundary(MetadataBlock),
	/// A markdown cell with a `## SOLUTION ##` line.
	MarkdownSolution,
	/// A code cell defining one test case.
	TestCell(TestHeader),
	/// Anything else.
	PlainContent,
}

impl std::fmt::Display for Role {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::AssignmentConfig(_) => write!(f, "assignment config"),
			Self::QuestionBoundary(_) => write!(f, "question"),
			Self::MarkdownSolution => write!(f, "markdown solution"),
			Self::TestCell(_) => write!(f, "test"),
			Self::PlainContent => write!(f, "content"),
		}
	}
}

/// The location of a metadata block inside a cell. Both indices point at the
/// delimiter lines, which belong to the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataBlock {
	/// Index of the opening delimiter line.
	pub start: usize,
	/// Index of the closing delimiter line.
	pub end: usize,
	/// Number of lines after `start` that are markers rather than body.
	skip: usize,
}

impl MetadataBlock {
	/// The key-value lines between the delimiters.
	pub fn body<'a>(&self, lines: &'a [String]) -> &'a [String] {
		&lines[self.start + 1 + self.skip..self.end]
	}

	/// The cell's lines with the whole block removed.
	pub fn strip(&self, lines: &[String]) -> Vec<String> {
		lines[..self.start]
			.iter()
			.chain(&lines[self.end + 1..])
			.cloned()
			.collect()
	}
}

/// How a test cell declared itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestHeader {
	/// A `# TEST` or `# HIDDEN TEST` line at `line`.
	Marker { line: usize, hidden: bool },
	/// A `""" # BEGIN TEST CONFIG` block.
	Config(MetadataBlock),
}

impl TestHeader {
	/// Index of the last header line; test input starts after it.
	pub fn last_line(&self) -> usize {
		match self {
			Self::Marker { line, .. } => *line,
			Self::Config(block) => block.end,
		}
	}
}

/// Decide the role of a cell from its kind and sentinel lines.
pub fn classify(cell: &Cell) -> AssignResult<Role> {
	match cell.kind {
		CellKind::Text => classify_markdown(&cell.lines),
		CellKind::Code => classify_code(&cell.lines),
		CellKind::Raw => Ok(Role::PlainContent),
	}
}

fn classify_markdown(lines: &[String]) -> AssignResult<Role> {
	let question = find_metadata_block(lines, BEGIN_QUESTION)?;
	let assignment = find_metadata_block(lines, BEGIN_ASSIGNMENT)?;
	let solution = lines.iter().any(|line| MARKDOWN_SOLUTION.is_match(line));

	match (question, assignment, solution) {
		(Some(_), Some(_), _) => {
			Err(AssignError::AmbiguousCell(
				"question and assignment config".to_string(),
			))
		}
		(Some(_), None, true) => {
			Err(AssignError::AmbiguousCell(
				"question and markdown solution".to_string(),
			))
		}
		(None, Some(_), true) => {
			Err(AssignError::AmbiguousCell(
				"assignment config and markdown solution".to_string(),
			))
		}
		(Some(block), None, false) => Ok(Role::QuestionBoundary(block)),
		(None, Some(block), false) => Ok(Role::AssignmentConfig(block)),
		(None, None, true) => Ok(Role::MarkdownSolution),
		(None, None, false) => Ok(Role::PlainContent),
	}
}

fn classify_code(lines: &[String]) -> AssignResult<Role> {
	let Some(first) = lines.iter().position(|line| !line.trim().is_empty()) else {
		return Ok(Role::PlainContent);
	};

	if TEST_HEADER.is_match(&lines[first]) {
		return Ok(Role::TestCell(TestHeader::Marker {
			line: first,
			hidden: is_hidden_test_header(&lines[first]),
		}));
	}

	if ends_with_marker(&lines[first], BEGIN_TEST_CONFIG) {
		let end = lines[first + 1..]
			.iter()
			.position(|line| ends_with_marker(line, END_TEST_CONFIG))
			.map(|offset| first + 1 + offset)
			.ok_or(AssignError::UnclosedMetadataBlock)?;

		return Ok(Role::TestCell(TestHeader::Config(MetadataBlock {
			start: first,
			end,
			skip: 0,
		})));
	}

	Ok(Role::PlainContent)
}

/// Find the fenced block whose first interior line is `marker`.
///
/// Ordinary fenced code blocks are stepped over. Any fence without a
/// closing fence, or a second block with the same marker, is an error.
pub fn find_metadata_block(lines: &[String], marker: &str) -> AssignResult<Option<MetadataBlock>> {
	let mut found: Option<MetadataBlock> = None;
	let mut cursor = 0;

	while cursor < lines.len() {
		if !lines[cursor].starts_with(FENCE) {
			cursor += 1;
			continue;
		}

		let start = cursor;
		let closing = lines[start + 1..]
			.iter()
			.position(|line| line.starts_with(FENCE))
			.map(|offset| start + 1 + offset);
		let is_marker = lines
			.get(start + 1)
			.is_some_and(|line| line.trim() == marker);

		match (closing, is_marker) {
			(Some(end), true) => {
				if found.is_some() {
					return Err(AssignError::MultipleMetadataBlocks(marker.to_string()));
				}
				found = Some(MetadataBlock {
					start,
					end,
					skip: 1,
				});
				cursor = end + 1;
			}
			(Some(end), false) => cursor = end + 1,
			(None, true) => return Err(AssignError::UnclosedMetadataBlock),
			(None, false) => return Err(AssignError::UnclosedFence { line: start + 1 }),
		}
	}

	Ok(found)
}
