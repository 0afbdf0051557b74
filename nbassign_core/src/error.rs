use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum AssignError {
	#[error(transparent)]
	#[diagnostic(code(nbassign::io_error))]
	Io(#[from] std::io::Error),

	#[error("failed to read notebook: {0}")]
	#[diagnostic(
		code(nbassign::notebook),
		help("the master notebook must be nbformat 4 JSON")
	)]
	Notebook(String),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(nbassign::config_parse),
		help("check that nbassign.toml is valid TOML")
	)]
	ConfigParse(String),

	#[error("cell {index} is invalid (`{excerpt}`)")]
	#[diagnostic(code(nbassign::cell))]
	InCell {
		index: usize,
		excerpt: String,
		#[source]
		source: Box<AssignError>,
	},

	#[error("metadata block opened but never closed")]
	#[diagnostic(
		code(nbassign::unclosed_metadata_block),
		help("close the block with a line of three backticks")
	)]
	UnclosedMetadataBlock,

	#[error("fence on line {line} is never closed")]
	#[diagnostic(
		code(nbassign::unclosed_fence),
		help("close the fenced block with a line of three backticks")
	)]
	UnclosedFence { line: usize },

	#[error("more than one `{0}` block in a single cell")]
	#[diagnostic(code(nbassign::multiple_metadata_blocks))]
	MultipleMetadataBlocks(String),

	#[error("cell matches more than one role: {0}")]
	#[diagnostic(
		code(nbassign::ambiguous_cell),
		help("split question metadata, assignment config, and solutions into separate cells")
	)]
	AmbiguousCell(String),

	#[error("`{marker}` on line {line} has no matching begin marker")]
	#[diagnostic(code(nbassign::unmatched_end_marker))]
	UnmatchedEndMarker { marker: String, line: usize },

	#[error("`{marker}` on line {line} is never closed")]
	#[diagnostic(
		code(nbassign::unclosed_block),
		help("every begin marker must be closed within the same cell")
	)]
	UnclosedBlock { marker: String, line: usize },

	#[error("`{marker}` on line {line} opened inside another block of the same kind")]
	#[diagnostic(code(nbassign::nested_block), help("blocks of the same kind cannot nest"))]
	NestedBlock { marker: String, line: usize },

	#[error("solution cell appears outside of any question")]
	#[diagnostic(
		code(nbassign::dangling_solution),
		help("add a `BEGIN QUESTION` block before the solution")
	)]
	DanglingSolution,

	#[error("test cell appears outside of any question")]
	#[diagnostic(
		code(nbassign::dangling_test),
		help("tests must follow the solution of an open question")
	)]
	DanglingTest,

	#[error("question `{0}` has no content once its metadata block is removed")]
	#[diagnostic(
		code(nbassign::empty_question_cell),
		help("add the question prompt to the cell holding the `BEGIN QUESTION` block")
	)]
	EmptyQuestionCell(String),

	#[error("question `{0}` closed before any solution or test cell")]
	#[diagnostic(code(nbassign::missing_solution))]
	MissingSolution(String),

	#[error("manual question `{0}` has neither a markdown prompt nor a markdown solution")]
	#[diagnostic(
		code(nbassign::manual_without_prompt),
		help("add a markdown prompt cell between the question and its code solution")
	)]
	ManualQuestionWithoutPrompt(String),

	#[error("failed to parse {kind} metadata: {reason}")]
	#[diagnostic(code(nbassign::metadata_parse))]
	MetadataParse { kind: String, reason: String },

	#[error("invalid question name: `{0}`")]
	#[diagnostic(
		code(nbassign::invalid_question_name),
		help("names start with a letter and contain only letters, digits, and underscores")
	)]
	InvalidQuestionName(String),

	#[error("duplicate question name: `{0}`")]
	#[diagnostic(
		code(nbassign::duplicate_question),
		help("each question name must be unique within the notebook")
	)]
	DuplicateQuestion(String),

	#[error("question `{name}` lists {expected} point value(s) but has {got} test case(s)")]
	#[diagnostic(code(nbassign::point_count_mismatch))]
	PointCountMismatch {
		name: String,
		expected: usize,
		got: usize,
	},

	#[error("question `{name}` is worth {total} point(s) but its test cases assign {assigned}")]
	#[diagnostic(code(nbassign::point_total_mismatch))]
	PointTotalMismatch {
		name: String,
		total: f64,
		assigned: f64,
	},

	#[error("question `{0}` sets points both as a list and on individual test cases")]
	#[diagnostic(code(nbassign::conflicting_points))]
	ConflictingPoints(String),

	#[error("test cell has no test input")]
	#[diagnostic(code(nbassign::empty_test))]
	EmptyTest,

	#[error("a `# SEED` line requires a seed but none is configured")]
	#[diagnostic(
		code(nbassign::seed_required),
		help("set `seed` in nbassign.toml or in the `BEGIN ASSIGNMENT` block")
	)]
	SeedRequired,
}

impl AssignError {
	/// Attach the position and a short excerpt of the offending cell.
	pub fn in_cell(self, index: usize, lines: &[String]) -> Self {
		if matches!(self, Self::InCell { .. }) {
			return self;
		}

		Self::InCell {
			index,
			excerpt: excerpt(lines),
			source: Box::new(self),
		}
	}

	/// The underlying error, looking through any cell wrapper.
	pub fn root(&self) -> &AssignError {
		match self {
			Self::InCell { source, .. } => source.root(),
			other => other,
		}
	}
}

const EXCERPT_LIMIT: usize = 60;

fn excerpt(lines: &[String]) -> String {
	let first = lines
		.iter()
		.map(|line| line.trim())
		.find(|line| !line.is_empty())
		.unwrap_or_default();

	if first.chars().count() > EXCERPT_LIMIT {
		let truncated: String = first.chars().take(EXCERPT_LIMIT).collect();
		format!("{truncated}…")
	} else {
		first.to_string()
	}
}

pub type AssignResult<T> = Result<T, AssignError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
