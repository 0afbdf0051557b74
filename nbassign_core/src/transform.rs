use std::collections::HashSet;

use serde_json::json;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::AssignConfig;
use crate::AssignError;
use crate::AssignResult;
use crate::Cell;
use crate::ConfigOverrides;
use crate::PointSpec;
use crate::QuestionConfig;
use crate::TestCase;
use crate::TestDefinition;
use crate::classify::MetadataBlock;
use crate::classify::Role;
use crate::classify::classify;
use crate::metadata::parse_metadata;
use crate::metadata::parse_question;
use crate::patterns::PDF_BEGIN_QUESTION;
use crate::patterns::PDF_END_QUESTION;
use crate::redact::redact;
use crate::redact::strip_ignored;
use crate::suite::parse_test_cell;
use crate::suite::resolve_points;

/// Key under which generated metadata is stored, both on cells and on the
/// notebook itself.
pub const METADATA_KEY: &str = "nbassign";

/// Shown to students in place of a written solution.
pub const RESPONSE_PLACEHOLDER: &str = "_Type your answer here, replacing this text._";

/// Name of the grading handle created by the init cell.
pub const GRADER_HANDLE: &str = "grader";

/// The three streams produced by a pass over a master notebook, before any
/// boilerplate is added.
#[derive(Debug, Clone)]
pub struct Transformed {
	pub autograder: Vec<Cell>,
	pub student: Vec<Cell>,
	/// One definition per question, in document order.
	pub tests: Vec<TestDefinition>,
	/// The configuration after every `BEGIN ASSIGNMENT` block was applied.
	pub config: AssignConfig,
	/// Whether any `# SEED` line was found.
	pub seed_required: bool,
}

/// A question whose cells are still being read.
#[derive(Debug)]
struct OpenQuestion {
	config: QuestionConfig,
	/// Position of the question's boundary cell.
	index: usize,
	boundary: Vec<String>,
	cases: Vec<TestCase>,
	/// A markdown prompt cell followed the boundary.
	has_prompt: bool,
	/// The student copy received a response placeholder.
	response_emitted: bool,
}

#[derive(Debug)]
enum State {
	/// No question is open.
	Scanning,
	/// A question is open and its solution has not been seen yet.
	AwaitingPrompt(OpenQuestion),
	/// The solution was consumed; test cells are being collected.
	CollectingTests(OpenQuestion),
}

/// Single-pass state machine over the cells of a master notebook.
#[derive(Debug)]
pub struct Transformer {
	state: State,
	config: AssignConfig,
	names: HashSet<String>,
	autograder: Vec<Cell>,
	student: Vec<Cell>,
	tests: Vec<TestDefinition>,
	seed_required: bool,
}

/// Run a full pass over `cells`.
pub fn transform(cells: &[Cell], config: AssignConfig) -> AssignResult<Transformed> {
	let mut transformer = Transformer::new(config);
	for (index, cell) in cells.iter().enumerate() {
		transformer.push(index, cell)?;
	}
	transformer.finish()
}

impl Transformer {
	pub fn new(config: AssignConfig) -> Self {
		Self {
			state: State::Scanning,
			config,
			names: HashSet::new(),
			autograder: Vec::new(),
			student: Vec::new(),
			tests: Vec::new(),
			seed_required: false,
		}
	}

	/// Consume the next cell. Errors carry the cell's position.
	pub fn push(&mut self, index: usize, cell: &Cell) -> AssignResult<()> {
		let role = classify(cell).map_err(|e| e.in_cell(index, &cell.lines))?;
		debug!(index, role = %role, "classified cell");

		let state = std::mem::replace(&mut self.state, State::Scanning);
		let result = match state {
			State::Scanning => self.scan(index, cell, role),
			State::AwaitingPrompt(question) => self.await_solution(question, cell, role),
			State::CollectingTests(question) => self.collect_tests(question, index, cell, role),
		};

		result.map_err(|e| e.in_cell(index, &cell.lines))
	}

	/// Close any open question and return the collected streams.
	pub fn finish(mut self) -> AssignResult<Transformed> {
		match std::mem::replace(&mut self.state, State::Scanning) {
			State::Scanning => {}
			State::AwaitingPrompt(question) => {
				return Err(AssignError::MissingSolution(question.config.name.clone())
					.in_cell(question.index, &question.boundary));
			}
			State::CollectingTests(question) => self.finalize(question)?,
		}

		if self.seed_required && self.config.seed.is_none() {
			return Err(AssignError::SeedRequired);
		}

		Ok(Transformed {
			autograder: self.autograder,
			student: self.student,
			tests: self.tests,
			config: self.config,
			seed_required: self.seed_required,
		})
	}

	fn scan(&mut self, index: usize, cell: &Cell, role: Role) -> AssignResult<()> {
		match role {
			Role::AssignmentConfig(block) => {
				let overrides: ConfigOverrides =
					parse_metadata("assignment", block.body(&cell.lines))?;
				debug!(?overrides, "applied assignment config");
				self.config.apply(overrides);
				Ok(())
			}
			Role::QuestionBoundary(block) => self.open_question(index, cell, block),
			Role::MarkdownSolution => Err(AssignError::DanglingSolution),
			Role::TestCell(_) => Err(AssignError::DanglingTest),
			Role::PlainContent if cell.is_code() => self.emit_code(cell),
			Role::PlainContent => {
				self.emit_both(cell.clone());
				Ok(())
			}
		}
	}

	fn open_question(&mut self, index: usize, cell: &Cell, block: MetadataBlock) -> AssignResult<()> {
		let question = parse_question(block.body(&cell.lines))?;
		if !self.names.insert(question.name.clone()) {
			return Err(AssignError::DuplicateQuestion(question.name));
		}

		let mut lines = trim_blank_edges(block.strip(&cell.lines));
		if lines.is_empty() {
			return Err(AssignError::EmptyQuestionCell(question.name));
		}
		if question.manual {
			lines.splice(0..0, [PDF_BEGIN_QUESTION.to_string(), String::new()]);
		}

		let recorded =
			serde_json::to_value(&question).map_err(|e| AssignError::Notebook(e.to_string()))?;
		let mut autograder = cell.with_lines(lines.clone());
		autograder
			.metadata
			.insert(METADATA_KEY.to_string(), json!({ "question": recorded }));
		self.autograder.push(autograder);
		self.student.push(cell.with_lines(lines));

		info!(question = %question.name, manual = question.manual, "opened question");
		self.state = State::AwaitingPrompt(OpenQuestion {
			config: question,
			index,
			boundary: cell.lines.clone(),
			cases: Vec::new(),
			has_prompt: false,
			response_emitted: false,
		});

		Ok(())
	}

	fn await_solution(&mut self, mut question: OpenQuestion, cell: &Cell, role: Role) -> AssignResult<()> {
		match role {
			Role::PlainContent if !cell.is_code() => {
				self.emit_both(cell.clone());
				question.has_prompt = true;
				self.state = State::AwaitingPrompt(question);
				return Ok(());
			}
			Role::PlainContent => self.emit_code(cell)?,
			Role::MarkdownSolution => {
				self.autograder.push(cell.clone());
				self.student.push(Cell::markdown(RESPONSE_PLACEHOLDER));
				question.response_emitted = true;
			}
			Role::TestCell(header) => question.cases.push(parse_test_cell(cell, &header)?),
			Role::QuestionBoundary(_) | Role::AssignmentConfig(_) => {
				return Err(AssignError::MissingSolution(question.config.name.clone())
					.in_cell(question.index, &question.boundary));
			}
		}

		self.state = State::CollectingTests(question);
		Ok(())
	}

	fn collect_tests(
		&mut self,
		mut question: OpenQuestion,
		index: usize,
		cell: &Cell,
		role: Role,
	) -> AssignResult<()> {
		if let Role::TestCell(header) = &role {
			question.cases.push(parse_test_cell(cell, header)?);
			self.state = State::CollectingTests(question);
			return Ok(());
		}

		self.finalize(question)?;
		self.scan(index, cell, role)
	}

	/// Resolve points, record the test definition, and emit the cells that
	/// follow a question. Errors point at the question's boundary cell.
	fn finalize(&mut self, question: OpenQuestion) -> AssignResult<()> {
		let OpenQuestion {
			config,
			index,
			boundary,
			cases,
			has_prompt,
			response_emitted,
		} = question;
		let at_boundary = |error: AssignError| error.in_cell(index, &boundary);

		if config.manual && !has_prompt && !response_emitted {
			return Err(at_boundary(AssignError::ManualQuestionWithoutPrompt(
				config.name,
			)));
		}

		let resolved =
			resolve_points(&config.name, config.points.as_ref(), &cases).map_err(at_boundary)?;
		let total = match config.points {
			Some(PointSpec::Total(total)) => Some(total),
			_ => None,
		};
		let definition = TestDefinition::new(&config.name, &cases, &resolved, total);

		if cases.is_empty() && !config.manual {
			warn!(question = %config.name, "question has no test cases");
		}

		if config.manual {
			self.emit_both(Cell::markdown(PDF_END_QUESTION).with_locked());
		}

		let wants_check = definition.has_public_cases() || (config.manual && response_emitted);
		if config.check_cell && wants_check {
			self.emit_both(check_cell(&config.name));
		}

		info!(
			question = %config.name,
			cases = cases.len(),
			points = %definition.points,
			"finalized question"
		);
		self.tests.push(definition);

		Ok(())
	}

	/// Autograder gets the cell minus ignored lines; students get it
	/// redacted with outputs cleared. A cell made only of ignored lines is
	/// dropped from both.
	fn emit_code(&mut self, cell: &Cell) -> AssignResult<()> {
		let kept = strip_ignored(&cell.lines)?;
		let redacted = redact(&cell.lines)?;
		self.seed_required |= redacted.seed_required;

		if kept.is_empty() && !cell.lines.is_empty() {
			debug!("dropped instructor-only cell");
			return Ok(());
		}

		self.autograder.push(cell.with_lines(kept));
		let mut student = cell.with_lines(redacted.lines);
		student.clear_outputs();
		self.student.push(student);

		Ok(())
	}

	fn emit_both(&mut self, cell: Cell) {
		self.autograder.push(cell.clone());
		self.student.push(cell);
	}
}

/// A locked cell running the checks of question `name`.
pub fn check_cell(name: &str) -> Cell {
	Cell::code(format!("{GRADER_HANDLE}.check(\"{name}\")")).with_locked()
}

fn trim_blank_edges(mut lines: Vec<String>) -> Vec<String> {
	while lines.last().is_some_and(|line| line.trim().is_empty()) {
		lines.pop();
	}
	let leading = lines
		.iter()
		.take_while(|line| line.trim().is_empty())
		.count();
	lines.drain(..leading);
	lines
}
