use float_cmp::approx_eq;
use serde::Serialize;
use serde::Serializer;
use serde_json::Value;

use crate::AssignError;
use crate::AssignResult;
use crate::Cell;
use crate::PointSpec;
use crate::classify::TestHeader;
use crate::metadata::parse_test_config;
use crate::redact::strip_ignored;

/// Points given to each test case of a question that declares none.
pub const DEFAULT_POINTS_PER_CASE: f64 = 1.0;

/// A single doctest-style test case collected from a test cell.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
	/// The code to run, one statement per line.
	pub input: String,
	/// The exact text the code is expected to print.
	pub expected_output: String,
	pub hidden: bool,
	/// Points declared on the case itself, before resolution.
	pub points: Option<f64>,
	pub success_message: Option<String>,
	pub failure_message: Option<String>,
}

/// Build a test case from a test cell classified with `header`.
pub fn parse_test_cell(cell: &Cell, header: &TestHeader) -> AssignResult<TestCase> {
	let (hidden, config) = match header {
		TestHeader::Marker { hidden, .. } => (*hidden, None),
		TestHeader::Config(block) => {
			let config = parse_test_config(block.body(&cell.lines))?;
			(config.hidden.unwrap_or(false), Some(config))
		}
	};

	let mut input = strip_ignored(&cell.lines[header.last_line() + 1..])?;
	while input.last().is_some_and(|line| line.trim().is_empty()) {
		input.pop();
	}
	while input.first().is_some_and(|line| line.trim().is_empty()) {
		input.remove(0);
	}

	if input.is_empty() {
		return Err(AssignError::EmptyTest);
	}

	let expected_output = cell
		.output()
		.map(|output| output.trim_end_matches('\n').to_string())
		.unwrap_or_default();
	let config = config.unwrap_or_default();

	Ok(TestCase {
		input: input.join("\n"),
		expected_output,
		hidden,
		points: config.points,
		success_message: config.success_message,
		failure_message: config.failure_message,
	})
}

/// Resolve the points of every case of question `name`. Returns one value
/// per case, in order.
///
/// - A total is split evenly across the cases without their own points,
///   keeping the exact quotient so the sum matches the total.
/// - A list must have exactly one entry per case.
/// - Without a declaration, cases without their own points get
///   [`DEFAULT_POINTS_PER_CASE`].
pub fn resolve_points(
	name: &str,
	points: Option<&PointSpec>,
	cases: &[TestCase],
) -> AssignResult<Vec<f64>> {
	match points {
		Some(PointSpec::PerCase(values)) => {
			if values.len() != cases.len() {
				return Err(AssignError::PointCountMismatch {
					name: name.to_string(),
					expected: values.len(),
					got: cases.len(),
				});
			}
			if cases.iter().any(|case| case.points.is_some()) {
				return Err(AssignError::ConflictingPoints(name.to_string()));
			}
			Ok(values.clone())
		}
		Some(PointSpec::Total(total)) => {
			let explicit: f64 = cases.iter().filter_map(|case| case.points).sum();
			let unassigned = cases.iter().filter(|case| case.points.is_none()).count();
			let remainder = total - explicit;

			let mismatch = if unassigned == 0 {
				!cases.is_empty() && !approx_eq!(f64, remainder, 0.0, epsilon = 1e-9)
			} else {
				remainder < 0.0
			};
			if mismatch {
				return Err(AssignError::PointTotalMismatch {
					name: name.to_string(),
					total: *total,
					assigned: explicit,
				});
			}

			let share = if unassigned == 0 {
				0.0
			} else {
				remainder / unassigned as f64
			};

			Ok(cases
				.iter()
				.map(|case| case.points.unwrap_or(share))
				.collect())
		}
		None => {
			Ok(cases
				.iter()
				.map(|case| case.points.unwrap_or(DEFAULT_POINTS_PER_CASE))
				.collect())
		}
	}
}

/// A point value that serializes as an integer when it is whole.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Points(pub f64);

impl Serialize for Points {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		if self.0.fract() == 0.0 && self.0.abs() < 1e15 {
			serializer.serialize_i64(self.0 as i64)
		} else {
			serializer.serialize_f64(self.0)
		}
	}
}

impl std::fmt::Display for Points {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// The finalized, serializable tests of one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestDefinition {
	pub name: String,
	pub points: Points,
	pub suites: Vec<TestSuite>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestSuite {
	pub cases: Vec<DoctestCase>,
	pub scored: bool,
	pub setup: String,
	pub teardown: String,
	#[serde(rename = "type")]
	pub kind: String,
}

/// A test case as written to a test file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoctestCase {
	/// Prompt-prefixed input lines followed by the expected output.
	pub code: String,
	pub hidden: bool,
	pub locked: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub points: Option<Points>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub success_message: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub failure_message: Option<String>,
}

impl TestDefinition {
	/// Assemble the definition of question `name` from its cases and their
	/// resolved points. A declared `total` is the question's points as
	/// written; otherwise the case points are summed.
	pub fn new(name: &str, cases: &[TestCase], resolved: &[f64], total: Option<f64>) -> Self {
		let points = total.unwrap_or_else(|| resolved.iter().sum());

		let cases = cases
			.iter()
			.zip(resolved)
			.map(|(case, points)| {
				DoctestCase {
					code: doctest_code(&case.input, &case.expected_output),
					hidden: case.hidden,
					locked: false,
					points: Some(Points(*points)),
					success_message: case.success_message.clone(),
					failure_message: case.failure_message.clone(),
				}
			})
			.collect();

		Self {
			name: name.to_string(),
			points: Points(points),
			suites: vec![TestSuite {
				cases,
				scored: true,
				setup: String::new(),
				teardown: String::new(),
				kind: "doctest".to_string(),
			}],
		}
	}

	pub fn cases(&self) -> impl Iterator<Item = &DoctestCase> {
		self.suites.iter().flat_map(|suite| suite.cases.iter())
	}

	/// Whether any case is visible to students.
	pub fn has_public_cases(&self) -> bool {
		self.cases().any(|case| !case.hidden)
	}

	/// The definition students receive: hidden cases removed.
	pub fn public_only(&self) -> Self {
		let mut public = self.clone();
		for suite in &mut public.suites {
			suite.cases.retain(|case| !case.hidden);
		}
		public
	}

	pub fn to_value(&self) -> AssignResult<Value> {
		serde_json::to_value(self).map_err(|e| AssignError::Notebook(e.to_string()))
	}

	/// Render as a Python module assigning the definition to `test`.
	pub fn to_python(&self) -> AssignResult<String> {
		let mut output = String::from("test = ");
		write_python(&self.to_value()?, 0, &mut output);
		output.push('\n');
		Ok(output)
	}

	pub fn to_json(&self) -> AssignResult<String> {
		let mut json =
			serde_json::to_string_pretty(self).map_err(|e| AssignError::Notebook(e.to_string()))?;
		json.push('\n');
		Ok(json)
	}
}

/// Format test input as an interactive-session transcript followed by the
/// expected output.
///
/// Lines continuing an open statement (indented blocks, open brackets,
/// multi-line strings, and backslash continuations) get the `... ` prompt.
pub fn doctest_code(input: &str, expected_output: &str) -> String {
	let mut scanner = LineScanner::default();
	let mut lines = Vec::new();

	for line in input.lines() {
		let open = scanner.is_open();
		if line.trim().is_empty() && !open {
			continue;
		}

		let prompt = if open || is_continuation(line) { "..." } else { ">>>" };
		if line.is_empty() {
			lines.push(prompt.to_string());
		} else {
			lines.push(format!("{prompt} {line}"));
		}
		scanner.scan(line);
	}

	if !expected_output.is_empty() {
		lines.push(expected_output.to_string());
	}

	lines.join("\n")
}

fn is_continuation(line: &str) -> bool {
	if line.starts_with([' ', '\t']) {
		return true;
	}

	let keyword = line.split(|c: char| !c.is_alphanumeric()).next().unwrap_or("");
	matches!(keyword, "elif" | "else" | "except" | "finally")
}

/// Lexical state carried from one source line to the next.
#[derive(Debug, Default)]
struct LineScanner {
	/// Quote character of an open triple-quoted string.
	triple_quote: Option<char>,
	/// Unclosed brackets.
	depth: usize,
	/// The last line ended with a backslash outside any string.
	escaped_newline: bool,
}

impl LineScanner {
	/// Whether the next line belongs to the current statement.
	fn is_open(&self) -> bool {
		self.triple_quote.is_some() || self.depth > 0 || self.escaped_newline
	}

	fn scan(&mut self, line: &str) {
		let chars: Vec<char> = line.chars().collect();
		let mut quote: Option<char> = None;
		let mut index = 0;

		while index < chars.len() {
			let c = chars[index];

			if let Some(open) = self.triple_quote {
				if c == '\\' {
					index += 2;
					continue;
				}
				if chars[index..].starts_with(&[open, open, open]) {
					self.triple_quote = None;
					index += 3;
					continue;
				}
			} else if let Some(open) = quote {
				if c == '\\' {
					index += 2;
					continue;
				}
				if c == open {
					quote = None;
				}
			} else {
				match c {
					'#' => break,
					'"' | '\'' if chars[index..].starts_with(&[c, c, c]) => {
						self.triple_quote = Some(c);
						index += 3;
						continue;
					}
					'"' | '\'' => quote = Some(c),
					'(' | '[' | '{' => self.depth += 1,
					')' | ']' | '}' => self.depth = self.depth.saturating_sub(1),
					_ => {}
				}
			}

			index += 1;
		}

		self.escaped_newline =
			self.triple_quote.is_none() && quote.is_none() && line.trim_end().ends_with('\\');
	}
}

const PYTHON_INDENT: &str = "    ";

fn write_python(value: &Value, depth: usize, output: &mut String) {
	match value {
		Value::Null => output.push_str("None"),
		Value::Bool(true) => output.push_str("True"),
		Value::Bool(false) => output.push_str("False"),
		Value::Number(number) => output.push_str(&number.to_string()),
		Value::String(text) => output.push_str(&python_string(text)),
		Value::Array(items) => {
			if items.is_empty() {
				output.push_str("[]");
				return;
			}
			output.push_str("[\n");
			for item in items {
				output.push_str(&PYTHON_INDENT.repeat(depth + 1));
				write_python(item, depth + 1, output);
				output.push_str(",\n");
			}
			output.push_str(&PYTHON_INDENT.repeat(depth));
			output.push(']');
		}
		Value::Object(map) => {
			if map.is_empty() {
				output.push_str("{}");
				return;
			}
			output.push_str("{\n");
			for (key, item) in map {
				output.push_str(&PYTHON_INDENT.repeat(depth + 1));
				output.push_str(&python_string(key));
				output.push_str(": ");
				write_python(item, depth + 1, output);
				output.push_str(",\n");
			}
			output.push_str(&PYTHON_INDENT.repeat(depth));
			output.push('}');
		}
	}
}

/// Multi-line strings become raw triple-quoted literals so doctest
/// transcripts stay readable; everything else uses JSON escaping, which is a
/// valid Python string literal.
fn python_string(text: &str) -> String {
	let raw_safe = !text.contains("\"\"\"") && !text.ends_with(['"', '\\']);
	if text.contains('\n') && raw_safe {
		format!("r\"\"\"{text}\"\"\"")
	} else {
		Value::String(text.to_string()).to_string()
	}
}
