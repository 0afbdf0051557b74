use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::AssignError;
use crate::AssignResult;
use crate::patterns::QUESTION_NAME;

/// Metadata declared in a question's `BEGIN QUESTION` block.
///
/// ```yaml
/// name: q1
/// points: 2
/// manual: false
/// check_cell: true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuestionConfig {
	/// Identifier used for test files and check cells.
	pub name: String,
	/// Either a total split across the test cases or one value per case.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub points: Option<PointSpec>,
	/// Graded by a person rather than by tests.
	#[serde(default)]
	pub manual: bool,
	/// Emit a "run checks" cell after the question when one is warranted.
	#[serde(default = "default_check_cell")]
	pub check_cell: bool,
}

fn default_check_cell() -> bool {
	true
}

/// The `points` value of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointSpec {
	Total(f64),
	PerCase(Vec<f64>),
}

/// Metadata declared in a test cell's `BEGIN TEST CONFIG` block.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestCaseConfig {
	#[serde(default)]
	pub hidden: Option<bool>,
	#[serde(default)]
	pub points: Option<f64>,
	#[serde(default)]
	pub success_message: Option<String>,
	#[serde(default)]
	pub failure_message: Option<String>,
}

/// Parse the key-value lines of a metadata block into `T`.
///
/// `kind` names the block in error messages.
pub fn parse_metadata<T, S>(kind: &str, lines: &[S]) -> AssignResult<T>
where
	T: DeserializeOwned,
	S: AsRef<str>,
{
	let source = lines
		.iter()
		.map(AsRef::as_ref)
		.collect::<Vec<_>>()
		.join("\n");

	if source.trim().is_empty() {
		return Err(AssignError::MetadataParse {
			kind: kind.to_string(),
			reason: "the block is empty".to_string(),
		});
	}

	serde_yaml_ng::from_str(&source).map_err(|e| {
		AssignError::MetadataParse {
			kind: kind.to_string(),
			reason: e.to_string(),
		}
	})
}

/// Parse and validate a `BEGIN QUESTION` block.
pub fn parse_question<S: AsRef<str>>(lines: &[S]) -> AssignResult<QuestionConfig> {
	let question: QuestionConfig = parse_metadata("question", lines)?;

	if !QUESTION_NAME.is_match(&question.name) {
		return Err(AssignError::InvalidQuestionName(question.name));
	}

	Ok(question)
}

/// Parse a `BEGIN TEST CONFIG` block.
pub fn parse_test_config<S: AsRef<str>>(lines: &[S]) -> AssignResult<TestCaseConfig> {
	// Blocks that only exist to mark a test cell are allowed to be empty.
	if lines.iter().all(|line| line.as_ref().trim().is_empty()) {
		return Ok(TestCaseConfig::default());
	}

	parse_metadata("test", lines)
}
