//! Sentinel grammar for master notebooks. Every marker the classifier and
//! the redactor recognize is defined here and nowhere else.

use std::sync::LazyLock;

use regex::Regex;

/// First interior line of a fenced question metadata block.
pub const BEGIN_QUESTION: &str = "BEGIN QUESTION";
/// First interior line of a fenced assignment config block.
pub const BEGIN_ASSIGNMENT: &str = "BEGIN ASSIGNMENT";
/// Lines starting with this open or close a fenced metadata block.
pub const FENCE: &str = "```";

/// Markers consumed by the PDF renderer to find manually graded regions.
pub const PDF_BEGIN_QUESTION: &str = "<!-- BEGIN QUESTION -->";
pub const PDF_END_QUESTION: &str = "<!-- END QUESTION -->";

pub const BEGIN_SOLUTION: &str = "# BEGIN SOLUTION";
pub const END_SOLUTION: &str = "# END SOLUTION";
pub const BEGIN_IGNORE: &str = "# BEGIN IGNORE";
pub const END_IGNORE: &str = "# END IGNORE";
pub const BEGIN_TEST_CONFIG: &str = "# BEGIN TEST CONFIG";
pub const END_TEST_CONFIG: &str = "# END TEST CONFIG";

/// Line suffixes dropped from the student copy without a placeholder.
pub const SKIP_SUFFIXES: [&str; 4] = [
	"# SOLUTION NO PROMPT",
	"# BEGIN PROMPT",
	"# END PROMPT",
	SEED_SUFFIX,
];
pub const SEED_SUFFIX: &str = "# SEED";
/// Line suffix removed from both copies.
pub const IGNORE_SUFFIX: &str = "# IGNORE";

/// `# TEST`, `# HIDDEN TEST`, `## TEST ##`, and `## HIDDEN TEST ##`.
pub(crate) static TEST_HEADER: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)^\s*(?:##\s*(?P<a>hidden\s+)?test\s*##|#\s*(?P<b>hidden\s+)?test)\s*$")
		.unwrap_or_else(|e| panic!("invalid test header pattern: {e}"))
});

/// A markdown line declaring the cell to be a written solution.
pub(crate) static MARKDOWN_SOLUTION: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)##\s*solution\s*##")
		.unwrap_or_else(|e| panic!("invalid markdown solution pattern: {e}"))
});

/// `target = value # SOLUTION`, keeping the target and operator.
pub(crate) static SOLUTION_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(
		r"^(?P<lhs>\s*[A-Za-z_][\w.]*(?:\[[^\]]*\])*(?:\s*,\s*[A-Za-z_][\w.]*(?:\[[^\]]*\])*)*\s*(?:\*\*|//|>>|<<|[-+*/%@&|^])?=)(?P<rhs>[^=].*?)#\s*SOLUTION\s*$",
	)
	.unwrap_or_else(|e| panic!("invalid solution assignment pattern: {e}"))
});

/// Any other code line ending in `# SOLUTION`.
pub(crate) static SOLUTION_LINE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^(?P<indent>\s*)[^#\s].*?#\s*SOLUTION\s*$")
		.unwrap_or_else(|e| panic!("invalid solution line pattern: {e}"))
});

/// Question names: a letter followed by letters, digits, or underscores.
pub(crate) static QUESTION_NAME: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$")
		.unwrap_or_else(|e| panic!("invalid question name pattern: {e}"))
});

/// Whether `line` ends with `marker`, ignoring trailing whitespace.
pub(crate) fn ends_with_marker(line: &str, marker: &str) -> bool {
	line.trim_end().ends_with(marker)
}

/// Whether the test header on `line` declares a hidden test.
pub(crate) fn is_hidden_test_header(line: &str) -> bool {
	TEST_HEADER
		.captures(line)
		.is_some_and(|captures| captures.name("a").is_some() || captures.name("b").is_some())
}

/// Leading whitespace of `line`.
pub(crate) fn indentation(line: &str) -> &str {
	&line[..line.len() - line.trim_start().len()]
}
