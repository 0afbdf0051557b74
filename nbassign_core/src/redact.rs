use tracing::debug;

use crate::AssignError;
use crate::AssignResult;
use crate::patterns::BEGIN_IGNORE;
use crate::patterns::BEGIN_SOLUTION;
use crate::patterns::END_IGNORE;
use crate::patterns::END_SOLUTION;
use crate::patterns::IGNORE_SUFFIX;
use crate::patterns::SEED_SUFFIX;
use crate::patterns::SKIP_SUFFIXES;
use crate::patterns::SOLUTION_ASSIGNMENT;
use crate::patterns::SOLUTION_LINE;
use crate::patterns::ends_with_marker;
use crate::patterns::indentation;

/// The placeholder shown to students in place of solution code.
pub const PLACEHOLDER: &str = "...";

/// The result of redacting a cell for the student copy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Redacted {
	pub lines: Vec<String>,
	/// Whether a `# SEED` line was removed.
	pub seed_required: bool,
}

/// A block kind tracked while walking a cell's lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
	Solution,
	Ignore,
}

impl BlockKind {
	fn begin(self) -> &'static str {
		match self {
			Self::Solution => BEGIN_SOLUTION,
			Self::Ignore => BEGIN_IGNORE,
		}
	}

	fn end(self) -> &'static str {
		match self {
			Self::Solution => END_SOLUTION,
			Self::Ignore => END_IGNORE,
		}
	}
}

/// The markers recognized on a single line, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineMarker {
	Skip { seed: bool },
	Begin { kind: BlockKind, prompt: bool },
	End(BlockKind),
	IgnoreLine,
	None,
}

fn line_marker(line: &str) -> LineMarker {
	if ends_with_marker(line, "# BEGIN SOLUTION NO PROMPT") {
		return LineMarker::Begin {
			kind: BlockKind::Solution,
			prompt: false,
		};
	}

	if let Some(suffix) = SKIP_SUFFIXES
		.iter()
		.find(|suffix| ends_with_marker(line, suffix))
	{
		return LineMarker::Skip {
			seed: *suffix == SEED_SUFFIX,
		};
	}

	if ends_with_marker(line, BEGIN_SOLUTION) {
		return LineMarker::Begin {
			kind: BlockKind::Solution,
			prompt: true,
		};
	}

	if ends_with_marker(line, END_SOLUTION) {
		return LineMarker::End(BlockKind::Solution);
	}

	if ends_with_marker(line, BEGIN_IGNORE) {
		return LineMarker::Begin {
			kind: BlockKind::Ignore,
			prompt: false,
		};
	}

	if ends_with_marker(line, END_IGNORE) {
		return LineMarker::End(BlockKind::Ignore);
	}

	if ends_with_marker(line, IGNORE_SUFFIX) {
		return LineMarker::IgnoreLine;
	}

	LineMarker::None
}

/// Tracks which blocks are open while walking a cell. Both must be closed by
/// the time the cell ends.
#[derive(Debug, Default)]
struct RedactionState {
	/// 1-indexed line that opened the current solution block.
	solution: Option<usize>,
	/// 1-indexed line that opened the current ignore block.
	ignore: Option<usize>,
}

impl RedactionState {
	fn slot(&mut self, kind: BlockKind) -> &mut Option<usize> {
		match kind {
			BlockKind::Solution => &mut self.solution,
			BlockKind::Ignore => &mut self.ignore,
		}
	}

	fn open(&mut self, kind: BlockKind, line: usize) -> AssignResult<()> {
		let slot = self.slot(kind);
		if slot.is_some() {
			return Err(AssignError::NestedBlock {
				marker: kind.begin().to_string(),
				line,
			});
		}

		*slot = Some(line);
		Ok(())
	}

	fn close(&mut self, kind: BlockKind, line: usize) -> AssignResult<()> {
		if self.slot(kind).take().is_none() {
			return Err(AssignError::UnmatchedEndMarker {
				marker: kind.end().to_string(),
				line,
			});
		}

		Ok(())
	}

	fn finish(self) -> AssignResult<()> {
		// Report the block that was opened first.
		let open = [
			(BlockKind::Solution, self.solution),
			(BlockKind::Ignore, self.ignore),
		]
		.into_iter()
		.filter_map(|(kind, line)| line.map(|line| (kind, line)))
		.min_by_key(|(_, line)| *line);

		match open {
			Some((kind, line)) => {
				Err(AssignError::UnclosedBlock {
					marker: kind.begin().to_string(),
					line,
				})
			}
			None => Ok(()),
		}
	}
}

/// Produce the student-visible version of a code cell's lines.
///
/// Skip-suffix lines are dropped, inline `# SOLUTION` lines are replaced by a
/// placeholder, solution blocks collapse to a single indented placeholder (or
/// nothing for `# BEGIN SOLUTION NO PROMPT`), and ignore blocks vanish.
/// Unbalanced or nested markers are errors.
pub fn redact<S: AsRef<str>>(lines: &[S]) -> AssignResult<Redacted> {
	let mut state = RedactionState::default();
	let mut redacted = Redacted::default();

	for (index, line) in lines.iter().enumerate() {
		let line = line.as_ref();
		let number = index + 1;
		let marker = line_marker(line);

		if state.ignore.is_some() {
			match marker {
				LineMarker::End(BlockKind::Ignore) => state.close(BlockKind::Ignore, number)?,
				LineMarker::Begin {
					kind: BlockKind::Ignore,
					..
				} => state.open(BlockKind::Ignore, number)?,
				_ => {}
			}
			continue;
		}

		if state.solution.is_some() {
			match marker {
				LineMarker::End(BlockKind::Solution) => state.close(BlockKind::Solution, number)?,
				LineMarker::Begin {
					kind: BlockKind::Solution,
					..
				} => state.open(BlockKind::Solution, number)?,
				LineMarker::Begin {
					kind: BlockKind::Ignore,
					..
				} => state.open(BlockKind::Ignore, number)?,
				LineMarker::End(BlockKind::Ignore) => state.close(BlockKind::Ignore, number)?,
				LineMarker::Skip { seed } => redacted.seed_required |= seed,
				_ => {}
			}
			continue;
		}

		match marker {
			LineMarker::Skip { seed } => {
				redacted.seed_required |= seed;
			}
			LineMarker::Begin { kind, prompt } => {
				state.open(kind, number)?;
				if prompt {
					redacted
						.lines
						.push(format!("{}{PLACEHOLDER}", indentation(line)));
				}
			}
			LineMarker::End(kind) => state.close(kind, number)?,
			LineMarker::IgnoreLine => {}
			LineMarker::None => redacted.lines.push(substitute_solution(line)),
		}
	}

	state.finish()?;

	if redacted.lines.len() != lines.len() {
		debug!(
			before = lines.len(),
			after = redacted.lines.len(),
			"redacted solution lines"
		);
	}

	Ok(redacted)
}

/// Remove instructor-only scaffolding (ignore blocks and `# IGNORE` lines)
/// while keeping solutions. This is what the autograder copy receives.
pub fn strip_ignored<S: AsRef<str>>(lines: &[S]) -> AssignResult<Vec<String>> {
	let mut state = RedactionState::default();
	let mut kept = Vec::with_capacity(lines.len());

	for (index, line) in lines.iter().enumerate() {
		let line = line.as_ref();
		let number = index + 1;

		match line_marker(line) {
			LineMarker::Begin {
				kind: BlockKind::Ignore,
				..
			} => state.open(BlockKind::Ignore, number)?,
			LineMarker::End(BlockKind::Ignore) => state.close(BlockKind::Ignore, number)?,
			LineMarker::IgnoreLine if state.ignore.is_none() => {}
			_ if state.ignore.is_some() => {}
			_ => kept.push(line.to_string()),
		}
	}

	state.finish()?;
	Ok(kept)
}

/// Rewrite a single line carrying an inline `# SOLUTION` marker.
fn substitute_solution(line: &str) -> String {
	if let Some(captures) = SOLUTION_ASSIGNMENT.captures(line) {
		return format!("{} {PLACEHOLDER}", &captures["lhs"]);
	}

	if let Some(captures) = SOLUTION_LINE.captures(line) {
		return format!("{}{PLACEHOLDER}", &captures["indent"]);
	}

	line.to_string()
}
