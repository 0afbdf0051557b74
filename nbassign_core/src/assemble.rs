use std::path::Path;
use std::path::PathBuf;

use serde_json::Map;
use serde_json::Value;
use tracing::info;
use tracing::warn;

use crate::AssignConfig;
use crate::AssignResult;
use crate::Cell;
use crate::Notebook;
use crate::TestDefinition;
use crate::TestFileFormat;
use crate::transform::GRADER_HANDLE;
use crate::transform::METADATA_KEY;
use crate::transform::transform;

/// Directory holding the instructor copy and its complete tests.
pub const AUTOGRADER_DIR: &str = "autograder";
/// Directory holding the student copy and its public tests.
pub const STUDENT_DIR: &str = "student";
/// Directory inside the staging area receiving replaced output.
const BACKUP_DIR: &str = "previous";

const CHECK_ALL_INSTRUCTIONS: &str = "---\n\nTo double-check your work, the cell below will \
                                      rerun all of the autograder tests.";
const EXPORT_INSTRUCTIONS: &str = "## Submission\n\nMake sure you have run all cells in your \
                                   notebook in order before running the cell below, so that \
                                   all images/graphs appear in the output. The cell below will \
                                   generate a zip file for you to submit. **Please save before \
                                   exporting!**";

/// Everything produced from one master notebook.
#[derive(Debug, Clone)]
pub struct AssignmentOutput {
	/// Instructor copy with solutions intact.
	pub autograder: Notebook,
	/// Student copy with solutions redacted.
	pub student: Notebook,
	/// Complete test definitions, one per question.
	pub autograder_tests: Vec<TestDefinition>,
	/// Test definitions with hidden cases removed.
	pub student_tests: Vec<TestDefinition>,
	/// The configuration after every in-notebook override.
	pub config: AssignConfig,
	pub seed_required: bool,
}

impl AssignmentOutput {
	/// Sum of the points of every question.
	pub fn total_points(&self) -> f64 {
		self.autograder_tests.iter().map(|test| test.points.0).sum()
	}
}

/// Transform `master` and wrap both copies with the configured boilerplate.
/// Nothing is written to disk.
pub fn assemble(master: &Notebook, config: AssignConfig) -> AssignResult<AssignmentOutput> {
	let transformed = transform(&master.cells, config)?;
	let config = transformed.config;

	let (leading, trailing) = boilerplate(&config);
	let wrap = |cells: Vec<Cell>| -> Vec<Cell> {
		leading
			.iter()
			.cloned()
			.chain(cells)
			.chain(trailing.iter().cloned())
			.collect()
	};

	let mut autograder = master.with_cells(wrap(transformed.autograder));
	let mut student = master.with_cells(wrap(transformed.student));
	let student_tests: Vec<TestDefinition> = transformed
		.tests
		.iter()
		.map(TestDefinition::public_only)
		.collect();

	if !config.tests.files {
		embed_tests(&mut autograder, &transformed.tests)?;
		embed_tests(&mut student, &student_tests)?;
	}

	Ok(AssignmentOutput {
		autograder,
		student,
		autograder_tests: transformed.tests,
		student_tests,
		config,
		seed_required: transformed.seed_required,
	})
}

/// The locked cells placed before and after the transformed cells.
fn boilerplate(config: &AssignConfig) -> (Vec<Cell>, Vec<Cell>) {
	let mut leading = Vec::new();
	let mut trailing = Vec::new();

	if config.init_cell {
		leading.push(Cell::code(init_source(config)).with_locked());
	}

	if config.check_all_cell {
		trailing.push(Cell::markdown(CHECK_ALL_INSTRUCTIONS).with_locked());
		trailing.push(Cell::code(format!("{GRADER_HANDLE}.check_all()")).with_locked());
	}

	if config.export_cell {
		let mut instructions = EXPORT_INSTRUCTIONS.to_string();
		if let Some(extra) = &config.export_instructions {
			instructions.push_str("\n\n");
			instructions.push_str(extra.trim());
		}
		let pdf = if config.export_pdf { "True" } else { "False" };

		trailing.push(Cell::markdown(instructions).with_locked());
		trailing.push(
			Cell::code(format!(
				"# Save your notebook first, then run this cell to export your \
				 submission.\n{GRADER_HANDLE}.export(pdf={pdf})"
			))
			.with_locked(),
		);
	}

	(leading, trailing)
}

fn init_source(config: &AssignConfig) -> String {
	let module = &config.grader_module;
	let handle = if config.tests.files {
		format!(
			"{GRADER_HANDLE} = {module}.Notebook(tests_dir=\"{}\")",
			config.tests.dir.display()
		)
	} else {
		format!("{GRADER_HANDLE} = {module}.Notebook()")
	};

	format!("# Initialize the grader\nimport {module}\n{handle}")
}

/// Store definitions under `nbassign.tests` in the notebook metadata.
fn embed_tests(notebook: &mut Notebook, tests: &[TestDefinition]) -> AssignResult<()> {
	let mut embedded = Map::new();
	for test in tests {
		embedded.insert(test.name.clone(), test.to_value()?);
	}

	let entry = notebook
		.metadata
		.entry(METADATA_KEY.to_string())
		.or_insert_with(|| Value::Object(Map::new()));
	if !entry.is_object() {
		*entry = Value::Object(Map::new());
	}
	if let Value::Object(map) = entry {
		map.insert("tests".to_string(), Value::Object(embedded));
	}

	Ok(())
}

/// Render each definition to its file name and content.
pub fn render_tests(
	tests: &[TestDefinition],
	format: TestFileFormat,
) -> AssignResult<Vec<(String, String)>> {
	tests
		.iter()
		.map(|test| {
			let content = match format {
				TestFileFormat::Python => test.to_python()?,
				TestFileFormat::Json => test.to_json()?,
			};
			Ok((format!("{}.{}", test.name, format.extension()), content))
		})
		.collect()
}

/// Write both copies under `dest/autograder` and `dest/student`.
///
/// Everything is rendered first and staged in a temporary directory inside
/// `dest`; the final directories are only replaced once every file has been
/// written. Returns the paths of the written files.
pub fn write_output(output: &AssignmentOutput, stem: &str, dest: &Path) -> AssignResult<Vec<PathBuf>> {
	let mut files: Vec<(PathBuf, String)> = Vec::new();
	let notebook_name = format!("{stem}.ipynb");

	for (dir, notebook, tests) in [
		(AUTOGRADER_DIR, &output.autograder, &output.autograder_tests),
		(STUDENT_DIR, &output.student, &output.student_tests),
	] {
		let base = PathBuf::from(dir);
		files.push((base.join(&notebook_name), notebook.to_json()?));

		if output.config.tests.files {
			let tests_dir = base.join(&output.config.tests.dir);
			for (name, content) in render_tests(tests, output.config.tests.format)? {
				files.push((tests_dir.join(name), content));
			}
		}
	}

	std::fs::create_dir_all(dest)?;
	let staging = dest.join(format!(".nbassign-staging-{}", std::process::id()));
	if let Err(error) = stage_files(&staging, &files) {
		let _ = std::fs::remove_dir_all(&staging);
		return Err(error);
	}

	replace_dirs(&staging, dest, &[AUTOGRADER_DIR, STUDENT_DIR])?;
	std::fs::remove_dir_all(&staging)?;

	let written: Vec<PathBuf> = files.into_iter().map(|(path, _)| dest.join(path)).collect();
	for path in &written {
		info!(path = %path.display(), "wrote artifact");
	}

	Ok(written)
}

/// Move each of `dirs` from `staging` into `dest`. Existing directories are
/// first moved aside into `staging`; when any move fails, every directory
/// already moved is put back and the staging directory is removed.
pub(crate) fn replace_dirs(staging: &Path, dest: &Path, dirs: &[&str]) -> AssignResult<()> {
	let backups = staging.join(BACKUP_DIR);
	std::fs::create_dir_all(&backups)?;

	let mut moved_aside = Vec::new();
	let mut placed = Vec::new();
	let result = swap_dirs(staging, dest, &backups, dirs, &mut moved_aside, &mut placed);

	if result.is_err() {
		let mut restored = true;
		for dir in placed.iter().rev() {
			restored &= std::fs::rename(dest.join(dir), staging.join(dir)).is_ok();
		}
		for dir in moved_aside.iter().rev() {
			restored &= std::fs::rename(backups.join(dir), dest.join(dir)).is_ok();
		}

		if restored {
			let _ = std::fs::remove_dir_all(staging);
		} else {
			warn!(path = %staging.display(), "previous output could not be restored");
		}
	}

	result
}

fn swap_dirs<'a>(
	staging: &Path,
	dest: &Path,
	backups: &Path,
	dirs: &[&'a str],
	moved_aside: &mut Vec<&'a str>,
	placed: &mut Vec<&'a str>,
) -> AssignResult<()> {
	for &dir in dirs {
		let target = dest.join(dir);
		if target.exists() {
			warn!(path = %target.display(), "replacing existing output directory");
			std::fs::rename(&target, backups.join(dir))?;
			moved_aside.push(dir);
		}
	}

	for &dir in dirs {
		std::fs::rename(staging.join(dir), dest.join(dir))?;
		placed.push(dir);
	}

	Ok(())
}

fn stage_files(staging: &Path, files: &[(PathBuf, String)]) -> AssignResult<()> {
	for (relative, content) in files {
		let path = staging.join(relative);
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(&path, content)?;
	}

	Ok(())
}
