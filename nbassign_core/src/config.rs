use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::AssignError;
use crate::AssignResult;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] =
	["nbassign.toml", ".nbassign.toml", ".config/nbassign.toml"];

/// Default directory, relative to each generated notebook, holding test
/// files.
pub const DEFAULT_TESTS_DIR: &str = "tests";

/// Default module providing the grading handle in generated notebooks.
pub const DEFAULT_GRADER_MODULE: &str = "otter";

/// Configuration for an assignment.
///
/// Loaded from an `nbassign.toml` file and then updated by any
/// `BEGIN ASSIGNMENT` blocks in the master notebook.
///
/// ```toml
/// name = "hw01"
/// init_cell = true
/// check_all_cell = true
/// export_cell = true
/// export_pdf = true
/// seed = 42
///
/// [tests]
/// files = true
/// dir = "tests"
/// format = "python"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct AssignConfig {
	/// Assignment name, also used as the generated notebooks' file stem.
	pub name: Option<String>,
	/// Insert a locked cell creating the grading handle at the top.
	pub init_cell: bool,
	/// Append a locked cell running every check at the end.
	pub check_all_cell: bool,
	/// Append locked export instructions at the end.
	pub export_cell: bool,
	/// Whether the export call also renders a PDF.
	pub export_pdf: bool,
	/// Extra text added to the export instructions.
	pub export_instructions: Option<String>,
	/// Request a solutions PDF from the renderer.
	pub solutions_pdf: bool,
	/// Request a template PDF of manually graded questions from the renderer.
	pub template_pdf: bool,
	/// Request an autograder bundle from the packaging step.
	pub generate: bool,
	/// Seed for cells marked `# SEED`.
	pub seed: Option<u64>,
	/// Module imported by the init cell to create the grading handle.
	pub grader_module: String,
	pub tests: TestsConfig,
}

impl Default for AssignConfig {
	fn default() -> Self {
		Self {
			name: None,
			init_cell: true,
			check_all_cell: true,
			export_cell: true,
			export_pdf: true,
			export_instructions: None,
			solutions_pdf: false,
			template_pdf: false,
			generate: false,
			seed: None,
			grader_module: DEFAULT_GRADER_MODULE.to_string(),
			tests: TestsConfig::default(),
		}
	}
}

/// Where and how test definitions are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestsConfig {
	/// Write one file per question. When false, definitions are embedded in
	/// the notebook metadata instead.
	pub files: bool,
	/// Directory, relative to each notebook, holding the test files.
	pub dir: PathBuf,
	pub format: TestFileFormat,
}

impl Default for TestsConfig {
	fn default() -> Self {
		Self {
			files: true,
			dir: PathBuf::from(DEFAULT_TESTS_DIR),
			format: TestFileFormat::default(),
		}
	}
}

/// Serialization used for standalone test files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum TestFileFormat {
	/// A Python module assigning the definition to `test`.
	#[default]
	Python,
	/// A JSON document.
	Json,
}

impl TestFileFormat {
	pub fn extension(self) -> &'static str {
		match self {
			Self::Python => "py",
			Self::Json => "json",
		}
	}
}

/// Keys accepted in a notebook's `BEGIN ASSIGNMENT` block. Each key present
/// replaces the corresponding configuration value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
	pub name: Option<String>,
	pub init_cell: Option<bool>,
	pub check_all_cell: Option<bool>,
	pub export_cell: Option<bool>,
	pub export_pdf: Option<bool>,
	pub export_instructions: Option<String>,
	pub solutions_pdf: Option<bool>,
	pub template_pdf: Option<bool>,
	pub generate: Option<bool>,
	pub seed: Option<u64>,
	pub grader_module: Option<String>,
	pub tests: Option<TestsOverrides>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestsOverrides {
	pub files: Option<bool>,
	pub dir: Option<PathBuf>,
	pub format: Option<TestFileFormat>,
}

impl AssignConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if no config file exists.
	pub fn load(root: &Path) -> AssignResult<Option<AssignConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		Self::load_file(&config_path).map(Some)
	}

	/// Load the config from an explicit file.
	pub fn load_file(path: &Path) -> AssignResult<AssignConfig> {
		let content = std::fs::read_to_string(path)?;
		toml::from_str(&content).map_err(|e| AssignError::ConfigParse(e.to_string()))
	}

	/// Apply the keys set in a `BEGIN ASSIGNMENT` block.
	pub fn apply(&mut self, overrides: ConfigOverrides) {
		let ConfigOverrides {
			name,
			init_cell,
			check_all_cell,
			export_cell,
			export_pdf,
			export_instructions,
			solutions_pdf,
			template_pdf,
			generate,
			seed,
			grader_module,
			tests,
		} = overrides;

		if name.is_some() {
			self.name = name;
		}
		if export_instructions.is_some() {
			self.export_instructions = export_instructions;
		}
		if seed.is_some() {
			self.seed = seed;
		}
		if let Some(module) = grader_module {
			self.grader_module = module;
		}

		for (slot, value) in [
			(&mut self.init_cell, init_cell),
			(&mut self.check_all_cell, check_all_cell),
			(&mut self.export_cell, export_cell),
			(&mut self.export_pdf, export_pdf),
			(&mut self.solutions_pdf, solutions_pdf),
			(&mut self.template_pdf, template_pdf),
			(&mut self.generate, generate),
		] {
			if let Some(value) = value {
				*slot = value;
			}
		}

		if let Some(tests) = tests {
			if let Some(files) = tests.files {
				self.tests.files = files;
			}
			if let Some(dir) = tests.dir {
				self.tests.dir = dir;
			}
			if let Some(format) = tests.format {
				self.tests.format = format;
			}
		}
	}

	/// The file stem of the generated notebooks: the configured name, else
	/// the master notebook's own stem.
	pub fn notebook_stem(&self, master: &Path) -> String {
		self.name.clone().unwrap_or_else(|| {
			master
				.file_stem()
				.map_or_else(|| "assignment".to_string(), |stem| stem.to_string_lossy().into_owned())
		})
	}
}
