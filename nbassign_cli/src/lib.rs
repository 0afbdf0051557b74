use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Split a master assignment notebook into autograder and student copies.",
	long_about = "nbassign reads a master assignment notebook annotated with question blocks, \
	              solution markers, and test cells, and produces an autograder copy with \
	              solutions intact, a student copy with solutions redacted, and one test file \
	              per question.\n\nQuick start:\n  nbassign check hw01.ipynb  Validate the \
	              master notebook\n  nbassign run hw01.ipynb    Write dist/autograder and \
	              dist/student"
)]
pub struct NbassignCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Generate the autograder and student copies of a master notebook.
	///
	/// Writes `<output>/autograder` and `<output>/student`, each holding the
	/// transformed notebook and, unless tests are embedded in the notebook
	/// metadata, one test file per question. Nothing is written when the
	/// master notebook has an error.
	Run {
		/// Path to the master notebook.
		master: PathBuf,

		/// Directory receiving the generated copies. Defaults to `dist`
		/// next to the master notebook.
		#[arg(long, short)]
		output: Option<PathBuf>,

		/// Explicit config file. Defaults to the first of `nbassign.toml`,
		/// `.nbassign.toml`, or `.config/nbassign.toml` found next to the
		/// master notebook.
		#[arg(long, short)]
		config: Option<PathBuf>,
	},
	/// Validate a master notebook without writing anything.
	///
	/// Runs the full transformation in memory and reports the questions
	/// found with their points. Exits with a non-zero status code when the
	/// notebook has an error.
	Check {
		/// Path to the master notebook.
		master: PathBuf,

		/// Explicit config file.
		#[arg(long, short)]
		config: Option<PathBuf>,

		/// Output format for check results. Use `text` for human-readable
		/// output or `json` for programmatic consumption.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text output with colors and formatting.
	Text,
	/// JSON output for programmatic consumption.
	Json,
}
