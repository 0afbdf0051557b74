use std::path::Path;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use nbassign_cli::Commands;
use nbassign_cli::NbassignCli;
use nbassign_cli::OutputFormat;
use nbassign_core::AssignConfig;
use nbassign_core::AssignmentOutput;
use nbassign_core::Notebook;
use nbassign_core::TestDefinition;
use nbassign_core::assemble;
use nbassign_core::write_output;
use owo_colors::OwoColorize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Directory, next to the master notebook, receiving generated copies when
/// `--output` is not given.
const DEFAULT_OUTPUT_DIR: &str = "dist";

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = NbassignCli::parse();

	// Respect NO_COLOR, --no-color, and terminals without color support.
	let use_color = !args.no_color
		&& std::env::var_os("NO_COLOR").is_none()
		&& supports_color::on(supports_color::Stream::Stderr).is_some();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	init_tracing(args.verbose, use_color);

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let result = match &args.command {
		Some(Commands::Run {
			master,
			output,
			config,
		}) => run_generate(master, output.as_deref(), config.as_deref()),
		Some(Commands::Check {
			master,
			config,
			format,
		}) => run_check(master, config.as_deref(), *format),
		None => {
			eprintln!("No subcommand specified. Run `nbassign --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		// Try to render through miette for rich diagnostics with help text
		// and error codes.
		match e.downcast::<nbassign_core::AssignError>() {
			Ok(assign_err) => {
				let report: miette::Report = (*assign_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

/// Log to stderr. `RUST_LOG` wins over the default level; `--verbose`
/// raises the default from `warn` to `debug`.
fn init_tracing(verbose: bool, use_color: bool) {
	let default_level = if verbose { "debug" } else { "warn" };
	let filter = if verbose {
		EnvFilter::new(default_level)
	} else {
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
	};

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.without_time()
		.try_init()
		.ok();
}

/// The directory holding the master notebook, used for config discovery
/// and the default output directory.
fn project_root(master: &Path) -> PathBuf {
	master
		.parent()
		.filter(|parent| !parent.as_os_str().is_empty())
		.map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Resolve the config file, returning the config and the file it came from.
fn load_config(
	master: &Path,
	explicit: Option<&Path>,
) -> Result<(AssignConfig, Option<PathBuf>), Box<dyn std::error::Error>> {
	if let Some(path) = explicit {
		return Ok((AssignConfig::load_file(path)?, Some(path.to_path_buf())));
	}

	let root = project_root(master);
	match AssignConfig::resolve_path(&root) {
		Some(path) => Ok((AssignConfig::load_file(&path)?, Some(path))),
		None => Ok((AssignConfig::default(), None)),
	}
}

fn build(
	master: &Path,
	config: Option<&Path>,
) -> Result<(AssignmentOutput, Option<PathBuf>), Box<dyn std::error::Error>> {
	let (config, config_path) = load_config(master, config)?;
	if let Some(path) = &config_path {
		debug!(path = %path.display(), "loaded config");
	}

	let notebook = Notebook::load(master)?;
	debug!(cells = notebook.len(), "loaded master notebook");

	Ok((assemble(&notebook, config)?, config_path))
}

fn print_section(title: &str) {
	println!();
	println!("{}", colored!(title, bold));
}

fn print_field(label: &str, value: impl std::fmt::Display) {
	println!("{label:<28} {value}");
}

fn case_counts(test: &TestDefinition) -> (usize, usize) {
	let hidden = test.cases().filter(|case| case.hidden).count();
	(test.cases().count() - hidden, hidden)
}

fn print_questions(output: &AssignmentOutput) {
	print_section("Questions");
	if output.autograder_tests.is_empty() {
		println!("  (none)");
		return;
	}

	for test in &output.autograder_tests {
		let (public, hidden) = case_counts(test);
		println!(
			"  {:<20} {} point(s), {public} public and {hidden} hidden test(s)",
			test.name, test.points
		);
	}
}

/// Work handed to external collaborators is only reported, never
/// performed.
fn print_requests(config: &AssignConfig) {
	let requests: Vec<&str> = [
		(config.solutions_pdf, "solutions PDF"),
		(config.template_pdf, "manual question template PDF"),
		(config.generate, "autograder bundle"),
	]
	.into_iter()
	.filter_map(|(enabled, label)| enabled.then_some(label))
	.collect();

	if requests.is_empty() {
		return;
	}

	print_section("Requested from downstream tools");
	for request in requests {
		println!("  {request}");
	}
}

fn run_generate(
	master: &Path,
	output: Option<&Path>,
	config: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
	let (assignment, config_path) = build(master, config)?;
	let dest = output.map_or_else(
		|| project_root(master).join(DEFAULT_OUTPUT_DIR),
		Path::to_path_buf,
	);
	let stem = assignment.config.notebook_stem(master);
	let written = write_output(&assignment, &stem, &dest)?;

	println!(
		"{} {} question(s) into {}",
		colored!("Generated", green),
		assignment.autograder_tests.len(),
		dest.display()
	);

	print_section("Summary");
	print_field(
		"Resolved config",
		config_path.map_or_else(|| "(defaults)".to_string(), |path| path.display().to_string()),
	);
	print_field("Notebook name", format!("{stem}.ipynb"));
	print_field("Total points", nbassign_core::Points(assignment.total_points()));
	print_field("Files written", written.len());
	if let Some(seed) = assignment.config.seed {
		print_field("Seed", seed);
	}

	print_questions(&assignment);
	print_requests(&assignment.config);

	if assignment.seed_required {
		println!();
		println!(
			"{} `# SEED` lines were removed from the student copy",
			colored!("note:", yellow)
		);
	}

	Ok(())
}

fn run_check(
	master: &Path,
	config: Option<&Path>,
	format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
	let assignment = match build(master, config) {
		Ok((assignment, _)) => assignment,
		Err(e) => {
			if matches!(format, OutputFormat::Json) {
				let output = serde_json::json!({
					"ok": false,
					"error": e.to_string(),
				});
				println!("{output}");
			}
			return Err(e);
		}
	};

	match format {
		OutputFormat::Json => {
			let questions: Vec<serde_json::Value> = assignment
				.autograder_tests
				.iter()
				.map(|test| {
					let (public, hidden) = case_counts(test);
					serde_json::json!({
						"name": test.name,
						"points": test.points,
						"public_cases": public,
						"hidden_cases": hidden,
					})
				})
				.collect();
			let output = serde_json::json!({
				"ok": true,
				"questions": questions,
				"total_points": nbassign_core::Points(assignment.total_points()),
				"seed_required": assignment.seed_required,
			});
			println!("{output}");
		}
		OutputFormat::Text => {
			println!(
				"Check passed: {} question(s), {} point(s).",
				assignment.autograder_tests.len(),
				nbassign_core::Points(assignment.total_points())
			);
			print_questions(&assignment);
		}
	}

	Ok(())
}
