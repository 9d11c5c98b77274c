use clap::{Parser, Subcommand};
use mailgate::config::{self, ValidatorConfig};
use mailgate::imaging::RustBackend;
use mailgate::inline_css::{CssFetcher, HttpFetcher, OfflineFetcher};
use mailgate::pipeline::{self, CollaboratorError, Discard, Notifier, Pipeline};
use mailgate::report::ValidationReport;
use mailgate::{intake, metadata, output};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Shared flags for commands that read an upload.
#[derive(clap::Args, Clone)]
struct InputArgs {
    /// Zip archive to read
    archive: PathBuf,

    /// Treat the input file as base64 text wrapping the zip
    #[arg(long)]
    base64: bool,
}

#[derive(Parser)]
#[command(name = "mailgate")]
#[command(about = "Acceptance gate for zipped HTML email templates")]
#[command(long_about = "\
Acceptance gate for zipped HTML email templates

An upload is a zip archive holding exactly one HTML document plus its images
and optional stylesheets:

  template.zip
  ├── index.html          # the one HTML document
  ├── styles.css          # inlined into <style> blocks before checking
  └── images/
      ├── hero.jpg        # at most 600px wide, 72 dpi when declared
      └── logo.png

Pipeline:
  1. intake   unzip, require exactly one .html entry
  2. resize   only when the upload exceeds the size budget (300 KB)
  3. inline   replace <link rel=\"stylesheet\"> with inline CSS
  4. checks   images, scripts, map/CSS policy, backgrounds, video,
              dimensions, link hygiene (opt-in), suspicious content

Exit status is 0 when the template passes, 1 when checks fail, and 2 on a
fatal error (unreadable archive, unreachable size budget, bad config).

Run 'mailgate gen-config' to generate a documented mailgate.toml.")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./mailgate.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log library diagnostics to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline over one upload
    Check {
        #[command(flatten)]
        input: InputArgs,

        /// Never fetch remote stylesheets
        #[arg(long)]
        no_fetch: bool,

        /// Print the audit record as JSON instead of the text report
        #[arg(long)]
        json: bool,

        /// Write the HTML report to this file
        #[arg(long, value_name = "OUT")]
        html: Option<PathBuf>,
    },
    /// Print width, format and density for every image in an upload
    Inspect {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Print a stock mailgate.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match cli.command {
        Command::Check {
            input,
            no_fetch,
            json,
            html,
        } => {
            let config = resolve_config(cli.config.as_deref())?;
            init_thread_pool(&config.processing);

            let backend = RustBackend::new();
            let fetcher: Box<dyn CssFetcher> = if no_fetch || !config.css.fetch_remote {
                Box::new(OfflineFetcher)
            } else {
                Box::new(HttpFetcher::new(config.css.fetch_timeout()))
            };
            let file_notifier = html.map(|path| FileNotifier { path });
            let mut pipeline = Pipeline::new(&config, &backend, fetcher.as_ref())
                .with_publisher(&Discard);
            if let Some(notifier) = &file_notifier {
                pipeline = pipeline.with_notifier(notifier);
            }

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    if json {
                        continue;
                    }
                    for line in output::format_pipeline_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = if input.base64 {
                let payload = std::fs::read_to_string(&input.archive)?;
                pipeline::run_base64(&pipeline, &payload, Some(tx))
            } else {
                let bytes = std::fs::read(&input.archive)?;
                pipeline.run(&bytes, Some(tx))
            };
            printer.join().ok();
            let outcome = result?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.audit_record())?);
            } else {
                println!();
                if let Some(resize) = &outcome.resize {
                    output::print_resize(resize);
                    println!();
                }
                output::print_report(&outcome.report);
                output::print_error_log(&outcome.report);
                output::print_status(&outcome);
            }

            Ok(if outcome.passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Inspect { input } => {
            let config = resolve_config(cli.config.as_deref())?;
            let archive = if input.base64 {
                intake::read_base64_archive(&std::fs::read_to_string(&input.archive)?)?
            } else {
                intake::read_archive(&std::fs::read(&input.archive)?)?
            };
            let reports = metadata::inspect(&archive, &RustBackend::new());
            output::print_inspect(&reports, &config.limits);
            Ok(ExitCode::SUCCESS)
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Load the explicit config file, or `mailgate.toml` from the working
/// directory when none is given. An explicit path must exist.
fn resolve_config(explicit: Option<&Path>) -> Result<ValidatorConfig, Box<dyn std::error::Error>> {
    match explicit {
        Some(path) if !path.exists() => {
            Err(format!("config file not found: {}", path.display()).into())
        }
        Some(path) => Ok(config::load_config(path)?),
        None => Ok(config::load_config(Path::new(config::DEFAULT_CONFIG_FILE))?),
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores — user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Writes the rendered report to a file.
struct FileNotifier {
    path: PathBuf,
}

impl Notifier for FileNotifier {
    fn notify(
        &self,
        _report: &ValidationReport,
        rendered_html: &str,
    ) -> Result<(), CollaboratorError> {
        std::fs::write(&self.path, rendered_html)
            .map_err(|e| CollaboratorError(format!("{}: {e}", self.path.display())))
    }
}

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        eprintln!("[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

/// Warnings always reach stderr; `--verbose` adds debug output.
fn init_logging(verbose: bool) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        });
    }
}
