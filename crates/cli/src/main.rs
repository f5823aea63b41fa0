use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use config::Config;
use engine::LineEngine;
use eyre::WrapErr;
use repl::{ReplDebugger, StdinLines};
use tracing_subscriber::EnvFilter;

/// Source name used for code passed with `--exec`.
const CMDLINE: &str = "<cmdline>";
/// Source name used for code read from standard input.
const STDIN: &str = "<stdin>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Debugger for jsonnet programs
#[derive(Debug, Parser)]
#[clap(version)]
struct Args {
    /// Program to debug, or `-` to read it from standard input
    #[clap(required_unless_present = "dap")]
    input: Option<String>,

    /// Treat the input as inline code rather than a file name
    #[clap(short, long)]
    exec: bool,

    /// Additional library search directory (repeatable)
    #[clap(short = 'J', long = "jpath", value_parser = non_empty)]
    jpath: Vec<String>,

    /// Start a debug adapter protocol server
    #[clap(short, long)]
    dap: bool,

    /// Speak the debug adapter protocol over stdin and stdout
    #[clap(short, long, requires = "dap")]
    stdin: bool,

    /// Port for the debug adapter protocol server
    #[clap(short, long)]
    port: Option<u16>,

    #[clap(short, long, value_enum)]
    log_level: Option<LogLevel>,

    /// Configuration file to use instead of the default one
    #[clap(short, long)]
    config: Option<PathBuf>,
}

fn non_empty(value: &str) -> Result<String, String> {
    if value.is_empty() {
        return Err("-J argument was empty string".to_string());
    }
    Ok(value.to_string())
}

/// A program ready to hand to the REPL.
#[derive(Debug, PartialEq, Eq)]
struct Program {
    name: String,
    source: String,
    search_paths: Vec<String>,
}

/// The name a program is known by, used in error messages before it is read.
fn source_name(input: &str, exec: bool) -> &str {
    match (exec, input) {
        (true, _) => CMDLINE,
        (false, "-") => STDIN,
        (false, path) => path,
    }
}

fn read_program(
    input: &str,
    exec: bool,
    mut search_paths: Vec<String>,
    mut stdin: impl Read,
) -> io::Result<Program> {
    let name = source_name(input, exec).to_string();
    let source = if exec {
        input.to_string()
    } else if input == "-" {
        let mut source = String::new();
        stdin.read_to_string(&mut source)?;
        source
    } else {
        let source = std::fs::read_to_string(input)?;
        search_paths.push(parent_dir(Path::new(input)));
        source
    };

    Ok(Program {
        name,
        source,
        search_paths,
    })
}

fn parent_dir(path: &Path) -> String {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.display().to_string(),
        _ => ".".to_string(),
    }
}

/// `RUST_LOG` wins, then the flag, then the config file, then `error`.
fn env_filter(flag: Option<LogLevel>, configured: Option<&str>) -> eyre::Result<EnvFilter> {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return Ok(EnvFilter::from_default_env());
    }
    let level = match (flag, configured) {
        (Some(flag), _) => flag.directive(),
        (None, Some(configured)) => LogLevel::from_str(configured, true)
            .map_err(|e| eyre::eyre!("invalid log level {configured:?} in config file: {e}"))?
            .directive(),
        (None, None) => LogLevel::Error.directive(),
    };
    Ok(EnvFilter::new(level))
}

fn serve(args: &Args, config: &Config) -> eyre::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("building async runtime")?;

    if args.stdin {
        runtime
            .block_on(adapter::serve_stdio(LineEngine::new()))
            .wrap_err("serving DAP over stdio")
    } else {
        let port = args.port.unwrap_or(config.dap.port);
        runtime
            .block_on(adapter::serve_tcp(&config.dap.host, port, LineEngine::new))
            .wrap_err_with(|| format!("serving DAP on {}:{port}", config.dap.host))
    }
}

fn debug_interactively(args: &Args, config: &Config, input: &str) -> eyre::Result<()> {
    let mut search_paths = args.jpath.clone();
    search_paths.extend(config.search_paths.iter().cloned());

    let program = match read_program(input, args.exec, search_paths, io::stdin()) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("Opening input file: {}: {e}", source_name(input, args.exec));
            std::process::exit(1);
        }
    };
    tracing::debug!(name = %program.name, search_paths = ?program.search_paths, "starting REPL");

    let engine = LineEngine::new().with_source(&program.name, &program.source);
    let mut repl = ReplDebugger::new(
        engine,
        program.name,
        program.source,
        program.search_paths,
        StdinLines::new(),
        io::stdout(),
    );
    repl.run()
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).wrap_err("loading configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(args.log_level, config.log_level.as_deref())?)
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!(?args, ?config, "parsed command line arguments");

    match (&args.input, args.dap) {
        (_, true) => serve(&args, &config),
        (Some(input), false) => debug_interactively(&args, &config, input),
        (None, false) => eyre::bail!("must give filename"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("jsonnice").chain(args.iter().copied()))
    }

    #[test]
    fn input_is_required_outside_dap_mode() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["--dap"]).is_ok());
        assert!(parse(&["prog.jsonnet"]).is_ok());
    }

    #[test]
    fn stdin_requires_dap() {
        assert!(parse(&["--stdin", "prog.jsonnet"]).is_err());
        let args = parse(&["-d", "-s"]).unwrap();
        assert!(args.dap && args.stdin);
    }

    #[test]
    fn empty_jpath_is_rejected() {
        let err = parse(&["-J", "", "prog.jsonnet"]).unwrap_err();
        assert!(err.to_string().contains("-J argument was empty string"));

        let args = parse(&["-J", "lib", "--jpath", "vendor", "prog.jsonnet"]).unwrap();
        assert_eq!(args.jpath, vec!["lib", "vendor"]);
    }

    #[test]
    fn log_levels() {
        let args = parse(&["-l", "warn", "prog.jsonnet"]).unwrap();
        assert_eq!(args.log_level, Some(LogLevel::Warn));
        assert!(parse(&["-l", "loud", "prog.jsonnet"]).is_err());
    }

    #[test]
    fn inline_code_is_named_cmdline() {
        let program = read_program("local x = 1;", true, vec!["lib".into()], io::empty()).unwrap();
        assert_eq!(
            program,
            Program {
                name: "<cmdline>".to_string(),
                source: "local x = 1;".to_string(),
                search_paths: vec!["lib".to_string()],
            }
        );
    }

    #[test]
    fn dash_reads_standard_input() {
        let program = read_program("-", false, Vec::new(), "x\n".as_bytes()).unwrap();
        assert_eq!(program.name, "<stdin>");
        assert_eq!(program.source, "x\n");
        assert!(program.search_paths.is_empty());
    }

    #[test]
    fn files_add_their_directory_to_the_search_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prog.jsonnet");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "'hello'").unwrap();

        let input = path.display().to_string();
        let program = read_program(&input, false, vec!["lib".into()], io::empty()).unwrap();
        assert_eq!(program.name, input);
        assert_eq!(program.source, "'hello'\n");
        assert_eq!(
            program.search_paths,
            vec!["lib".to_string(), dir.path().display().to_string()]
        );
    }

    #[test]
    fn bare_file_names_search_the_working_directory() {
        assert_eq!(parent_dir(Path::new("prog.jsonnet")), ".");
        assert_eq!(parent_dir(Path::new("lib/prog.jsonnet")), "lib");
    }

    #[test]
    fn config_log_level_is_checked() {
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return;
        }
        assert!(env_filter(None, Some("INFO")).is_ok());
        assert!(env_filter(Some(LogLevel::Debug), Some("nonsense")).is_ok());
        let err = env_filter(None, Some("nonsense")).unwrap_err();
        assert!(err.to_string().contains("invalid log level \"nonsense\""));
    }

    #[test]
    fn missing_files_fail_to_open() {
        let err = read_program("/no/such/prog.jsonnet", false, Vec::new(), io::empty()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert_eq!(source_name("/no/such/prog.jsonnet", false), "/no/such/prog.jsonnet");
    }
}
