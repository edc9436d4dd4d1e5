//! Makrell CLI entry point.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use makrell_language::TracerConfig;
use makrell_runtime::repl::{format_diagnostic, format_error};
use makrell_runtime::{Repl, Session, SessionConfig};
use thiserror::Error;

/// CLI configuration parsed from arguments.
#[derive(Default)]
struct CliConfig {
    code: Option<String>,
    file: Option<PathBuf>,
    include_dirs: Vec<PathBuf>,
    emit: bool,
    trace: bool,
    trace_json: bool,
    no_cache: bool,
    show_help: bool,
    show_version: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0} requires a value")]
    MissingValue(&'static str),
    #[error("unknown option: {0}")]
    UnknownOption(String),
    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
    #[error(transparent)]
    Makrell(#[from] makrell_foundation::Error),
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    match run(args) {
        Ok(code) => code,
        Err(CliError::Makrell(e)) => {
            eprintln!("{}", format_error(&e));
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("\x1b[31mError: {e}\x1b[0m");
            ExitCode::FAILURE
        }
    }
}

fn parse_args(args: Vec<String>) -> Result<CliConfig, CliError> {
    let mut config = CliConfig::default();
    let mut args = args.into_iter().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => config.show_help = true,
            "-V" | "--version" => config.show_version = true,
            "--emit" => config.emit = true,
            "--trace" => config.trace = true,
            "--trace-json" => {
                config.trace = true;
                config.trace_json = true;
            }
            "--no-cache" => config.no_cache = true,
            "-c" => config.code = Some(args.next().ok_or(CliError::MissingValue("-c"))?),
            "-I" => config
                .include_dirs
                .push(PathBuf::from(args.next().ok_or(CliError::MissingValue("-I"))?)),
            arg if arg.starts_with('-') => return Err(CliError::UnknownOption(arg.to_string())),
            path => {
                if config.file.is_some() || config.code.is_some() {
                    return Err(CliError::UnexpectedArgument(path.to_string()));
                }
                config.file = Some(PathBuf::from(path));
            }
        }
    }

    Ok(config)
}

fn session_config(config: &CliConfig) -> SessionConfig {
    let mut session = SessionConfig::new().with_echo();
    for dir in &config.include_dirs {
        session = session.with_root(dir);
    }
    if let Some(file) = &config.file {
        session = session.with_source_path(file);
    }
    if config.no_cache {
        session = session.without_cache();
    }
    if config.emit {
        session = session.with_emit();
    }
    if config.trace {
        let mut tracer = TracerConfig::new().enabled().to_stderr();
        if config.trace_json {
            tracer = tracer.json();
        }
        session = session.with_tracer(tracer);
    }
    session
}

fn run(args: Vec<String>) -> Result<ExitCode, CliError> {
    let config = parse_args(args)?;

    if config.show_help {
        print_help();
        return Ok(ExitCode::SUCCESS);
    }

    if config.show_version {
        println!("makrell {}", env!("CARGO_PKG_VERSION"));
        return Ok(ExitCode::SUCCESS);
    }

    let session_config = session_config(&config);

    if config.code.is_none() && config.file.is_none() {
        Repl::new(session_config)?.run()?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut session = Session::new(session_config)?;
    let evaluation = match (&config.code, &config.file) {
        (Some(code), _) => session.eval(code)?,
        (None, Some(file)) => session.eval_file(file)?,
        (None, None) => return Ok(ExitCode::SUCCESS),
    };

    if let Some(program) = &evaluation.program {
        println!("{program}");
    }
    for diagnostic in &evaluation.diagnostics {
        eprintln!("{}", format_diagnostic(diagnostic));
    }
    if !evaluation.value.is_none() {
        println!("{}", evaluation.value.repr());
    }
    Ok(ExitCode::SUCCESS)
}

fn print_help() {
    println!(
        "\x1b[1mMakrell\x1b[0m - extensible bracket-and-operator language

\x1b[1mUSAGE:\x1b[0m
    makrell [OPTIONS] [FILE]
    makrell [OPTIONS] -c CODE

\x1b[1mARGUMENTS:\x1b[0m
    [FILE]    Source file to run; without FILE or -c the REPL starts

\x1b[1mOPTIONS:\x1b[0m
    -c CODE         Run CODE and print its final value
    -I DIR          Add a module search root (repeatable)
    --emit          Print the generated program before running it
    --no-cache      Do not read or write compiled module caches
    -h, --help      Print help information
    -V, --version   Print version information

\x1b[1mDEBUG OPTIONS:\x1b[0m
    --trace         Trace meta engine events to stderr
    --trace-json    Trace as JSON lines

\x1b[1mEXAMPLES:\x1b[0m
    makrell                          Start the REPL
    makrell main.mr                  Run main.mr
    makrell -c \"{{print 1 + 2}}\"      Run a snippet
    makrell --emit -c \"x = 2 * 3\"    Show the generated program

\x1b[1mREPL COMMANDS:\x1b[0m
    :help           Show commands
    :emit [CODE]    Toggle program display, or show CODE's program
    :quit           Leave (also Ctrl+D)"
    );
}
