// ABOUTME: jyro CLI: run scripts against JSON data, compile to .jyrx, and
// compare output against an expected file in test mode

use clap::{Parser, Subcommand};
use jyro::{
    parse_json, value_to_json, CancellationToken, ExecutionLimits, ExecutionOptions, Jyro,
    JyroResult,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

/// Sandboxed JSON-transformation scripting engine
#[derive(Parser, Debug)]
#[command(name = "jyro")]
#[command(version)]
#[command(about = "Run Jyro scripts against JSON data")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log engine internals (repeat for trace output)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a script (.jyro source or .jyrx binary)
    Run {
        /// Script file to execute
        script: PathBuf,

        /// JSON file with the root data (defaults to an empty object)
        #[arg(long, value_name = "FILE")]
        data: Option<PathBuf>,

        /// Write the resulting data here instead of stdout
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Pretty-print the resulting JSON
        #[arg(long)]
        pretty: bool,

        #[command(flatten)]
        limits: LimitArgs,

        /// Skip registering the standard library
        #[arg(long = "no-stdlib")]
        no_stdlib: bool,
    },
    /// Compile a script to .jyrx bytes
    Compile {
        /// Script source file
        script: PathBuf,

        /// Output path for the compiled blob
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
    /// Run a script and compare the produced data to an expected JSON file
    Test {
        /// Script file to execute
        script: PathBuf,

        /// JSON file with the root data (defaults to an empty object)
        #[arg(long, value_name = "FILE")]
        data: Option<PathBuf>,

        /// JSON file with the expected resulting data
        #[arg(long, value_name = "FILE")]
        expect: PathBuf,

        #[command(flatten)]
        limits: LimitArgs,
    },
}

#[derive(clap::Args, Debug)]
struct LimitArgs {
    /// Maximum execution time in milliseconds
    #[arg(long, value_name = "MS", default_value = "10000")]
    max_time: u64,

    /// Maximum number of executed statements
    #[arg(long, value_name = "N", default_value = "1000000")]
    max_statements: u64,

    /// Maximum cumulative loop iterations
    #[arg(long, value_name = "N", default_value = "10000000")]
    max_loops: u64,

    /// Maximum function call depth
    #[arg(long, value_name = "N", default_value = "256")]
    max_call_depth: u32,
}

impl LimitArgs {
    fn to_options(&self) -> ExecutionOptions {
        ExecutionOptions::new().limits(
            ExecutionLimits::new()
                .max_execution_time(Duration::from_millis(self.max_time))
                .max_statements(self.max_statements)
                .max_loop_iterations(self.max_loops)
                .max_call_depth(self.max_call_depth),
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    simple_logger::SimpleLogger::new()
        .with_level(level)
        .init()
        .expect("logger initialises once");

    match cli.command {
        Command::Run {
            script,
            data,
            output,
            pretty,
            limits,
            no_stdlib,
        } => run_command(&script, data.as_deref(), output.as_deref(), pretty, &limits, no_stdlib),
        Command::Compile { script, output } => compile_command(&script, &output),
        Command::Test {
            script,
            data,
            expect,
            limits,
        } => test_command(&script, data.as_deref(), &expect, &limits),
    }
}

fn run_command(
    script: &Path,
    data: Option<&Path>,
    output: Option<&Path>,
    pretty: bool,
    limits: &LimitArgs,
    no_stdlib: bool,
) -> ExitCode {
    let result = match execute_script(script, data, limits, no_stdlib) {
        Ok(result) => result,
        Err(message) => {
            eprintln!("error: {}", message);
            return ExitCode::from(2);
        }
    };

    report_messages(&result);

    let json = value_to_json(&result.data);
    let rendered = if pretty {
        serde_json::to_string_pretty(&json).expect("engine output is valid JSON")
    } else {
        serde_json::to_string(&json).expect("engine output is valid JSON")
    };
    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, rendered + "\n") {
                eprintln!("error: cannot write {}: {}", path.display(), e);
                return ExitCode::from(2);
            }
        }
        None => println!("{}", rendered),
    }

    if result.is_successful {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn compile_command(script: &Path, output: &Path) -> ExitCode {
    let source = match std::fs::read_to_string(script) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: cannot read {}: {}", script.display(), e);
            return ExitCode::from(2);
        }
    };
    let mut engine = Jyro::new();
    if let Err(e) = jyro::stdlib::register_standard_library(engine.registry_mut()) {
        eprintln!("error: {}", e);
        return ExitCode::from(2);
    }
    let compiled = match engine.compile(&source) {
        Ok(compiled) => compiled,
        Err(messages) => {
            for message in &messages {
                eprintln!("{}", message);
            }
            return ExitCode::from(1);
        }
    };
    let bytes = match compiled.to_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(1);
        }
    };
    if let Err(e) = std::fs::write(output, bytes) {
        eprintln!("error: cannot write {}: {}", output.display(), e);
        return ExitCode::from(2);
    }
    ExitCode::SUCCESS
}

fn test_command(
    script: &Path,
    data: Option<&Path>,
    expect: &Path,
    limits: &LimitArgs,
) -> ExitCode {
    let expected = match read_json_file(Some(expect)) {
        Ok(expected) => expected,
        Err(message) => {
            eprintln!("error: {}", message);
            return ExitCode::from(2);
        }
    };
    let result = match execute_script(script, data, limits, false) {
        Ok(result) => result,
        Err(message) => {
            eprintln!("error: {}", message);
            return ExitCode::from(2);
        }
    };
    report_messages(&result);

    if !result.is_successful {
        eprintln!("test failed: script did not run successfully");
        return ExitCode::from(1);
    }
    if !result.data.equals_value(&expected) {
        eprintln!("test failed: output differs from {}", expect.display());
        eprintln!(
            "  produced: {}",
            serde_json::to_string(&value_to_json(&result.data)).expect("valid JSON")
        );
        eprintln!(
            "  expected: {}",
            serde_json::to_string(&value_to_json(&expected)).expect("valid JSON")
        );
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn execute_script(
    script: &Path,
    data: Option<&Path>,
    limits: &LimitArgs,
    no_stdlib: bool,
) -> Result<JyroResult, String> {
    let data = read_json_file(data)?;
    let mut builder = Jyro::builder()
        .with_data(data)
        .with_options(limits.to_options());
    if !no_stdlib {
        builder = builder.with_standard_library();
    }

    let is_binary = script.extension().is_some_and(|ext| ext == "jyrx");
    builder = if is_binary {
        let bytes = std::fs::read(script)
            .map_err(|e| format!("cannot read {}: {}", script.display(), e))?;
        builder.with_script_bytes(bytes)
    } else {
        let source = std::fs::read_to_string(script)
            .map_err(|e| format!("cannot read {}: {}", script.display(), e))?;
        builder.with_script(source)
    };

    Ok(builder.run_with_token(CancellationToken::new()))
}

fn read_json_file(path: Option<&Path>) -> Result<jyro::Value, String> {
    match path {
        None => Ok(parse_json("{}").expect("literal empty object parses")),
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
            parse_json(&text).map_err(|e| format!("invalid JSON in {}: {}", path.display(), e))
        }
    }
}

fn report_messages(result: &JyroResult) {
    for message in &result.messages {
        eprintln!("{}", message);
    }
}
