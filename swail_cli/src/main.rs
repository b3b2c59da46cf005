use std::{
    fs, io,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context;
use clap::Parser;
use codesnake::{Block, CodeWidth, Label, LineIndex};
use rustyline::error::ReadlineError;
use swail::{Executor, Limits, LoadError, ParseError};
use tracing_subscriber::EnvFilter;
use yansi::Paint;

/// Run Swail programs, or explore the language interactively.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Program to run. Without one, start a REPL.
    file: Option<PathBuf>,
    /// Print the compiled bytecode before running
    #[arg(long)]
    dump: bool,
    /// Instructions executed between garbage collections
    #[arg(long, default_value_t = Limits::default().fuel_per_slice)]
    fuel: i32,
    /// Deepest allowed nesting of function calls
    #[arg(long, default_value_t = Limits::default().max_frames)]
    max_frames: usize,
}

fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();
}

fn render_parse_error(name: &str, source: &str, error: &ParseError) {
    let mut span = error.span.clone();
    // errors at the end of input have nothing under them, so point at what precedes
    if span.is_empty() {
        span.start = source[..span.start]
            .chars()
            .next_back()
            .map_or(span.start, |c| span.start - c.len_utf8());
    }

    let idx = LineIndex::new(source);
    let label = Label::new(span)
        .with_text(error.to_string().red().to_string())
        .with_style(|s| s.red().to_string());
    match Block::new(&idx, [label]) {
        Some(block) => {
            let block = block.map_code(|c| CodeWidth::new(c, c.len()));
            eprintln!("{}[{name}]", block.prologue());
            eprint!("{block}");
            eprintln!("{}", block.epilogue());
        }
        None => eprintln!("{name}:{:?}: {error}", error.span),
    }
}

fn run_file(path: &Path, limits: Limits, dump: bool) -> anyhow::Result<()> {
    let source =
        fs::read_to_string(path).with_context(|| format!("could not read {}", path.display()))?;
    let mut executor = Executor::new(limits);
    if let Err(error) = executor.load_source(&source) {
        if let LoadError::Parse(parse) = &error {
            render_parse_error(&path.display().to_string(), &source, parse);
        }
        return Err(error.into());
    }
    if dump {
        print!("{}", executor.disassemble());
    }
    executor.run(&mut io::stdout().lock())?;
    Ok(())
}

fn repl(limits: Limits, dump: bool) -> anyhow::Result<()> {
    let mut readline = rustyline::DefaultEditor::new()?;
    let mut executor = Executor::new(limits);
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() { ">> " } else { ".. " };
        let line = match readline.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                pending.clear();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(error) => return Err(error.into()),
        };
        _ = readline.add_history_entry(line.as_str());

        // a line opening a block keeps reading until an empty line
        let in_block = !pending.is_empty() || line.trim_end().ends_with(':');
        pending.push_str(&line);
        pending.push('\n');
        if in_block && !line.trim().is_empty() {
            continue;
        }
        let source = std::mem::take(&mut pending);

        let depth = executor.stack().len();
        match executor.load_source(&source) {
            Ok(()) => {}
            Err(LoadError::Parse(error)) => {
                render_parse_error("<repl>", &source, &error);
                continue;
            }
            Err(error) => {
                eprintln!("{} {error}", "error:".red().bold());
                continue;
            }
        }
        if dump {
            print!("{}", executor.disassemble());
        }

        match executor.run(&mut io::stdout().lock()) {
            Ok(()) => {
                let stack = executor.stack();
                if stack.len() > depth {
                    if let Some(top) = stack.last() {
                        println!("{}", top.green());
                    }
                }
            }
            Err(error) => {
                eprintln!("{} {error}", "error:".red().bold());
                executor.abandon();
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing();

    let limits = Limits {
        fuel_per_slice: args.fuel,
        max_frames: args.max_frames,
    };
    let result = match &args.file {
        Some(path) => run_file(path, limits, args.dump),
        None => repl(limits, args.dump),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{} {error:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
