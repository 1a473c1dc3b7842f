//! `loom` — the command-line driver: run loom source, externalize it to
//! canonical text, bundle a source tree into a self-contained executable,
//! or execute a previously-bundled one (§6).

use clap::Parser;
use loom_cli::bundle;
use loom_cli::config::{Config, FileConfig};
use loom_cli::ffi_loader::DlFfiBackend;
use loom_core::{Heap, NullKind, ObjectData, ProcessState, Vm};
use loom_runtime::{install_backend, EvalErrorKind};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "loom")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Driver for the loom virtual machine", long_about = None)]
struct Cli {
    /// Trace level: 0 disables tracing, higher values emit more detail
    /// through the `tracing` subscriber.
    #[arg(long, value_name = "N")]
    trace: Option<u32>,

    /// Log the active stack's depth alongside every traced node.
    #[arg(long)]
    tracestack: bool,

    /// Parse and evaluate the given source file(s), in order, against one
    /// shared VM.
    #[arg(long)]
    run: bool,

    /// Loom source file(s) to parse.
    #[arg(long = "source", value_name = "FILE")]
    sources: Vec<PathBuf>,

    /// Parse `--source` and write its canonicalized text to FILE instead
    /// of evaluating it.
    #[arg(long, value_name = "FILE")]
    externalize: Option<PathBuf>,

    /// Record per-node debug info (source file/line/column) while parsing.
    #[arg(long)]
    dbg: bool,

    /// Application name, used in `--build` output and config resolution.
    #[arg(long, value_name = "NAME")]
    appname: Option<String>,

    /// Additional resource file(s) to embed in a `--build` bundle.
    #[arg(long = "resource", value_name = "FILE")]
    resources: Vec<PathBuf>,

    /// Bundle the current executable plus `--source`/`--resource` files
    /// into a new self-contained binary at this path.
    #[arg(long, value_name = "NAME")]
    build: Option<PathBuf>,

    /// Interpreter binary to embed as the host of a `--build` bundle
    /// (defaults to the currently running `loom` binary).
    #[arg(long, value_name = "PATH")]
    build_interpreter: Option<PathBuf>,

    /// Treat the running executable itself as a bundle: extract its
    /// attached resources and run the first loom source found among them.
    #[arg(long)]
    exec: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let file_config = FileConfig::default_path()
        .and_then(|path| Config::load_file(&path).ok())
        .flatten();
    let config = Config::resolve(file_config, cli.trace, cli.tracestack, cli.dbg, cli.appname.clone());

    init_tracing(config.trace_level);
    ProcessState::set_trace_level(config.trace_level);
    ProcessState::set_trace_stack(config.trace_stack);
    install_backend(Box::new(DlFfiBackend::new()));

    let result = if cli.exec {
        run_exec()
    } else if let Some(build_target) = &cli.build {
        run_build(
            build_target,
            &cli.sources,
            &cli.resources,
            cli.build_interpreter.as_deref(),
            config.appname.as_deref(),
        )
    } else if let Some(out) = &cli.externalize {
        run_externalize(&cli.sources, out, config.record_debug)
    } else if cli.run || !cli.sources.is_empty() {
        run_sources(&cli.sources, config.record_debug)
    } else {
        eprintln!("nothing to do: pass --run, --externalize, --build, or --exec");
        Err(1)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code as u8),
    }
}

/// `--run`/`--source`: parse every source file into one combined program
/// (each file's expressions appended to a single growing buffer) and
/// evaluate it against one VM.
fn run_sources(sources: &[PathBuf], record_debug: bool) -> Result<(), u8> {
    if sources.is_empty() {
        eprintln!("--run requires at least one --source FILE");
        return Err(1);
    }

    let mut heap = Heap::new();
    let root = heap.alloc(ObjectData::Null(NullKind::Pointer));
    let mut vm = Vm::new(heap, root);

    for path in sources {
        let source = read_source(path)?;
        let file_index = ProcessState::register_file(path.clone());
        let list = loom_compiler::parse(&source, &mut vm.heap, file_index, record_debug)
            .map_err(|e| report(&format!("{}: {e}", path.display())))?;
        loom_runtime::eval_expression_list(&mut vm, &list).map_err(|e| match e.kind {
            EvalErrorKind::Halt(code) => {
                if code != 0 {
                    eprintln!("halt({code})");
                }
                code.rem_euclid(256) as u8
            }
            _ => report(&format!("{}: {e}", path.display())),
        })?;
    }
    Ok(())
}

/// `--externalize FILE`: parse `--source` and write its canonical text.
fn run_externalize(sources: &[PathBuf], out: &PathBuf, record_debug: bool) -> Result<(), u8> {
    if sources.len() != 1 {
        eprintln!("--externalize requires exactly one --source FILE");
        return Err(1);
    }
    let path = &sources[0];
    let source = read_source(path)?;
    let mut heap = Heap::new();
    let file_index = ProcessState::register_file(path.clone());
    let list = loom_compiler::parse(&source, &mut heap, file_index, record_debug)
        .map_err(|e| report(&format!("{}: {e}", path.display())))?;
    let text = loom_compiler::externalize(&list);
    std::fs::write(out, text).map_err(|e| report(&format!("{}: {e}", out.display())))?;
    Ok(())
}

/// `--build NAME`: append `--source`/`--resource` files to an interpreter
/// binary as an LZ4 resource bundle (§6's bundle format).
fn run_build(
    target: &PathBuf,
    sources: &[PathBuf],
    resources: &[PathBuf],
    interpreter: Option<&std::path::Path>,
    appname: Option<&str>,
) -> Result<(), u8> {
    let interpreter_path = match interpreter {
        Some(p) => p.to_path_buf(),
        None => std::env::current_exe().map_err(|e| report(&format!("current executable: {e}")))?,
    };
    let interpreter_bytes = std::fs::read(&interpreter_path)
        .map_err(|e| report(&format!("{}: {e}", interpreter_path.display())))?;

    let mut entries = Vec::new();
    for path in sources.iter().chain(resources.iter()) {
        let data = std::fs::read(path).map_err(|e| report(&format!("{}: {e}", path.display())))?;
        let entry_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("resource")
            .to_string();
        entries.push((entry_name, data));
    }

    let bundled = bundle::write_bundle(&interpreter_bytes, &entries);
    std::fs::write(target, &bundled).map_err(|e| report(&format!("{}: {e}", target.display())))?;
    make_executable(target)?;
    match appname {
        Some(name) => println!("built {name} -> {}", target.display()),
        None => println!("built {}", target.display()),
    }
    Ok(())
}

/// `--exec`: treat the running binary as a bundle, extract its resources,
/// and run the first `.loom` source found among them.
fn run_exec() -> Result<(), u8> {
    let exe_path =
        std::env::current_exe().map_err(|e| report(&format!("current executable: {e}")))?;
    let bytes = std::fs::read(&exe_path).map_err(|e| report(&format!("{}: {e}", exe_path.display())))?;

    let resources = bundle::read_resources(&bytes).map_err(|e| report(&e.to_string()))?;
    let source_resource = resources
        .iter()
        .find(|r| r.path.ends_with(".loom"))
        .ok_or_else(|| report("bundle has no .loom resource to run"))?;
    let source = String::from_utf8(source_resource.data.clone())
        .map_err(|e| report(&format!("{}: {e}", source_resource.path)))?;

    let mut heap = Heap::new();
    let root = heap.alloc(ObjectData::Null(NullKind::Pointer));
    let file_index = ProcessState::register_file(PathBuf::from(&source_resource.path));
    let list = loom_compiler::parse(&source, &mut heap, file_index, false)
        .map_err(|e| report(&format!("{}: {e}", source_resource.path)))?;
    let mut vm = Vm::new(heap, root);
    loom_runtime::eval_expression_list(&mut vm, &list).map_err(|e| match e.kind {
        EvalErrorKind::Halt(code) => code.rem_euclid(256) as u8,
        _ => report(&format!("{}: {e}", source_resource.path)),
    })?;
    Ok(())
}

/// `--trace N` maps onto `tracing`'s level filter: 0 is silent, higher
/// values step down through info/debug/trace.
fn init_tracing(level: u32) {
    use tracing_subscriber::EnvFilter;

    let default_level = match level {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn read_source(path: &PathBuf) -> Result<String, u8> {
    std::fs::read_to_string(path).map_err(|e| report(&format!("{}: {e}", path.display())))
}

fn report(message: &str) -> u8 {
    eprintln!("{message}");
    1
}

#[cfg(unix)]
fn make_executable(path: &PathBuf) -> Result<(), u8> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)
        .map_err(|e| report(&format!("{}: {e}", path.display())))?
        .permissions();
    perms.set_mode(perms.mode() | 0o111);
    std::fs::set_permissions(path, perms).map_err(|e| report(&format!("{}: {e}", path.display())))
}

#[cfg(not(unix))]
fn make_executable(_path: &PathBuf) -> Result<(), u8> {
    Ok(())
}
