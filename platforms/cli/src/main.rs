use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use automata::loader::DEFINITION_EXTENSION;
use automata::{
    compile, ExampleCatalog, Machine, MachineLoader, Simulation, Status, MAX_EXECUTION_STEPS,
};

#[derive(Parser)]
#[clap(author, version, about, long_about = None, arg_required_else_help = true)]
struct Cli {
    /// The machine to simulate, either a definition source or a `.json` definition
    #[clap(short, long, conflicts_with = "example")]
    machine: Option<PathBuf>,

    /// Simulate an embedded example instead, by title
    #[clap(short, long)]
    example: Option<String>,

    /// An input word; may be given several times. Without one the empty word is simulated
    #[clap(short, long)]
    input: Vec<String>,

    /// Print the configurations after each step
    #[clap(short = 'd', long)]
    debug: bool,

    /// Stop a simulation that is still pending after this many steps
    #[clap(long, default_value_t = MAX_EXECUTION_STEPS)]
    max_steps: usize,

    /// Print the final snapshot of each simulation as JSON
    #[clap(long)]
    json: bool,

    /// List the embedded examples and exit
    #[clap(short, long)]
    list: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    if cli.list {
        for (index, example) in automata::EXAMPLES.iter().enumerate() {
            println!("{index:>2}  {:<10} {}", example.category, example.title);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let Some(machine) = load(cli)? else {
        return Ok(ExitCode::from(2));
    };

    let mut all_accepted = true;
    for input in inputs(cli) {
        let status = simulate(&machine, input, cli)?;
        all_accepted &= status == Status::Accept;
    }

    Ok(if all_accepted {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// The words to simulate, falling back to the empty word.
fn inputs(cli: &Cli) -> Vec<&str> {
    if cli.input.is_empty() {
        vec![""]
    } else {
        cli.input.iter().map(String::as_str).collect()
    }
}

/// Loads the requested machine, printing compile diagnostics. `None` means it did not compile.
fn load(cli: &Cli) -> Result<Option<Machine>> {
    let (name, source) = match (&cli.machine, &cli.example) {
        (Some(path), _) => {
            if path.extension().is_some_and(|ext| ext == DEFINITION_EXTENSION) {
                let machine = MachineLoader::load_machine(path)
                    .with_context(|| format!("failed to load {}", path.display()))?;
                return Ok(Some(machine));
            }

            let source = MachineLoader::read_source(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            (path.display().to_string(), source)
        }
        (None, Some(title)) => {
            let example = ExampleCatalog::by_title(title)?;
            (example.title.to_string(), example.source.to_string())
        }
        (None, None) => bail!("either --machine or --example is required"),
    };

    let compilation = compile(&source);
    if !compilation.diagnostics.is_empty() {
        eprintln!("{}\n", compilation.render(&source));
    }
    info!(
        machine = %name,
        errors = compilation.errors().count(),
        warnings = compilation.warnings().count(),
        "compiled"
    );

    Ok(compilation.machine)
}

fn simulate(machine: &Machine, input: &str, cli: &Cli) -> Result<Status> {
    let mut simulation = Simulation::new(machine, input);
    if cli.debug {
        print!("{}", simulation.snapshot());
    }

    let mut status = simulation.status();
    while !status.is_terminal() && simulation.step_count() < cli.max_steps {
        status = simulation.step();
        if cli.debug {
            print!("{}", simulation.snapshot());
        }
    }

    let snapshot = simulation.snapshot();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }

    println!("{input:?}: {status} after {} steps", snapshot.step);
    if let Some(path) = snapshot.accepted_paths.first().filter(|p| !p.is_empty()) {
        println!("  path: {}", path.join(", "));
    }

    Ok(status)
}
