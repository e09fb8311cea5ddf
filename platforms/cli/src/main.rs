use clap::Parser;
use fsml::analyzer::analyze_automaton;
use fsml::encoder::{encode, export_turing, Tagged};
use fsml::evaluator::Automaton;
use fsml::graph::Graph;
use fsml::{Compiler, Evaluation, Options, ProgramManager, MAX_EXECUTION_STEPS};
use std::fs;
use std::io::{self, Read};
use std::process;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// The program file to evaluate. Standard input is read when no file is given.
    file: Option<String>,

    /// Evaluate a bundled program by name instead of a file
    #[clap(short, long, conflicts_with = "file")]
    program: Option<String>,

    /// List the bundled programs
    #[clap(short, long)]
    list: bool,

    /// Computation layers explored by each test before it is reported as undecided
    #[clap(short, long, default_value_t = MAX_EXECUTION_STEPS)]
    max_steps: usize,

    /// Print the tokens as JSON
    #[clap(long)]
    tokens: bool,

    /// Print the syntax tree as JSON
    #[clap(long)]
    ast: bool,

    /// Print the graph of every declared machine as JSON
    #[clap(short, long)]
    graph: bool,

    /// Report structural issues of every declared machine
    #[clap(short, long)]
    analyze: bool,

    /// Print every Turing machine with numbered states as JSON
    #[clap(short, long)]
    export: bool,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    if cli.list {
        for (index, name) in ProgramManager::list_program_names().iter().enumerate() {
            println!("{index}: {name}");
        }
        return;
    }

    let source = match read_source(&cli) {
        Ok(source) => source,
        Err(message) => {
            eprintln!("{message}");
            process::exit(2);
        }
    };

    let compiler = Compiler::with_options(Options {
        max_layers: cli.max_steps,
    });
    let evaluation = match compiler.evaluate(&source) {
        Ok(evaluation) => evaluation,
        Err(e) => {
            eprintln!("{}", e.render(&source));
            process::exit(1);
        }
    };

    if let Err(e) = report(&cli, &evaluation) {
        eprintln!("Failed to encode output: {e}");
        process::exit(1);
    }
}

fn read_source(cli: &Cli) -> Result<String, String> {
    if let Some(name) = &cli.program {
        return ProgramManager::get_program_by_name(name)
            .map(|program| program.source)
            .map_err(|e| e.to_string());
    }

    match &cli.file {
        Some(path) => {
            fs::read_to_string(path).map_err(|e| format!("Failed to read file {path}: {e}"))
        }
        None if atty::is(atty::Stream::Stdin) => {
            Err("No program given. Pass a file, --program <NAME> or pipe a program in.".into())
        }
        None => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .map_err(|e| format!("Failed to read standard input: {e}"))?;
            Ok(source)
        }
    }
}

fn report(cli: &Cli, evaluation: &Evaluation) -> Result<(), serde_json::Error> {
    if cli.tokens {
        println!("{}", serde_json::to_string_pretty(&evaluation.tokens)?);
    }
    if cli.ast {
        println!("{}", serde_json::to_string_pretty(&evaluation.module)?);
    }

    for line in &evaluation.output {
        println!("{line}");
    }

    for outcome in &evaluation.tests {
        let verdict = match outcome.accepted {
            Some(true) => "accepted",
            Some(false) => "rejected",
            None => "undecided",
        };
        println!("{} {:?}: {}", outcome.automaton, outcome.input, verdict);
    }

    for (name, automaton) in evaluation.automata() {
        if cli.analyze {
            for finding in analyze_automaton(&automaton) {
                println!("{name}: {finding}");
            }
        }
        if cli.graph {
            if let Some(graph) = Graph::from_automaton(&automaton) {
                println!("{}", encode(&Tagged::Graph(graph))?);
            }
        }
        if cli.export {
            if let Automaton::Turing(machine) = &automaton {
                println!("{}", serde_json::to_string_pretty(&export_turing(machine))?);
            }
        }
    }

    Ok(())
}
