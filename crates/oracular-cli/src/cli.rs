//! Command-line surface.

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "oracular",
    version,
    about = "Inspect and evaluate predicate expression graphs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Parse expressions, run the graph lifecycle, and report problems.
    Check(GraphArgs),
    /// Print the merged DAG before and after transforms.
    Dump(GraphArgs),
    /// Evaluate expressions against a transaction description.
    Eval(EvalArgs),
}

/// Expression and template inputs shared by `check` and `dump`.
#[derive(Args)]
pub struct GraphArgs {
    /// Expression to acquire (repeatable).
    #[arg(short = 'e', long = "expr", value_name = "SEXPR", required = true)]
    pub exprs: Vec<String>,

    /// Template definition: name, space-separated args, body (repeatable).
    #[arg(
        short = 't',
        long = "template",
        value_names = ["NAME", "ARGS", "BODY"],
        num_args = 3,
        action = clap::ArgAction::Append
    )]
    pub templates: Vec<String>,

    /// Colorize diagnostics.
    #[arg(long, value_enum, default_value = "auto")]
    pub color: ColorChoice,
}

#[derive(Args)]
pub struct EvalArgs {
    #[command(flatten)]
    pub graph: GraphArgs,

    /// Transaction description: JSON with `fields` and optional `complete`.
    #[arg(long = "tx", value_name = "FILE")]
    pub tx: Option<std::path::PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    pub fn should_colorize(self) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        }
    }
}
