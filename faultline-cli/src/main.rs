//! # faultline CLI
//!
//! Build structured errors from the command line and print how they render.
//!
//! Usage:
//!   faultline render [--code N] [--op OP] [--kind KIND] [--wrap-...] <message>
//!   faultline kinds
//!   faultline codes
//!
//! Examples:
//!   faultline render --op db.Insert --kind database "connection refused"
//!   faultline render --op user.Load --wrap-kind not-exist --wrap-code 404 "user 42"
//!   faultline render --json --kind timeout "deadline exceeded"

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use faultline_error::stack::NoopProvider;
use faultline_error::{Code, Error, ErrorBuilder, Kind, StackConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "faultline")]
#[command(author, version, about = "faultline - structured errors with call stacks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Do not capture call stacks
    #[arg(long, global = true)]
    no_stack: bool,

    /// Maximum number of stack addresses to capture
    #[arg(long, global = true)]
    depth: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an error, optionally wrapping an inner one, and print it
    Render(RenderArgs),
    /// List error kinds and their descriptions
    Kinds,
    /// List the named classification codes
    Codes,
}

#[derive(Args)]
struct RenderArgs {
    /// Classification code of the outer error
    #[arg(long)]
    code: Option<i32>,

    /// Operation label of the outer error
    #[arg(long)]
    op: Option<String>,

    /// Kind of the outer error (e.g. not-exist, database)
    #[arg(long)]
    kind: Option<Kind>,

    /// Classification code of the wrapped error
    #[arg(long)]
    wrap_code: Option<i32>,

    /// Operation label of the wrapped error
    #[arg(long)]
    wrap_op: Option<String>,

    /// Kind of the wrapped error
    #[arg(long)]
    wrap_kind: Option<Kind>,

    /// Print the JSON form instead of text
    #[arg(long)]
    json: bool,

    /// Append the call stack to the text form
    #[arg(long)]
    trace: bool,

    /// Leaf message
    #[arg(trailing_var_arg = true)]
    message: Vec<String>,
}

impl RenderArgs {
    fn has_inner(&self) -> bool {
        self.wrap_code.is_some() || self.wrap_op.is_some() || self.wrap_kind.is_some()
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn stack_config(cli: &Cli) -> StackConfig {
    let mut config = StackConfig::from_env();
    if cli.no_stack {
        config = config.with_provider(NoopProvider);
    }
    if let Some(depth) = cli.depth {
        config = config.with_max_depth(depth);
    }
    config
}

fn classify(
    builder: ErrorBuilder<'static>,
    code: Option<i32>,
    op: Option<&str>,
    kind: Option<Kind>,
) -> ErrorBuilder<'static> {
    let mut builder = builder;
    if let Some(code) = code {
        builder = builder.code(Code(code));
    }
    if let Some(op) = op {
        builder = builder.op(op.to_string());
    }
    if let Some(kind) = kind {
        builder = builder.kind(kind);
    }
    builder
}

/// Assemble the outer error, and the inner one when any `--wrap-*` flag is given
fn build_error(args: &RenderArgs) -> anyhow::Result<Error> {
    let message = args.message.join(" ");

    let outer = if args.has_inner() {
        let inner = classify(
            Error::builder(),
            args.wrap_code,
            args.wrap_op.as_deref(),
            args.wrap_kind,
        )
        .message(message)
        .finish()
        .ok_or_else(|| anyhow!("inner error was nil"))?;
        tracing::debug!(inner = %inner, "built inner error");
        classify(Error::builder(), args.code, args.op.as_deref(), args.kind).wrap(inner)
    } else {
        classify(Error::builder(), args.code, args.op.as_deref(), args.kind).message(message)
    };

    outer.finish().ok_or_else(|| anyhow!("error was nil"))
}

fn render(args: &RenderArgs) -> anyhow::Result<()> {
    let err = build_error(args)?;

    if args.json {
        let value = err.to_json_value().context("serializing error")?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else if args.trace {
        println!("{:#}", err);
    } else {
        println!("{}", err);
    }
    Ok(())
}

fn list_kinds() {
    for kind in Kind::ALL {
        println!("{:3}  {:<18} {}", kind as u8, kind.as_str(), kind.description());
    }
}

fn list_codes() {
    for (name, code) in Code::NAMED {
        println!("{:3}  {}", code.value(), name);
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    StackConfig::set_global(stack_config(&cli))
        .map_err(|_| anyhow!("stack configuration already initialized"))?;

    match &cli.command {
        Commands::Render(args) => render(args)?,
        Commands::Kinds => list_kinds(),
        Commands::Codes => list_codes(),
    }
    Ok(())
}
