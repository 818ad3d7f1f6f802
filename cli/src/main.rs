mod manifest;
mod test_runner;

use std::path::Path;
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use renderer::{RenderError, Value, render_template};

use crate::manifest::{Manifest, parse_var};

#[derive(Parser)]
#[command(name = "stencil", version, about = "Slot-aware template renderer")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render templates to stdout
    Render(RenderArgs),

    /// Analyze templates without rendering them
    Check(CheckArgs),

    /// Run .test.stencil fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Template files to render, each independently
    #[arg(required = true)]
    files: Vec<String>,

    /// TOML manifest with properties, synthetic namespaces and slot contributions
    #[arg(short, long)]
    manifest: Option<String>,

    /// Set a property, overriding the manifest. Repeatable.
    #[arg(long = "var", value_name = "KEY=VALUE")]
    vars: Vec<String>,

    /// Pack id of the templates (overrides the manifest)
    #[arg(long)]
    pack: Option<String>,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Template files to analyze
    #[arg(required = true)]
    files: Vec<String>,

    /// Dump the resolved block list
    #[arg(long)]
    blocks: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.stencil file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stencil=warn,renderer=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Command::Render(args) => do_render(args, cli.no_color),
        Command::Check(args) => do_check(args, cli.no_color),
        Command::Test(args) => {
            let path = Path::new(&args.path);
            if args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            test_runner::run_tests(path, cli.no_color, &args.category)
        }
    };
    process::exit(exit_code);
}

fn color_choice(no_color: bool) -> ColorChoice {
    if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}

fn do_render(args: RenderArgs, no_color: bool) -> i32 {
    let mut manifest = match &args.manifest {
        Some(path) => match Manifest::load(Path::new(path)) {
            Ok(m) => m,
            Err(e) => {
                eprintln!("error: manifest '{}': {}", path, e);
                return 1;
            }
        },
        None => Manifest::default(),
    };
    if let Some(pack) = args.pack {
        manifest.pack = Some(pack);
    }

    let overrides: Vec<(String, Value)> = match args.vars.iter().map(|v| parse_var(v)).collect() {
        Ok(vars) => vars,
        Err(e) => {
            eprintln!("error: --var: {}", e);
            return 1;
        }
    };
    let slots = match manifest.slot_registry() {
        Ok(slots) => slots,
        Err(e) => {
            eprintln!("error: manifest: {}", e);
            return 1;
        }
    };
    let options = manifest.render_options();

    let writer = StandardStream::stderr(color_choice(no_color));
    let config = term::Config::default();
    let mut files = SimpleFiles::new();
    let mut failed = 0usize;

    // A failing file is reported and the remaining files still render.
    for file in &args.files {
        let source = match std::fs::read_to_string(file) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: cannot read '{}': {}", file, e);
                failed += 1;
                continue;
            }
        };
        let file_id = files.add(file.clone(), source.clone());

        let template = match manifest.parser(source, file_id).parse() {
            Ok(t) => t,
            Err(errors) => {
                for error in &errors {
                    let diagnostic = error.to_diagnostic();
                    let _ = term::emit_to_write_style(&mut writer.lock(), &config, &files, &diagnostic);
                }
                failed += 1;
                continue;
            }
        };

        match render_template(&template, manifest.scope(&overrides), &slots, &options) {
            Ok(output) => {
                debug!(file = %file, bytes = output.len(), "rendered");
                print!("{}", output);
            }
            Err(error) => {
                emit_render_error(&writer, &config, &files, file_id, &error);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        eprintln!("error: {} of {} file(s) failed to render", failed, args.files.len());
        1
    } else {
        0
    }
}

fn do_check(args: CheckArgs, no_color: bool) -> i32 {
    let writer = StandardStream::stderr(color_choice(no_color));
    let config = term::Config::default();
    let mut files = SimpleFiles::new();
    let mut failed = 0usize;

    for file in &args.files {
        let source = match std::fs::read_to_string(file) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: cannot read '{}': {}", file, e);
                failed += 1;
                continue;
            }
        };
        let file_id = files.add(file.clone(), source.clone());

        match stencil::parser::Parser::new(source, file_id).parse() {
            Ok(template) => {
                eprintln!("ok: {} ({} blocks)", file, template.blocks.len());
                if args.blocks {
                    print_blocks(&template);
                }
            }
            Err(errors) => {
                for error in &errors {
                    let diagnostic = error.to_diagnostic();
                    let _ = term::emit_to_write_style(&mut writer.lock(), &config, &files, &diagnostic);
                }
                failed += 1;
            }
        }
    }

    if failed > 0 { 1 } else { 0 }
}

/// One line per block, indented by nesting depth.
fn print_blocks(template: &stencil::Template) {
    let mut open: Vec<&stencil::Block> = Vec::new();
    for block in &template.blocks {
        while open.last().is_some_and(|parent| !parent.contains(block)) {
            open.pop();
        }
        println!("{}{}", "  ".repeat(open.len()), block);
        open.push(block);
    }
}

fn emit_render_error(
    writer: &StandardStream,
    config: &term::Config,
    files: &SimpleFiles<String, String>,
    file_id: usize,
    error: &RenderError,
) {
    match &error.span {
        Some(span) => {
            let diagnostic = Diagnostic::error()
                .with_message(error.to_string())
                .with_labels(vec![
                    Label::primary(file_id, span.clone()).with_message("while rendering this block"),
                ]);
            let _ = term::emit_to_write_style(&mut writer.lock(), config, files, &diagnostic);
        }
        None => eprintln!("render error: {}", error),
    }
}
