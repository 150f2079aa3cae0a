pub mod check;
pub mod dump;
pub mod eval;

use annotate_snippets::{AnnotationKind, Level, Renderer, Snippet};
use oracular_lib::{Context, Diagnostics, DiagnosticsPrinter, Engine, Error, Oracle};

use crate::cli::GraphArgs;

/// A configured engine plus the acquired oracles, ready for lifecycle.
pub struct Setup {
    pub engine: Engine,
    pub context: Context,
    pub oracles: Vec<(String, Oracle)>,
}

/// Builds an engine from the shared arguments: templates first, then one
/// oracle per expression.
pub fn build(args: &GraphArgs) -> Result<Setup, ()> {
    let colored = args.color.should_colorize();
    let mut engine = Engine::new();

    for (number, definition) in args.templates.chunks(3).enumerate() {
        let [name, params, body] = definition else {
            eprintln!("error: --template takes three values: name, args, body");
            return Err(());
        };
        let origin = format!("cli:template:{}", number + 1);
        let params: Vec<&str> = params.split(' ').filter(|p| !p.is_empty()).collect();
        if let Err(error) = engine.define_template(name, &params, body, &origin) {
            report_error(Some(body), &error, colored);
            return Err(());
        }
    }

    let mut context = engine.new_context();
    let mut oracles = Vec::with_capacity(args.exprs.len());
    for (number, expr) in args.exprs.iter().enumerate() {
        let origin = format!("cli:expr:{}", number + 1);
        match engine.acquire(&mut context, expr, &origin) {
            Ok(oracle) => oracles.push((expr.clone(), oracle)),
            Err(error) => {
                report_error(Some(expr), &error, colored);
                return Err(());
            }
        }
    }

    Ok(Setup {
        engine,
        context,
        oracles,
    })
}

/// Renders an error to stderr; parse errors get a caret into the source.
pub fn report_error(source: Option<&str>, error: &Error, colored: bool) {
    match error {
        Error::Parse {
            offset, message, ..
        } => {
            if let Some(source) = source {
                eprintln!("{}", render_offset(source, *offset, message, colored));
                return;
            }
            eprintln!("error: {error}");
        }
        Error::Validation { diagnostics, .. }
        | Error::Transform(diagnostics)
        | Error::PreEvaluation(diagnostics) => {
            eprintln!("error: {error}");
            eprint!("{}", render_diagnostics(diagnostics));
        }
        _ => eprintln!("error: {error}"),
    }
}

pub fn render_diagnostics(diagnostics: &Diagnostics) -> String {
    DiagnosticsPrinter::new(diagnostics).render()
}

fn render_offset(source: &str, offset: usize, message: &str, colored: bool) -> String {
    let renderer = if colored {
        Renderer::styled()
    } else {
        Renderer::plain()
    };
    let range = adjust_range(offset, source.len());
    let report = &[Level::ERROR
        .primary_title(message)
        .element(Snippet::source(source).line_start(1).annotation(
            AnnotationKind::Primary.span(range),
        ))];
    renderer.render(report).to_string()
}

fn adjust_range(offset: usize, limit: usize) -> std::ops::Range<usize> {
    offset..(offset + 1).min(limit).max(offset)
}
