use oracular_lib::{Engine, MergeGraph, lifecycle, parse_expression};

use crate::cli::GraphArgs;

use super::report_error;

/// Builds the merge graph by hand so the lifecycle's checkpoint dumps can
/// go to stdout rather than a context-configured sink.
pub fn run(args: GraphArgs) -> Result<(), ()> {
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

    let mut graph = MergeGraph::new();
    for (number, source) in args.exprs.iter().enumerate() {
        let origin = format!("cli:expr:{}", number + 1);
        let expr = match parse_expression(source, engine.call_factory(), &origin) {
            Ok(expr) => expr,
            Err(error) => {
                report_error(Some(source), &error, colored);
                return Err(());
            }
        };
        match graph.add_root(&expr, engine.call_factory()) {
            Ok(index) => {
                if let Some(root) = graph.root_node(index) {
                    graph.add_origin(root, origin);
                }
            }
            Err(error) => {
                report_error(Some(source), &error, colored);
                return Err(());
            }
        }
    }

    let mut stdout = std::io::stdout();
    match lifecycle::run(graph, engine.call_factory(), Some(&mut stdout)) {
        Ok(_) => Ok(()),
        Err(error) => {
            report_error(None, &error, colored);
            Err(())
        }
    }
}
