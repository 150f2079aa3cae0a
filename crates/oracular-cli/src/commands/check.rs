use crate::cli::GraphArgs;

use super::{build, render_diagnostics, report_error};

pub fn run(args: GraphArgs) -> Result<(), ()> {
    let colored = args.color.should_colorize();
    let mut setup = build(&args)?;

    if let Err(error) = setup.engine.close_context(&mut setup.context) {
        report_error(None, &error, colored);
        return Err(());
    }

    if let Some(warnings) = setup.context.warnings() {
        if !warnings.is_empty() {
            eprint!("{}", render_diagnostics(warnings));
        }
    }

    let frozen = setup.context.frozen().expect("context closed above");
    println!(
        "ok: {} node(s), {} oracle(s)",
        frozen.index_limit(),
        frozen.oracle_count()
    );
    Ok(())
}
