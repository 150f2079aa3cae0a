use oracular_lib::{Transaction, Value};
use serde::Deserialize;

use crate::cli::EvalArgs;

use super::{build, report_error};

/// Transaction description accepted by `--tx`.
#[derive(Debug, Default, Deserialize)]
struct TxSpec {
    #[serde(default)]
    fields: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    complete: bool,
}

pub fn run(args: EvalArgs) -> Result<(), ()> {
    let colored = args.graph.color.should_colorize();
    let mut setup = build(&args.graph)?;

    if let Err(error) = setup.engine.close_context(&mut setup.context) {
        report_error(None, &error, colored);
        return Err(());
    }

    let spec = match &args.tx {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|error| {
                eprintln!("error: could not read {}: {error}", path.display());
            })?;
            serde_json::from_str::<TxSpec>(&text).map_err(|error| {
                eprintln!("error: malformed transaction description: {error}");
            })?
        }
        None => TxSpec::default(),
    };

    let mut tx = Transaction::new();
    for (name, value) in &spec.fields {
        let value = json_to_value(value).map_err(|unsupported| {
            eprintln!("error: field `{name}`: {unsupported}");
        })?;
        tx.set_field(name.clone(), value);
    }
    if spec.complete {
        tx.complete();
    }

    for (source, oracle) in &setup.oracles {
        let result = oracle.query(&setup.context, &mut tx).map_err(|error| {
            report_error(None, &error, colored);
        })?;
        let value = match &result.value {
            Some(value) => value.to_sexpr(),
            None => "-".to_string(),
        };
        let status = if result.finished { "finished" } else { "pending" };
        println!("{source} => {value} ({status})");
    }
    Ok(())
}

fn json_to_value(json: &serde_json::Value) -> Result<Value, String> {
    match json {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Number(i64::from(*b))),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Number(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Float(f))
            } else {
                Err(format!("unrepresentable number {n}"))
            }
        }
        serde_json::Value::String(s) => Ok(Value::bytes(s)),
        serde_json::Value::Array(items) => Ok(Value::List(
            items.iter().map(json_to_value).collect::<Result<_, _>>()?,
        )),
        serde_json::Value::Object(_) => Err("nested objects are not supported".to_string()),
    }
}
