//! Hyperparameter sweep expansion.
//!
//! A [`SweepSpec`] names a script, fixed arguments, and one or more swept
//! argument lists; [`make_commands`] expands the Cartesian product of the
//! swept values into fully-formed command lines ready for the queue.

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Result, RunnerError};

/// Declarative description of a sweep, deserializable from a JSON file.
///
/// Swept argument values must be JSON arrays; argument order in the file is
/// preserved in the generated command lines. `algorithm_hyper_args` are
/// merged over `common_hyper_args`, overriding on key collision.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SweepSpec {
    /// The script each command invokes.
    pub script: String,
    /// Optional interpreter prefixed to the script (e.g. `python3`).
    #[serde(default)]
    pub interpreter: Option<String>,
    /// Arguments repeated verbatim in every command.
    #[serde(default)]
    pub base_args: Map<String, Value>,
    /// Swept arguments shared by all algorithms; each value is a list.
    #[serde(default)]
    pub common_hyper_args: Map<String, Value>,
    /// Algorithm-specific swept arguments; each value is a list.
    #[serde(default)]
    pub algorithm_hyper_args: Map<String, Value>,
}

/// Read a [`SweepSpec`] from a JSON file.
pub fn load_sweep_file(path: &Path) -> Result<SweepSpec> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| {
        RunnerError::Configuration(format!("invalid sweep file {}: {}", path.display(), e))
    })
}

/// Expand a sweep into one command line per point of the swept product.
///
/// Rendering rules per argument value: `null` is omitted, `true` becomes
/// `--key`, `false` becomes `--no-key`, an array becomes `--key v1 v2 …`,
/// and any other scalar becomes `--key value`. The last swept axis varies
/// fastest.
///
/// # Errors
///
/// `Configuration` if the script is empty, a swept value is not a list, or
/// any list is empty.
pub fn make_commands(spec: &SweepSpec) -> Result<Vec<String>> {
    if spec.script.trim().is_empty() {
        return Err(RunnerError::Configuration(
            "sweep script must not be empty".to_string(),
        ));
    }

    let mut base_cmd = String::new();
    if let Some(interpreter) = &spec.interpreter {
        base_cmd.push_str(interpreter);
        base_cmd.push(' ');
    }
    base_cmd.push_str(&spec.script);

    // Merge the swept axes; algorithm-specific values win but keep the
    // original key position.
    let mut axes = spec.common_hyper_args.clone();
    for (key, value) in &spec.algorithm_hyper_args {
        axes.insert(key.clone(), value.clone());
    }

    let mut keys = Vec::with_capacity(axes.len());
    let mut lists = Vec::with_capacity(axes.len());
    for (key, value) in &axes {
        let list = value.as_array().ok_or_else(|| {
            RunnerError::Configuration(format!("swept argument --{} must be a list", key))
        })?;
        if list.is_empty() {
            return Err(RunnerError::Configuration(format!(
                "swept argument --{} has an empty list",
                key
            )));
        }
        keys.push(key.clone());
        lists.push(list);
    }

    let mut combos: Vec<Vec<&Value>> = vec![Vec::new()];
    for list in &lists {
        let mut next = Vec::with_capacity(combos.len() * list.len());
        for combo in &combos {
            for value in list.iter() {
                let mut extended = combo.clone();
                extended.push(value);
                next.push(extended);
            }
        }
        combos = next;
    }

    let mut commands = Vec::with_capacity(combos.len());
    for combo in combos {
        let mut cmd = base_cmd.clone();
        for (key, value) in &spec.base_args {
            cmd.push_str(&arg_fragment(key, value)?);
        }
        for (key, value) in keys.iter().zip(combo) {
            cmd.push_str(&arg_fragment(key, value)?);
        }
        commands.push(cmd);
    }
    Ok(commands)
}

fn arg_fragment(key: &str, value: &Value) -> Result<String> {
    Ok(match value {
        Value::Null => String::new(),
        Value::Bool(true) => format!(" --{}", key),
        Value::Bool(false) => format!(" --no-{}", key),
        Value::Array(items) => {
            if items.is_empty() {
                return Err(RunnerError::Configuration(format!(
                    "argument --{} has an empty list",
                    key
                )));
            }
            let joined = items
                .iter()
                .map(render_scalar)
                .collect::<Vec<_>>()
                .join(" ");
            format!(" --{} {}", key, joined)
        }
        other => format!(" --{} {}", key, render_scalar(other)),
    })
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flag_rendering() {
        assert_eq!(arg_fragment("print", &json!(true)).unwrap(), " --print");
        assert_eq!(arg_fragment("print", &json!(false)).unwrap(), " --no-print");
        assert_eq!(arg_fragment("skip", &json!(null)).unwrap(), "");
        assert_eq!(arg_fragment("lr", &json!(0.1)).unwrap(), " --lr 0.1");
        assert_eq!(
            arg_fragment("layers", &json!([64, 128])).unwrap(),
            " --layers 64 128"
        );
    }

    #[test]
    fn empty_list_rejected() {
        assert!(arg_fragment("layers", &json!([])).is_err());
    }

    #[test]
    fn empty_script_rejected() {
        let spec = SweepSpec::default();
        assert!(make_commands(&spec).is_err());
    }
}
