//! Sweep expansion against known-good command lines.

use serde_json::json;

use sweeprun::sweep::{load_sweep_file, make_commands, SweepSpec};

fn spec_from(value: serde_json::Value) -> SweepSpec {
    serde_json::from_value(value).unwrap()
}

#[test]
fn full_expansion_matches_expected_commands() {
    let spec = spec_from(json!({
        "script": "train.py",
        "interpreter": "python3",
        "base_args": {"threads": 2, "lr": 0.1, "print": true, "layers": [64, 128]},
        "common_hyper_args": {"seed": [0, 1, 2]},
        "algorithm_hyper_args": {"wd": [0.01, 0.1]}
    }));

    let cmds = make_commands(&spec).unwrap();
    assert_eq!(cmds.len(), 6);

    let mut expected = Vec::new();
    for seed in [0, 1, 2] {
        for wd in ["0.01", "0.1"] {
            expected.push(format!(
                "python3 train.py --threads 2 --lr 0.1 --print --layers 64 128 --seed {} --wd {}",
                seed, wd
            ));
        }
    }
    assert_eq!(cmds, expected);
}

#[test]
fn no_interpreter_runs_script_as_given() {
    let spec = spec_from(json!({
        "script": "./run.sh",
        "common_hyper_args": {"seed": [0, 1]}
    }));
    let cmds = make_commands(&spec).unwrap();
    assert_eq!(cmds, vec!["./run.sh --seed 0", "./run.sh --seed 1"]);
}

#[test]
fn no_swept_args_yields_a_single_command() {
    let spec = spec_from(json!({
        "script": "train.py",
        "base_args": {"lr": 0.1}
    }));
    let cmds = make_commands(&spec).unwrap();
    assert_eq!(cmds, vec!["train.py --lr 0.1"]);
}

#[test]
fn false_flags_and_nulls_render_correctly() {
    let spec = spec_from(json!({
        "script": "train.py",
        "base_args": {"verbose": false, "resume": null, "tag": "run-a"}
    }));
    let cmds = make_commands(&spec).unwrap();
    assert_eq!(cmds, vec!["train.py --no-verbose --tag run-a"]);
}

#[test]
fn algorithm_args_override_common_args() {
    let spec = spec_from(json!({
        "script": "train.py",
        "common_hyper_args": {"lr": [0.1], "seed": [0]},
        "algorithm_hyper_args": {"lr": [0.2, 0.3]}
    }));
    let cmds = make_commands(&spec).unwrap();
    // The overriding values win and keep lr's original position.
    assert_eq!(
        cmds,
        vec!["train.py --lr 0.2 --seed 0", "train.py --lr 0.3 --seed 0"]
    );
}

#[test]
fn non_list_swept_value_is_rejected() {
    let spec = spec_from(json!({
        "script": "train.py",
        "common_hyper_args": {"seed": 3}
    }));
    assert!(make_commands(&spec).is_err());
}

#[test]
fn empty_swept_list_is_rejected() {
    let spec = spec_from(json!({
        "script": "train.py",
        "common_hyper_args": {"seed": []}
    }));
    assert!(make_commands(&spec).is_err());
}

#[test]
fn sweep_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sweep.json");
    std::fs::write(
        &path,
        r#"{"script": "train.py", "common_hyper_args": {"seed": [0, 1]}}"#,
    )
    .unwrap();

    let spec = load_sweep_file(&path).unwrap();
    let cmds = make_commands(&spec).unwrap();
    assert_eq!(cmds, vec!["train.py --seed 0", "train.py --seed 1"]);
}

#[test]
fn invalid_sweep_file_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sweep.json");
    std::fs::write(&path, "not json").unwrap();
    assert!(load_sweep_file(&path).is_err());
}
