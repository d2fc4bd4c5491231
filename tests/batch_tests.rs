//! LSF submission-string assembly.

use sweeprun::batch::{is_lsf_host, BsubRunner};
use sweeprun::config::BatchConfig;
use sweeprun::error::RunnerError;

fn runner_in(dir: &std::path::Path, config: BatchConfig) -> BsubRunner {
    let mut config = config;
    config.log_dir = dir.to_path_buf();
    BsubRunner::new(config)
}

#[test]
fn base_command_minimal() {
    let runner = BsubRunner::new(BatchConfig::new("test"));
    assert_eq!(runner.base_command(), "bsub -o logs/lsf.test -n 1 ");
}

#[test]
fn base_command_all_options() {
    let config = BatchConfig::new("test")
        .with_threads(4)
        .with_gpu(true)
        .with_wall_time(720)
        .with_memory(4096);
    let runner = BsubRunner::new(config);
    assert_eq!(
        runner.base_command(),
        "bsub -o logs/lsf.test -W 720 -R \"rusage[mem=4096]\" \
         -R \"rusage[ngpus_excl_p=1]\" -n 4 "
    );
}

#[test]
fn base_command_flag_order_is_stable() {
    let config = BatchConfig::new("test").with_memory(2048).with_threads(2);
    let runner = BsubRunner::new(config);
    assert_eq!(
        runner.base_command(),
        "bsub -o logs/lsf.test -R \"rusage[mem=2048]\" -n 2 "
    );
}

#[tokio::test]
async fn run_names_each_job_and_quotes_the_command() {
    let dir = tempfile::tempdir().unwrap();
    let runner = runner_in(dir.path(), BatchConfig::new("exp"));

    let commands = vec!["train.py --seed 0".to_string(), "train.py --seed 1".to_string()];
    let submitted = runner.run(&commands).await.unwrap();

    assert_eq!(submitted.len(), 2);
    assert!(submitted[0].contains("-J \"exp-0\""));
    assert!(submitted[0].ends_with("\"train.py --seed 0\""));
    assert!(submitted[1].contains("-J \"exp-1\""));
}

#[tokio::test]
async fn run_batch_writes_the_command_file_and_submits_an_array() {
    let dir = tempfile::tempdir().unwrap();
    let runner = runner_in(dir.path(), BatchConfig::new("exp"));

    let commands: Vec<String> = (0..6).map(|i| format!("train.py --seed {}", i)).collect();
    let submission = runner.run_batch(&commands).await.unwrap();

    assert!(submission.contains("-J \"exp[1-6]\""));
    assert!(submission.contains("LSB_JOBINDEX"));

    // Exactly one command file, holding one command per line.
    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .starts_with("exp_cmd_")
        })
        .collect();
    assert_eq!(entries.len(), 1);

    let contents = std::fs::read_to_string(entries[0].path()).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], "train.py --seed 0");
    assert_eq!(lines[5], "train.py --seed 5");
}

#[tokio::test]
async fn empty_command_list_is_a_hard_error() {
    let dir = tempfile::tempdir().unwrap();
    let runner = runner_in(dir.path(), BatchConfig::new("exp"));

    assert!(matches!(
        runner.run(&[]).await,
        Err(RunnerError::EmptyQueue)
    ));
    assert!(matches!(
        runner.run_batch(&[]).await,
        Err(RunnerError::EmptyQueue)
    ));
}

#[test]
fn lsf_detection_follows_the_environment() {
    std::env::remove_var("LSF_ENVDIR");
    assert!(!is_lsf_host());
    std::env::set_var("LSF_ENVDIR", "/opt/lsf/conf");
    assert!(is_lsf_host());
    std::env::remove_var("LSF_ENVDIR");
}
