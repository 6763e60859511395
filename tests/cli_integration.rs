//! Integration tests for the `cmdtag` binary.
//!
//! Every test runs against its own config file and lock directory, with
//! the environment that changes discovery or worker mode cleared.

use std::fs;
use std::path::Path;
use std::process::Stdio;
use std::thread;
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let locks = dir.path().join("locks");
        fs::write(
            dir.path().join("config.toml"),
            format!(
                "[locks]\ndirectory = {:?}\n\n[workers]\npoll_interval_ms = 10\n",
                locks.to_string_lossy()
            ),
        )
        .unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("cmdtag").unwrap();
        cmd.env("CMDTAG_CONFIG", self.path().join("config.toml"))
            .env_remove("CMDTAG_PATH")
            .env_remove("CMDTAG_WORKER_ID")
            .env_remove("RUST_LOG");
        cmd
    }
}

#[test]
fn version_flag_works() {
    Sandbox::new()
        .cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cmdtag"));
}

#[test]
fn help_lists_commands() {
    Sandbox::new()
        .cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("demo:greet"))
        .stdout(predicate::str::contains("--no-interactive"));
}

#[test]
fn list_groups_by_namespace() {
    Sandbox::new()
        .cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Available commands:"))
        .stdout(predicate::str::contains(" demo\n"))
        .stdout(predicate::str::contains("demo:touch"));
}

#[test]
fn greet_runs_plugin_then_handler() {
    Sandbox::new()
        .cmd()
        .args(["demo:greet", "Bob"])
        .assert()
        .success()
        .stdout("audit: demo:greet\nhi, Bob!\n");
}

#[test]
fn quiet_hides_informational_output() {
    Sandbox::new()
        .cmd()
        .args(["-q", "demo:greet", "Bob", "--greeting", "yo"])
        .assert()
        .success()
        .stdout("yo, Bob!\n");
}

#[test]
fn abbreviations_resolve() {
    Sandbox::new()
        .cmd()
        .args(["d:g", "Bob"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hi, Bob!"));
}

#[test]
fn unknown_command_fails() {
    Sandbox::new()
        .cmd()
        .arg("nope")
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn missing_required_argument_fails() {
    Sandbox::new()
        .cmd()
        .arg("demo:greet")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<NAME>"));
}

#[test]
fn prompts_read_piped_answers() {
    Sandbox::new()
        .cmd()
        .args(["--interactive", "demo:login"])
        .write_stdin("bob\nsecret\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("logged in as bob (6 character password)"));
}

#[test]
fn supplied_options_skip_prompts() {
    Sandbox::new()
        .cmd()
        .args(["--no-interactive", "demo:login", "--user", "ann", "--password", "pw"])
        .assert()
        .success()
        .stdout("logged in as ann (2 character password)\n");
}

#[test]
fn missing_prompt_value_without_terminal_fails() {
    Sandbox::new()
        .cmd()
        .args(["--no-interactive", "demo:login", "--user", "ann"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--password"));
}

#[test]
fn rejected_answer_fails() {
    Sandbox::new()
        .cmd()
        .args(["--interactive", "demo:login"])
        .write_stdin("   \nsecret\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn workers_fan_out() {
    let sandbox = Sandbox::new();
    let into = sandbox.path().join("out");

    sandbox
        .cmd()
        .args(["demo:touch", "--workers", "3", "--into"])
        .arg(&into)
        .assert()
        .success();

    let written: Vec<_> = fs::read_dir(&into)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(written.len(), 3);
    for id in 1..=3 {
        let prefix = format!("worker-{}-", id);
        assert!(written.iter().any(|name| name.starts_with(&prefix)), "{:?}", written);
    }
}

#[test]
fn worker_mode_runs_the_handler_directly() {
    Sandbox::new()
        .cmd()
        .env("CMDTAG_WORKER_ID", "4")
        .args(["demo:touch", "--workers", "3"])
        .assert()
        .success()
        .stdout("worker 4 done\n");
}

#[test]
fn once_refuses_a_second_run() {
    let sandbox = Sandbox::new();
    let mut first = std::process::Command::new(assert_cmd::cargo::cargo_bin("cmdtag"))
        .env("CMDTAG_CONFIG", sandbox.path().join("config.toml"))
        .env_remove("CMDTAG_PATH")
        .env_remove("CMDTAG_WORKER_ID")
        .args(["demo:once", "--hold", "3000"])
        .stdout(Stdio::null())
        .spawn()
        .unwrap();
    thread::sleep(Duration::from_millis(800));

    let second = sandbox.cmd().arg("demo:once").assert();
    first.wait().unwrap();

    second
        .failure()
        .stderr(predicate::str::contains("already running"));

    sandbox.cmd().arg("demo:once").assert().success().stdout("done\n");
}

#[test]
fn manifests_are_discovered_from_the_environment() {
    let sandbox = Sandbox::new();
    let commands = sandbox.path().join("commands");
    fs::create_dir_all(commands.join("nested")).unwrap();
    fs::write(
        commands.join("nested/hello.cmd.toml"),
        r#"
[[unit]]
id = "hello"
handler = "greet"

[[unit.tag]]
name = "cli"
args = ["team:hello", "Greet the team"]

[[unit.tag]]
name = "argument"
args = ["name", "REQUIRED"]

[[unit.tag]]
name = "option"
args = ["greeting", "VALUE_IS_ARRAY"]
named = { default = ["hello"] }

[[unit.tag]]
name = "audited"
"#,
    )
    .unwrap();

    sandbox
        .cmd()
        .env("CMDTAG_PATH", &commands)
        .args(["team:hello", "crew"])
        .assert()
        .success()
        .stdout("audit: team:hello\nhello, crew!\n");
}

#[test]
fn bad_manifest_is_reported() {
    let sandbox = Sandbox::new();
    let commands = sandbox.path().join("commands");
    fs::create_dir_all(&commands).unwrap();
    fs::write(
        commands.join("broken.cmd.toml"),
        "[[unit]]\nid = \"x\"\nhandler = \"no_such_handler\"\n",
    )
    .unwrap();

    sandbox
        .cmd()
        .env("CMDTAG_PATH", &commands)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no_such_handler"));
}

#[test]
fn completion_script_is_generated() {
    Sandbox::new()
        .cmd()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("demo:greet"));
}

#[test]
fn workers_receive_hidden_values_without_argv() {
    let sandbox = Sandbox::new();
    let commands = sandbox.path().join("commands");
    fs::create_dir_all(&commands).unwrap();
    fs::write(
        commands.join("fleet.cmd.toml"),
        r#"
[[unit]]
id = "fleet-login"
handler = "login"

[[unit.tag]]
name = "cli"
args = ["fleet:login"]

[[unit.tag]]
name = "prompt"
args = ["user"]

[[unit.tag]]
name = "prompt"
args = ["password"]
named = { secret = true }

[[unit.tag]]
name = "spawnable"
"#,
    )
    .unwrap();

    let output = sandbox
        .cmd()
        .env("CMDTAG_PATH", &commands)
        .args(["--no-interactive", "fleet:login", "--workers", "2", "--user", "bob"])
        .args(["--password", "hunter2"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8(output).unwrap();
    assert_eq!(
        stdout.matches("logged in as bob (7 character password)").count(),
        2,
        "{}",
        stdout
    );
}
