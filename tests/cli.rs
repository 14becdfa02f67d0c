#![cfg(unix)]

use std::process::Command;

fn cws_term(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_cws-term"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn exit_code_follows_the_program() {
    let out = cws_term(&["Publishing", "sh", "-c", "exit 3"]);
    assert_eq!(out.status.code(), Some(3));

    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("🔥: Publishing"), "{stderr:?}");
}

#[test]
fn success_replays_program_stdout() {
    let out = cws_term(&["Listing", "sh", "-c", "echo listed"]);
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(out.stdout, b"listed\n");

    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("✅: Listing"), "{stderr:?}");
}

#[test]
fn missing_arguments_print_usage() {
    let out = cws_term(&["only-a-title"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).starts_with("usage:"));
}
