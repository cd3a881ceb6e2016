use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const LOOKUP: &str = "dstport,protocol,tag\n25,tcp,sv_P1\n68,udp,sv_P2\n";

const FLOW_LOG: &str = "\
2 123456789012 eni-0a1b2c3d 10.0.1.201 198.51.100.2 25 49153 6 25 20000 1620140761 1620140821 ACCEPT OK
2 123456789012 eni-5f6g7h8i 10.0.2.103 52.26.198.183 68 49161 17 7 3000 1620140761 1620140821 ACCEPT OK
2 123456789012 eni-9k10l11m 192.168.1.5 51.15.99.115 99 25 47 20 10000 1620145661 1620145721 ACCEPT OK
";

fn flowtag(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_flowtag"))
        .args(args)
        .current_dir(dir)
        .env_remove("FLOWTAG_LOOKUP")
        .env_remove("FLOWTAG_FLOW_LOG")
        .env_remove("FLOWTAG_OUTPUT")
        .env_remove("FLOWTAG_WORKERS")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .output()
        .unwrap()
}

fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("lookup.csv"), LOOKUP).unwrap();
    fs::write(dir.path().join("flows.txt"), FLOW_LOG).unwrap();
    dir
}

#[test]
fn missing_lookup_exits_non_zero_without_output() {
    let dir = workspace();
    let out = flowtag(
        dir.path(),
        &["--lookup", "missing.csv", "--flow-log", "flows.txt", "--output", "report.csv"],
    );

    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("cannot open"), "stderr: {}", stderr);
    assert!(stderr.contains("missing.csv"), "stderr: {}", stderr);
    assert!(!dir.path().join("report.csv").exists());
}

#[test]
fn bad_lookup_header_exits_non_zero_without_output() {
    let dir = workspace();
    fs::write(dir.path().join("bad.csv"), "port,protocol,tag\n25,tcp,x\n").unwrap();
    let out = flowtag(
        dir.path(),
        &["--lookup", "bad.csv", "--flow-log", "flows.txt", "--output", "report.csv"],
    );

    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("dstport"), "stderr: {}", stderr);
    assert!(!dir.path().join("report.csv").exists());
}

#[test]
fn successful_run_writes_text_report() {
    let dir = workspace();
    let out = flowtag(
        dir.path(),
        &["--lookup", "lookup.csv", "--flow-log", "flows.txt", "--output", "report.csv"],
    );

    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let report = fs::read_to_string(dir.path().join("report.csv")).unwrap();
    assert_eq!(
        report,
        "\
Tag Counts:
Tag,Count
sv_P1,1
sv_P2,1
Untagged,1

Port/Protocol Combination Counts:
Port,Protocol,Count
25,tcp,1
68,udp,1
99,unknown,1
"
    );
}

#[test]
fn parallel_run_writes_same_report() {
    let dir = workspace();
    let sequential = flowtag(
        dir.path(),
        &["--lookup", "lookup.csv", "--flow-log", "flows.txt", "--output", "one.csv"],
    );
    let parallel = flowtag(
        dir.path(),
        &["--lookup", "lookup.csv", "--flow-log", "flows.txt", "--output", "four.csv", "-w", "4"],
    );

    assert!(sequential.status.success());
    assert!(parallel.status.success());
    assert_eq!(
        fs::read_to_string(dir.path().join("one.csv")).unwrap(),
        fs::read_to_string(dir.path().join("four.csv")).unwrap()
    );
}
