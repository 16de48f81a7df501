mod common;

use common::TestContext;
use predicates::prelude::*;
use std::fs;

#[test]
fn patch_writes_default_output_next_to_source() {
    let ctx = TestContext::new();

    ctx.cli()
        .arg("-c")
        .arg(ctx.config())
        .arg("-s")
        .arg(ctx.session())
        .assert()
        .success()
        .stdout(predicate::str::contains("patched_session.tcl"));

    let patched = ctx.read("patched_session.tcl");
    assert!(patched.contains(
        "set _session_group_2 {Issue Unit}; gui_sg_create \"$_session_group_2\"; set {Issue Unit} \"$_session_group_2\""
    ));
    assert!(patched.contains(
        "gui_sg_addsignal -group \"$_session_group_2\" { tb.dut.core.issue.valid }; gui_set_radix -radix {binary} -signals { tb.dut.core.issue.valid }"
    ));
    assert!(patched.contains("gui_sg_addsignal -group \"$_session_group_2\" { -- } -divider"));
    assert!(patched.contains("-radix {hex} -signals { tb.dut.core.issue.slot_1 }"));
    assert!(patched.contains(
        "set _session_group_4 $_session_group_2|; append _session_group_4 {Port lsu}"
    ));
    assert!(patched.contains("{ tb.dut.core.issue.lsu_ack }"));
    assert!(patched.contains(
        "gui_list_add_group -id ${Wave.1} -after {Issue Unit|Port alu} {{Issue Unit|Port lsu}}"
    ));
    assert!(patched.contains("gui_list_collapse -id ${Wave.1} {Issue Unit}"));
    assert!(patched.contains("gui_list_expand -id ${Wave.1} {Issue Unit|Port alu}"));
    assert!(patched.contains("gui_wv_zoom_outfull -id ${Wave.1}"));
    assert!(!patched.contains("gui_wv_zoom_timerange"));

    // The source is never modified
    assert_eq!(ctx.read("session.tcl"), include_str!("fixtures/session.tcl"));
}

#[test]
fn patch_respects_explicit_output() {
    let ctx = TestContext::new();

    ctx.cli()
        .args(["-c", "groups.yaml", "-s", "session.tcl", "-o", "out.tcl"])
        .assert()
        .success();

    assert!(ctx.path("out.tcl").exists());
    assert!(!ctx.path("patched_session.tcl").exists());
}

#[test]
fn reruns_produce_identical_output() {
    let ctx = TestContext::new();

    for output in ["a.tcl", "b.tcl"] {
        ctx.cli()
            .args(["-c", "groups.yaml", "-s", "session.tcl", "-o", output])
            .assert()
            .success();
    }

    assert_eq!(ctx.read("a.tcl"), ctx.read("b.tcl"));
}

#[test]
fn dry_run_prints_sections_without_writing() {
    let ctx = TestContext::new();

    ctx.cli()
        .args(["-c", "groups.yaml", "-s", "session.tcl", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# Creating groups and adding signals"))
        .stdout(predicate::str::contains("# Adding groups to the view"))
        .stdout(predicate::str::contains("{ tb.dut.core.issue.alu_req }"));

    assert!(!ctx.path("patched_session.tcl").exists());
}

#[test]
fn dump_instructions_emits_json() {
    let ctx = TestContext::new();

    let output = ctx
        .cli()
        .args(["-c", "groups.yaml", "-s", "session.tcl", "--dump-instructions"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let instructions: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let instructions = instructions.as_array().unwrap();
    let count = |kind: &str| {
        instructions
            .iter()
            .filter(|i| i["kind"] == kind)
            .count()
    };
    assert_eq!(count("open_group"), 3);
    assert_eq!(count("close_group"), 3);
    assert_eq!(count("add_signal"), 7);
    assert_eq!(count("add_divider"), 1);
    assert_eq!(instructions[0]["id"], 2);
    assert!(!ctx.path("patched_session.tcl").exists());
}

#[test]
fn missing_environment_variable_fails() {
    let ctx = TestContext::new();

    ctx.cli()
        .env_remove("DESIGN_TOP")
        .args(["-c", "groups.yaml", "-s", "session.tcl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("DESIGN_TOP"));

    assert!(!ctx.path("patched_session.tcl").exists());
}

#[test]
fn duplicate_anchor_requires_first_anchor_flag() {
    let ctx = TestContext::new();
    let mut session = ctx.read("session.tcl");
    session.push_str("# Global: Signal Groups\n");
    fs::write(ctx.session(), session).unwrap();

    ctx.cli()
        .args(["-c", "groups.yaml", "-s", "session.tcl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("# Global: Signal Groups"));
    assert!(!ctx.path("patched_session.tcl").exists());

    ctx.cli()
        .args(["-c", "groups.yaml", "-s", "session.tcl", "--first-anchor"])
        .assert()
        .success();
    assert!(ctx.path("patched_session.tcl").exists());
}

#[test]
fn output_equal_to_source_is_rejected() {
    let ctx = TestContext::new();

    ctx.cli()
        .args(["-c", "groups.yaml", "-s", "session.tcl", "-o", "session.tcl"])
        .assert()
        .failure();

    assert_eq!(ctx.read("session.tcl"), include_str!("fixtures/session.tcl"));
}

#[test]
fn unknown_configuration_key_fails() {
    let ctx = TestContext::new();
    ctx.write_config("settings:\n  wave_name: Wave.1\n  colour: red\ngroups: []\n");

    ctx.cli()
        .args(["-c", "groups.yaml", "-s", "session.tcl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("colour"));
}

#[test]
fn missing_required_arguments_fail() {
    let ctx = TestContext::new();

    ctx.cli()
        .args(["-c", "groups.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--source"));
}
