#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use sideload::{
    AttachmentResult, AttachmentTier, BootstrapOptions, Bootstrapper, CycleReport,
    HostEnvironment, ModuleReference, Phase, PlatformVersion, RuntimeLimits, Status, Verdict,
};
use tempfile::TempDir;

const GREETER_WAT: &str = include_str!("../../../demos/greeter.wat");

fn write_module(dir: &TempDir, wat_src: &str) -> PathBuf {
    let path = dir.path().join("module.wasm");
    std::fs::write(&path, wat::parse_str(wat_src).expect("valid wat")).expect("write module");
    path
}

fn run_with(
    path: &Path,
    entry: &str,
    env: &HostEnvironment,
    options: BootstrapOptions,
) -> CycleReport {
    Bootstrapper::new(RuntimeLimits::default(), options)
        .expect("bootstrapper")
        .run(&ModuleReference::new(path, entry), env)
}

fn run(path: &Path, entry: &str) -> CycleReport {
    let options = BootstrapOptions {
        storage_report: false,
        ..BootstrapOptions::default()
    };
    run_with(path, entry, &HostEnvironment::default(), options)
}

fn statuses(report: &CycleReport, phase: Phase) -> Vec<Status> {
    report.trace.in_phase(phase).map(|e| e.status).collect()
}

#[test]
fn trivial_entry_type_succeeds() {
    let dir = TempDir::new().unwrap();
    let path = write_module(&dir, GREETER_WAT);

    let report = run(&path, "demo.Greeter");

    assert_eq!(report.verdict, Verdict::Success);
    assert!(statuses(&report, Phase::Load).iter().all(|s| *s == Status::Ok));
    assert_eq!(statuses(&report, Phase::BaseAttach), vec![Status::Ok]);
    assert!(statuses(&report, Phase::Invoke).iter().all(|s| *s == Status::Ok));
    assert_eq!(
        report.attachment,
        Some(AttachmentResult {
            tier: AttachmentTier::FullAttach,
            succeeded: true,
        })
    );
    let rendered = report.trace.render();
    assert!(rendered.contains("guest: hello from demo.Greeter"));
    assert!(rendered.contains("guest: full attach complete"));
}

#[test]
fn nonexistent_path_yields_single_not_found_entry() {
    let report = run(Path::new("/nonexistent.pkg"), "any.Type");

    assert_eq!(report.verdict, Verdict::Failure);
    assert_eq!(report.attachment, None);
    assert_eq!(report.trace.len(), 1);
    let entry = &report.trace.entries()[0];
    assert_eq!(entry.phase, Phase::Load);
    assert_eq!(entry.status, Status::Failed);
    assert!(entry.message.contains("not found"), "{}", entry.message);
}

#[test]
fn unknown_type_name_is_symbol_not_found() {
    let dir = TempDir::new().unwrap();
    let path = write_module(&dir, GREETER_WAT);

    let report = run(&path, "demo.Missing");

    assert_eq!(report.verdict, Verdict::Failure);
    assert_eq!(report.trace.len(), 1);
    assert!(report.trace.entries()[0]
        .message
        .contains("type demo.Missing not found"));
}

#[test]
fn missing_entry_method_fails_after_attach() {
    let dir = TempDir::new().unwrap();
    let path = write_module(
        &dir,
        r#"(module
            (global (export "demo.Silent::_base:Context") (mut i32) (i32.const 0))
            (func (export "demo.Silent::new()") (result i32) i32.const 8)
        )"#,
    );

    let report = run(&path, "demo.Silent");

    assert_eq!(report.verdict, Verdict::Failure);
    assert_eq!(statuses(&report, Phase::BaseAttach), vec![Status::Ok]);
    let invoke: Vec<_> = report.trace.in_phase(Phase::Invoke).collect();
    assert_eq!(invoke.len(), 1);
    assert_eq!(invoke[0].status, Status::Failed);
    assert!(invoke[0].message.contains("on_create(Bundle) not declared"));
}

#[test]
fn throwing_full_attach_does_not_block_invocation() {
    let dir = TempDir::new().unwrap();
    let path = write_module(
        &dir,
        r#"(module
            (global (export "app.Component::_base:Context") (mut i32) (i32.const 0))
            (global (export "demo.Fragile extends app.Component") i32 (i32.const 0))
            (func (export "demo.Fragile::new()") (result i32) i32.const 8)
            (func (export "app.Component::_attach(Context,Token,com.vendor.Window)")
              (param i32 i32 i32 i32)
              unreachable)
            (func (export "demo.Fragile::on_create(Bundle)") (param i32 i32))
        )"#,
    );

    let report = run(&path, "demo.Fragile");

    assert_eq!(report.verdict, Verdict::Success);
    assert_eq!(statuses(&report, Phase::FullAttach), vec![Status::Degraded]);
    assert_eq!(
        report.attachment,
        Some(AttachmentResult {
            tier: AttachmentTier::BaseOnly,
            succeeded: true,
        })
    );
    assert_eq!(statuses(&report, Phase::Invoke), vec![Status::Ok]);
}

#[test]
fn failed_base_attach_never_reaches_full_attach() {
    let dir = TempDir::new().unwrap();
    let path = write_module(
        &dir,
        r#"(module
            (import "host" "log" (func $log (param i32 i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "attach reached")
            (global (export "app.Component::_base:Context") i32 (i32.const 0))
            (global (export "demo.Locked extends app.Component") i32 (i32.const 0))
            (func (export "demo.Locked::new()") (result i32) i32.const 8)
            (func (export "app.Component::_attach(Context)") (param i32 i32)
              i32.const 0
              i32.const 14
              call $log)
            (func (export "demo.Locked::on_create(Bundle)") (param i32 i32))
        )"#,
    );

    let report = run(&path, "demo.Locked");

    assert_eq!(report.verdict, Verdict::Failure);
    assert_eq!(statuses(&report, Phase::BaseAttach), vec![Status::Failed]);
    assert!(report.trace.in_phase(Phase::FullAttach).next().is_none());
    assert!(report.trace.in_phase(Phase::Invoke).next().is_none());
    assert!(!report.trace.render().contains("attach reached"));
    let failure = report.trace.in_phase(Phase::BaseAttach).next().unwrap();
    assert!(failure.message.starts_with("Failed to initialize demo.Locked"));
    assert!(failure.message.contains("access denied"));
}

#[test]
fn throwing_base_setter_stops_before_full_attach() {
    let dir = TempDir::new().unwrap();
    let path = write_module(
        &dir,
        r#"(module
            (import "host" "log" (func $log (param i32 i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "setter ran")
            (data (i32.const 16) "attach reached")
            (global (export "demo.Brittle extends app.Component") i32 (i32.const 0))
            (func (export "demo.Brittle::new()") (result i32) i32.const 8)
            (func (export "app.Component::_attach_base_context(Context)") (param i32 i32)
              i32.const 0
              i32.const 10
              call $log
              unreachable)
            (func (export "app.Component::_attach(Context)") (param i32 i32)
              i32.const 16
              i32.const 14
              call $log)
            (func (export "demo.Brittle::on_create(Bundle)") (param i32 i32))
        )"#,
    );

    let report = run(&path, "demo.Brittle");

    assert_eq!(report.verdict, Verdict::Failure);
    assert_eq!(report.trace.in_phase(Phase::FullAttach).count(), 0);
    assert_eq!(report.trace.in_phase(Phase::Invoke).count(), 0);
    let base: Vec<_> = report.trace.in_phase(Phase::BaseAttach).collect();
    assert_eq!(base.len(), 2);
    assert_eq!(base[0].status, Status::Ok);
    assert_eq!(base[0].message, "guest: setter ran");
    assert_eq!(base[1].status, Status::Failed);
    assert!(base[1].message.starts_with("Failed to initialize demo.Brittle"));
    assert!(!report.trace.render().contains("attach reached"));
    assert_eq!(
        report.attachment,
        Some(AttachmentResult {
            tier: AttachmentTier::None,
            succeeded: false,
        })
    );
}

#[test]
fn older_platform_degrades_full_attach_but_succeeds() {
    let dir = TempDir::new().unwrap();
    let path = write_module(&dir, GREETER_WAT);
    let env = HostEnvironment {
        platform: PlatformVersion(12),
        ..HostEnvironment::default()
    };
    let options = BootstrapOptions {
        storage_report: false,
        ..BootstrapOptions::default()
    };

    let report = run_with(&path, "demo.Greeter", &env, options);

    assert_eq!(report.verdict, Verdict::Success);
    assert_eq!(statuses(&report, Phase::FullAttach), vec![Status::Degraded]);
    assert!(report.trace.render().contains("guest: hello from demo.Greeter"));
}

#[test]
fn full_lifecycle_runs_follow_up_steps() {
    let dir = TempDir::new().unwrap();
    let path = write_module(&dir, GREETER_WAT);
    let options = BootstrapOptions {
        follow_up_lifecycle: true,
        storage_report: false,
    };

    let report = run_with(&path, "demo.Greeter", &HostEnvironment::default(), options);

    assert_eq!(report.verdict, Verdict::Success);
    let follow_up: Vec<_> = report
        .trace
        .in_phase(Phase::FollowUp)
        .map(|e| e.message.as_str())
        .collect();
    assert_eq!(
        follow_up,
        vec![
            "guest: on_start",
            "on_start() called",
            "guest: on_resume",
            "on_resume() called"
        ]
    );
}

#[test]
fn runaway_entry_method_is_contained() {
    let dir = TempDir::new().unwrap();
    let path = write_module(
        &dir,
        r#"(module
            (global (export "demo.Spin::_base:Context") (mut i32) (i32.const 0))
            (func (export "demo.Spin::new()") (result i32) i32.const 8)
            (func (export "demo.Spin::on_create(Bundle)") (param i32 i32)
              (loop $forever br $forever))
        )"#,
    );
    let options = BootstrapOptions {
        storage_report: false,
        ..BootstrapOptions::default()
    };
    let bootstrapper = Bootstrapper::new(
        RuntimeLimits {
            max_cpu_ms: 1,
            ..RuntimeLimits::default()
        },
        options,
    )
    .unwrap();

    let report = bootstrapper.run(
        &ModuleReference::new(&path, "demo.Spin"),
        &HostEnvironment::default(),
    );

    assert_eq!(report.verdict, Verdict::Failure);
    let invoke = report.trace.in_phase(Phase::Invoke).next().unwrap();
    assert!(invoke.message.contains("exceeded CPU budget"), "{}", invoke.message);
}

#[test]
fn report_serializes_for_hosts() {
    let dir = TempDir::new().unwrap();
    let path = write_module(&dir, GREETER_WAT);

    let report = run(&path, "demo.Greeter");
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["verdict"], "success");
    assert_eq!(json["attachment"]["tier"], "full_attach");
    assert_eq!(json["trace"][0]["phase"], "load");
    assert_eq!(json["trace"][0]["status"], "ok");
}
