//! Exit and fault hooks, observed from a child process.
//!
//! Each `child_*` test does nothing unless `LEAKGUARD_HOOK_CHILD` names it;
//! the parent tests re-run this binary with that variable set and inspect the
//! child's stderr and exit status.

use std::os::unix::process::ExitStatusExt;
use std::process::{Command, Output};

const CHILD_ENV: &str = "LEAKGUARD_HOOK_CHILD";

fn is_child(role: &str) -> bool {
    std::env::var(CHILD_ENV).is_ok_and(|v| v == role)
}

fn run_child(test_name: &str) -> Output {
    let exe = std::env::current_exe().expect("current test binary");
    Command::new(exe)
        .args([test_name, "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, test_name)
        .output()
        .expect("spawn child test process")
}

fn disable_core_dumps() {
    let limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: plain syscall on a stack value.
    unsafe { libc::setrlimit(libc::RLIMIT_CORE, &limit) };
}

#[test]
fn child_exit_with_leak() {
    if !is_child("child_exit_with_leak") {
        return;
    }
    leakguard_abi::init().expect("install hooks");
    let leaked = leakguard_abi::malloc(24);
    let freed = leakguard_abi::malloc(8);
    // SAFETY: the second free is untracked and never reaches the allocator.
    unsafe {
        leakguard_abi::free(freed);
        leakguard_abi::free(freed);
    }
    assert!(!leaked.is_null());
}

#[test]
fn child_exit_clean() {
    if !is_child("child_exit_clean") {
        return;
    }
    assert!(!leakguard_abi::hooks_installed());
    leakguard_abi::init().expect("install hooks");
    assert!(leakguard_abi::hooks_installed());
    leakguard_abi::init().expect("second init is a no-op");
    assert!(leakguard_abi::hooks_installed());

    for signal in leakguard_abi::FATAL_SIGNALS {
        // SAFETY: zeroed sigaction is a valid out-parameter; no new action.
        let mut current = unsafe { std::mem::zeroed::<libc::sigaction>() };
        // SAFETY: query only; `current` is a valid out-parameter.
        let rc = unsafe { libc::sigaction(signal, std::ptr::null(), &mut current) };
        assert_eq!(rc, 0);
        assert_ne!(current.sa_sigaction, libc::SIG_DFL, "signal {signal}");
        assert_ne!(current.sa_flags & libc::SA_ONSTACK, 0, "signal {signal}");
    }

    let p = leakguard_abi::calloc(2, 16);
    // SAFETY: p came from the tracked calloc.
    unsafe { leakguard_abi::free(p) };
}

#[test]
fn child_segv_with_leak() {
    if !is_child("child_segv_with_leak") {
        return;
    }
    disable_core_dumps();
    leakguard_abi::init().expect("install hooks");
    let _leaked = leakguard_abi::malloc(128);
    // SAFETY: raising a signal the installed hook handles.
    unsafe { libc::raise(libc::SIGSEGV) };
}

#[test]
fn child_abort_after_explicit_report() {
    if !is_child("child_abort_after_explicit_report") {
        return;
    }
    disable_core_dumps();
    leakguard_abi::init().expect("install hooks");
    let _leaked = leakguard_abi::malloc(7);
    let summary = leakguard_abi::report_now().expect("first report");
    assert_eq!((summary.count, summary.bytes), (1, 7));
    std::process::abort();
}

#[test]
fn exit_hook_reports_leaks_and_keeps_exit_status() {
    let out = run_child("child_exit_with_leak");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(out.status.success(), "child failed: {stderr}");
    assert!(stderr.contains("[LEAKGUARD]"), "{stderr}");
    assert!(stderr.contains("invalid free at 0x"), "{stderr}");
    assert!(stderr.contains(" 24 bytes at 0x"), "{stderr}");
    assert!(stderr.contains("total (1) leaks, (24) bytes"), "{stderr}");
}

#[test]
fn exit_hook_reports_no_leaks_once() {
    let out = run_child("child_exit_clean");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(out.status.success(), "child failed: {stderr}");
    assert_eq!(stderr.matches("no leaks").count(), 1, "{stderr}");
    assert!(!stderr.contains("invalid free"), "{stderr}");
}

#[test]
fn fault_hook_reports_then_dies_by_same_signal() {
    let out = run_child("child_segv_with_leak");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert_eq!(out.status.signal(), Some(libc::SIGSEGV), "{stderr}");
    let notice = format!("caught signal {}, dumping leaks...", libc::SIGSEGV);
    assert!(stderr.contains(&notice), "{stderr}");
    assert!(stderr.contains("total (1) leaks, (128) bytes"), "{stderr}");
    let notice_at = stderr.find(&notice).expect("notice");
    let total_at = stderr.find("total (1)").expect("total");
    assert!(notice_at < total_at, "notice precedes the report");
}

#[test]
fn fault_after_explicit_report_does_not_report_twice() {
    let out = run_child("child_abort_after_explicit_report");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert_eq!(out.status.signal(), Some(libc::SIGABRT), "{stderr}");
    assert_eq!(stderr.matches("total (1) leaks, (7) bytes").count(), 1, "{stderr}");
    assert!(stderr.contains(&format!("caught signal {}", libc::SIGABRT)), "{stderr}");
}
