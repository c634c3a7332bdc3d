//! End-to-end tests running the `linebag` binary between two pipes.
//!
//! Signals are delivered with `kill(2)` once the process has logged that
//! buffering started, which happens after the signal descriptor is set up.

use std::io::{BufRead, BufReader, Read, Write};
use std::os::fd::AsRawFd;
use std::process::{Child, ChildStderr, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const BIN: &str = env!("CARGO_BIN_EXE_linebag");

fn command(slots: &str) -> Command {
    let mut cmd = Command::new(BIN);
    cmd.arg(slots)
        .env("LINEBAG_LOG", "info")
        .env_remove("LINEBAG_SLOT_SIZE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

/// Reads stderr until a log line containing `needle` shows up.
fn wait_for_log(stderr: &mut BufReader<ChildStderr>, needle: &str) {
    let mut line = String::new();
    loop {
        line.clear();
        let n = stderr.read_line(&mut line).expect("reading stderr");
        assert!(n > 0, "process exited before logging {needle:?}");
        if line.contains(needle) {
            return;
        }
    }
}

fn spawn_ready(slots: &str) -> (Child, BufReader<ChildStderr>) {
    let mut child = command(slots).spawn().expect("spawning linebag");
    let mut stderr = BufReader::new(child.stderr.take().expect("stderr piped"));
    wait_for_log(&mut stderr, "buffering started");
    (child, stderr)
}

fn kill(child: &Child, signo: i32) {
    // SAFETY: kill(2) has no memory-safety preconditions.
    let rc = unsafe { libc::kill(child.id() as libc::pid_t, signo) };
    assert_eq!(rc, 0, "kill failed");
}

/// Returns true if `fd` becomes readable within `timeout`.
fn readable_within(fd: &impl AsRawFd, timeout: Duration) -> bool {
    let mut pfd = libc::pollfd {
        fd: fd.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    // SAFETY: pfd is a single live pollfd entry.
    let rc = unsafe { libc::poll(&mut pfd, 1, timeout.as_millis() as libc::c_int) };
    rc > 0
}

/// Waits for the child to exit, giving up after `timeout`.
fn wait_within(child: &mut Child, timeout: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait().unwrap() {
            return Some(status);
        }
        thread::sleep(Duration::from_millis(10));
    }
    None
}

#[test]
fn test_copies_lines_and_exits_on_eof() {
    let mut child = command("4").spawn().unwrap();
    let mut stdin = child.stdin.take().unwrap();
    stdin.write_all(b"hello\nworld\n").unwrap();
    drop(stdin);

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "status: {:?}", output.status);
    assert_eq!(output.stdout, b"hello\nworld\n");
}

#[test]
fn test_large_input_through_small_ring() {
    let mut input = Vec::new();
    for i in 0..2_000 {
        input.extend_from_slice(format!("line {i} {}\n", "x".repeat(i % 50)).as_bytes());
    }
    input.extend_from_slice(&[b'y'; 100]);
    input.extend_from_slice(b"\ntrailing without newline");

    let mut child = command("2")
        .env("LINEBAG_SLOT_SIZE", "16")
        .spawn()
        .unwrap();
    let mut stdin = child.stdin.take().unwrap();
    let expected = input.clone();
    let writer = thread::spawn(move || {
        stdin.write_all(&input).unwrap();
    });

    let output = child.wait_with_output().unwrap();
    writer.join().unwrap();

    assert!(output.status.success(), "status: {:?}", output.status);
    assert_eq!(output.stdout.len(), expected.len());
    assert!(output.stdout == expected, "output differs from input");
}

#[test]
fn test_empty_input_exits_cleanly() {
    let output = command("4").stdin(Stdio::null()).output().unwrap();
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_bad_arguments_fail_before_running() {
    for args in [&["abc"][..], &[][..], &["1"][..], &["4", "5"][..]] {
        let output = Command::new(BIN)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(1), "args {args:?}");
        assert!(output.stdout.is_empty());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("invalid command line"), "stderr: {stderr}");
        assert!(stderr.contains("startup failed"), "stderr: {stderr}");
    }
}

#[test]
fn test_sigterm_exits_with_buffered_data() {
    let (mut child, _stderr) = spawn_ready("4");
    let mut stdin = child.stdin.take().unwrap();
    stdin.write_all(b"unfinished").unwrap();

    kill(&child, libc::SIGTERM);
    let status = child.wait().unwrap();
    assert_eq!(status.code(), Some(128 + libc::SIGTERM));
}

#[test]
fn test_sigint_exits() {
    let (mut child, _stderr) = spawn_ready("4");
    kill(&child, libc::SIGINT);
    let status = child.wait().unwrap();
    assert_eq!(status.code(), Some(128 + libc::SIGINT));
}

#[test]
fn test_pause_and_resume() {
    let (mut child, mut stderr) = spawn_ready("8");
    let mut stdin = child.stdin.take().unwrap();
    let mut stdout = child.stdout.take().unwrap();

    kill(&child, libc::SIGUSR1);
    wait_for_log(&mut stderr, "pausing output");

    stdin.write_all(b"a\nb\n").unwrap();
    assert!(
        !readable_within(&stdout, Duration::from_millis(200)),
        "output arrived while paused"
    );

    kill(&child, libc::SIGUSR2);
    wait_for_log(&mut stderr, "resuming output");
    assert!(readable_within(&stdout, Duration::from_secs(5)));

    drop(stdin);
    let mut out = Vec::new();
    stdout.read_to_end(&mut out).unwrap();
    assert_eq!(out, b"a\nb\n");
    assert!(child.wait().unwrap().success());
}

#[test]
fn test_consumer_hangup_is_clean_exit() {
    let (mut child, _stderr) = spawn_ready("4");
    let _stdin = child.stdin.take().unwrap();
    drop(child.stdout.take());

    let status = child.wait().unwrap();
    assert!(status.success(), "status: {status:?}");
}

#[test]
fn test_unread_output_does_not_block_input_or_termination() {
    // Slots larger than the free pipe space, so a whole-slot write cannot
    // complete while nobody reads stdout
    let mut child = command("64")
        .env("LINEBAG_SLOT_SIZE", "20000")
        .spawn()
        .unwrap();
    let mut stderr = BufReader::new(child.stderr.take().unwrap());
    wait_for_log(&mut stderr, "buffering started");
    let _stdout = child.stdout.take().unwrap();
    let mut stdin = child.stdin.take().unwrap();

    let line = {
        let mut line = vec![b'q'; 19_999];
        line.push(b'\n');
        line
    };
    let (done_tx, done_rx) = mpsc::channel();
    thread::spawn(move || {
        for _ in 0..40 {
            if stdin.write_all(&line).is_err() {
                return;
            }
        }
        let _ = done_tx.send(());
    });

    assert!(
        done_rx.recv_timeout(Duration::from_secs(5)).is_ok(),
        "input stopped flowing while output was not read"
    );
    // Let the last bytes move from the pipe into the ring
    thread::sleep(Duration::from_millis(300));

    kill(&child, libc::SIGTERM);
    let status = wait_within(&mut child, Duration::from_secs(3));
    if status.is_none() {
        let _ = child.kill();
    }
    assert_eq!(
        status.and_then(|s| s.code()),
        Some(128 + libc::SIGTERM),
        "SIGTERM not handled while output was not read"
    );

    let mut log = String::new();
    stderr.read_to_string(&mut log).unwrap();
    assert!(log.contains("bytes_in=800000"), "log: {log}");
}
