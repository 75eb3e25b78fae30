// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

const BIN: &str = env!("CARGO_BIN_EXE_dd-diskqueued");

/// Handle to a running dd-diskqueued daemon process.
pub struct DaemonHandle {
    child: Child,
    log_lines: Arc<Mutex<Vec<String>>>,
    _stderr_thread: std::thread::JoinHandle<()>,
}

impl DaemonHandle {
    /// Start the daemon with `--config` pointing to the given file.
    pub fn start(config: &Path) -> Self {
        let mut child = Command::new(BIN)
            .arg("--config")
            .arg(config)
            .env_remove("DD_DQ_CONFIG_FILE")
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to start dd-diskqueued");

        let stderr = child.stderr.take().expect("failed to capture stderr");
        let log_lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let lines_clone = Arc::clone(&log_lines);

        // simple_logger is built with the `stderr` feature, so every level lands here.
        let stderr_thread = std::thread::spawn(move || {
            let reader = BufReader::new(stderr);
            for line in reader.lines() {
                match line {
                    Ok(l) => {
                        eprintln!("[daemon] {l}");
                        lines_clone.lock().unwrap().push(l);
                    }
                    Err(_) => break,
                }
            }
        });

        Self {
            child,
            log_lines,
            _stderr_thread: stderr_thread,
        }
    }

    /// Wait until a log line containing `pattern` appears, or timeout.
    pub fn wait_for_log(&self, pattern: &str, timeout: Duration) -> bool {
        self.wait_for_log_count(pattern, 1, timeout)
    }

    /// Wait until a log line containing `pattern` appears using the default timeout.
    pub fn wait_for_log_default(&self, pattern: &str) -> bool {
        self.wait_for_log(pattern, DEFAULT_TIMEOUT)
    }

    /// Count how many log lines contain `pattern`.
    pub fn count_log_matches(&self, pattern: &str) -> usize {
        let lines = self.log_lines.lock().unwrap();
        lines.iter().filter(|l| l.contains(pattern)).count()
    }

    /// Wait until the count of log lines matching `pattern` reaches at least `n`.
    pub fn wait_for_log_count(&self, pattern: &str, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.count_log_matches(pattern) >= n {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    /// Send a signal to the daemon process.
    pub fn send_signal(&self, sig: Signal) {
        let pid = i32::try_from(self.child.id()).expect("pid out of range");
        signal::kill(Pid::from_raw(pid), sig).expect("failed to send signal to daemon");
    }

    /// Send SIGTERM and wait for the daemon to exit. Returns the exit status.
    pub fn stop(&mut self) -> std::process::ExitStatus {
        self.send_signal(Signal::SIGTERM);
        self.wait_with_timeout(DEFAULT_TIMEOUT)
    }

    /// Wait for the daemon to exit within the given timeout.
    pub fn wait_with_timeout(&mut self, timeout: Duration) -> std::process::ExitStatus {
        let deadline = Instant::now() + timeout;
        loop {
            match self
                .child
                .try_wait()
                .expect("failed to check daemon status")
            {
                Some(status) => return status,
                None => {
                    if Instant::now() >= deadline {
                        self.child.kill().ok();
                        return self.child.wait().expect("failed to wait on killed daemon");
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        }
    }
}

impl Drop for DaemonHandle {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Run the binary to completion with `args`.
pub fn run_once(args: &[&str]) -> Output {
    Command::new(BIN)
        .args(args)
        .env_remove("DD_DQ_CONFIG_FILE")
        .output()
        .expect("failed to run dd-diskqueued")
}

/// A scratch host: fixture diskstats, sysfs and mounts, a trace script and a config.
pub struct Fixture {
    pub dir: tempfile::TempDir,
}

impl Fixture {
    /// `in_flight` is the queue depth reported for `sda` on every read.
    pub fn new(in_flight: u64) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        std::fs::write(
            root.join("diskstats"),
            format!(
                "   8       0 sda 100 0 800 50 200 0 1600 90 {in_flight} 140 300 0 0 0 0\n\
                    8       1 sda1 90 0 700 40 180 0 1500 80 0 120 250 0 0 0 0\n\
                    7       0 loop0 1 0 2 0 0 0 0 0 9 0 0 0 0 0 0\n"
            ),
        )
        .unwrap();
        std::fs::create_dir_all(root.join("block/sda/device")).unwrap();
        std::fs::write(root.join("block/sda/device/model"), "QEMU HARDDISK\n").unwrap();
        std::fs::write(root.join("mounts"), "/dev/sda1 / ext4 rw 0 0\n").unwrap();
        std::fs::create_dir_all(root.join("work")).unwrap();

        std::fs::write(
            root.join("trace.csv"),
            "io_type,start_time,end_time,io_time_us,disk_service_time_us,queue_depth,size_bytes,process_name,process_id,disk,filename\n\
             Write,1,2,100,40,3,500,postgres,812,sda,/var/lib/pg/wal\n\
             Write,3,4,50,20,3,300,postgres,812,sda,/var/lib/pg/wal\n\
             Read,5,6,10,5,1,N/A,backup,77,sda,/data/dump\n\
             Write,9,9\n\
             Read,7,8,10,5,1,4096,backup,77,sda,/data/dump\n",
        )
        .unwrap();
        std::fs::write(
            root.join("tool.sh"),
            format!("cp {} \"$1\"\n", root.join("trace.csv").display()),
        )
        .unwrap();

        Self { dir }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write the config file with `extra` YAML appended and return its path.
    pub fn write_config(&self, extra: &str) -> PathBuf {
        let root = self.dir.path().display();
        let yaml = format!(
            "log_level: debug\n\
             sample_frequency_seconds: 1\n\
             alert_sample_value_threshold: 2.0\n\
             alert_required_recurrence: 2\n\
             trace_capture_duration_seconds: 1\n\
             min_time_between_traces_seconds: 600\n\
             counter: in_flight\n\
             diskstats_path: {root}/diskstats\n\
             sys_block_path: {root}/block\n\
             mounts_path: {root}/mounts\n\
             require_privilege: false\n\
             sink:\n  type: json_file\n  path: {root}/events.json\n\
             {extra}"
        );
        let path = self.path("diskqueue.yaml");
        std::fs::write(&path, yaml)
            .unwrap_or_else(|e| panic!("failed to write {}: {e}", path.display()));
        path
    }

    /// The default trace tool section: `/bin/sh tool.sh {output}`.
    pub fn trace_tool_yaml(&self) -> String {
        format!(
            "trace_tool:\n  command: /bin/sh\n  start_args: [\"{}\", \"{{output}}\"]\n  work_dir: {}\n",
            self.path("tool.sh").display(),
            self.path("work").display()
        )
    }

    /// Every event written to the JSON sink so far.
    pub fn events(&self) -> Vec<serde_json::Value> {
        std::fs::read_to_string(self.path("events.json"))
            .unwrap_or_default()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }
}
