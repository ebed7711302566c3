use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

fn avlab_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_avlab"));
    cmd.env("HOME", home);
    for var in [
        "AVLAB_CONFIG",
        "AVLAB_DEVICE_HOST",
        "AVLAB_DEVICE_PORT",
        "AVLAB_DEVICE_CONNECT_TIMEOUT_MS",
        "AVLAB_DEVICE_READ_TIMEOUT_MS",
        "AVLAB_UI_COLOR",
        "AVLAB_UI_MAX_TABLE_ROWS",
        "AVLAB_EXPORTS_DIR",
        "AVLAB_CATALOG",
        "AVLAB_LOG",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home = std::env::temp_dir().join(format!("avlab-device-test-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

/// Line-protocol peer on 127.0.0.1 serving `connections` clients in turn.
struct FakeDevice {
    port: u16,
    received: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl FakeDevice {
    fn start(answers: &[(&str, &str)], connections: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let answers: HashMap<String, String> = answers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&received);
        let handle = std::thread::spawn(move || {
            for _ in 0..connections {
                let Ok((stream, _)) = listener.accept() else {
                    return;
                };
                serve(stream, &answers, &log);
            }
        });
        Self {
            port,
            received,
            handle,
        }
    }

    fn port(&self) -> String {
        self.port.to_string()
    }

    fn finish(self) -> Vec<String> {
        self.handle.join().expect("fake device thread");
        let received = self.received.lock().expect("lock");
        received.clone()
    }
}

fn serve(stream: TcpStream, answers: &HashMap<String, String>, log: &Mutex<Vec<String>>) {
    let mut writer = stream.try_clone().expect("clone stream");
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let Ok(line) = line else {
            return;
        };
        let command = line.trim().to_string();
        log.lock().expect("lock").push(command.clone());
        let reply = match command.strip_prefix("set ") {
            Some(rest) => rest.to_string(),
            None => answers.get(&command).cloned().unwrap_or_default(),
        };
        if writer.write_all(format!("{reply}\r\n").as_bytes()).is_err() {
            return;
        }
    }
}

fn unused_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr").port().to_string()
}

fn run(home: &Path, args: &[&str]) -> Output {
    avlab_cmd(home).args(args).output().expect("run avlab")
}

fn json_stdout(out: &Output) -> serde_json::Value {
    serde_json::from_slice(&out.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}): {}\nstderr: {}",
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        )
    })
}

const HDR_LOST: &[(&str, &str)] = &[
    ("get status rx0", "3840X2160P60 422 12B HDR BT2020"),
    ("get status rx1", "no signal"),
    ("get status tx0", "3840X2160P60 422 12B SDR BT709"),
    ("get edidmode", "edidmode automix"),
    ("get edidhdrflag", "edidhdrflag off"),
];

#[test]
fn diagnose_reports_hdr_lost_over_tcp() {
    let home = make_temp_home();
    let device = FakeDevice::start(HDR_LOST, 1);
    let out = run(
        &home,
        &["--json", "diagnose", "--host", "127.0.0.1", "--port", &device.port()],
    );
    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));

    let v = json_stdout(&out);
    assert_eq!(v["signal_chain"][0]["signal"]["hdr_format"], "HDR10");
    assert_eq!(v["hdr_status"]["output"]["format"], "SDR");
    assert_eq!(v["issues"][0]["title"], "HDR Lost in Signal Chain");
    assert_eq!(v["recommendations"][0]["command"], "set edidhdrflag on");

    let received = device.finish();
    assert_eq!(received[0], "get status rx0");
    assert!(received.iter().all(|c| c.starts_with("get ")));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn concurrent_diagnoses_stay_independent() {
    let home = make_temp_home();
    let hdr = FakeDevice::start(HDR_LOST, 1);
    let idle = FakeDevice::start(
        &[
            ("get status rx0", "no signal"),
            ("get status rx1", "no signal"),
            ("get edidmode", "edidmode automix"),
        ],
        1,
    );

    let spawn = |port: String| {
        avlab_cmd(&home)
            .args(["--json", "diagnose", "--host", "127.0.0.1", "--port", &port])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn avlab")
    };
    let a = spawn(hdr.port());
    let b = spawn(idle.port());
    let a = a.wait_with_output().expect("wait a");
    let b = b.wait_with_output().expect("wait b");
    assert_eq!(a.status.code(), Some(0));
    assert_eq!(b.status.code(), Some(0));

    let a = json_stdout(&a);
    let b = json_stdout(&b);
    assert_eq!(a["device"], format!("127.0.0.1:{}", hdr.port()));
    assert_eq!(b["device"], format!("127.0.0.1:{}", idle.port()));
    assert_eq!(a["issues"][0]["title"], "HDR Lost in Signal Chain");
    assert_eq!(b["issues"][0]["title"], "No Input Signal Detected");
    assert_eq!(b["issues"].as_array().map(Vec::len), Some(1));
    assert_eq!(b["hdr_status"]["input"]["detected"], false);

    hdr.finish();
    idle.finish();
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn settings_partition_failures_and_succeed() {
    let home = make_temp_home();
    let device = FakeDevice::start(
        &[
            ("get edidmode", "edidmode automix"),
            ("get opmode", "opmode 2"),
            ("get cec", "cec error"),
        ],
        1,
    );
    let out = run(
        &home,
        &["--json", "settings", "--host", "127.0.0.1", "--port", &device.port()],
    );
    assert_eq!(out.status.code(), Some(0));

    let v = json_stdout(&out);
    assert_eq!(v["settings"]["edidmode"], "automix");
    assert_eq!(v["settings"]["opmode"], 2);
    assert!(v["settings"].get("cec").is_none());

    let failures = v["failures"].as_array().expect("failures");
    let cec = failures
        .iter()
        .find(|f| f["key"] == "cec")
        .expect("cec failure");
    assert_eq!(cec["reason"]["kind"], "sentinel");
    assert!(failures.iter().any(|f| f["reason"]["kind"] == "empty"));
    device.finish();
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn apply_sends_each_key_and_writes_a_log() {
    let home = make_temp_home();
    let device = FakeDevice::start(&[], 1);
    let out = run(
        &home,
        &[
            "--json",
            "apply",
            "--host",
            "127.0.0.1",
            "--port",
            &device.port(),
            "--set",
            "edidmode=automix",
            "--set",
            "unmutedelay=400",
        ],
    );
    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));

    let v = json_stdout(&out);
    assert_eq!(v["results"].as_array().map(Vec::len), Some(2));
    assert!(v["results"].as_array().expect("results").iter().all(|r| r["applied"] == true));

    let received = device.finish();
    assert_eq!(received, ["set edidmode automix", "set unmutedelay 400"]);

    let logs: Vec<_> = std::fs::read_dir(home.join(".config/avlab/logs"))
        .expect("logs dir")
        .filter_map(Result::ok)
        .collect();
    assert_eq!(logs.len(), 1);
    let log: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(logs[0].path()).expect("read log"))
            .expect("log json");
    assert_eq!(log["status"], "ok");
    assert_eq!(log["command"], "apply");
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn apply_rejects_line_breaks_before_they_reach_the_device() {
    let home = make_temp_home();
    let patch = home.join("patch.json");
    std::fs::write(&patch, r#"{"cec": "on", "edidmode": "automix\r\nfactoryreset 1"}"#)
        .expect("write patch");

    let device = FakeDevice::start(&[], 1);
    let out = run(
        &home,
        &[
            "--json",
            "apply",
            "--host",
            "127.0.0.1",
            "--port",
            &device.port(),
            "--file",
            patch.to_str().expect("utf8"),
        ],
    );
    assert_eq!(out.status.code(), Some(10), "{}", String::from_utf8_lossy(&out.stderr));

    let v = json_stdout(&out);
    let results = v["results"].as_array().expect("results");
    let edid = results.iter().find(|r| r["key"] == "edidmode").expect("edidmode");
    assert_eq!(edid["applied"], false);
    assert!(edid["error"].as_str().is_some_and(|e| e.contains("unsupported command")));

    let received = device.finish();
    assert_eq!(received, ["set cec on"]);

    let out = run(
        &home,
        &[
            "apply",
            "--host",
            "127.0.0.1",
            "--port",
            &unused_port(),
            "--set",
            "edidmode=automix\r\nfactoryreset 1",
        ],
    );
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn backup_writes_a_restorable_document() {
    let home = make_temp_home();
    let device = FakeDevice::start(
        &[
            ("get edidmode", "edidmode custom"),
            ("get status rx0", "1920x1080p60 RGB 8b"),
        ],
        1,
    );
    let out = run(
        &home,
        &["--json", "backup", "--host", "127.0.0.1", "--port", &device.port()],
    );
    assert_eq!(out.status.code(), Some(0));
    device.finish();

    let v = json_stdout(&out);
    let path = PathBuf::from(v["artifact"].as_str().expect("artifact path"));
    assert!(path.starts_with(home.join(".config/avlab/exports")));
    let name = path.file_name().and_then(|n| n.to_str()).expect("file name");
    assert!(name.starts_with("vrroom_backup_"));

    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("read backup")).expect("json");
    assert_eq!(doc["vrroom_backup"], true);
    assert_eq!(doc["ip_address"], "127.0.0.1");
    assert_eq!(doc["settings"]["edidmode"], "custom");

    // The backup feeds straight back into analyze.
    let out = run(&home, &["--json", "--dry-run", "analyze", "--file", path.to_str().expect("utf8")]);
    assert_eq!(out.status.code(), Some(0));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn unreachable_device_exits_20() {
    let home = make_temp_home();
    let port = unused_port();
    let out = run(&home, &["diagnose", "--host", "127.0.0.1", "--port", &port]);
    assert_eq!(out.status.code(), Some(20));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("error:"));
    assert!(stderr.contains("next steps:"));
    let _ = std::fs::remove_dir_all(&home);
}
