use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

fn avlab_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_avlab"));
    cmd.env("HOME", home);
    cmd.env_remove("AVLAB_CONFIG");
    cmd.env_remove("AVLAB_DEVICE_HOST");
    cmd.env_remove("AVLAB_DEVICE_PORT");
    cmd.env_remove("AVLAB_DEVICE_CONNECT_TIMEOUT_MS");
    cmd.env_remove("AVLAB_DEVICE_READ_TIMEOUT_MS");
    cmd.env_remove("AVLAB_UI_COLOR");
    cmd.env_remove("AVLAB_UI_MAX_TABLE_ROWS");
    cmd.env_remove("AVLAB_EXPORTS_DIR");
    cmd.env_remove("AVLAB_CATALOG");
    cmd
}

fn run(home: &Path, args: &[&str]) -> Output {
    avlab_cmd(home).args(args).output().expect("run avlab")
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);

    let temp = std::env::temp_dir();
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let uniq = format!("avlab-config-test-{}-{seq}", std::process::id());
    let home = temp.join(uniq);
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdirs");
    }
    std::fs::write(path, bytes).expect("write");
}

fn show(out: &Output) -> serde_json::Value {
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    serde_json::from_slice(&out.stdout).expect("parse json")
}

#[test]
fn defaults_without_a_config_file() {
    let home = make_temp_home();
    let v = show(&run(&home, &["--json", "config", "--show"]));
    assert!(v["device"].get("host").is_none());
    assert_eq!(v["device"]["port"], 2222);
    assert_eq!(v["device"]["read_timeout_ms"], 5000);
    assert_eq!(v["ui"]["max_table_rows"], 20);
    assert!(v.get("config_path").is_none());
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn env_overrides_config_file() {
    let home = make_temp_home();
    write_file(
        home.join(".config/avlab/config.toml").as_path(),
        br#"
[device]
host = "192.168.1.40"
port = 2222

[exports]
dir = "~/vrroom"
"#,
    );

    let v = show(&run(&home, &["--json", "config", "--show"]));
    assert_eq!(v["device"]["host"], "192.168.1.40");
    assert_eq!(v["exports"]["dir"], home.join("vrroom").display().to_string());

    let out = avlab_cmd(&home)
        .env("AVLAB_DEVICE_PORT", "2323")
        .env("AVLAB_DEVICE_HOST", "vrroom.local")
        .args(["--json", "config", "--show"])
        .output()
        .expect("run avlab");
    let v = show(&out);
    assert_eq!(v["device"]["host"], "vrroom.local");
    assert_eq!(v["device"]["port"], 2323);
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn config_flag_beats_env_path() {
    let home = make_temp_home();
    let from_env = home.join("env.toml");
    let from_flag = home.join("flag.toml");
    write_file(&from_env, b"[ui]\nmax_table_rows = 7\n");
    write_file(&from_flag, b"[ui]\nmax_table_rows = 9\n");

    let out = avlab_cmd(&home)
        .env("AVLAB_CONFIG", &from_env)
        .args(["--json", "config", "--show"])
        .output()
        .expect("run avlab");
    assert_eq!(show(&out)["ui"]["max_table_rows"], 7);

    let out = avlab_cmd(&home)
        .env("AVLAB_CONFIG", &from_env)
        .args(["--json", "--config", from_flag.to_str().expect("utf8"), "config", "--show"])
        .output()
        .expect("run avlab");
    let v = show(&out);
    assert_eq!(v["ui"]["max_table_rows"], 9);
    assert_eq!(v["config_path"], from_flag.display().to_string());
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn toml_output_round_trips() {
    let home = make_temp_home();
    let out = run(&home, &["config", "--show"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    let v: toml::Value = toml::from_str(&stdout).expect("toml");
    assert_eq!(v["device"]["port"].as_integer(), Some(2222));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn invalid_config_sources_exit_2() {
    let home = make_temp_home();
    write_file(home.join(".config/avlab/config.toml").as_path(), b"[device\nport = 1");
    let out = run(&home, &["config", "--show"]);
    assert_eq!(out.status.code(), Some(2));

    let home2 = make_temp_home();
    let out = avlab_cmd(&home2)
        .env("AVLAB_UI_COLOR", "sometimes")
        .args(["config", "--show"])
        .output()
        .expect("run avlab");
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
    let _ = std::fs::remove_dir_all(&home2);
}

#[test]
fn user_catalog_extends_builtin() {
    let home = make_temp_home();
    write_file(
        home.join("my-gear.toml").as_path(),
        br#"
[displays.den_projector]
name = "Den Projector"
type = "projector"
handshake_time_ms = 4000
"#,
    );
    write_file(
        home.join(".config/avlab/config.toml").as_path(),
        b"[catalog]\npath = \"~/my-gear.toml\"\n",
    );

    let v = show(&run(&home, &["--json", "catalog", "displays"]));
    let ids: Vec<_> = v
        .as_array()
        .expect("entries")
        .iter()
        .filter_map(|e| e["id"].as_str())
        .collect();
    assert!(ids.contains(&"den_projector"));
    assert!(ids.contains(&"jvc_dla_nz8"));
    let _ = std::fs::remove_dir_all(&home);
}
