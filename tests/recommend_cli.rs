use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

fn avlab_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_avlab"));
    cmd.env("HOME", home);
    cmd.env_remove("AVLAB_CONFIG");
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
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home = std::env::temp_dir().join(format!("avlab-recommend-test-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn titles(v: &serde_json::Value) -> Vec<String> {
    v["recommendations"]
        .as_array()
        .expect("recommendations")
        .iter()
        .filter_map(|r| r["title"].as_str().map(str::to_string))
        .collect()
}

#[test]
fn lldv_goal_on_a_projector_writes_a_stamped_patch() {
    let home = make_temp_home();
    let out = run(
        &home,
        &[
            "--json",
            "recommend",
            "--display",
            "jvc_dla_nz8",
            "--matrix",
            "vrroom",
            "--goal",
            "lldv_non_dv",
        ],
    );
    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["summary"]["display"], "JVC DLA-NZ8");
    assert_eq!(v["summary"]["receiver"], "Not specified");
    assert_eq!(v["settings_patch"]["ediddvflag"], "on");
    assert!(titles(&v).contains(&"Enable LLDV in AutoMix Mode".to_string()));

    let artifact = PathBuf::from(v["artifact"].as_str().expect("artifact"));
    let name = artifact.file_name().and_then(|n| n.to_str()).expect("name");
    assert!(name.starts_with("vrroom_recommended_"));
    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&artifact).expect("read")).expect("json");
    assert_eq!(doc["_optimized_by"], "avlab");
    assert_eq!(doc["ediddvflag"], "on");
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn setup_file_and_dry_run() {
    let home = make_temp_home();
    let setup = home.join("theater.toml");
    std::fs::write(
        &setup,
        r#"
display = "jvc_dla_nz8"
hdfury_device = "arcana"
goals = ["lldv_non_dv"]
"#,
    )
    .expect("write setup");

    let out = run(
        &home,
        &["--json", "--dry-run", "recommend", "--setup", setup.to_str().expect("utf8")],
    );
    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert!(v["artifact"].is_null());
    assert!(titles(&v).contains(&"HDFury Device Does Not Support LLDV".to_string()));
    assert!(!home.join(".config/avlab/exports").exists());
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn unknown_goal_exits_2() {
    let home = make_temp_home();
    let out = run(&home, &["recommend", "--goal", "more_bass"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn goals_and_catalog_listings() {
    let home = make_temp_home();
    let out = run(&home, &["--json", "goals"]);
    assert_eq!(out.status.code(), Some(0));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    let ids: Vec<_> = v
        .as_array()
        .expect("goals")
        .iter()
        .filter_map(|g| g["id"].as_str())
        .collect();
    assert_eq!(ids.len(), 7);
    assert_eq!(ids[0], "avoid_bonk");

    let out = run(&home, &["--json", "catalog", "hdfury"]);
    assert_eq!(out.status.code(), Some(0));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    let entries = v.as_array().expect("entries");
    assert!(entries.iter().all(|e| e["category"] == "matrices"));
    assert!(entries.iter().any(|e| e["id"] == "vrroom"));

    let out = run(&home, &["catalog", "toasters"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}
