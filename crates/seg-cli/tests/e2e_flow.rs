//! End-to-end integration tests for the segmentation flow.
//!
//! Tests the full pipeline: import → evaluate → export → sync → campaigns
//! by driving the `seg` binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const EVENTS_CSV: &str = "\
event_id,user_id,event_type,device,plan_at_event,timestamp
e1,1,click,mobile,pro,2024-01-05T10:00:00Z
e2,1.0,click,mobile,pro,2024-01-06T10:00:00Z
e3,2,click,web,free,2024-01-07T10:00:00Z
e4,3,view,web,pro,2024-01-08T10:00:00Z
";

const USERS_CSV: &str = "\
user_id,country,device,plan,num_tasks,email,last_login
1,US,mobile,pro,4,one@example.com,2024-01-30T12:00:00Z
2,DE,web,free,2,two@example.com,2024-01-29T08:00:00Z
3,US,web,pro,,three@example.com,2024-01-28T00:00:00Z
";

const CAMPAIGN_TOML: &str = r#"
name = "Clickers"

[[sets]]
event_types = ["click"]
min_event_count = 1

[[sets]]
plans = ["pro"]
min_event_count = 1
"#;

struct Env {
    temp: TempDir,
    config: PathBuf,
}

impl Env {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.toml");
        std::fs::write(
            &config,
            format!(
                "database_path = {:?}\ndestination_table = \"Clickers\"\n",
                temp.path().join("seg.db").display().to_string()
            ),
        )
        .unwrap();
        for (name, contents) in [
            ("events.csv", EVENTS_CSV),
            ("users.csv", USERS_CSV),
            ("campaign.toml", CAMPAIGN_TOML),
        ] {
            std::fs::write(temp.path().join(name), contents).unwrap();
        }
        Self { temp, config }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.temp.path().join(name)
    }

    fn seg(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_seg"))
            .env("HOME", self.temp.path())
            .env("XDG_CONFIG_HOME", self.temp.path().join(".config"))
            .env_remove("SEG_CRM_ENDPOINT")
            .arg("--config")
            .arg(&self.config)
            .args(args)
            .output()
            .expect("failed to run seg")
    }

    fn seg_ok(&self, args: &[&str]) -> String {
        let output = self.seg(args);
        assert!(
            output.status.success(),
            "seg {args:?} should succeed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

#[test]
fn test_import_evaluate_export_sync() {
    let env = Env::new();
    let events = display(&env.path("events.csv"));
    let users = display(&env.path("users.csv"));
    let campaign = display(&env.path("campaign.toml"));
    let now = "--now=2024-02-01T00:00:00Z";

    let imported = env.seg_ok(&["import", "events", &events]);
    assert!(imported.starts_with("Imported 4 events"));
    env.seg_ok(&["import", "users", &users]);

    // AND: clicked at least once and had a pro-plan event.
    let evaluated = env.seg_ok(&["evaluate", &campaign, now, "--json"]);
    let rows: Vec<serde_json::Value> = evaluated
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["user_id"], "1");
    assert_eq!(rows[0]["event_count"], 2);
    assert_eq!(rows[0]["matched_sets"], serde_json::json!([0, 1]));

    // OR override widens to every user with a qualifying event.
    let exported = env.seg_ok(&["export", &campaign, now, "--combine", "or"]);
    let ids: Vec<&str> = exported
        .lines()
        .skip(1)
        .map(|line| line.split(',').next().unwrap())
        .collect();
    assert_eq!(ids, vec!["1", "2", "3"]);

    let synced = env.seg_ok(&["sync", &campaign, now]);
    assert_eq!(synced, "Synced 1 users to table Clickers\n");
}

#[test]
fn test_campaigns_save_and_list() {
    let env = Env::new();

    env.seg_ok(&["campaigns", "save", "Spring re-engagement"]);
    let listed = env.seg_ok(&["campaigns", "list"]);

    assert!(listed.trim_end().ends_with("  Spring re-engagement"));
}

#[test]
fn test_missing_campaign_file_fails() {
    let env = Env::new();
    let missing = display(&env.path("missing.toml"));

    let output = env.seg(&["evaluate", &missing]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("campaign file not found"));
}

#[test]
fn test_invalid_sync_table_fails_without_side_effects() {
    let env = Env::new();
    let events = display(&env.path("events.csv"));
    let users = display(&env.path("users.csv"));
    let campaign = display(&env.path("campaign.toml"));
    env.seg_ok(&["import", "events", &events]);
    env.seg_ok(&["import", "users", &users]);

    let output = env.seg(&["sync", &campaign, "--table", "events"]);
    assert!(!output.status.success());

    // The events relation is still intact.
    let evaluated = env.seg_ok(&[
        "evaluate",
        &campaign,
        "--now=2024-02-01T00:00:00Z",
        "--json",
    ]);
    assert_eq!(evaluated.lines().count(), 1);
}
