//! Shared test data for command tests.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::import::{Dataset, ImportArgs, run as import};
use crate::Config;

/// Evaluation instant used by every pass in command tests.
pub const NOW: &str = "2024-02-01T00:00:00Z";

pub const EVENTS_CSV: &str = "\
event_id,user_id,event_type,device,plan_at_event,timestamp
e1,1,click,mobile,pro,2024-01-05T10:00:00Z
e2,1,click,mobile,pro,2024-01-06T10:00:00Z
e3,2,click,web,free,2024-01-07T10:00:00Z
e4,2,view,web,free,2024-01-08T10:00:00Z
e5,3,click,web,pro,2024-01-09T10:00:00Z
e6,4,view,mobile,free,2024-01-10 10:00:00
e7,9,click,web,free,2024-01-11T10:00:00Z
";

pub const USERS_CSV: &str = "\
user_id,country,device,plan,num_tasks,email,last_login
1,US,mobile,pro,3,one@example.com,2024-01-30T12:00:00Z
2,DE,web,free,1,two@example.com,2024-01-25T08:00:00Z
3,US,web,pro,,three@example.com,2023-11-01T00:00:00Z
4,FR,mobile,free,5,four@example.com,2024-01-31T09:00:00Z
";

/// Clickers active in the last 30 days, or mobile viewers.
pub const CAMPAIGN_TOML: &str = r#"
name = "Spring re-engagement"
combine = "or"

[[sets]]
event_types = ["click"]
min_event_count = 1
active_within_days = 30

[[sets]]
event_types = ["view"]
devices = ["mobile"]
min_event_count = 1
"#;

pub struct Fixture {
    temp: TempDir,
    pub config: Config,
}

impl Fixture {
    /// A config pointing at a database inside a fresh temp dir.
    pub fn empty() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: temp.path().join("data").join("seg.db"),
            ..Config::default()
        };
        Self { temp, config }
    }

    /// A database with the sample events and users imported.
    pub fn seeded() -> Self {
        let fixture = Self::empty();
        for (dataset, name, contents) in [
            (Dataset::Events, "events.csv", EVENTS_CSV),
            (Dataset::Users, "users.csv", USERS_CSV),
        ] {
            let args = ImportArgs {
                dataset,
                path: fixture.write_file(name, contents),
            };
            import(&mut Vec::new(), &args, &fixture.config).unwrap();
        }
        fixture
    }

    pub fn dir(&self) -> &Path {
        self.temp.path()
    }

    pub fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Writes the sample campaign file.
    pub fn campaign(&self) -> PathBuf {
        self.write_file("campaign.toml", CAMPAIGN_TOML)
    }
}
