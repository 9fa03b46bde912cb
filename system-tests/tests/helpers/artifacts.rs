// system-tests/tests/helpers/artifacts.rs
// ============================================================================
// Module: Test Artifacts
// Description: Artifact helpers for system-tests.
// Purpose: Create per-test run roots and write deterministic summaries.
// Dependencies: sdk-harness-core, serde, serde_jcs
// ============================================================================

use std::env;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use sdk_harness_core::ReportCounts;
use sdk_harness_core::TestReport;
use serde::Serialize;

/// Optional override for the artifact root of a run.
const ENV_RUN_ROOT: &str = "SDK_HARNESS_SYSTEM_TEST_RUN_ROOT";

/// Canonical per-scenario summary artifact.
#[derive(Debug, Serialize)]
struct ScenarioSummary {
    /// Scenario name.
    test_name: String,
    /// Aggregated status label.
    status: String,
    /// Leaf outcome counts.
    counts: ReportCounts,
    /// Free-form scenario notes.
    notes: Vec<String>,
}

/// Current time in epoch milliseconds.
fn now_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

/// Resolves the artifact root for one test.
fn run_root(test_name: &str) -> io::Result<PathBuf> {
    let base = match env::var_os(ENV_RUN_ROOT) {
        Some(raw) => PathBuf::from(
            raw.into_string()
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("{ENV_RUN_ROOT} must be valid UTF-8")))?,
        ),
        None => PathBuf::from("target/system-tests").join(format!("run_{}", now_millis())),
    };
    Ok(base.join(test_name))
}

/// Artifact manager for a single system-test.
#[derive(Debug, Clone)]
pub struct TestArtifacts {
    /// Root directory of this test's artifacts.
    root: PathBuf,
}

impl TestArtifacts {
    /// Creates the artifact root for a test.
    pub fn new(test_name: &str) -> io::Result<Self> {
        let root = run_root(test_name)?;
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
        })
    }

    /// Returns the root directory for the test artifacts.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes a JSON artifact using canonical JCS serialization.
    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> io::Result<PathBuf> {
        let path = self.root.join(name);
        let bytes = serde_jcs::to_vec(value).map_err(|err| io::Error::other(err.to_string()))?;
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Writes the canonical summary of a finished scenario.
    pub fn write_summary(&self, report: &TestReport, notes: Vec<String>) -> io::Result<PathBuf> {
        let summary = ScenarioSummary {
            test_name: report.name.clone(),
            status: report.status().label().to_string(),
            counts: report.counts(),
            notes,
        };
        self.write_json("summary.json", &summary)
    }
}
