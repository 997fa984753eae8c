//! Report fixtures for tests and replay files.

use crate::types::{DocId, Report, TestCase, TestStatus};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Midnight UTC on 2024-01-`n`, plus `n - 1` days beyond January.
pub fn day(n: u32) -> DateTime<Utc> {
    let base = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid fixture date");
    base + Duration::days(i64::from(n.saturating_sub(1)))
}

/// A test case with a fresh id.
pub fn test_case(name: &str, status: TestStatus) -> TestCase {
    TestCase {
        id: DocId::new(),
        name: name.to_string(),
        status,
        test_group_id: None,
    }
}

/// Builder for [`Report`] with realistic defaults:
/// `lab-foo / arm64 / board1 / no instance / defconfig1 / gcc-8`.
#[derive(Debug, Clone)]
pub struct ReportFixture {
    report: Report,
}

impl ReportFixture {
    pub fn new(name: &str) -> Self {
        Self {
            report: Report {
                id: DocId::new(),
                name: name.to_string(),
                job: "mainline".to_string(),
                job_id: None,
                kernel: "v6.1".to_string(),
                git_branch: "master".to_string(),
                arch: "arm64".to_string(),
                board: "board1".to_string(),
                board_instance: None,
                defconfig: "defconfig".to_string(),
                defconfig_full: "defconfig1".to_string(),
                compiler_version_ext: Some("gcc-8".to_string()),
                lab_name: "lab-foo".to_string(),
                parent_id: None,
                sub_groups: Vec::new(),
                test_cases: Vec::new(),
                created_on: day(1),
            },
        }
    }

    #[must_use]
    pub fn id(mut self, id: DocId) -> Self {
        self.report.id = id;
        self
    }

    #[must_use]
    pub fn job(mut self, job: &str) -> Self {
        self.report.job = job.to_string();
        self
    }

    #[must_use]
    pub fn kernel(mut self, kernel: &str) -> Self {
        self.report.kernel = kernel.to_string();
        self
    }

    #[must_use]
    pub fn branch(mut self, branch: &str) -> Self {
        self.report.git_branch = branch.to_string();
        self
    }

    #[must_use]
    pub fn arch(mut self, arch: &str) -> Self {
        self.report.arch = arch.to_string();
        self
    }

    #[must_use]
    pub fn board(mut self, board: &str) -> Self {
        self.report.board = board.to_string();
        self
    }

    #[must_use]
    pub fn board_instance(mut self, instance: Option<&str>) -> Self {
        self.report.board_instance = instance.map(str::to_string);
        self
    }

    #[must_use]
    pub fn defconfig_full(mut self, defconfig_full: &str) -> Self {
        self.report.defconfig_full = defconfig_full.to_string();
        self
    }

    #[must_use]
    pub fn compiler(mut self, compiler: Option<&str>) -> Self {
        self.report.compiler_version_ext = compiler.map(str::to_string);
        self
    }

    #[must_use]
    pub fn lab(mut self, lab: &str) -> Self {
        self.report.lab_name = lab.to_string();
        self
    }

    #[must_use]
    pub fn created_on(mut self, created_on: DateTime<Utc>) -> Self {
        self.report.created_on = created_on;
        self
    }

    #[must_use]
    pub fn parent(mut self, parent: DocId) -> Self {
        self.report.parent_id = Some(parent);
        self
    }

    #[must_use]
    pub fn sub_groups(mut self, ids: Vec<DocId>) -> Self {
        self.report.sub_groups = ids;
        self
    }

    #[must_use]
    pub fn test_cases(mut self, cases: &[TestCase]) -> Self {
        self.report.test_cases = cases.iter().map(|c| c.id).collect();
        self
    }

    pub fn build(self) -> Report {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_is_sequential() {
        assert_eq!(day(2) - day(1), Duration::days(1));
        assert_eq!(day(1).to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_fixture_links_test_cases() {
        let cases = [test_case("t1", TestStatus::Pass), test_case("t2", TestStatus::Fail)];
        let report = ReportFixture::new("baseline").test_cases(&cases).build();
        assert_eq!(report.test_cases, vec![cases[0].id, cases[1].id]);
        assert_eq!(report.lab_name, "lab-foo");
    }
}
