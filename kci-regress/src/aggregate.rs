//! Test group tree loading and status aggregation.
//!
//! The tree is loaded breadth-first into an arena and folded bottom-up, so
//! arbitrarily deep nesting never recurses. A group reachable twice (shared
//! or cyclic) is rejected instead of being counted twice.

use crate::error::EngineError;
use crate::store::ReportStore;
use kci_common::{DocId, Report, ReportSummary, StatusTotals, TestCase};
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

/// A report with its test cases and sub-groups resolved and counted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedReport {
    pub report: Report,
    pub test_cases: Vec<TestCase>,
    pub sub_groups: Vec<AggregatedReport>,
    /// Counts over this group's own test cases.
    pub totals: StatusTotals,
    /// Own counts plus every descendant's.
    pub total_results: StatusTotals,
}

impl AggregatedReport {
    pub fn id(&self) -> DocId {
        self.report.id
    }

    pub fn total_tests(&self) -> u32 {
        self.total_results.total()
    }

    /// Whether any test in the whole tree failed.
    pub fn has_failures(&self) -> bool {
        self.total_results.has_failures()
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary::new(&self.report, self.total_results)
    }
}

struct Node {
    report: Report,
    test_cases: Vec<TestCase>,
    children: Vec<usize>,
}

/// Resolve `root`'s test cases and sub-groups and compute its totals.
///
/// Dangling test case or sub-group ids are skipped with a warning.
pub async fn aggregate(
    store: &dyn ReportStore,
    root: Report,
) -> Result<AggregatedReport, EngineError> {
    let mut parents: HashMap<DocId, DocId> = HashMap::new();
    parents.insert(root.id, root.id);

    let (root_cases, root_children) = load_level(store, &root, &mut parents).await?;
    let mut arena: Vec<Node> = Vec::new();
    let mut root_node = Node {
        report: root,
        test_cases: root_cases,
        children: Vec::new(),
    };
    for child in root_children {
        arena.push(Node {
            report: child,
            test_cases: Vec::new(),
            children: Vec::new(),
        });
        root_node.children.push(arena.len() - 1);
    }

    // Children always land after their parent, so a forward scan visits
    // every node once.
    let mut idx = 0;
    while idx < arena.len() {
        let (cases, children) = load_level(store, &arena[idx].report, &mut parents).await?;
        arena[idx].test_cases = cases;
        for child in children {
            arena.push(Node {
                report: child,
                test_cases: Vec::new(),
                children: Vec::new(),
            });
            let child_idx = arena.len() - 1;
            arena[idx].children.push(child_idx);
        }
        idx += 1;
    }

    let mut built: Vec<Option<AggregatedReport>> = vec![None; arena.len()];
    for (idx, node) in arena.into_iter().enumerate().rev() {
        let folded = fold(node, &mut built);
        built[idx] = Some(folded);
    }
    Ok(fold(root_node, &mut built))
}

async fn load_level(
    store: &dyn ReportStore,
    report: &Report,
    parents: &mut HashMap<DocId, DocId>,
) -> Result<(Vec<TestCase>, Vec<Report>), EngineError> {
    let mut cases = Vec::with_capacity(report.test_cases.len());
    for case_id in &report.test_cases {
        match store.test_case(case_id).await? {
            Some(case) => cases.push(case),
            None => warn!(
                "Test case {} referenced by group {} not found, skipping",
                case_id, report.id
            ),
        }
    }

    let mut children = Vec::with_capacity(report.sub_groups.len());
    for child_id in &report.sub_groups {
        if parents.contains_key(child_id) {
            return Err(EngineError::SharedSubGroup {
                child: *child_id,
                parent: report.id,
            });
        }
        match store.report(child_id).await? {
            Some(child) => {
                parents.insert(*child_id, report.id);
                children.push(child);
            }
            None => warn!(
                "Sub-group {} referenced by group {} not found, skipping",
                child_id, report.id
            ),
        }
    }
    Ok((cases, children))
}

fn fold(node: Node, built: &mut [Option<AggregatedReport>]) -> AggregatedReport {
    let mut totals = StatusTotals::default();
    for case in &node.test_cases {
        totals.record(case.status);
    }

    let mut total_results = totals;
    let mut sub_groups = Vec::with_capacity(node.children.len());
    for child_idx in node.children {
        if let Some(child) = built.get_mut(child_idx).and_then(Option::take) {
            total_results.add(&child.total_results);
            sub_groups.push(child);
        }
    }

    AggregatedReport {
        report: node.report,
        test_cases: node.test_cases,
        sub_groups,
        totals,
        total_results,
    }
}
