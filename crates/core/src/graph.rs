// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency graph over job names.
//!
//! Jobs reference each other only by name; the graph is rebuilt fresh
//! from the persisted job slice on every pass rather than held as a
//! linked structure.

use crate::job::{JobStatus, PlanJob};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

/// Validation failures for a plan's job graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate job name: {0}")]
    DuplicateName(String),
    #[error("job {job} depends on unknown job {dependency}")]
    UnknownDependency { job: String, dependency: String },
    #[error("dependency cycle involving job {0}")]
    Cycle(String),
}

/// Validate names and dependencies without ordering.
pub fn validate_graph(jobs: &[PlanJob]) -> Result<(), GraphError> {
    let mut seen = HashSet::new();
    for job in jobs {
        if !seen.insert(job.name.as_str()) {
            return Err(GraphError::DuplicateName(job.name.clone()));
        }
    }
    for job in jobs {
        for dep in &job.depends_on {
            if !seen.contains(dep.as_str()) {
                return Err(GraphError::UnknownDependency {
                    job: job.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }
    // Cycle detection falls out of the sort.
    topological_sort(jobs).map(|_| ())
}

/// Kahn's algorithm, stable on plan order.
///
/// Returns job names in dependency order; ties are broken by position
/// in the plan's job list so ordering is deterministic.
pub fn topological_sort(jobs: &[PlanJob]) -> Result<Vec<String>, GraphError> {
    let index: HashMap<&str, usize> = jobs
        .iter()
        .enumerate()
        .map(|(i, j)| (j.name.as_str(), i))
        .collect();

    let mut in_degree: HashMap<&str, usize> = jobs.iter().map(|j| (j.name.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for job in jobs {
        for dep in &job.depends_on {
            if !index.contains_key(dep.as_str()) {
                return Err(GraphError::UnknownDependency {
                    job: job.name.clone(),
                    dependency: dep.clone(),
                });
            }
            *in_degree.entry(job.name.as_str()).or_default() += 1;
            dependents
                .entry(dep.as_str())
                .or_default()
                .push(job.name.as_str());
        }
    }

    // BTreeMap keyed by plan position keeps the frontier deterministic.
    let mut ready: BTreeMap<usize, &str> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(name, _)| (index[name], *name))
        .collect();

    let mut order = Vec::with_capacity(jobs.len());
    while let Some((_, name)) = ready.pop_first() {
        order.push(name.to_string());
        for dependent in dependents.get(name).into_iter().flatten().copied() {
            let degree = in_degree.entry(dependent).or_default();
            *degree -= 1;
            if *degree == 0 {
                ready.insert(index[dependent], dependent);
            }
        }
    }

    if order.len() != jobs.len() {
        // Some job never reached in-degree zero; name one for the error.
        let stuck = jobs
            .iter()
            .find(|j| !order.iter().any(|n| n == &j.name))
            .map(|j| j.name.clone())
            .unwrap_or_default();
        return Err(GraphError::Cycle(stuck));
    }

    Ok(order)
}

pub fn has_cycle(jobs: &[PlanJob]) -> bool {
    matches!(topological_sort(jobs), Err(GraphError::Cycle(_)))
}

/// Merge order for each job: topological rank, ties broken by plan
/// position. Assigned once at plan creation and persisted.
pub fn merge_order(jobs: &[PlanJob]) -> Result<HashMap<String, u32>, GraphError> {
    let order = topological_sort(jobs)?;
    Ok(order
        .into_iter()
        .enumerate()
        .map(|(rank, name)| (name, rank as u32))
        .collect())
}

/// Names of jobs eligible to launch: `queued` or `waiting_deps` with
/// every dependency already `merged`.
pub fn ready_jobs(jobs: &[PlanJob]) -> Vec<String> {
    let status: HashMap<&str, JobStatus> = jobs
        .iter()
        .map(|j| (j.name.as_str(), j.status))
        .collect();

    jobs.iter()
        .filter(|j| matches!(j.status, JobStatus::Queued | JobStatus::WaitingDeps))
        .filter(|j| {
            j.depends_on
                .iter()
                .all(|dep| status.get(dep.as_str()) == Some(&JobStatus::Merged))
        })
        .map(|j| j.name.clone())
        .collect()
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
