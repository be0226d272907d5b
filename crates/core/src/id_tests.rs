// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn job_id_roundtrips_through_string() {
    let id = JobId::new("job-1");
    assert_eq!(id.as_str(), "job-1");
    assert_eq!(id.to_string(), "job-1");
    assert_eq!(JobId::from("job-1".to_string()), id);
}

#[test]
fn ids_compare_against_str() {
    let id = PlanId::new("plan-7");
    assert_eq!(id, *"plan-7");
    assert_eq!(id, "plan-7");
}

#[test]
fn uuid_gen_produces_unique_ids() {
    let idgen = UuidIdGen;
    let a = idgen.next();
    let b = idgen.next();
    assert_ne!(a, b);
    assert_eq!(a.len(), 36);
}

#[test]
fn sequential_gen_counts_up() {
    let idgen = SequentialIdGen::new("job");
    assert_eq!(idgen.next(), "job-1");
    assert_eq!(idgen.next(), "job-2");

    // Clones share the counter
    let clone = idgen.clone();
    assert_eq!(clone.next(), "job-3");
}
