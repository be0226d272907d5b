// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pull-request body rendering.

use crate::train::TrainConfig;
use mc_core::Plan;

/// Fixed markdown body: job table, testing section, integration
/// footnotes. The PR title is the plan name.
pub fn render_pr_body(plan: &Plan, train: &TrainConfig) -> String {
    let mut body = String::new();

    body.push_str("## Jobs\n\n");
    body.push_str("| Job | Status | Merged |\n");
    body.push_str("|---|---|---|\n");
    for job in plan.jobs_by_merge_order() {
        let merged = job
            .merged_at
            .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "—".to_string());
        body.push_str(&format!("| {} | {} | {} |\n", job.name, job.status, merged));
    }

    body.push_str("\n## Testing\n\n");
    match &train.test_command {
        Some(command) => body.push_str(&format!("- Test command: `{command}`\n")),
        None => body.push_str("- Test command: from `package.json` `scripts.test`\n"),
    }
    if !train.setup_commands.is_empty() {
        body.push_str("- Setup:\n");
        for command in &train.setup_commands {
            body.push_str(&format!("  - `{command}`\n"));
        }
    }
    body.push_str(&format!(
        "- Each branch was merged into `{}` and gated on the tests above.\n",
        plan.integration_branch
    ));

    body.push_str(&format!(
        "\n---\n\nIntegration branch: `{}`\nBase: `{}` @ `{}`\n",
        plan.integration_branch, plan.base_branch, plan.base_commit
    ));

    body
}

#[cfg(test)]
#[path = "pr_tests.rs"]
mod tests;
