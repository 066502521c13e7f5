//! Rendering helpers (markdown) for human-readable artifacts.

use statedump_types::{ImportPlan, ImportResult};

pub fn render_plan_md(plan: &ImportPlan) -> String {
    let mut out = String::new();
    out.push_str("# statedump plan\n\n");
    out.push_str(&format!("- Objects: {}\n", plan.summary.objects_total));
    out.push_str(&format!("- Conflicts: {}\n", plan.summary.conflicts));
    out.push_str(&format!(
        "- Secrets needed: {}\n",
        plan.summary.passwords_needed
    ));
    out.push_str(&format!("- Files ignored: {}\n\n", plan.summary.files_ignored));

    out.push_str("## Objects\n\n");
    if plan.objects.is_empty() {
        out.push_str("_No objects._\n\n");
    } else {
        out.push_str("| Object | File | Conflict | Secret |\n");
        out.push_str("|---|---|---|---|\n");
        for o in &plan.objects {
            out.push_str(&format!(
                "| `{}` | `{}` | {} | {} |\n",
                o.key,
                o.source_file,
                yes_no(o.conflict),
                yes_no(o.needs_secret)
            ));
        }
        out.push('\n');
    }

    if !plan.conflicts.is_empty() {
        out.push_str("## Conflicts\n\n");
        for c in &plan.conflicts {
            let note = if c.differs() {
                "content differs"
            } else {
                "content identical"
            };
            out.push_str(&format!(
                "- `{}` from `{}`: {} (stored `{}`, incoming `{}`)\n",
                c.key,
                c.source_file,
                note,
                short(&c.stored_fingerprint),
                short(&c.incoming_fingerprint)
            ));
        }
        out.push('\n');
    }

    if !plan.passwords_needed.is_empty() {
        out.push_str("## Secrets needed\n\n");
        for p in &plan.passwords_needed {
            out.push_str(&format!("- `{}`: {}\n", p.key, p.reason));
        }
        out.push('\n');
    }

    if !plan.notices.is_empty() {
        out.push_str("## Notices\n\n");
        for n in &plan.notices {
            out.push_str(&format!("- {n}\n"));
        }
    }

    out
}

pub fn render_result_md(result: &ImportResult) -> String {
    let mut out = String::new();
    out.push_str("# statedump import\n\n");
    out.push_str(&format!("- Run: `{}`\n", result.run_id));
    if let Some(id) = &result.source_id {
        out.push_str(&format!("- Statedump id: `{id}`\n"));
    }
    out.push_str(&format!(
        "- Applied: {}, merged: {}, skipped: {}\n",
        result.summary.applied, result.summary.merged, result.summary.skipped
    ));
    out.push_str(&format!(
        "- Locked down: {}\n",
        yes_no(result.lockdown_engaged)
    ));
    out.push_str(&format!(
        "- Finished: {}\n\n",
        result.finished_at.to_rfc3339()
    ));

    out.push_str("## Objects\n\n");
    if result.applied.is_empty() {
        out.push_str("_Nothing written._\n");
    }
    for a in &result.applied {
        out.push_str(&format!("- `{}`: {}\n", a.key, a.status.label()));
    }

    if !result.notices.is_empty() {
        out.push_str("\n## Notices\n\n");
        for n in &result.notices {
            out.push_str(&format!("- {n}\n"));
        }
    }
    out
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}
