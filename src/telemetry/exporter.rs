//! Text exposition rendering.
//!
//! Turns a [`MetricsSnapshot`] into the standard pull-based text format an
//! external collector scrapes. Every family from [`DESCRIPTORS`] gets its
//! `# HELP` / `# TYPE` header even when no data exists for it yet, so the
//! full schema is visible on an empty process.

use std::fmt::Write;

use super::aggregator::{MetricDesc, MetricsSnapshot, DESCRIPTORS};

/// Render the snapshot in text exposition format.
pub fn render(snapshot: &MetricsSnapshot, role: &str) -> String {
    let mut out = String::new();

    for desc in DESCRIPTORS {
        header(&mut out, desc);
        match desc.name {
            "keysync_certificate_expiry_gauge" => {
                for (id, seconds) in &snapshot.resource_expiry {
                    sample(&mut out, desc.name, &[("resource_id", id), ("role", role)], *seconds);
                }
            }
            "keysync_resource_total_counter" => {
                resource_counter(&mut out, desc.name, &snapshot.resource_totals, role);
            }
            "keysync_resource_success_counter" => {
                resource_counter(&mut out, desc.name, &snapshot.resource_successes, role);
            }
            "keysync_resource_error_counter" => {
                resource_counter(&mut out, desc.name, &snapshot.resource_errors, role);
            }
            "keysync_stage_total_counter" => {
                stage_counter(&mut out, desc.name, snapshot, role, |c| c.total);
            }
            "keysync_stage_success_counter" => {
                stage_counter(&mut out, desc.name, snapshot, role, |c| c.success);
            }
            "keysync_stage_error_counter" => {
                stage_counter(&mut out, desc.name, snapshot, role, |c| c.error);
            }
            "keysync_auth_total_counter" => {
                sample(&mut out, desc.name, &[("role", role)], snapshot.auth.total as f64);
            }
            "keysync_auth_success_counter" => {
                sample(&mut out, desc.name, &[("role", role)], snapshot.auth.success as f64);
            }
            "keysync_auth_error_counter" => {
                sample(&mut out, desc.name, &[("role", role)], snapshot.auth.error as f64);
            }
            "keysync_error_counter" => {
                for (reason, count) in &snapshot.generic_errors {
                    sample(&mut out, desc.name, &[("error", reason), ("role", role)], *count as f64);
                }
            }
            other => debug_assert!(false, "descriptor without renderer: {other}"),
        }
    }

    out
}

fn header(out: &mut String, desc: &MetricDesc) {
    let _ = writeln!(out, "# HELP {} {}", desc.name, desc.help);
    let _ = writeln!(out, "# TYPE {} {}", desc.name, desc.kind.as_str());
}

fn resource_counter(
    out: &mut String,
    name: &str,
    values: &std::collections::BTreeMap<String, u64>,
    role: &str,
) {
    for (id, count) in values {
        sample(out, name, &[("resource_id", id), ("role", role)], *count as f64);
    }
}

fn stage_counter(
    out: &mut String,
    name: &str,
    snapshot: &MetricsSnapshot,
    role: &str,
    pick: impl Fn(&super::aggregator::StageCounters) -> u64,
) {
    for (id, stages) in &snapshot.stages {
        for (stage, counters) in stages {
            sample(
                out,
                name,
                &[("resource_id", id), ("stage", stage), ("role", role)],
                pick(counters) as f64,
            );
        }
    }
}

fn sample(out: &mut String, name: &str, labels: &[(&str, &str)], value: f64) {
    let _ = write!(out, "{name}{{");
    for (i, (key, val)) in labels.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{key}=\"{}\"", escape_label_value(val));
    }
    let _ = writeln!(out, "}} {value}");
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::MetricsSnapshot;

    #[test]
    fn empty_snapshot_still_advertises_every_family() {
        let out = render(&MetricsSnapshot::default(), "ops");
        for desc in DESCRIPTORS {
            assert!(out.contains(&format!("# HELP {} ", desc.name)), "{}", desc.name);
            assert!(
                out.contains(&format!("# TYPE {} {}", desc.name, desc.kind.as_str())),
                "{}",
                desc.name
            );
        }
        // Auth counters are global, so they always render a sample.
        assert!(out.contains("keysync_auth_total_counter{role=\"ops\"} 0"));
    }

    #[test]
    fn samples_carry_labels_and_values() {
        let mut snap = MetricsSnapshot::default();
        snap.resource_totals.insert("secret:platform/db".into(), 7);
        snap.resource_expiry.insert("certificate:pki/issue/web".into(), 3600.5);
        snap.generic_errors.insert("no_expiration_in_resource".into(), 2);
        let mut stage = std::collections::BTreeMap::new();
        stage.insert(
            "write".to_string(),
            crate::telemetry::StageCounters { total: 3, success: 2, error: 1 },
        );
        snap.stages.insert("secret:platform/db".into(), stage);

        let out = render(&snap, "ops");
        assert!(out.contains(
            "keysync_resource_total_counter{resource_id=\"secret:platform/db\",role=\"ops\"} 7"
        ));
        assert!(out.contains(
            "keysync_certificate_expiry_gauge{resource_id=\"certificate:pki/issue/web\",role=\"ops\"} 3600.5"
        ));
        assert!(out.contains(
            "keysync_stage_error_counter{resource_id=\"secret:platform/db\",stage=\"write\",role=\"ops\"} 1"
        ));
        assert!(out.contains(
            "keysync_error_counter{error=\"no_expiration_in_resource\",role=\"ops\"} 2"
        ));
    }

    #[test]
    fn label_values_are_escaped() {
        let mut snap = MetricsSnapshot::default();
        snap.generic_errors.insert("bad \"quote\"\nnewline".into(), 1);
        let out = render(&snap, "ops");
        assert!(out.contains(r#"error="bad \"quote\"\nnewline""#));
    }
}
