//! Diff display

use colored::Colorize;
use declarative::{ChangeKind, DiffSummary, Properties, ResourceDiff, ResourceKind};
use similar::{ChangeTag, TextDiff};

/// Render a property bag one `key = value` per line, nested maps flattened
pub fn render_properties(properties: &Properties) -> String {
    let mut out = String::new();
    for (key, value) in properties {
        match value.as_map() {
            Some(map) => {
                for (inner, v) in map {
                    out.push_str(&format!("{key}.{inner} = {v}\n"));
                }
            }
            None => out.push_str(&format!("{key} = {value}\n")),
        }
    }
    out
}

/// Changed lines between two property bags
pub fn property_changes(
    current: Option<&Properties>,
    desired: Option<&Properties>,
) -> Vec<(ChangeTag, String)> {
    let old = current.map(render_properties).unwrap_or_default();
    let new = desired.map(render_properties).unwrap_or_default();
    let diff = TextDiff::from_lines(&old, &new);

    diff.iter_all_changes()
        .filter(|c| c.tag() != ChangeTag::Equal)
        .map(|c| (c.tag(), c.value().trim_end().to_string()))
        .collect()
}

fn kind_title(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Role => "Roles",
        ResourceKind::Topic => "Topics",
        ResourceKind::Function => "Functions",
        ResourceKind::EventSubscription => "Subscriptions",
    }
}

/// Display a list of diffs in a user-friendly format
pub fn display_diff(diffs: &[ResourceDiff], verbose: bool) {
    if diffs.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    let by_kind = declarative::group_by_kind(diffs);

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Stack Diff".bold()
    );
    println!("│");

    for kind in ResourceKind::ALL {
        let Some(kind_diffs) = by_kind.get(&kind) else {
            continue;
        };
        println!("│ {}", kind_title(kind).bold());

        for diff in kind_diffs {
            let (symbol, note) = match diff.change {
                ChangeKind::Create => ("+".green(), "(new)"),
                ChangeKind::Update => ("~".yellow(), "(changed)"),
                ChangeKind::Delete => ("-".red(), "(will remove)"),
            };
            println!("│   {} {:<34} {}", symbol, diff.resource_id, note.dimmed());

            // Full property listings for creates and deletes need -v
            if diff.change == ChangeKind::Update || verbose {
                for (tag, line) in property_changes(diff.current.as_ref(), diff.desired.as_ref()) {
                    match tag {
                        ChangeTag::Delete => println!("│       {}", format!("- {line}").red()),
                        ChangeTag::Insert => println!("│       {}", format!("+ {line}").green()),
                        ChangeTag::Equal => {}
                    }
                }
            }
        }
        println!("│");
    }

    let summary = DiffSummary::from_diffs(diffs);
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} to add, {} to change, {} to remove",
        summary.additions.to_string().green(),
        summary.updates.to_string().yellow(),
        summary.removals.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::Value;

    fn function_props(timeout: u64, status: &str) -> Properties {
        let mut props = Properties::new();
        props.insert("timeout".into(), Value::seconds(timeout));
        props.insert("role".into(), Value::reference("Role", "arn"));
        props.insert(
            "environment".into(),
            Value::string_map([("STATUS", status), ("SENDER", "")]),
        );
        props
    }

    #[test]
    fn test_render_properties_flattens_maps() {
        let rendered = render_properties(&function_props(5, "DONE"));
        assert_eq!(
            rendered,
            "environment.SENDER = \"\"\n\
             environment.STATUS = \"DONE\"\n\
             role = ${Role.arn}\n\
             timeout = 5s\n"
        );
    }

    #[test]
    fn test_property_changes_only_reports_differences() {
        let old = function_props(5, "DONE");
        let new = function_props(10, "DONE");
        let changes = property_changes(Some(&old), Some(&new));
        assert_eq!(
            changes,
            vec![
                (ChangeTag::Delete, "timeout = 5s".to_string()),
                (ChangeTag::Insert, "timeout = 10s".to_string()),
            ]
        );
    }

    #[test]
    fn test_property_changes_for_create() {
        let changes = property_changes(None, Some(&function_props(5, "DONE")));
        assert_eq!(changes.len(), 4);
        assert!(changes.iter().all(|(tag, _)| *tag == ChangeTag::Insert));
    }
}
