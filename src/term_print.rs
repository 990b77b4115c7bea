use anyhow::Result;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use secl_rules::{MultiError, PolicyInfo};

pub struct TermPrinted;

pub trait TermPrintable {
    fn term_print(&self) -> Result<TermPrinted>;
}

impl TermPrintable for Vec<PolicyInfo> {
    fn term_print(&self) -> Result<TermPrinted> {
        println!("{}", policies_table(self));

        if let Some(skipped) = skipped_table(self) {
            println!("{skipped}");
        }

        Ok(TermPrinted)
    }
}

impl TermPrintable for MultiError {
    fn term_print(&self) -> Result<TermPrinted> {
        println!("{}", errors_table(self));
        Ok(TermPrinted)
    }
}

fn policies_table(policies: &[PolicyInfo]) -> Table {
    let mut summary = table();

    summary.set_header(vec![
        Cell::new("POLICY").add_attribute(Attribute::Bold),
        Cell::new("SOURCE").add_attribute(Attribute::Bold),
        Cell::new("RULES").add_attribute(Attribute::Bold),
        Cell::new("MACROS").add_attribute(Attribute::Bold),
        Cell::new("SKIPPED").add_attribute(Attribute::Bold),
    ]);

    for policy in policies {
        let skipped = policy.rule_skipped.len() + policy.macro_skipped.len();
        summary.add_row(vec![
            Cell::new(&policy.name)
                .fg(Color::Cyan)
                .add_attribute(Attribute::Bold),
            Cell::new(&policy.source),
            Cell::new(policy.rules.len()),
            Cell::new(policy.macros.len()),
            Cell::new(skipped).fg(if skipped > 0 {
                Color::Yellow
            } else {
                Color::White
            }),
        ]);
    }

    summary
}

/// Skipped definitions of every policy, `None` when nothing was skipped.
fn skipped_table(policies: &[PolicyInfo]) -> Option<Table> {
    let skipped: Vec<_> = policies
        .iter()
        .flat_map(|policy| {
            let rules = policy.rule_skipped.iter().map(|s| ("rule", s));
            let macros = policy.macro_skipped.iter().map(|s| ("macro", s));
            rules.chain(macros).map(move |(kind, s)| (&policy.name, kind, s))
        })
        .collect();

    if skipped.is_empty() {
        return None;
    }

    let mut details = table();

    details.set_header(vec![
        Cell::new("SKIPPED").add_attribute(Attribute::Bold),
        Cell::new("KIND").add_attribute(Attribute::Bold),
        Cell::new("POLICY").add_attribute(Attribute::Bold),
        Cell::new("REASON").add_attribute(Attribute::Bold),
    ]);

    for (policy, kind, skipped) in skipped {
        details.add_row(vec![
            Cell::new(&skipped.id)
                .fg(Color::Cyan)
                .add_attribute(Attribute::Bold),
            Cell::new(kind),
            Cell::new(policy),
            Cell::new(&skipped.reason).fg(Color::Yellow),
        ]);
    }

    Some(details)
}

fn errors_table(errors: &MultiError) -> Table {
    let mut details = table();

    details.set_header(vec![
        Cell::new("ID").add_attribute(Attribute::Bold),
        Cell::new("POLICY").add_attribute(Attribute::Bold),
        Cell::new("ERROR").add_attribute(Attribute::Bold),
    ]);

    for error in errors {
        details.add_row(vec![
            Cell::new(error.id())
                .fg(Color::Cyan)
                .add_attribute(Attribute::Bold),
            Cell::new(error.policy()),
            Cell::new(error.kind()).fg(Color::Red),
        ]);
    }

    details
}

fn table() -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table
}

#[cfg(test)]
mod tests {
    use secl_rules::{DefinitionError, DefinitionErrorKind, Skipped, SkipReason};

    use super::*;

    fn render(mut table: Table) -> String {
        table.set_width(200);
        table.to_string()
    }

    fn policies() -> Vec<PolicyInfo> {
        vec![
            PolicyInfo {
                name: "default.policy".to_string(),
                source: "file".to_string(),
                rules: vec!["sensitive_open".to_string()],
                macros: vec!["sensitive_files".to_string()],
                ..Default::default()
            },
            PolicyInfo {
                name: "custom.policy".to_string(),
                source: "file".to_string(),
                rule_skipped: vec![Skipped {
                    id: "legacy_exec".to_string(),
                    reason: SkipReason::AgentVersion,
                }],
                ..Default::default()
            },
        ]
    }

    #[test]
    fn policies_summary() {
        let summary = render(policies_table(&policies()));
        assert!(summary.contains("default.policy"));
        assert!(summary.contains("custom.policy"));

        let details = render(skipped_table(&policies()).unwrap());
        assert!(details.contains("legacy_exec"));
        assert!(details.contains("agent version constraint not satisfied"));

        assert!(policies().term_print().is_ok());
    }

    #[test]
    fn nothing_skipped() {
        let policies = policies();
        assert!(skipped_table(&policies[..1]).is_none());
    }

    #[test]
    fn definition_errors() {
        let mut errors = MultiError::new();
        errors.push(DefinitionError::rule(
            "broken",
            "custom.policy",
            DefinitionErrorKind::NoExpression,
        ));

        let details = render(errors_table(&errors));
        assert!(details.contains("broken"));
        assert!(details.contains("custom.policy"));
        assert!(details.contains("no expression defined"));

        assert!(errors.term_print().is_ok());
    }
}
