use colored::*;

use crate::permissions::CompiledRule;

/// Console prints permission decisions with colored formatting
pub struct Console {
    query_color: Color,
    allowed_color: Color,
    denied_color: Color,
}

impl Console {
    /// Create a new Console with default colors
    pub fn new() -> Self {
        Self {
            query_color: Color::Cyan,
            allowed_color: Color::Green,
            denied_color: Color::Red,
        }
    }

    /// Create a new Console with custom colors
    pub fn with_colors(query_color: Color, allowed_color: Color, denied_color: Color) -> Self {
        Self {
            query_color,
            allowed_color,
            denied_color,
        }
    }

    /// Print the query being evaluated
    pub fn print_query(&self, action: &str, subject: &str, field: Option<&str>) {
        let target = match field {
            Some(field) => format!("{}.{}", subject, field),
            None => subject.to_string(),
        };
        println!(
            "{} {} {}",
            "Query:".color(self.query_color).bold(),
            action.color(self.query_color),
            target
        );
    }

    /// Print the final decision
    pub fn print_decision(&self, allowed: bool) {
        if allowed {
            println!("{}", "✓ ALLOWED".color(self.allowed_color).bold());
        } else {
            println!("{}", "✗ DENIED".color(self.denied_color).bold());
        }
    }

    /// Print the rule that decided the query
    pub fn print_rule(&self, rule: Option<&CompiledRule>) {
        let Some(rule) = rule else {
            println!("{}", "No matching rule".bright_black());
            return;
        };

        let kind = if rule.is_inverted() { "cannot" } else { "can" };
        println!(
            "{} #{} {} {} {}",
            "Rule:".yellow().bold(),
            rule.index(),
            kind,
            rule.action(),
            rule.subject()
        );
        if let Some(fields) = rule.fields() {
            println!("  fields: {}", fields.join(", ").bright_black());
        }
        if let Some(condition) = rule.condition() {
            println!("  condition: {}", condition.to_string().bright_black());
        }
    }

    /// Print a separator line
    pub fn print_separator(&self) {
        println!("{}", "-".repeat(60).bright_black());
    }

    /// Print an error message
    pub fn print_error(&self, error: &str) {
        eprintln!("{} {}", "Error:".red().bold(), error);
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}
