use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StatValue {
    Count(u64),
    Text(String),
}

impl Display for StatValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StatValue::Count(c) => write!(f, "{c}"),
            StatValue::Text(t) => write!(f, "{t}"),
        }
    }
}

/// A tree of named counters, one node per (nested) algorithm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatisticsReport {
    pub name: String,
    pub values: BTreeMap<String, StatValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<StatisticsReport>,
}

impl StatisticsReport {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn count<S: Into<String>>(mut self, key: S, value: usize) -> Self {
        self.values.insert(key.into(), StatValue::Count(value as u64));
        self
    }

    pub fn text<S: Into<String>, T: ToString>(mut self, key: S, value: T) -> Self {
        self.values
            .insert(key.into(), StatValue::Text(value.to_string()));
        self
    }

    pub fn child(mut self, child: StatisticsReport) -> Self {
        self.children.push(child);
        self
    }

    pub fn get(&self, key: &str) -> Option<&StatValue> {
        self.values.get(key)
    }

    fn write_indented(&self, f: &mut Formatter<'_>, depth: usize) -> std::fmt::Result {
        let pad = "  ".repeat(depth);
        writeln!(f, "{pad}{}:", self.name)?;
        for (key, value) in &self.values {
            writeln!(f, "{pad}  {key}: {value}")?;
        }
        for child in &self.children {
            child.write_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl Display for StatisticsReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.write_indented(f, 0)
    }
}

/// Implemented by every algorithm; nested algorithms add their report as a child.
pub trait StatisticsProvider {
    fn statistics(&self) -> StatisticsReport;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_reports_indent() {
        let report = StatisticsReport::new("cegar")
            .count("refinements", 2)
            .child(StatisticsReport::new("cpa").count("iterations", 10));
        let text = report.to_string();
        assert!(text.contains("cegar:\n  refinements: 2\n"));
        assert!(text.contains("  cpa:\n    iterations: 10\n"));
        assert_eq!(report.get("refinements"), Some(&StatValue::Count(2)));
    }
}
