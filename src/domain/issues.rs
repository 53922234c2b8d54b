//! Findings produced while evaluating rules against one document

use crate::domain::document::{ElementRef, Location, NodeId};

/// A single rule violation tied to the element that triggered it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    rule_key: String,
    message: String,
    element: NodeId,
    location: Location,
}

impl Issue {
    pub fn new(
        rule_key: impl Into<String>,
        element: ElementRef<'_>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_key: rule_key.into(),
            message: message.into(),
            element: element.id(),
            location: element.location(),
        }
    }

    pub fn rule_key(&self) -> &str {
        &self.rule_key
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Id of the triggering element in the evaluated document
    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn location(&self) -> Location {
        self.location
    }
}

/// Collects issues in the order they are reported.
///
/// No de-duplication, sorting or filtering happens here.
#[derive(Debug, Default)]
pub struct IssueSink {
    issues: Vec<Issue>,
}

impl IssueSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, rule_key: &str, element: ElementRef<'_>, message: impl Into<String>) {
        tracing::debug!(
            "{} reported on <{}> at {}",
            rule_key,
            element.name(),
            element.location()
        );
        self.issues.push(Issue::new(rule_key, element, message));
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::DocumentBuilder;

    #[test]
    fn test_sink_keeps_report_order_and_duplicates() {
        let mut builder = DocumentBuilder::new();
        builder.start_element("beans", Location::new(1, 1)).unwrap();
        builder.start_element("bean", Location::new(2, 5)).unwrap();
        builder.end_element().unwrap();
        builder.end_element().unwrap();
        let doc = builder.finish().unwrap();
        let bean = doc.root().child_elements().next().unwrap();

        let mut sink = IssueSink::new();
        assert!(sink.is_empty());

        sink.report("second", bean, "b");
        sink.report("first", doc.root(), "a");
        sink.report("second", bean, "b");

        let keys: Vec<_> = sink.issues().iter().map(Issue::rule_key).collect();
        assert_eq!(keys, vec!["second", "first", "second"]);
        assert_eq!(sink.len(), 3);

        let issues = sink.into_issues();
        assert_eq!(issues[0], issues[2]);
        assert_eq!(issues[0].location(), Location::new(2, 5));
        assert_eq!(issues[0].element(), bean.id());
        assert_eq!(issues[1].message(), "a");
    }
}
