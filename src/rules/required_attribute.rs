//! Required attribute: every targeted element must carry a given attribute

use super::{Rule, RuleMetadata};
use crate::domain::document::{Document, ElementRef};
use crate::domain::issues::IssueSink;
use crate::domain::violations::Severity;
use crate::query::{PathQuery, Step};

pub const BEAN_SCOPE_KEY: &str = "SpringBeanScope";
const BEAN_SCOPE_MESSAGE: &str =
    "This bean does not have a scope. Scope is mandatory for every bean";

/// Flags every element matched by `target` that lacks `attribute`.
///
/// Only presence is checked; an empty value is accepted.
#[derive(Debug, Clone)]
pub struct RequiredAttributeRule {
    metadata: RuleMetadata,
    target: PathQuery,
    attribute: String,
    message: String,
}

impl RequiredAttributeRule {
    pub fn new(metadata: RuleMetadata, target: PathQuery, attribute: impl Into<String>) -> Self {
        let attribute = attribute.into();
        let message = format!("Add the mandatory \"{attribute}\" attribute");
        Self {
            metadata,
            target,
            attribute,
            message,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Every `beans/bean` must declare a `scope`
    pub fn bean_scope() -> Self {
        let metadata = RuleMetadata::new(BEAN_SCOPE_KEY, "Checking the scope of Spring beans")
            .with_description("Spring beans must declare a scope attribute.")
            .with_severity(Severity::Error)
            .with_tags(["bug", "spring"]);

        let target = PathQuery::from_steps([Step::child("beans"), Step::child("bean")]);

        Self::new(metadata, target, "scope").with_message(BEAN_SCOPE_MESSAGE)
    }

    pub fn is_compliant(&self, element: ElementRef<'_>) -> bool {
        element.attribute_ref(&self.attribute).is_present()
    }
}

impl Rule for RequiredAttributeRule {
    fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut RuleMetadata {
        &mut self.metadata
    }

    fn check(&self, document: &Document, sink: &mut IssueSink) {
        for element in self.target.evaluate(document) {
            if !self.is_compliant(element) {
                sink.report(&self.metadata.key, element, self.message.as_str());
            }
        }
    }

    fn queries(&self) -> Vec<&PathQuery> {
        vec![&self.target]
    }

    fn suggestion(&self) -> Option<String> {
        Some(format!("{}=\"...\"", self.attribute))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::xml::parse_document;
    use rstest::rstest;

    fn issue_count(xml: &str) -> usize {
        let doc = parse_document(xml).unwrap();
        RequiredAttributeRule::bean_scope().evaluate(&doc).len()
    }

    #[rstest]
    #[case::singleton(r#"<beans><bean scope="singleton"/></beans>"#, 0)]
    #[case::prototype(r#"<beans><bean class="a.B" scope="prototype"/></beans>"#, 0)]
    #[case::empty_scope(r#"<beans><bean scope=""/></beans>"#, 0)]
    #[case::missing(r#"<beans><bean class="a.B"/></beans>"#, 1)]
    #[case::prefixed_only(r#"<beans><bean p:scope="singleton"/></beans>"#, 1)]
    #[case::wrong_case(r#"<beans><bean Scope="singleton"/></beans>"#, 1)]
    #[case::scope_as_property(
        r#"<beans><bean><property name="scope" value="singleton"/></bean></beans>"#,
        1
    )]
    #[case::nested_bean_not_targeted(r#"<beans><bean scope="s"><bean/></bean></beans>"#, 0)]
    #[case::not_under_beans(r#"<config><bean/></config>"#, 0)]
    fn test_scope_presence(#[case] xml: &str, #[case] expected: usize) {
        assert_eq!(issue_count(xml), expected);
    }

    #[test]
    fn test_issues_follow_document_order() {
        let doc = parse_document(
            r#"<beans>
  <bean id="b1"/>
  <bean id="skip" scope="singleton"/>
  <bean id="b2"/>
  <bean id="b3"/>
</beans>"#,
        )
        .unwrap();

        let issues = RequiredAttributeRule::bean_scope().evaluate(&doc);
        let ids: Vec<_> = issues
            .iter()
            .filter_map(|issue| doc.get(issue.element()))
            .map(|bean| bean.attribute("id"))
            .collect();
        assert_eq!(ids, vec![Some("b1"), Some("b2"), Some("b3")]);
        for issue in &issues {
            assert!(issue.message().contains("mandatory"));
        }
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let xml = r#"<beans><bean/><bean/><bean scope="x"/><bean/></beans>"#;
        let doc = parse_document(xml).unwrap();
        let rule = RequiredAttributeRule::bean_scope();
        assert_eq!(rule.evaluate(&doc), rule.evaluate(&doc));
    }
}
