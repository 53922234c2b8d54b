//! Required companion property: a targeted element must carry a setting either
//! as an attribute or as a matching child element

use super::{Rule, RuleMetadata};
use crate::domain::document::{Document, ElementRef};
use crate::domain::issues::IssueSink;
use crate::domain::violations::Severity;
use crate::query::{PathQuery, Step, Term};

pub const RECONNECT_ON_EXCEPTION_KEY: &str = "SpringReconnectOnException";
pub const SINGLE_CONNECTION_FACTORY: &str =
    "org.springframework.jms.connection.SingleConnectionFactory";

/// Flags every element matched by `target` that has neither `attribute="value"`
/// nor a child matching `companion`.
#[derive(Debug, Clone)]
pub struct CompanionPropertyRule {
    metadata: RuleMetadata,
    target: PathQuery,
    attribute: String,
    value: String,
    companion: PathQuery,
    message: String,
}

impl CompanionPropertyRule {
    pub fn new(
        metadata: RuleMetadata,
        target: PathQuery,
        attribute: impl Into<String>,
        value: impl Into<String>,
        companion: PathQuery,
    ) -> Self {
        let attribute = attribute.into();
        let value = value.into();
        let message = format!("Set \"{attribute}\" to \"{value}\"");
        Self {
            metadata,
            target,
            attribute,
            value,
            companion,
            message,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// `SingleConnectionFactory` beans must set `reconnectOnException` to `true`,
    /// through `p:reconnectOnException` or a `<property>` child.
    pub fn reconnect_on_exception() -> Self {
        let metadata = RuleMetadata::new(
            RECONNECT_ON_EXCEPTION_KEY,
            "SingleConnectionFactory beans must reconnect on exception",
        )
        .with_description(
            "A SingleConnectionFactory keeps one shared JMS connection. Without \
             reconnectOnException=true a broken connection is never replaced.",
        )
        .with_severity(Severity::Error)
        .with_tags(["bug", "spring", "jms"]);

        let target = PathQuery::from_steps([
            Step::child("beans"),
            Step::child("bean").with(Term::attribute_equals("class", SINGLE_CONNECTION_FACTORY)),
        ]);
        let companion = PathQuery::from_steps([Step::child("property")
            .with(Term::attribute_equals("name", "reconnectOnException"))
            .with(Term::child_equals("value", "true"))]);

        let attribute = "p:reconnectOnException";
        Self::new(metadata, target, attribute, "true", companion)
            .with_message("Add a \"reconnectOnException\" property, set to \"true\"")
    }

    pub fn is_compliant(&self, element: ElementRef<'_>) -> bool {
        element.attribute_ref(&self.attribute).has_value(&self.value)
            || self.companion.matches_within(element)
    }
}

impl Rule for CompanionPropertyRule {
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
        vec![&self.target, &self.companion]
    }

    fn suggestion(&self) -> Option<String> {
        Some(format!("{}=\"{}\"", self.attribute, self.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::xml::parse_document;
    use rstest::rstest;

    fn issues_for(bean: &str) -> Vec<String> {
        let xml = format!("<beans>{bean}</beans>");
        let doc = parse_document(&xml).unwrap();
        CompanionPropertyRule::reconnect_on_exception()
            .evaluate(&doc)
            .iter()
            .map(|issue| issue.message().to_string())
            .collect()
    }

    #[rstest]
    #[case::prefixed_attribute(
        r#"<bean class="org.springframework.jms.connection.SingleConnectionFactory" p:reconnectOnException="true"/>"#
    )]
    #[case::property_value_attribute(
        r#"<bean class="org.springframework.jms.connection.SingleConnectionFactory">
             <property name="reconnectOnException" value="true"/>
           </bean>"#
    )]
    #[case::property_value_element(
        r#"<bean class="org.springframework.jms.connection.SingleConnectionFactory">
             <property name="reconnectOnException"><value>true</value></property>
           </bean>"#
    )]
    #[case::one_of_several_properties(
        r#"<bean class="org.springframework.jms.connection.SingleConnectionFactory">
             <property name="targetConnectionFactory" ref="target"/>
             <property name="reconnectOnException" value="true"/>
           </bean>"#
    )]
    #[case::other_class(
        r#"<bean class="org.springframework.jms.connection.CachingConnectionFactory"/>"#
    )]
    #[case::no_class(r#"<bean id="plain"/>"#)]
    fn test_compliant_or_not_applicable(#[case] bean: &str) {
        assert!(issues_for(bean).is_empty());
    }

    #[rstest]
    #[case::nothing(
        r#"<bean class="org.springframework.jms.connection.SingleConnectionFactory"/>"#
    )]
    #[case::unprefixed_attribute(
        r#"<bean class="org.springframework.jms.connection.SingleConnectionFactory" reconnectOnException="true"/>"#
    )]
    #[case::attribute_false(
        r#"<bean class="org.springframework.jms.connection.SingleConnectionFactory" p:reconnectOnException="false"/>"#
    )]
    #[case::attribute_upper_case(
        r#"<bean class="org.springframework.jms.connection.SingleConnectionFactory" p:reconnectOnException="TRUE"/>"#
    )]
    #[case::property_false(
        r#"<bean class="org.springframework.jms.connection.SingleConnectionFactory">
             <property name="reconnectOnException" value="false"/>
           </bean>"#
    )]
    #[case::property_without_value(
        r#"<bean class="org.springframework.jms.connection.SingleConnectionFactory">
             <property name="reconnectOnException"/>
           </bean>"#
    )]
    #[case::grandchild_property(
        r#"<bean class="org.springframework.jms.connection.SingleConnectionFactory">
             <wrapper><property name="reconnectOnException" value="true"/></wrapper>
           </bean>"#
    )]
    fn test_non_compliant(#[case] bean: &str) {
        let issues = issues_for(bean);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("reconnectOnException"));
        assert!(issues[0].contains("true"));
    }

    #[test]
    fn test_only_beans_under_beans_root_are_checked() {
        let doc = parse_document(
            r#"<root><bean class="org.springframework.jms.connection.SingleConnectionFactory"/></root>"#,
        )
        .unwrap();
        let rule = CompanionPropertyRule::reconnect_on_exception();
        assert!(rule.evaluate(&doc).is_empty());
    }

    #[test]
    fn test_issues_follow_document_order() {
        let doc = parse_document(
            r#"<beans>
  <bean id="one" class="org.springframework.jms.connection.SingleConnectionFactory"/>
  <bean id="ok" class="org.springframework.jms.connection.SingleConnectionFactory" p:reconnectOnException="true"/>
  <bean id="two" class="org.springframework.jms.connection.SingleConnectionFactory"/>
</beans>"#,
        )
        .unwrap();

        let lines: Vec<_> = CompanionPropertyRule::reconnect_on_exception()
            .evaluate(&doc)
            .iter()
            .map(|issue| issue.location().line)
            .collect();
        assert_eq!(lines, vec![2, 4]);
    }

    #[test]
    fn test_custom_instance_uses_default_message() {
        let rule = CompanionPropertyRule::new(
            RuleMetadata::new("PoolSize", "Pool size"),
            PathQuery::compile("beans/bean[@class='Pool']").unwrap(),
            "p:size",
            "10",
            PathQuery::compile("property[@name='size' and value='10']").unwrap(),
        );
        let doc = parse_document(r#"<beans><bean class="Pool"/></beans>"#).unwrap();

        let issues = rule.evaluate(&doc);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message(), "Set \"p:size\" to \"10\"");
        assert_eq!(rule.queries().len(), 2);
    }
}
