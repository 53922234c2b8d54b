//! XML parsing and rule evaluation for markup files
//!
//! Architecture: Anti-Corruption Layer - quick-xml events are translated into the domain Document
//! - Names are kept verbatim, so prefixed attributes like `p:scope` need no namespace declaration
//! - Positions are byte offsets from the reader, converted to 1-based line and column
//! - Issues become Violations only here, where the file and rule severity are known

use super::FileAnalyzer;
use crate::domain::document::{Document, DocumentBuilder, Location};
use crate::domain::violations::{GuardianError, GuardianResult, Severity, Violation};
use crate::rules::RuleSet;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;

/// Parse XML text into a [`Document`]
pub fn parse_document(content: &str) -> GuardianResult<Document> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);

    let lines = LineIndex::new(content);
    let mut builder = DocumentBuilder::new();
    let mut buf = Vec::new();

    loop {
        let position = reader.buffer_position() as usize;
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            let (line, column) = lines.locate(content, reader.error_position() as usize);
            GuardianError::parse(line, column, e.to_string())
        })?;

        match event {
            Event::Start(e) => {
                let location = lines.location(content, markup_start(content, position));
                open_element(&mut builder, &reader, &e, location)?;
            }
            Event::Empty(e) => {
                let location = lines.location(content, markup_start(content, position));
                open_element(&mut builder, &reader, &e, location)?;
                builder.end_element()?;
            }
            Event::End(_) => {
                builder.end_element()?;
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(|err| {
                    let (line, column) = lines.locate(content, position);
                    GuardianError::parse(line, column, err.to_string())
                })?;
                if !text.trim().is_empty() {
                    let location = lines.location(content, position);
                    builder.text(text.into_owned(), location)?;
                }
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                if !text.trim().is_empty() {
                    builder.text(text, lines.location(content, position))?;
                }
            }
            Event::Eof => break,
            // declarations, comments, processing instructions, doctype
            _ => {}
        }
        buf.clear();
    }

    let document = builder.finish()?;
    tracing::debug!(
        "Parsed document <{}> with {} elements",
        document.root().name(),
        document.element_count()
    );
    Ok(document)
}

/// Offset of the `<` opening the markup read from `position`.
///
/// After a text event the reader has already consumed that `<`.
fn markup_start(content: &str, position: usize) -> usize {
    let bytes = content.as_bytes();
    match bytes.get(position) {
        Some(b'<') => position,
        _ if position > 0 && bytes.get(position - 1) == Some(&b'<') => position - 1,
        _ => position,
    }
}

fn open_element(
    builder: &mut DocumentBuilder,
    reader: &Reader<&[u8]>,
    start: &BytesStart<'_>,
    location: Location,
) -> GuardianResult<()> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    builder.start_element(name.as_str(), location)?;

    for attr in start.attributes() {
        let attr = attr.map_err(|e| {
            GuardianError::parse(location.line, location.column, format!("<{name}>: {e}"))
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.decode_and_unescape_value(reader.decoder()).map_err(|e| {
            GuardianError::parse(
                location.line,
                location.column,
                format!("attribute '{key}' on <{name}>: {e}"),
            )
        })?;
        builder.attribute(key, value.into_owned())?;
    }

    Ok(())
}

/// Byte offsets of line starts, for offset to line/column conversion
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(content: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(content.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { starts }
    }

    fn locate(&self, content: &str, offset: usize) -> (u32, u32) {
        let offset = offset.min(content.len());
        let line = self.starts.partition_point(|&start| start <= offset).max(1);
        let start = self.starts[line - 1];
        let column = content
            .get(start..offset)
            .map_or(offset - start, |prefix| prefix.chars().count())
            + 1;
        (line as u32, column as u32)
    }

    fn location(&self, content: &str, offset: usize) -> Location {
        let (line, column) = self.locate(content, offset);
        Location::new(line, column)
    }
}

/// Evaluates a rule set against XML files
pub struct XmlAnalyzer {
    rules: RuleSet,
    extensions: Vec<String>,
}

impl XmlAnalyzer {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            extensions: vec!["xml".to_string()],
        }
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    fn severity_of(&self, rule_key: &str) -> Severity {
        self.rules
            .get(rule_key)
            .map_or(Severity::Error, |rule| rule.metadata().severity)
    }
}

impl FileAnalyzer for XmlAnalyzer {
    fn analyze(&self, file_path: &Path, content: &str) -> GuardianResult<Vec<Violation>> {
        let document = parse_document(content)?;
        let source_lines: Vec<&str> = content.lines().collect();

        let violations = self
            .rules
            .evaluate(&document)
            .into_iter()
            .map(|issue| {
                let location = issue.location();
                let mut violation = Violation::new(
                    issue.rule_key(),
                    self.severity_of(issue.rule_key()),
                    file_path.to_path_buf(),
                    issue.message(),
                )
                .with_position(location.line, location.column);

                if let Some(line) = source_lines.get(location.line as usize - 1) {
                    violation = violation.with_context(line.trim());
                }
                let rule = self.rules.get(issue.rule_key());
                if let Some(fix) = rule.and_then(|rule| rule.suggestion()) {
                    violation = violation.with_suggestion(fix);
                }
                violation
            })
            .collect();

        Ok(violations)
    }

    fn handles_file(&self, file_path: &Path) -> bool {
        let Some(ext) = file_path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        self.extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::Child;
    use rstest::rstest;

    #[test]
    fn test_parse_keeps_prefixed_names_verbatim() {
        let doc = parse_document(
            r#"<beans xmlns="http://www.springframework.org/schema/beans">
  <bean id="cf" p:reconnectOnException="true" scope="singleton"/>
</beans>"#,
        )
        .unwrap();

        let bean = doc.root().child_elements().next().unwrap();
        assert_eq!(bean.name(), "bean");
        assert_eq!(bean.attribute("p:reconnectOnException"), Some("true"));
        assert_eq!(bean.attribute("reconnectOnException"), None);
        assert_eq!(bean.location(), Location::new(2, 3));
    }

    #[test]
    fn test_parse_text_entities_and_cdata() {
        let doc = parse_document(
            "<?xml version=\"1.0\"?>\n<!-- c -->\n<a x=\"1 &lt; 2\"><b> t&amp;u </b><c><![CDATA[<raw>]]></c>\n</a>",
        )
        .unwrap();

        let root = doc.root();
        assert_eq!(root.attribute("x"), Some("1 < 2"));

        let children: Vec<_> = root.child_elements().collect();
        assert_eq!(children[0].text(), " t&u ");
        assert_eq!(children[1].text(), "<raw>");
        // whitespace-only text between elements is dropped
        let only_elements = root
            .children()
            .all(|child| matches!(child, Child::Element(_)));
        assert!(only_elements);
    }

    #[test]
    fn test_columns_count_characters() {
        let doc = parse_document("<a>\n  <é/><b/>\n</a>").unwrap();
        let locations: Vec<_> = doc.root().child_elements().map(|e| e.location()).collect();
        assert_eq!(locations, vec![Location::new(2, 3), Location::new(2, 7)]);
    }

    #[rstest]
    #[case::unclosed("<beans><bean>")]
    #[case::mismatched("<beans><bean></beans>")]
    #[case::duplicate_attribute(r#"<bean a="1" a="2"/>"#)]
    #[case::two_roots("<a/><b/>")]
    #[case::empty("")]
    #[case::text_only("just text")]
    #[case::unquoted_attribute("<bean a=1/>")]
    fn test_malformed_input_is_an_error(#[case] content: &str) {
        assert!(parse_document(content).is_err());
    }

    #[test]
    fn test_syntax_errors_carry_position() {
        match parse_document("<beans>\n  <bean></beans>") {
            Err(GuardianError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_analyzer_maps_issues_to_violations() {
        let analyzer = XmlAnalyzer::new(RuleSet::spring_defaults());
        let content = "<beans>\n  <bean id=\"a\"/>\n</beans>\n";

        let violations = analyzer.analyze(Path::new("ctx.xml"), content).unwrap();
        assert_eq!(violations.len(), 1);
        let violation = &violations[0];
        assert_eq!(violation.rule_id, "SpringBeanScope");
        assert_eq!(violation.severity, Severity::Error);
        assert_eq!(violation.line_number, Some(2));
        assert_eq!(violation.column_number, Some(3));
        assert_eq!(violation.context.as_deref(), Some("<bean id=\"a\"/>"));
        assert_eq!(violation.suggested_fix.as_deref(), Some("scope=\"...\""));
    }

    #[test]
    fn test_analyzer_suggests_companion_attribute() {
        let analyzer = XmlAnalyzer::new(RuleSet::spring_defaults());
        let content = r#"<beans><bean class="org.springframework.jms.connection.SingleConnectionFactory" scope="singleton"/></beans>"#;

        let violations = analyzer.analyze(Path::new("jms.xml"), content).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule_id, "SpringReconnectOnException");
        assert_eq!(
            violations[0].suggested_fix.as_deref(),
            Some("p:reconnectOnException=\"true\"")
        );
    }

    #[test]
    fn test_analyzer_handles_configured_extensions() {
        let analyzer = XmlAnalyzer::new(RuleSet::new());
        assert!(analyzer.handles_file(Path::new("a/context.xml")));
        assert!(analyzer.handles_file(Path::new("a/CONTEXT.XML")));
        assert!(!analyzer.handles_file(Path::new("a/context.xsd")));

        let analyzer = analyzer.with_extensions(vec!["xsd".to_string()]);
        assert!(analyzer.handles_file(Path::new("a/context.xsd")));
        assert!(!analyzer.handles_file(Path::new("Makefile")));
    }
}
