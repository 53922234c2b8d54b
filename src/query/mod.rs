//! Path query engine for locating elements in a document
//!
//! Architectural Principle: Service Layer - queries are compiled once and evaluated many times
//! - A PathQuery is an immutable list of steps, safe to share between threads
//! - Evaluation walks candidate sets step by step, keeping document order without duplicates
//! - Absence is an empty result, never an error

mod parser;

use crate::domain::document::{Document, ElementRef};
use crate::domain::violations::GuardianResult;
use std::fmt;
use std::str::FromStr;

/// How a step reaches its candidates from the previous set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Direct children (`a/b`)
    Child,
    /// Any element below (`a//b`)
    Descendant,
}

/// One condition inside a step predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// `@name` or `@name='value'`: tested against attributes only
    Attribute {
        name: String,
        value: Option<String>,
    },
    /// `name` or `name='value'`: satisfied by an attribute of that name or by
    /// a direct child element of that name whose string value matches
    Child {
        name: String,
        value: Option<String>,
    },
}

impl Term {
    pub fn attribute_equals(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Attribute {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn has_attribute(name: impl Into<String>) -> Self {
        Self::Attribute {
            name: name.into(),
            value: None,
        }
    }

    pub fn child_equals(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Child {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn has_child(name: impl Into<String>) -> Self {
        Self::Child {
            name: name.into(),
            value: None,
        }
    }

    fn holds(&self, element: ElementRef<'_>) -> bool {
        match self {
            Self::Attribute { name, value } => match value {
                Some(expected) => element.attribute(name) == Some(expected.as_str()),
                None => element.has_attribute(name),
            },
            Self::Child { name, value } => match value {
                Some(expected) => {
                    element.attribute(name) == Some(expected.as_str())
                        || element
                            .child_elements()
                            .any(|child| child.name() == name && child.text() == *expected)
                }
                None => {
                    element.has_attribute(name)
                        || element.child_elements().any(|child| child.name() == name)
                }
            },
        }
    }
}

/// A tag-name test with an optional AND-joined predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    axis: Axis,
    name: String,
    predicates: Vec<Term>,
}

impl Step {
    pub fn child(name: impl Into<String>) -> Self {
        Self {
            axis: Axis::Child,
            name: name.into(),
            predicates: Vec::new(),
        }
    }

    pub fn descendant(name: impl Into<String>) -> Self {
        Self {
            axis: Axis::Descendant,
            name: name.into(),
            predicates: Vec::new(),
        }
    }

    /// Add a predicate term; all terms of a step must hold
    pub fn with(mut self, term: Term) -> Self {
        self.predicates.push(term);
        self
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn predicates(&self) -> &[Term] {
        &self.predicates
    }

    fn matches(&self, element: ElementRef<'_>) -> bool {
        element.name() == self.name && self.predicates.iter().all(|term| term.holds(element))
    }

    fn select_from_document<'a>(&self, document: &'a Document) -> Vec<ElementRef<'a>> {
        match self.axis {
            Axis::Child => {
                let root = document.root();
                if self.matches(root) {
                    vec![root]
                } else {
                    Vec::new()
                }
            }
            Axis::Descendant => document.elements().filter(|e| self.matches(*e)).collect(),
        }
    }

    fn select_from<'a>(&self, context: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        match self.axis {
            Axis::Child => context
                .child_elements()
                .filter(|e| self.matches(*e))
                .collect(),
            Axis::Descendant => context.descendants().filter(|e| self.matches(*e)).collect(),
        }
    }

    /// Ordered union of this step applied to every candidate
    fn apply<'a>(&self, candidates: &[ElementRef<'a>]) -> Vec<ElementRef<'a>> {
        let mut selected: Vec<ElementRef<'a>> = candidates
            .iter()
            .flat_map(|candidate| self.select_from(*candidate))
            .collect();
        selected.sort_by_key(|element| element.id());
        selected.dedup_by_key(|element| element.id());
        selected
    }
}

/// A compiled, reusable path expression such as `beans/bean[@class='x']`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathQuery {
    absolute: bool,
    steps: Vec<Step>,
}

impl PathQuery {
    /// Compile the textual query syntax
    pub fn compile(source: &str) -> GuardianResult<Self> {
        parser::parse(source)
    }

    /// Build a relative query from steps
    pub fn from_steps(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            absolute: false,
            steps: steps.into_iter().collect(),
        }
    }

    /// Anchor the query at the document even when evaluated from an element
    pub fn anchored(mut self) -> Self {
        self.absolute = true;
        self
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Evaluate from the document node: the first step is tested against the root element
    pub fn evaluate<'a>(&self, document: &'a Document) -> Vec<ElementRef<'a>> {
        self.run(document, None)
    }

    /// Evaluate within `context`: the first step is tested against its children
    /// (or descendants), unless the query is anchored at the document
    pub fn evaluate_from<'a>(&self, context: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        if self.absolute {
            self.run(context.document(), None)
        } else {
            self.run(context.document(), Some(context))
        }
    }

    /// Whether evaluating from `context` yields at least one element
    pub fn matches_within(&self, context: ElementRef<'_>) -> bool {
        !self.evaluate_from(context).is_empty()
    }

    fn run<'a>(
        &self,
        document: &'a Document,
        context: Option<ElementRef<'a>>,
    ) -> Vec<ElementRef<'a>> {
        let mut steps = self.steps.iter();
        let Some(first) = steps.next() else {
            return Vec::new();
        };

        let mut candidates = match context {
            Some(context) => first.select_from(context),
            None => first.select_from_document(document),
        };

        for step in steps {
            if candidates.is_empty() {
                break;
            }
            candidates = step.apply(&candidates);
        }

        candidates
    }
}

impl FromStr for PathQuery {
    type Err = crate::domain::violations::GuardianError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

impl fmt::Display for PathQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, step) in self.steps.iter().enumerate() {
            let separator = match (index, step.axis, self.absolute) {
                (0, Axis::Child, false) => "",
                (0, Axis::Descendant, false) => ".//",
                (_, Axis::Child, _) => "/",
                (_, Axis::Descendant, _) => "//",
            };
            write!(f, "{separator}{step}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.predicates.is_empty() {
            return Ok(());
        }

        f.write_str("[")?;
        for (index, term) in self.predicates.iter().enumerate() {
            if index > 0 {
                f.write_str(" and ")?;
            }
            write!(f, "{term}")?;
        }
        f.write_str("]")
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (prefix, name, value) = match self {
            Self::Attribute { name, value } => ("@", name, value),
            Self::Child { name, value } => ("", name, value),
        };
        write!(f, "{prefix}{name}")?;
        if let Some(value) = value {
            let quote = if value.contains('\'') { '"' } else { '\'' };
            write!(f, "={quote}{value}{quote}")?;
        }
        Ok(())
    }
}
