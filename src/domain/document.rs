//! In-memory markup tree that rules evaluate against
//!
//! Architecture: Aggregate Root - Document owns every node of one parsed file
//! - Nodes live in an arena in document (pre-)order; `NodeId` is the only link between them
//! - Parent links are plain ids, so ownership stays strictly top-down with no cycles
//! - ElementRef is a cheap borrowed view used by the query engine and the rules

use crate::domain::violations::{GuardianError, GuardianResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Index of a node inside its document arena.
///
/// Ids are handed out in document order, so comparing two ids of the same
/// document compares their position in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in the arena
    pub fn index(self) -> usize {
        self.0
    }
}

/// 1-based source position of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Hash)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        name: String,
        attributes: BTreeMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// One past the last arena index belonging to this node's subtree
    subtree_end: usize,
    location: Location,
}

/// A parsed, namespace-unaware markup document
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl Document {
    /// The single root element
    pub fn root(&self) -> ElementRef<'_> {
        ElementRef {
            document: self,
            id: self.root,
        }
    }

    /// Look up an element by id; text nodes and foreign ids yield `None`
    pub fn get(&self, id: NodeId) -> Option<ElementRef<'_>> {
        match self.nodes.get(id.0)?.kind {
            NodeKind::Element { .. } => Some(ElementRef { document: self, id }),
            NodeKind::Text(_) => None,
        }
    }

    /// Every element of the document in document order
    pub fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> + '_ {
        (0..self.nodes.len()).filter_map(move |index| self.get(NodeId(index)))
    }

    /// Number of elements in the document
    pub fn element_count(&self) -> usize {
        self.elements().count()
    }

    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }
}

/// A child node as seen from its parent
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Child<'a> {
    Element(ElementRef<'a>),
    Text(&'a str),
}

/// Borrowed view of one element
#[derive(Clone, Copy)]
pub struct ElementRef<'a> {
    document: &'a Document,
    id: NodeId,
}

impl<'a> ElementRef<'a> {
    pub fn id(self) -> NodeId {
        self.id
    }

    pub fn document(self) -> &'a Document {
        self.document
    }

    /// Tag name exactly as written, prefix included
    pub fn name(self) -> &'a str {
        match &self.data().kind {
            NodeKind::Element { name, .. } => name,
            NodeKind::Text(_) => "",
        }
    }

    /// Value of the attribute with exactly this name, if present
    pub fn attribute(self, name: &str) -> Option<&'a str> {
        self.attribute_map()
            .and_then(|attributes| attributes.get(name))
            .map(String::as_str)
    }

    pub fn has_attribute(self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Handle on a (possibly absent) attribute of this element
    pub fn attribute_ref(self, name: &'a str) -> AttributeRef<'a> {
        AttributeRef {
            element: self,
            name,
        }
    }

    /// All attributes, ordered by name
    pub fn attributes(self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.attribute_map()
            .into_iter()
            .flat_map(|attributes| attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Direct children (elements and text) in source order
    pub fn children(self) -> impl Iterator<Item = Child<'a>> + 'a {
        let document = self.document;
        self.data().children.iter().map(move |&id| match &document.node(id).kind {
            NodeKind::Element { .. } => Child::Element(ElementRef { document, id }),
            NodeKind::Text(text) => Child::Text(text),
        })
    }

    /// Direct child elements in source order
    pub fn child_elements(self) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        self.children().filter_map(|child| match child {
            Child::Element(element) => Some(element),
            Child::Text(_) => None,
        })
    }

    /// Every element below this one, in document order, excluding itself
    pub fn descendants(self) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        let document = self.document;
        (self.id.0 + 1..self.data().subtree_end)
            .filter_map(move |index| document.get(NodeId(index)))
    }

    pub fn parent(self) -> Option<ElementRef<'a>> {
        self.data().parent.map(|id| ElementRef {
            document: self.document,
            id,
        })
    }

    pub fn location(self) -> Location {
        self.data().location
    }

    /// String value: all descendant text concatenated in document order
    pub fn text(self) -> String {
        (self.id.0 + 1..self.data().subtree_end)
            .filter_map(|index| match &self.document.nodes[index].kind {
                NodeKind::Text(text) => Some(text.as_str()),
                NodeKind::Element { .. } => None,
            })
            .collect()
    }

    fn data(self) -> &'a NodeData {
        self.document.node(self.id)
    }

    fn attribute_map(self) -> Option<&'a BTreeMap<String, String>> {
        match &self.data().kind {
            NodeKind::Element { attributes, .. } => Some(attributes),
            NodeKind::Text(_) => None,
        }
    }
}

impl PartialEq for ElementRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.document, other.document) && self.id == other.id
    }
}

impl Eq for ElementRef<'_> {}

impl fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementRef")
            .field("id", &self.id.0)
            .field("name", &self.name())
            .field("location", &self.location())
            .finish()
    }
}

/// An (element, attribute name) pair that can be tested without copying the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeRef<'a> {
    element: ElementRef<'a>,
    name: &'a str,
}

impl<'a> AttributeRef<'a> {
    pub fn element(self) -> ElementRef<'a> {
        self.element
    }

    pub fn name(self) -> &'a str {
        self.name
    }

    pub fn value(self) -> Option<&'a str> {
        self.element.attribute(self.name)
    }

    pub fn is_present(self) -> bool {
        self.value().is_some()
    }

    /// Present and exactly equal to `expected` (no case folding, no trimming)
    pub fn has_value(self, expected: &str) -> bool {
        self.value() == Some(expected)
    }
}

/// Event-style builder used by parsers to produce a [`Document`]
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    nodes: Vec<NodeData>,
    open: Vec<NodeId>,
    root: Option<NodeId>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new element as the last child of the current element
    pub fn start_element(
        &mut self,
        name: impl Into<String>,
        location: Location,
    ) -> GuardianResult<NodeId> {
        let name = name.into();
        if name.is_empty() {
            return Err(GuardianError::document(format!(
                "empty element name at {location}"
            )));
        }

        let parent = self.open.last().copied();
        if parent.is_none() && self.root.is_some() {
            return Err(GuardianError::document(format!(
                "second root element <{name}> at {location}"
            )));
        }

        let element = NodeKind::Element {
            name,
            attributes: BTreeMap::new(),
        };
        let id = self.push(element, parent, location);
        if parent.is_none() {
            self.root = Some(id);
        }
        self.open.push(id);
        Ok(id)
    }

    /// Add an attribute to the element currently open
    pub fn attribute(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> GuardianResult<()> {
        let name = name.into();
        let current = self.open.last().copied().ok_or_else(|| {
            GuardianError::document(format!("attribute '{name}' outside of an element"))
        })?;

        let node = &mut self.nodes[current.0];
        if let NodeKind::Element {
            name: element,
            attributes,
        } = &mut node.kind
        {
            if attributes.contains_key(&name) {
                return Err(GuardianError::document(format!(
                    "duplicate attribute '{name}' on <{element}> at {}",
                    node.location
                )));
            }
            attributes.insert(name, value.into());
        }
        Ok(())
    }

    /// Append character data to the element currently open.
    ///
    /// Whitespace outside the root element is ignored; any other text there
    /// is an error.
    pub fn text(&mut self, content: impl Into<String>, location: Location) -> GuardianResult<()> {
        let content = content.into();
        match self.open.last().copied() {
            Some(parent) => {
                self.push(NodeKind::Text(content), Some(parent), location);
                Ok(())
            }
            None if content.trim().is_empty() => Ok(()),
            None => Err(GuardianError::document(format!(
                "text outside of the root element at {location}"
            ))),
        }
    }

    /// Close the element currently open
    pub fn end_element(&mut self) -> GuardianResult<NodeId> {
        let id = self
            .open
            .pop()
            .ok_or_else(|| GuardianError::document("closing tag without an open element"))?;
        self.nodes[id.0].subtree_end = self.nodes.len();
        Ok(id)
    }

    /// Name of the element currently open, if any
    pub fn current_element(&self) -> Option<&str> {
        self.open.last().and_then(|id| match &self.nodes[id.0].kind {
            NodeKind::Element { name, .. } => Some(name.as_str()),
            NodeKind::Text(_) => None,
        })
    }

    pub fn finish(self) -> GuardianResult<Document> {
        if let Some(&id) = self.open.last() {
            let node = &self.nodes[id.0];
            let name = match &node.kind {
                NodeKind::Element { name, .. } => name.as_str(),
                NodeKind::Text(_) => "",
            };
            return Err(GuardianError::document(format!(
                "element <{name}> opened at {} is never closed",
                node.location
            )));
        }

        let root = self.root.ok_or_else(|| GuardianError::document("no root element"))?;
        Ok(Document {
            nodes: self.nodes,
            root,
        })
    }

    fn push(&mut self, kind: NodeKind, parent: Option<NodeId>, location: Location) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent,
            children: Vec::new(),
            subtree_end: id.0 + 1,
            location,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }
}
