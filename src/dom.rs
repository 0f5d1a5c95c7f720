//! Host Page Model
//!
//! A small mutable element tree standing in for the browser DOM. Components
//! read fields and write error markup through it; nothing else touches the page.

use std::fmt;

use serde::Serialize;

/// Handle to a node inside a [`Document`]. Only meaningful for the document
/// that created it, and only until the node is cleared away; cleared slots
/// are handed out again by later allocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Tags that never carry children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Form controls a component may validate.
pub const FIELD_TAGS: &[&str] = &["input", "select", "textarea"];

#[derive(Debug, Clone)]
struct ElementData {
    tag: String,
    attrs: Vec<(String, String)>,
    // Set once the value is changed programmatically; wins over the markup default.
    dirty_value: Option<String>,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Root,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed element tree.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    // Slots released by `clear_children`, reused before the arena grows
    free: Vec<NodeId>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: vec![],
            }],
            free: vec![],
        }
    }

    /// Build a document from an HTML fragment. Attributes keep their source
    /// order.
    pub fn parse(markup: &str) -> Self {
        let fragment = scraper::Html::parse_fragment(markup);
        let mut doc = Self::new();
        let root = doc.root();
        // parse_fragment wraps everything in a synthetic <html> element
        doc.import_children(fragment.root_element(), root);
        doc
    }

    fn import_children(&mut self, element: scraper::ElementRef<'_>, parent: NodeId) {
        for child in element.children() {
            if let Some(child_element) = scraper::ElementRef::wrap(child) {
                let el = child_element.value();
                let id = self.create_element(el.name());
                for (name, value) in el.attrs() {
                    self.set_attr(id, name, value);
                }
                self.append_child(parent, id);
                self.import_children(child_element, id);
            } else if let scraper::Node::Text(text) = child.value() {
                let id = self.create_text(&**text);
                self.append_child(parent, id);
            }
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs: vec![],
            dirty_value: None,
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let node = Node {
            kind,
            parent: None,
            children: vec![],
        };
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = node;
                id
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    /// Number of node slots held by the arena, live or free.
    pub fn allocated(&self) -> usize {
        self.nodes.len()
    }

    fn contains(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len()
    }

    // Linking a node under itself or one of its descendants would create a cycle
    fn can_link(&self, parent: NodeId, child: NodeId) -> bool {
        self.contains(parent)
            && self.contains(child)
            && child != self.root()
            && parent != child
            && !self.is_descendant(parent, child)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.can_link(parent, child) {
            return;
        }
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.can_link(parent, child) {
            return;
        }
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(0, child);
    }

    /// Drop every child of `node` and release the whole detached subtree.
    /// Ids that pointed into it must not be used afterwards.
    pub fn clear_children(&mut self, node: NodeId) {
        let Some(entry) = self.nodes.get_mut(node.0) else {
            return;
        };
        let mut released = std::mem::take(&mut entry.children);
        while let Some(child) = released.pop() {
            let slot = &mut self.nodes[child.0];
            released.append(&mut slot.children);
            *slot = Node {
                kind: NodeKind::Text(String::new()),
                parent: None,
                children: vec![],
            };
            self.free.push(child);
        }
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes.get_mut(node.0).and_then(|n| n.parent.take()) {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes.get(node.0).map_or(&[][..], |n| n.children.as_slice())
    }

    fn element(&self, node: NodeId) -> Option<&ElementData> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes.get_mut(node.0)?.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Tag name for element nodes, `None` for text and the document root.
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|el| el.tag.as_str())
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.element(node).is_some()
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?
            .attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(el) = self.element_mut(node) {
            match el.attrs.iter_mut().find(|(n, _)| n == name) {
                Some((_, v)) => *v = value.to_string(),
                None => el.attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        if let Some(el) = self.element_mut(node) {
            el.attrs.retain(|(n, _)| n != name);
        }
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attr(node, "class")
            .map_or(false, |c| c.split_whitespace().any(|t| t == class))
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if class.is_empty() || self.has_class(node, class) || !self.is_element(node) {
            return;
        }
        let updated = match self.attr(node, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
            _ => class.to_string(),
        };
        self.set_attr(node, "class", &updated);
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        let Some(existing) = self.attr(node, "class") else {
            return;
        };
        let updated = existing
            .split_whitespace()
            .filter(|t| *t != class)
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attr(node, "class", &updated);
    }

    /// All nodes below `scope` in document order, `scope` excluded.
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    pub fn is_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    /// True when the node is still reachable from the document root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        node == self.root() || self.is_descendant(node, self.root())
    }

    pub fn find_by_class(&self, scope: NodeId, class: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|n| self.has_class(*n, class))
            .collect()
    }

    pub fn find_by_tags(&self, scope: NodeId, tags: &[&str]) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|n| self.tag(*n).map_or(false, |t| tags.contains(&t)))
            .collect()
    }

    pub fn find_by_attr(&self, scope: NodeId, name: &str, value: &str) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|n| self.attr(*n, name) == Some(value))
    }

    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.find_by_attr(self.root(), "id", id)
    }

    /// Nearest element carrying `class`, starting with `node` itself.
    pub fn closest_with_class(&self, node: NodeId, class: &str) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(n) = current {
            if self.has_class(n, class) {
                return Some(n);
            }
            current = self.parent(n);
        }
        None
    }

    pub fn text_content(&self, node: NodeId) -> String {
        match self.nodes.get(node.0).map(|n| &n.kind) {
            Some(NodeKind::Text(text)) => text.clone(),
            Some(_) => self
                .children(node)
                .iter()
                .map(|c| self.text_content(*c))
                .collect(),
            None => String::new(),
        }
    }

    /// Current value of a form control, following the browser's defaults
    /// until [`Document::set_value`] is called.
    pub fn value(&self, node: NodeId) -> String {
        let Some(el) = self.element(node) else {
            return String::new();
        };
        if let Some(dirty) = &el.dirty_value {
            return dirty.clone();
        }
        match el.tag.as_str() {
            "textarea" => self.text_content(node),
            "select" => {
                let options = self.find_by_tags(node, &["option"]);
                options
                    .iter()
                    .find(|o| self.has_attr(**o, "selected"))
                    .or_else(|| options.first())
                    .map(|o| self.value(*o))
                    .unwrap_or_default()
            }
            "option" => match self.attr(node, "value") {
                Some(v) => v.to_string(),
                None => self.text_content(node).trim().to_string(),
            },
            _ => self.attr(node, "value").unwrap_or_default().to_string(),
        }
    }

    pub fn set_value(&mut self, node: NodeId, value: &str) {
        if let Some(el) = self.element_mut(node) {
            el.dirty_value = Some(value.to_string());
        }
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_node(*child, &mut out);
        }
        out
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    pub fn to_html(&self) -> String {
        self.inner_html(self.root())
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        let Some(entry) = self.nodes.get(node.0) else {
            return;
        };
        match &entry.kind {
            NodeKind::Root => out.push_str(&self.inner_html(node)),
            NodeKind::Text(text) => out.push_str(&html_escape::encode_text(text)),
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (name, value) in &el.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&el.tag.as_str()) {
                    return;
                }
                for child in &entry.children {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_structure_and_attributes() {
        let doc = Document::parse(
            r#"<form data-dough-component="Validation"><div class="form__row"><input id="input" required></div></form>"#,
        );
        let input = doc.element_by_id("input").unwrap();
        assert_eq!(doc.tag(input), Some("input"));
        assert!(doc.has_attr(input, "required"));

        let row = doc.closest_with_class(input, "form__row").unwrap();
        let form = doc.find_by_attr(doc.root(), "data-dough-component", "Validation").unwrap();
        assert!(doc.is_descendant(row, form));
    }

    #[test]
    fn test_class_manipulation() {
        let mut doc = Document::parse(r#"<div id="a" class="one two"></div>"#);
        let a = doc.element_by_id("a").unwrap();

        doc.add_class(a, "three");
        doc.add_class(a, "three");
        assert_eq!(doc.attr(a, "class"), Some("one two three"));

        doc.remove_class(a, "two");
        assert_eq!(doc.attr(a, "class"), Some("one three"));
        assert!(!doc.has_class(a, "two"));
    }

    #[test]
    fn test_control_values() {
        let mut doc = Document::parse(
            r#"<input id="i" value="x"><textarea id="t">hello</textarea>
               <select id="s"><option value="a">A</option><option selected>B</option></select>"#,
        );
        let i = doc.element_by_id("i").unwrap();
        let t = doc.element_by_id("t").unwrap();
        let s = doc.element_by_id("s").unwrap();

        assert_eq!(doc.value(i), "x");
        assert_eq!(doc.value(t), "hello");
        assert_eq!(doc.value(s), "B");

        doc.set_value(i, "");
        assert_eq!(doc.value(i), "");
    }

    #[test]
    fn test_serialization_escapes_text() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        let text = doc.create_text("<b>bold</b> & more");
        doc.append_child(p, text);
        let root = doc.root();
        doc.append_child(root, p);

        assert_eq!(doc.to_html(), "<p>&lt;b&gt;bold&lt;/b&gt; &amp; more</p>");
    }

    #[test]
    fn test_clear_children_disconnects() {
        let mut doc = Document::parse(r#"<div id="slot"><p id="old">x</p></div>"#);
        let slot = doc.element_by_id("slot").unwrap();
        let old = doc.element_by_id("old").unwrap();

        doc.clear_children(slot);
        assert!(!doc.is_connected(old));
        assert!(doc.element_by_id("old").is_none());
        assert_eq!(doc.inner_html(slot), "");
    }

    #[test]
    fn test_cleared_slots_are_reused() {
        let mut doc = Document::parse(r#"<ol id="list"></ol>"#);
        let list = doc.element_by_id("list").unwrap();

        let mut sizes = vec![];
        for round in 0..50 {
            doc.clear_children(list);
            for n in 0..3 {
                let li = doc.create_element("li");
                let text = doc.create_text(&format!("{}-{}", round, n));
                doc.append_child(li, text);
                doc.append_child(list, li);
            }
            sizes.push(doc.allocated());
        }

        assert!(sizes.iter().all(|s| *s == sizes[0]));
        assert_eq!(doc.inner_html(list), "<li>49-0</li><li>49-1</li><li>49-2</li>");
    }

    #[test]
    fn test_foreign_ids_are_ignored() {
        let mut doc = Document::parse(r#"<div id="a"></div>"#);
        let a = doc.element_by_id("a").unwrap();
        let mut big = Document::new();
        let stray = (0..10).map(|_| big.create_element("span")).last().unwrap();

        doc.append_child(a, stray);
        doc.prepend_child(stray, a);
        doc.clear_children(stray);
        doc.append_child(a, a);
        assert_eq!(doc.outer_html(stray), "");
        assert_eq!(doc.to_html(), r#"<div id="a"></div>"#);
    }

    #[test]
    fn test_attribute_source_order_is_kept() {
        let markup = r#"<form id="form" data-dough-config="{}" class="x" action="/go"></form>"#;
        assert_eq!(Document::parse(markup).to_html(), markup);
    }
}
