use super::*;

/// Index into the arena; doubles as node identity for de-duplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NodeKind {
    Document,
    Element(Element),
    Text(String),
    Comment(String),
}

/// One source attribute. Order and the value's exact bytes are preserved;
/// names are stored lowercased since HTML attribute names are
/// case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Attr {
    pub(crate) name: String,
    pub(crate) value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Element {
    pub(crate) tag: String,
    pub(crate) attrs: Vec<Attr>,
}

impl Element {
    pub(crate) fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
            .map(|attr| attr.value.as_str())
    }

    pub(crate) fn has_attr(&self, name: &str) -> bool {
        self.attrs
            .iter()
            .any(|attr| attr.name.eq_ignore_ascii_case(name))
    }

    pub(crate) fn has_class(&self, class_name: &str) -> bool {
        self.attr("class")
            .map(|classes| classes.split_whitespace().any(|c| c == class_name))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) kind: NodeKind,
}

/// Arena-backed document tree. Nodes own their children through indices;
/// the parent link is a plain back-index, so the tree stays a rooted forest
/// with a single owner. Read-only once parsing finishes.
#[derive(Debug, Clone)]
pub struct Dom {
    pub(crate) nodes: Vec<Node>,
    root: NodeId,
}

impl Dom {
    pub(crate) fn new() -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Document,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn create_node(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub(crate) fn create_element(
        &mut self,
        parent: NodeId,
        tag: String,
        attrs: Vec<Attr>,
    ) -> NodeId {
        self.create_node(parent, NodeKind::Element(Element { tag, attrs }))
    }

    pub(crate) fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.create_node(parent, NodeKind::Text(text))
    }

    pub(crate) fn create_comment(&mut self, parent: NodeId, text: String) -> NodeId {
        self.create_node(parent, NodeKind::Comment(text))
    }

    pub(crate) fn element(&self, node_id: NodeId) -> Option<&Element> {
        match &self.nodes[node_id.0].kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn tag_name(&self, node_id: NodeId) -> Option<&str> {
        self.element(node_id).map(|e| e.tag.as_str())
    }

    pub fn attr(&self, node_id: NodeId, name: &str) -> Option<&str> {
        self.element(node_id).and_then(|e| e.attr(name))
    }

    pub fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes[node_id.0].parent
    }

    pub fn children(&self, node_id: NodeId) -> &[NodeId] {
        &self.nodes[node_id.0].children
    }

    pub(crate) fn previous_element_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        let parent = self.parent(node_id)?;
        let children = &self.nodes[parent.0].children;
        let pos = children.iter().position(|id| *id == node_id)?;
        for sibling in children[..pos].iter().rev() {
            if self.element(*sibling).is_some() {
                return Some(*sibling);
            }
        }
        None
    }

    pub(crate) fn next_element_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        let parent = self.parent(node_id)?;
        let children = &self.nodes[parent.0].children;
        let pos = children.iter().position(|id| *id == node_id)?;
        for sibling in children.iter().skip(pos + 1) {
            if self.element(*sibling).is_some() {
                return Some(*sibling);
            }
        }
        None
    }

    /// Concatenation of every Text descendant in document order, no
    /// separators added.
    pub fn text_content(&self, node_id: NodeId) -> String {
        match &self.nodes[node_id.0].kind {
            NodeKind::Document | NodeKind::Element(_) => {
                let mut out = String::new();
                for child in &self.nodes[node_id.0].children {
                    let text =
                        stacker::maybe_grow(64 * 1024, 4 * 1024 * 1024, || {
                            self.text_content(*child)
                        });
                    out.push_str(&text);
                }
                out
            }
            NodeKind::Text(text) => text.clone(),
            NodeKind::Comment(_) => String::new(),
        }
    }

    /// Every Element node under (and including) `node_id`, pre-order DFS.
    pub fn collect_elements(&self, node_id: NodeId, out: &mut Vec<NodeId>) {
        if self.element(node_id).is_some() {
            out.push(node_id);
        }
        for child in &self.nodes[node_id.0].children {
            stacker::maybe_grow(64 * 1024, 4 * 1024 * 1024, || {
                self.collect_elements(*child, out);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Dom {
        // <ul><li id="a">x</li><!-- note --><li class="b c">y</li></ul>
        let mut dom = Dom::new();
        let ul = dom.create_element(dom.root(), "ul".into(), Vec::new());
        let li_a = dom.create_element(
            ul,
            "li".into(),
            vec![Attr {
                name: "id".into(),
                value: "a".into(),
            }],
        );
        dom.create_text(li_a, "x".into());
        dom.create_comment(ul, " note ".into());
        let li_b = dom.create_element(
            ul,
            "li".into(),
            vec![Attr {
                name: "class".into(),
                value: "b c".into(),
            }],
        );
        dom.create_text(li_b, "y".into());
        dom
    }

    #[test]
    fn element_siblings_skip_text_and_comment_nodes() {
        let dom = sample();
        let mut elements = Vec::new();
        dom.collect_elements(dom.root(), &mut elements);
        assert_eq!(elements.len(), 3);

        let li_a = elements[1];
        let li_b = elements[2];
        assert_eq!(dom.next_element_sibling(li_a), Some(li_b));
        assert_eq!(dom.previous_element_sibling(li_b), Some(li_a));
        assert_eq!(dom.previous_element_sibling(li_a), None);
        assert_eq!(dom.next_element_sibling(li_b), None);
    }

    #[test]
    fn text_content_concatenates_in_document_order() {
        let dom = sample();
        assert_eq!(dom.text_content(dom.root()), "xy");
    }

    #[test]
    fn attr_lookup_is_case_insensitive() {
        let dom = sample();
        let mut elements = Vec::new();
        dom.collect_elements(dom.root(), &mut elements);
        assert_eq!(dom.attr(elements[1], "ID"), Some("a"));
        assert!(dom.element(elements[2]).unwrap().has_class("b"));
        assert!(dom.element(elements[2]).unwrap().has_class("c"));
        assert!(!dom.element(elements[2]).unwrap().has_class("d"));
    }
}
