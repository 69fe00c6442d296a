use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

pub type NodeId = usize;

/// Elements whose content never shows up in rendered text
const SKIPPED_TAGS: &[&str] = &[
    "head", "script", "style", "noscript", "template", "svg", "title",
];

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "pre", "section", "table", "tbody", "thead", "tr", "ul",
];

#[derive(Debug, Clone)]
pub enum DomNode {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Slot {
    node: DomNode,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

/// Arena copy of the document tree (elements and text only). Node ids follow
/// document order.
#[derive(Debug, Clone, Default)]
pub struct DomTree {
    slots: Vec<Slot>,
    roots: Vec<NodeId>,
}

impl DomTree {
    pub fn from_document(document: &Html) -> Self {
        let mut tree = DomTree::default();
        let mut stack = vec![(document.tree.root(), None)];

        while let Some((node, parent)) = stack.pop() {
            let data = match node.value() {
                Node::Element(el) => DomNode::Element {
                    tag: el.name().to_ascii_lowercase(),
                    attrs: el
                        .attrs()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                },
                Node::Text(text) => DomNode::Text(text.to_string()),
                Node::Document | Node::Fragment => {
                    // Transparent: children hang off the same parent
                    for child in node.children().rev() {
                        stack.push((child, parent));
                    }
                    continue;
                }
                _ => continue,
            };

            let id = tree.push(data, parent);
            for child in node.children().rev() {
                stack.push((child, Some(id)));
            }
        }

        tree
    }

    fn push(&mut self, node: DomNode, parent: Option<NodeId>) -> NodeId {
        let id = self.slots.len();
        let siblings = match parent {
            Some(p) => &mut self.slots[p].children,
            None => &mut self.roots,
        };
        let prev = siblings.last().copied();
        siblings.push(id);

        if let Some(prev) = prev {
            self.slots[prev].next_sibling = Some(id);
        }
        self.slots.push(Slot {
            node,
            parent,
            children: Vec::new(),
            prev_sibling: prev,
            next_sibling: None,
        });
        id
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id].parent
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id].prev_sibling
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id].next_sibling
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.slots[id].node {
            DomNode::Element { tag, .. } => Some(tag),
            DomNode::Text(_) => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.slots[id].node {
            DomNode::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            DomNode::Text(_) => None,
        }
    }

    /// Element ids in document order
    pub fn elements(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.slots.len()).filter(|&id| self.tag(id).is_some())
    }

    /// Next node after `id` that is not one of its descendants: the next
    /// sibling, or the next sibling of the closest ancestor that has one.
    pub fn next_in_flow(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            if let Some(next) = self.next_sibling(current) {
                return Some(next);
            }
            current = self.parent(current)?;
        }
    }

    /// Text held directly by the node (its own text children), whitespace
    /// collapsed
    pub fn own_text(&self, id: NodeId) -> String {
        match &self.slots[id].node {
            DomNode::Text(text) => collapse_whitespace(text),
            DomNode::Element { .. } => {
                let joined = self.slots[id]
                    .children
                    .iter()
                    .filter_map(|&c| match &self.slots[c].node {
                        DomNode::Text(text) => Some(text.as_str()),
                        DomNode::Element { .. } => None,
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                collapse_whitespace(&joined)
            }
        }
    }

    /// First element in document order whose own text satisfies `predicate`
    pub fn find_heading<F>(&self, predicate: F) -> Option<NodeId>
    where
        F: Fn(&str) -> bool,
    {
        self.elements().find(|&id| {
            let text = self.own_text(id);
            !text.is_empty() && predicate(&text)
        })
    }

    /// innerText-style rendering of one node
    pub fn text_of(&self, id: NodeId) -> String {
        self.render(&[id])
    }

    /// innerText-style rendering of the whole tree
    pub fn full_text(&self) -> String {
        self.render(&self.roots)
    }

    fn is_skipped(&self, id: NodeId) -> bool {
        match self.tag(id) {
            Some(tag) => SKIPPED_TAGS.contains(&tag) || self.attr(id, "hidden").is_some(),
            None => false,
        }
    }

    fn breaks_around(tag: &str) -> usize {
        if tag == "p" {
            2
        } else if BLOCK_TAGS.contains(&tag) {
            1
        } else {
            0
        }
    }

    fn render(&self, starts: &[NodeId]) -> String {
        enum Visit {
            Enter(NodeId),
            Leave(usize),
        }

        let mut sink = TextSink::default();
        let mut stack: Vec<Visit> = starts.iter().rev().map(|&id| Visit::Enter(id)).collect();

        while let Some(visit) = stack.pop() {
            let id = match visit {
                Visit::Leave(breaks) => {
                    sink.boundary(breaks);
                    continue;
                }
                Visit::Enter(id) => id,
            };

            match &self.slots[id].node {
                DomNode::Text(text) => sink.push_text(text),
                DomNode::Element { tag, .. } => {
                    if self.is_skipped(id) {
                        continue;
                    }
                    if tag == "br" {
                        sink.line_break();
                        continue;
                    }
                    let breaks = Self::breaks_around(tag);
                    sink.boundary(breaks);
                    stack.push(Visit::Leave(breaks));
                    for &child in self.slots[id].children.iter().rev() {
                        stack.push(Visit::Enter(child));
                    }
                }
            }
        }

        sink.out
    }
}

/// Accumulates rendered text, deferring separators until the next visible
/// character so output never starts or ends with them
#[derive(Default)]
struct TextSink {
    out: String,
    pending_breaks: usize,
    pending_space: bool,
}

impl TextSink {
    fn boundary(&mut self, breaks: usize) {
        self.pending_breaks = self.pending_breaks.max(breaks);
    }

    fn line_break(&mut self) {
        if self.out.is_empty() {
            return;
        }
        self.out.push('\n');
        self.pending_space = false;
    }

    fn push_text(&mut self, text: &str) {
        if text.trim().is_empty() {
            if !text.is_empty() {
                self.pending_space = true;
            }
            return;
        }
        if text.starts_with(char::is_whitespace) {
            self.pending_space = true;
        }

        if !self.out.is_empty() {
            if self.pending_breaks > 0 {
                let trimmed = self.out.trim_end_matches(' ').len();
                self.out.truncate(trimmed);
                for _ in 0..self.pending_breaks {
                    self.out.push('\n');
                }
            } else if self.pending_space && !self.out.ends_with('\n') {
                self.out.push(' ');
            }
        }
        self.pending_breaks = 0;
        self.pending_space = false;

        self.out.push_str(&collapse_whitespace(text));
        if text.ends_with(char::is_whitespace) {
            self.pending_space = true;
        }
    }
}

/// Point-in-time view of a page, taken after expansion. Keeps the parsed
/// document for selector queries and a [`DomTree`] for ordered walks and
/// innerText-style rendering.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    url: String,
    html: String,
    document: Html,
    tree: DomTree,
    text: String,
}

impl PageSnapshot {
    pub fn parse(url: impl Into<String>, html: impl Into<String>) -> Self {
        let html = html.into();
        let document = Html::parse_document(&html);
        let tree = DomTree::from_document(&document);
        let text = tree.full_text();

        Self {
            url: url.into(),
            html,
            document,
            tree,
            text,
        }
    }

    /// Replace the computed text with text rendered by a real browser
    pub fn with_rendered_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if !text.trim().is_empty() {
            self.text = text;
        }
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn document(&self) -> &Html {
        &self.document
    }

    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    /// Full rendered text of the page
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn raw_text(&self, limit: usize) -> String {
        self.text.chars().take(limit).collect()
    }

    pub fn raw_html_excerpt(&self, limit: usize) -> String {
        self.html.chars().take(limit).collect()
    }

    /// First non-empty `content` of the `<meta>` tags matched by `css`
    pub fn meta_content(&self, css: &str) -> Result<Option<String>> {
        let selector = selector(css)?;
        Ok(self
            .document
            .select(&selector)
            .filter_map(|el| el.value().attr("content"))
            .map(str::trim)
            .find(|content| !content.is_empty())
            .map(str::to_string))
    }

    /// Absolute http(s) form of `raw`, resolved against the page URL
    pub fn resolve_url(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let resolved = match Url::parse(raw) {
            Ok(url) => url,
            Err(_) => Url::parse(&self.url).ok()?.join(raw).ok()?,
        };
        match resolved.scheme() {
            "http" | "https" => Some(resolved.to_string()),
            _ => None,
        }
    }
}

pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector `{}`: {:?}", css, e))
}

/// Visible text of a selected element on one line
pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
