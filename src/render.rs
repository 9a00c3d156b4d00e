use super::*;
use colored::{Color, Colorize};

/// The requested shape of output derived from each matched node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Element,
    Text,
    Attribute(String),
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub projection: Projection,
    pub pretty: bool,
    pub color: bool,
    pub limit: Option<usize>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            projection: Projection::Element,
            pretty: false,
            color: false,
            limit: None,
        }
    }
}

/// Projects matched nodes to output text, one block per match, blocks
/// separated by a single newline. A match lacking the requested attribute
/// contributes no block at all — omission is how downstream pipes filter,
/// so it is deliberately not an error.
pub fn render(dom: &Dom, matches: &[NodeId], settings: &RenderSettings) -> String {
    let colors = Colorizer {
        enabled: settings.color,
    };
    let limit = settings.limit.unwrap_or(usize::MAX);

    let mut blocks = Vec::new();
    for node_id in matches.iter().take(limit) {
        match &settings.projection {
            Projection::Element => {
                let mut out = String::new();
                if settings.pretty {
                    dump_node_pretty(dom, *node_id, 0, &colors, &mut out);
                    while out.ends_with('\n') {
                        out.pop();
                    }
                } else {
                    dump_node(dom, *node_id, &colors, &mut out);
                }
                blocks.push(out);
            }
            Projection::Text => blocks.push(dom.text_content(*node_id)),
            Projection::Attribute(name) => {
                if let Some(value) = dom.attr(*node_id, name) {
                    blocks.push(value.to_string());
                }
            }
        }
    }

    blocks.join("\n")
}

struct Colorizer {
    enabled: bool,
}

impl Colorizer {
    fn paint(&self, text: &str, color: Color) -> String {
        if self.enabled {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }
}

fn dump_node(dom: &Dom, node_id: NodeId, colors: &Colorizer, out: &mut String) {
    match &dom.nodes[node_id.0].kind {
        NodeKind::Document => {
            for child in dom.children(node_id) {
                dump_node(dom, *child, colors, out);
            }
        }
        NodeKind::Text(text) => out.push_str(&escape_text(text)),
        NodeKind::Comment(text) => {
            out.push_str(&colors.paint(&format!("<!--{text}-->"), Color::Blue));
        }
        NodeKind::Element(element) => {
            out.push_str(&colors.paint(&format!("<{}", element.tag), Color::Magenta));
            for attr in &element.attrs {
                out.push(' ');
                out.push_str(&colors.paint(&attr.name, Color::Yellow));
                out.push_str(&colors.paint("=\"", Color::Magenta));
                out.push_str(&colors.paint(&escape_attr(&attr.value), Color::Green));
                out.push_str(&colors.paint("\"", Color::Magenta));
            }
            out.push_str(&colors.paint(">", Color::Magenta));

            if html::is_void_tag(&element.tag) {
                return;
            }

            let raw_text_container = matches!(element.tag.as_str(), "script" | "style");
            for child in dom.children(node_id) {
                if raw_text_container {
                    match &dom.nodes[child.0].kind {
                        NodeKind::Text(text) => out.push_str(text),
                        _ => stacker::maybe_grow(64 * 1024, 4 * 1024 * 1024, || {
                            dump_node(dom, *child, colors, out);
                        }),
                    }
                } else {
                    stacker::maybe_grow(64 * 1024, 4 * 1024 * 1024, || {
                        dump_node(dom, *child, colors, out);
                    });
                }
            }

            out.push_str(&colors.paint(&format!("</{}>", element.tag), Color::Magenta));
        }
    }
}

fn dump_node_pretty(dom: &Dom, node_id: NodeId, depth: usize, colors: &Colorizer, out: &mut String) {
    let indent = " ".repeat(depth * 2);
    match &dom.nodes[node_id.0].kind {
        NodeKind::Document => {
            for child in dom.children(node_id) {
                dump_node_pretty(dom, *child, depth, colors, out);
            }
        }
        NodeKind::Text(text) => {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                out.push_str(&indent);
                out.push_str(&escape_text(trimmed));
                out.push('\n');
            }
        }
        NodeKind::Comment(text) => {
            out.push_str(&indent);
            out.push_str(&colors.paint(&format!("<!--{text}-->"), Color::Blue));
            out.push('\n');
        }
        NodeKind::Element(element) => {
            out.push_str(&indent);
            out.push_str(&colors.paint(&format!("<{}", element.tag), Color::Magenta));
            for attr in &element.attrs {
                out.push(' ');
                out.push_str(&colors.paint(&attr.name, Color::Yellow));
                out.push_str(&colors.paint("=\"", Color::Magenta));
                out.push_str(&colors.paint(&escape_attr(&attr.value), Color::Green));
                out.push_str(&colors.paint("\"", Color::Magenta));
            }
            out.push_str(&colors.paint(">", Color::Magenta));
            out.push('\n');

            if html::is_void_tag(&element.tag) {
                return;
            }

            let raw_text_container = matches!(element.tag.as_str(), "script" | "style");
            for child in dom.children(node_id) {
                if raw_text_container {
                    if let NodeKind::Text(text) = &dom.nodes[child.0].kind {
                        let trimmed = text.trim();
                        if !trimmed.is_empty() {
                            for line in trimmed.lines() {
                                out.push_str(&" ".repeat((depth + 1) * 2));
                                out.push_str(line.trim());
                                out.push('\n');
                            }
                        }
                        continue;
                    }
                }
                stacker::maybe_grow(64 * 1024, 4 * 1024 * 1024, || {
                    dump_node_pretty(dom, *child, depth + 1, colors, out);
                });
            }

            out.push_str(&indent);
            out.push_str(&colors.paint(&format!("</{}>", element.tag), Color::Magenta));
            out.push('\n');
        }
    }
}

fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}
