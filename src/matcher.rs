use super::*;
use std::collections::HashSet;

/// Evaluates a selector chain against the document, returning matches in
/// document order of the final matching node, de-duplicated by node
/// identity. Total over well-formed inputs: an empty document or a
/// selector nothing satisfies yields an empty vec, never an error.
pub fn query(dom: &Dom, selector: &Selector) -> Vec<NodeId> {
    let mut candidates = Vec::new();
    dom.collect_elements(dom.root(), &mut candidates);

    let mut seen = HashSet::new();
    let mut matched = Vec::new();
    for candidate in candidates {
        if matches_chain(dom, candidate, &selector.compounds) && seen.insert(candidate) {
            matched.push(candidate);
        }
    }
    matched
}

/// The candidate must satisfy the last compound; every earlier compound
/// must then be satisfied by some strictly-higher ancestor, scanning
/// upward. Descendant semantics ask for existence of a matching ancestor
/// chain, not an exact distance.
fn matches_chain(dom: &Dom, node_id: NodeId, compounds: &[Compound]) -> bool {
    let Some((last, rest)) = compounds.split_last() else {
        return false;
    };
    if !matches_compound(dom, node_id, last) {
        return false;
    }

    let mut current = node_id;
    for compound in rest.iter().rev() {
        let mut cursor = dom.parent(current);
        let mut found = None;
        while let Some(ancestor) = cursor {
            if matches_compound(dom, ancestor, compound) {
                found = Some(ancestor);
                break;
            }
            cursor = dom.parent(ancestor);
        }
        let Some(ancestor) = found else {
            return false;
        };
        current = ancestor;
    }

    true
}

fn matches_compound(dom: &Dom, node_id: NodeId, compound: &Compound) -> bool {
    let Some(element) = dom.element(node_id) else {
        return false;
    };

    if let Some(type_name) = &compound.type_name {
        if element.tag != *type_name {
            return false;
        }
    }

    if let Some(id) = &compound.id {
        if element.attr("id") != Some(id.as_str()) {
            return false;
        }
    }

    if compound
        .classes
        .iter()
        .any(|class_name| !element.has_class(class_name))
    {
        return false;
    }

    for test in &compound.attr_tests {
        let holds = match test {
            AttrTest::Exists { name } => element.has_attr(name),
            AttrTest::Equals { name, value } => element.attr(name) == Some(value.as_str()),
            AttrTest::StartsWith { name, value } => element
                .attr(name)
                .is_some_and(|actual| actual.starts_with(value.as_str())),
            AttrTest::EndsWith { name, value } => element
                .attr(name)
                .is_some_and(|actual| actual.ends_with(value.as_str())),
            AttrTest::Contains { name, value } => element
                .attr(name)
                .is_some_and(|actual| actual.contains(value.as_str())),
        };
        if !holds {
            return false;
        }
    }

    for pseudo in &compound.pseudo_classes {
        let holds = match pseudo {
            PseudoClass::FirstChild => dom.previous_element_sibling(node_id).is_none(),
            PseudoClass::LastChild => dom.next_element_sibling(node_id).is_none(),
        };
        if !holds {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn select(html: &str, selector: &str) -> Vec<String> {
        let dom = parse_html(html).unwrap();
        let chain = parse_selector(selector).unwrap();
        query(&dom, &chain)
            .into_iter()
            .map(|id| {
                let tag = dom.tag_name(id).unwrap();
                match dom.attr(id, "id") {
                    Some(node_id) => format!("{tag}#{node_id}"),
                    None => tag.to_string(),
                }
            })
            .collect()
    }

    #[test]
    fn single_compound_walks_document_order() {
        let found = select(
            r#"<div id="a"><p id="b"></p></div><p id="c"></p>"#,
            "p",
        );
        assert_eq!(found, vec!["p#b", "p#c"]);
    }

    #[test]
    fn class_constraint_requires_every_class() {
        let html = r#"<ul><li id="a" class="x">1</li><li id="b" class="x y">2</li></ul>"#;
        assert_eq!(select(html, "li.x"), vec!["li#a", "li#b"]);
        assert_eq!(select(html, "li.x.y"), vec!["li#b"]);
        assert_eq!(select(html, "li.z"), Vec::<String>::new());
    }

    #[test]
    fn descendant_chain_matches_at_any_depth() {
        let html = r#"
            <section id="top">
              <div><article><span id="deep">x</span></article></div>
            </section>
            <span id="outside">y</span>
        "#;
        assert_eq!(select(html, "section span"), vec!["span#deep"]);
        assert_eq!(select(html, "section div article span"), vec!["span#deep"]);
        assert_eq!(select(html, "article section span"), Vec::<String>::new());
    }

    #[test]
    fn candidates_emit_in_document_order_of_the_final_node() {
        let html = r#"
            <div id="one"><span id="s1"></span></div>
            <div id="two"><span id="s2"></span><span id="s3"></span></div>
        "#;
        assert_eq!(select(html, "div span"), vec!["span#s1", "span#s2", "span#s3"]);
    }

    #[test]
    fn id_chain_emits_each_node_once() {
        // Both ancestors carry the same class, so the inner span's ancestor
        // chain can be satisfied two ways; the span must still appear once.
        let html = r#"<div class="w" id="outer"><div class="w" id="inner"><span id="s">x</span></div></div>"#;
        assert_eq!(select(html, "div.w span"), vec!["span#s"]);
    }

    #[test]
    fn attribute_operators_use_literal_bytes() {
        let html = r#"<a id="l" href="http://x.com/page">l</a>"#;
        assert_eq!(select(html, r#"a[href^="http://x"]"#), vec!["a#l"]);
        assert_eq!(select(html, r#"a[href$=".org"]"#), Vec::<String>::new());
        assert_eq!(select(html, r#"a[href*="x.com"]"#), vec!["a#l"]);
        assert_eq!(select(html, r#"a[href="http://x.com/page"]"#), vec!["a#l"]);
        assert_eq!(select(html, r#"a[href="HTTP://x.com/page"]"#), Vec::<String>::new());
        assert_eq!(select(html, "a[href]"), vec!["a#l"]);
        assert_eq!(select(html, "a[target]"), Vec::<String>::new());
    }

    #[test]
    fn exists_matches_a_superset_of_every_valued_operator() {
        let html = r#"
            <a id="a1" href="http://x.com">1</a>
            <a id="a2" href="mailto:x@y.z">2</a>
            <a id="a3">3</a>
        "#;
        let exists = select(html, "a[href]");
        for valued in [
            r#"a[href="http://x.com"]"#,
            r#"a[href^="http"]"#,
            r#"a[href$=".com"]"#,
            r#"a[href*="x"]"#,
        ] {
            for found in select(html, valued) {
                assert!(exists.contains(&found), "{valued} escaped [href]");
            }
        }
    }

    #[test]
    fn first_and_last_child_skip_text_and_comment_siblings() {
        let html = r#"<ul>text<li id="a">1</li><!-- x --><li id="b">2</li><li id="c">3</li>tail</ul>"#;
        assert_eq!(select(html, "li:first-child"), vec!["li#a"]);
        assert_eq!(select(html, "li:last-child"), vec!["li#c"]);
        assert_eq!(select(html, "li:first-child:last-child"), Vec::<String>::new());
    }

    #[test]
    fn only_element_child_is_both_first_and_last() {
        let html = r#"<div><p id="only">x</p></div>"#;
        assert_eq!(select(html, "p:first-child:last-child"), vec!["p#only"]);
    }

    #[test]
    fn tag_match_is_case_sensitive_against_captured_tag() {
        // The parser captures tags lowercased, so an uppercase type name
        // never matches.
        let html = "<DIV>x</DIV>";
        assert_eq!(select(html, "div"), vec!["div"]);
        assert_eq!(select(html, "DIV"), Vec::<String>::new());
    }

    #[test]
    fn empty_document_yields_empty_result() {
        assert_eq!(select("", "div"), Vec::<String>::new());
        assert_eq!(select("plain text only", "div"), Vec::<String>::new());
    }
}
