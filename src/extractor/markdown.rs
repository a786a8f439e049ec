// HTML to Markdown conversion
// Recursive descent over the parsed fragment, depth-limited, with an
// images appendix replacing inline images

use scraper::{ElementRef, Html, Node};
use tracing::warn;

use super::clean::SKIP_TAGS;
use super::images::DescribedImage;

/// Recursion ceiling; pathological nesting logs and stops descending
const MAX_DEPTH: usize = 20;

/// Convert an HTML fragment to markdown body text
pub fn convert_fragment(fragment_html: &str) -> String {
    let doc = Html::parse_fragment(fragment_html);
    let mut out = String::new();
    convert_children(doc.root_element(), &mut out, 0);
    out
}

/// Assemble the full document: title header, optional author line, body,
/// and the images appendix.
pub fn render_document(
    title: &str,
    author: &str,
    body_markdown: &str,
    images: &[DescribedImage],
) -> String {
    let mut md = String::new();

    md.push_str("# ");
    md.push_str(title);
    md.push_str("\n\n");

    if !author.is_empty() {
        md.push_str("**Author:** ");
        md.push_str(author);
        md.push_str("\n\n");
    }

    md.push_str("---\n\n");
    md.push_str(body_markdown);

    if !images.is_empty() {
        md.push_str("\n\n---\n\n## Images\n\n");

        for (index, image) in images.iter().enumerate() {
            md.push_str(&format!("### Image {}/{}\n\n", index + 1, images.len()));
            md.push_str("**[AI-Generated Description]**\n\n");
            md.push_str(&image.description);
            md.push_str("\n\n");
            md.push_str(&format!("*Source: {}*\n\n", image.url));

            if !image.alt.is_empty() {
                md.push_str(&format!("*Alt text: {}*\n\n", image.alt));
            }

            md.push_str("---\n\n");
        }
    }

    md
}

fn convert_children(el: ElementRef<'_>, out: &mut String, depth: usize) {
    if depth > MAX_DEPTH {
        warn!(depth, "Markdown conversion hit depth limit");
        return;
    }

    for child in el.children() {
        match child.value() {
            Node::Text(text) => append_text(text, out),
            Node::Element(element) => {
                let name = element.name().to_string();
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                convert_element(&name, child_el, out, depth);
            }
            _ => {}
        }
    }
}

fn append_text(text: &str, out: &mut String) {
    let text = text.trim();
    if !text.is_empty() {
        out.push_str(text);
        if !text.ends_with(['.', ',', '!', '?']) {
            out.push(' ');
        }
    }
}

fn convert_element(name: &str, el: ElementRef<'_>, out: &mut String, depth: usize) {
    match name {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = name[1..].parse::<usize>().unwrap_or(1);
            out.push_str("\n\n");
            out.push_str(&"#".repeat(level));
            out.push(' ');
            out.push_str(collect_text(el).trim());
            out.push_str("\n\n");
        }
        "p" => {
            out.push_str("\n\n");
            convert_children(el, out, depth + 1);
            out.push_str("\n\n");
        }
        "br" => out.push_str("  \n"),
        "strong" | "b" => {
            out.push_str("**");
            convert_children(el, out, depth + 1);
            out.push_str("**");
        }
        "em" | "i" => {
            out.push('*');
            convert_children(el, out, depth + 1);
            out.push('*');
        }
        "code" => {
            out.push('`');
            out.push_str(&collect_text(el));
            out.push('`');
        }
        "pre" => {
            out.push_str("\n\n```\n");
            out.push_str(&collect_text(el));
            out.push_str("\n```\n\n");
        }
        "blockquote" => {
            out.push_str("\n\n> ");
            out.push_str(&collect_text(el).trim().replace('\n', "\n> "));
            out.push_str("\n\n");
        }
        "ul" | "ol" => {
            out.push_str("\n\n");
            render_list(el, name == "ol", out, depth, 0);
            out.push('\n');
        }
        "a" => {
            let text = collect_text(el).trim().to_string();
            match el.value().attr("href") {
                Some(href) if !text.is_empty() => {
                    out.push('[');
                    out.push_str(&text);
                    out.push_str("](");
                    out.push_str(href);
                    out.push(')');
                }
                _ if !text.is_empty() => out.push_str(&text),
                _ => {}
            }
        }
        "hr" => out.push_str("\n\n---\n\n"),
        // Inline images are skipped; the appendix carries them
        "img" => {}
        _ if SKIP_TAGS.contains(&name) => {}
        // div, section, article, main, span, and anything unknown: recurse
        _ => convert_children(el, out, depth + 1),
    }
}

/// Render a list: one line per direct `<li>` child, with nested lists
/// emitted as indented sublists under their parent item. Numbering counts
/// direct items only.
fn render_list(list: ElementRef<'_>, ordered: bool, out: &mut String, depth: usize, indent: usize) {
    if depth > MAX_DEPTH {
        warn!(depth, "Markdown conversion hit depth limit");
        return;
    }

    let items = list
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "li");

    for (index, li) in items.enumerate() {
        out.push_str(&"  ".repeat(indent));
        if ordered {
            out.push_str(&format!("{}. ", index + 1));
        } else {
            out.push_str("- ");
        }
        out.push_str(&list_item_line(li, depth));
        out.push('\n');

        for sublist in li
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|child| matches!(child.value().name(), "ul" | "ol"))
        {
            render_list(
                sublist,
                sublist.value().name() == "ol",
                out,
                depth + 1,
                indent + 1,
            );
        }
    }
}

/// One line of text for a list item, collapsed to single spaces; direct
/// nested lists are excluded here and rendered by `render_list`.
fn list_item_line(li: ElementRef<'_>, depth: usize) -> String {
    let mut item = String::new();

    for child in li.children() {
        match child.value() {
            Node::Text(text) => append_text(text, &mut item),
            Node::Element(element) => {
                let name = element.name().to_string();
                if name == "ul" || name == "ol" {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    convert_element(&name, child_el, &mut item, depth + 1);
                }
            }
            _ => {}
        }
    }

    item.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalized(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn headings_render_with_level() {
        let md = convert_fragment("<h1>One</h1><h3>Three</h3>");
        assert!(md.contains("\n\n# One\n\n"));
        assert!(md.contains("\n\n### Three\n\n"));
    }

    #[test]
    fn paragraph_with_inline_formatting() {
        let md = convert_fragment("<p>Plain <strong>bold</strong> and <em>italic</em> text.</p>");
        assert_eq!(normalized(&md), "Plain **bold** and *italic* text.");
    }

    #[test]
    fn text_spacing_follows_punctuation() {
        let md = convert_fragment("<p><span>End.</span><span>Next</span></p>");
        // No space injected after sentence-final punctuation
        assert!(md.contains("End.Next"));

        let md = convert_fragment("<p><span>word</span><span>more</span></p>");
        assert!(md.contains("word more"));
    }

    #[test]
    fn links_render_or_collapse() {
        let md = convert_fragment(r#"<a href="https://x.test">label</a>"#);
        assert!(md.contains("[label](https://x.test)"));

        let md = convert_fragment(r#"<a href="https://x.test"></a>"#);
        assert!(!md.contains("x.test"));

        let md = convert_fragment("<a>no href</a>");
        assert!(md.contains("no href"));
    }

    #[test]
    fn lists_render_with_markers() {
        let md = convert_fragment("<ul><li>alpha</li><li>beta</li></ul>");
        assert!(md.contains("- alpha\n"));
        assert!(md.contains("- beta\n"));

        let md = convert_fragment("<ol><li>first</li><li>second</li></ol>");
        assert!(md.contains("1. first\n"));
        assert!(md.contains("2. second\n"));
    }

    #[test]
    fn nested_lists_render_each_item_once() {
        let md = convert_fragment(
            "<ul><li>Item 1<ul><li>Nested A</li><li>Nested B</li></ul></li><li>Item 2</li></ul>",
        );

        assert!(md.contains("- Item 1\n  - Nested A\n  - Nested B\n- Item 2\n"));
        // Nested items belong to the sublist only, never to the outer list
        assert_eq!(md.matches("Nested A").count(), 1);
        assert_eq!(md.matches("Nested B").count(), 1);
    }

    #[test]
    fn nested_ordered_numbering_counts_direct_items_only() {
        let md = convert_fragment(
            "<ol><li>First<ol><li>Sub one</li><li>Sub two</li></ol></li><li>Second</li></ol>",
        );

        assert!(md.contains("1. First\n  1. Sub one\n  2. Sub two\n2. Second\n"));
        assert!(!md.contains("3. "));
    }

    #[test]
    fn blockquote_prefixes_every_line() {
        let md = convert_fragment("<blockquote>line one\nline two</blockquote>");
        assert!(md.contains("> line one\n> line two"));
    }

    #[test]
    fn code_and_pre_render_fenced() {
        let md = convert_fragment("<p>Use <code>cargo build</code></p>");
        assert!(md.contains("`cargo build`"));

        let md = convert_fragment("<pre>fn main() {}</pre>");
        assert!(md.contains("```\nfn main() {}\n```"));
    }

    #[test]
    fn skip_tags_and_images_are_omitted() {
        let md = convert_fragment(
            "<p>Visible</p><script>var x;</script><img src='/a.png'><nav>menu</nav>",
        );
        assert!(md.contains("Visible"));
        assert!(!md.contains("var x"));
        assert!(!md.contains("a.png"));
        assert!(!md.contains("menu"));
    }

    #[test]
    fn containers_recurse_transparently() {
        let md = convert_fragment("<div><section><p>Nested text.</p></section></div>");
        assert_eq!(normalized(&md), "Nested text.");
    }

    #[test]
    fn depth_limit_stops_descent() {
        let mut html = String::new();
        for _ in 0..30 {
            html.push_str("<div>");
        }
        html.push_str("<p>too deep</p>");
        for _ in 0..30 {
            html.push_str("</div>");
        }

        let md = convert_fragment(&html);
        assert!(!md.contains("too deep"));
    }

    #[test]
    fn hr_renders_rule() {
        assert!(convert_fragment("<hr>").contains("\n\n---\n\n"));
    }

    #[test]
    fn document_layout_with_author_and_images() {
        let images = vec![
            DescribedImage {
                url: "https://example.com/a.png".to_string(),
                alt: "a chart".to_string(),
                description: "A revenue chart.".to_string(),
            },
            DescribedImage {
                url: "https://example.com/b.png".to_string(),
                alt: String::new(),
                description: "Image: (Description unavailable)".to_string(),
            },
        ];

        let doc = render_document("My Title", "Jane Doe", "Body text.", &images);

        assert!(doc.starts_with("# My Title\n\n**Author:** Jane Doe\n\n---\n\n"));
        assert!(doc.contains("## Images"));
        assert!(doc.contains("### Image 1/2"));
        assert!(doc.contains("**[AI-Generated Description]**\n\nA revenue chart."));
        assert!(doc.contains("*Source: https://example.com/a.png*"));
        assert!(doc.contains("*Alt text: a chart*"));
        assert!(doc.contains("### Image 2/2"));
        // Second image has no alt text line
        let second = doc.split("### Image 2/2").nth(1).unwrap();
        assert!(!second.contains("*Alt text:"));
    }

    #[test]
    fn document_without_author_or_images_is_minimal() {
        let doc = render_document("Title", "", "Body.", &[]);
        assert_eq!(doc, "# Title\n\n---\n\nBody.");
    }

    #[test]
    fn reconversion_is_stable_modulo_whitespace() {
        let html = "<h1>Title</h1><p>First paragraph with <b>bold</b>.</p><p>Second.</p>";
        let first = convert_fragment(html);
        let second = convert_fragment(&first);
        assert_eq!(normalized(&first), normalized(&second));
    }
}
