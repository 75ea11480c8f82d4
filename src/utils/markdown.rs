//! Markdown to HTML conversion with highlighted code blocks.
//!
//! Fenced code blocks are highlighted with syntect using inline styles, so
//! the output needs no extra stylesheet. Blocks in an unknown language fall
//! back to plain text highlighting.

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html};
use std::sync::LazyLock;
use syntect::{
    highlighting::ThemeSet, html::highlighted_html_for_string, parsing::SyntaxSet,
};

static SYNTAXES: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEMES: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

/// Whether `name` is one of syntect's bundled themes.
pub fn is_known_theme(name: &str) -> bool {
    THEMES.themes.contains_key(name)
}

/// Convert Markdown source to HTML, highlighting code with `theme`.
pub fn to_html(markdown: &[u8], theme: &str) -> Vec<u8> {
    let text = String::from_utf8_lossy(markdown);
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_HEADING_ATTRIBUTES;

    // (language, accumulated code) while inside a code block
    let mut code: Option<(String, String)> = None;
    let mut events = Vec::new();

    for event in Parser::new_ext(&text, options) {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => {
                        info.split_whitespace().next().unwrap_or_default().to_owned()
                    }
                    CodeBlockKind::Indented => String::new(),
                };
                code = Some((lang, String::new()));
            }
            Event::Text(text) if code.is_some() => {
                if let Some((_, body)) = code.as_mut() {
                    body.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((lang, body)) = code.take() {
                    events.push(Event::Html(CowStr::from(highlight(&body, &lang, theme))));
                }
            }
            event => events.push(event),
        }
    }

    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    out.into_bytes()
}

fn highlight(code: &str, lang: &str, theme: &str) -> String {
    let syntax = SYNTAXES
        .find_syntax_by_token(lang)
        .unwrap_or_else(|| SYNTAXES.find_syntax_plain_text());
    THEMES
        .themes
        .get(theme)
        .and_then(|theme| highlighted_html_for_string(code, &SYNTAXES, syntax, theme).ok())
        .unwrap_or_else(|| format!("<pre><code>{}</code></pre>\n", escape(code)))
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html(src: &str, theme: &str) -> String {
        String::from_utf8(to_html(src.as_bytes(), theme)).unwrap()
    }

    #[test]
    fn test_basic_markdown() {
        let out = html("# Title\n\nSome *text*.", "InspiredGitHub");
        assert!(out.contains("<h1>Title</h1>"));
        assert!(out.contains("<em>text</em>"));
    }

    #[test]
    fn test_inline_html_passes_through() {
        let out = html("<div class=\"x\">raw</div>\n", "InspiredGitHub");
        assert!(out.contains("<div class=\"x\">raw</div>"));
    }

    #[test]
    fn test_code_block_is_highlighted() {
        let out = html("```rust\nfn main() {}\n```\n", "InspiredGitHub");
        assert!(out.contains("<pre style="));
        assert!(out.contains("main"));
        assert!(!out.contains("<code class=\"language-rust\">"));
    }

    #[test]
    fn test_unknown_theme_falls_back_to_plain() {
        let out = html("```\n<a>\n```\n", "no-such-theme");
        assert!(out.contains("<pre><code>&lt;a&gt;\n</code></pre>"));
    }

    #[test]
    fn test_known_themes() {
        assert!(is_known_theme("InspiredGitHub"));
        assert!(is_known_theme("base16-ocean.dark"));
        assert!(!is_known_theme("nope"));
    }
}
