//! Markdown rendering to plain text

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Parser, Tag, TagEnd};

/// Plain-text rendering of a markdown file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedMarkdown {
    /// First level-1 heading
    pub title: Option<String>,

    /// Rendered text
    pub text: String,
}

/// Render markdown to plain text, keeping headings, list items and code
pub fn render_markdown(content: &str) -> RenderedMarkdown {
    let mut rendered = RenderedMarkdown::default();
    let mut parts: Vec<String> = Vec::new();
    let mut heading: Option<(HeadingLevel, String)> = None;
    let mut code: Option<String> = None;

    for event in Parser::new(content) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                heading = Some((level, String::new()));
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, text)) = heading.take() {
                    let text = text.trim().to_string();
                    if text.is_empty() {
                        continue;
                    }
                    if rendered.title.is_none() && level == HeadingLevel::H1 {
                        rendered.title = Some(text.clone());
                    }
                    parts.push(format!("\n{}\n\n", text));
                }
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                let fence = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => format!("```{}\n", lang),
                    _ => "```\n".to_string(),
                };
                code = Some(fence);
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(mut block) = code.take() {
                    if !block.ends_with('\n') {
                        block.push('\n');
                    }
                    block.push_str("```\n\n");
                    parts.push(block);
                }
            }
            Event::Text(text) => {
                if let Some((_, ref mut h)) = heading {
                    h.push_str(&text);
                } else if let Some(ref mut block) = code {
                    block.push_str(&text);
                } else {
                    parts.push(text.to_string());
                }
            }
            Event::Code(inline) => {
                if let Some((_, ref mut h)) = heading {
                    h.push_str(&inline);
                } else {
                    parts.push(format!("`{}`", inline));
                }
            }
            Event::SoftBreak | Event::HardBreak => parts.push("\n".to_string()),
            Event::End(TagEnd::Paragraph) => parts.push("\n\n".to_string()),
            Event::Start(Tag::Item) => parts.push("- ".to_string()),
            Event::End(TagEnd::Item) => parts.push("\n".to_string()),
            Event::End(TagEnd::List(_)) => parts.push("\n".to_string()),
            _ => {}
        }
    }

    rendered.text = collapse_blank_lines(parts.concat().trim());
    rendered
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_markdown_basic() {
        let markdown = r#"
# Servo Wiring

Connect the **signal** wire to pin 9.

## Code

```cpp
servo.attach(9);
```

- Red: 5V
- Brown: GND

[Datasheet](https://example.com/sg90.pdf)
"#;

        let doc = render_markdown(markdown);

        assert_eq!(doc.title, Some("Servo Wiring".to_string()));
        assert!(doc.text.contains("Connect the signal wire to pin 9."));
        assert!(doc.text.contains("servo.attach(9);"));
        assert!(doc.text.contains("- Red: 5V"));
        assert!(doc.text.contains("Datasheet"));
        assert!(!doc.text.contains("https://example.com"));
    }

    #[test]
    fn test_title_is_first_h1_only() {
        let doc = render_markdown("## Intro\n\ntext\n\n# Real Title\n\n# Second");
        assert_eq!(doc.title, Some("Real Title".to_string()));
    }

    #[test]
    fn test_no_title_without_h1() {
        let doc = render_markdown("Just a paragraph.");
        assert_eq!(doc.title, None);
        assert_eq!(doc.text, "Just a paragraph.");
    }

    #[test]
    fn test_render_is_deterministic() {
        let md = "# A\n\nsome `code` here\n\n1. one\n2. two\n";
        assert_eq!(render_markdown(md), render_markdown(md));
    }
}
