use crossterm::style::{ContentStyle, Stylize};
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// A rendered piece of a tutor reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Vec<Span>),
    Heading { level: u8, spans: Vec<Span> },
    Code { language: Option<String>, code: String },
    Quote(Vec<Block>),
    List { start: Option<u64>, items: Vec<Vec<Block>> },
    Rule,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Style {
    pub bold: bool,
    pub italic: bool,
    pub strike: bool,
    pub code: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub style: Style,
    pub link: Option<String>,
}

pub fn parse(input: &str) -> Vec<Block> {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let mut builder = Builder::default();
    for event in Parser::new_ext(input, options) {
        builder.event(event);
    }
    builder.finish()
}

enum Frame {
    Quote(Vec<Block>),
    List { start: Option<u64>, items: Vec<Vec<Block>> },
    Item(Vec<Block>),
}

#[derive(Default)]
struct Builder {
    blocks: Vec<Block>,
    frames: Vec<Frame>,
    inline: Vec<Span>,
    style: Style,
    link: Option<String>,
    heading: Option<u8>,
    code: Option<(Option<String>, String)>,
}

impl Builder {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => match self.code.as_mut() {
                Some((_, code)) => code.push_str(&text),
                None => self.span(text.into_string(), self.style),
            },
            Event::Code(text) => {
                let style = Style { code: true, ..self.style };
                self.span(text.into_string(), style);
            }
            Event::SoftBreak => self.span(" ".to_string(), Style::default()),
            Event::HardBreak => self.span("\n".to_string(), Style::default()),
            Event::Rule => {
                self.flush();
                self.push(Block::Rule);
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush();
                self.heading = Some(heading_level(level));
            }
            Tag::Strong => self.style.bold = true,
            Tag::Emphasis => self.style.italic = true,
            Tag::Strikethrough => self.style.strike = true,
            Tag::Link { dest_url, .. } => self.link = Some(dest_url.into_string()),
            Tag::CodeBlock(kind) => {
                self.flush();
                let language = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.trim().is_empty() => {
                        Some(lang.trim().to_string())
                    }
                    _ => None,
                };
                self.code = Some((language, String::new()));
            }
            Tag::BlockQuote(_) => {
                self.flush();
                self.frames.push(Frame::Quote(Vec::new()));
            }
            Tag::List(start) => {
                self.flush();
                self.frames.push(Frame::List {
                    start,
                    items: Vec::new(),
                });
            }
            Tag::Item => self.frames.push(Frame::Item(Vec::new())),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.flush(),
            TagEnd::Heading(_) => {
                let spans = std::mem::take(&mut self.inline);
                if let Some(level) = self.heading.take() {
                    self.push(Block::Heading { level, spans });
                }
            }
            TagEnd::Strong => self.style.bold = false,
            TagEnd::Emphasis => self.style.italic = false,
            TagEnd::Strikethrough => self.style.strike = false,
            TagEnd::Link => self.link = None,
            TagEnd::CodeBlock => {
                if let Some((language, code)) = self.code.take() {
                    let code = code.trim_end_matches('\n').to_string();
                    self.push(Block::Code { language, code });
                }
            }
            TagEnd::BlockQuote(_) => {
                self.flush();
                if let Some(Frame::Quote(inner)) = self.frames.pop() {
                    self.push(Block::Quote(inner));
                }
            }
            TagEnd::Item => {
                // Tight list items carry text without a paragraph.
                self.flush();
                if let Some(Frame::Item(blocks)) = self.frames.pop() {
                    if let Some(Frame::List { items, .. }) = self.frames.last_mut() {
                        items.push(blocks);
                    }
                }
            }
            TagEnd::List(_) => {
                self.flush();
                if let Some(Frame::List { start, items }) = self.frames.pop() {
                    self.push(Block::List { start, items });
                }
            }
            _ => {}
        }
    }

    fn span(&mut self, text: String, style: Style) {
        self.inline.push(Span {
            text,
            style,
            link: self.link.clone(),
        });
    }

    fn flush(&mut self) {
        if self.heading.is_some() || self.inline.is_empty() {
            return;
        }
        let spans = std::mem::take(&mut self.inline);
        self.push(Block::Paragraph(spans));
    }

    fn push(&mut self, block: Block) {
        match self.frames.last_mut() {
            Some(Frame::Quote(blocks)) | Some(Frame::Item(blocks)) => blocks.push(block),
            Some(Frame::List { items, .. }) => items.push(vec![block]),
            None => self.blocks.push(block),
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.heading = None;
        self.flush();
        self.blocks
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Renders a reply for a terminal. With `ansi` off only the layout is kept.
pub fn render_terminal(input: &str, ansi: bool) -> String {
    let blocks = parse(input);
    let mut out = Vec::new();
    for block in &blocks {
        out.push(render_block(block, ansi));
    }
    out.join("\n\n")
}

fn render_block(block: &Block, ansi: bool) -> String {
    match block {
        Block::Paragraph(spans) => render_spans(spans, ansi),
        Block::Heading { spans, .. } => {
            let text = render_spans(spans, false);
            paint(ContentStyle::new().bold(), text, ansi)
        }
        Block::Code { code, .. } => code
            .lines()
            .map(|line| format!("    {line}"))
            .collect::<Vec<_>>()
            .join("\n"),
        Block::Quote(inner) => inner
            .iter()
            .map(|b| render_block(b, ansi))
            .collect::<Vec<_>>()
            .join("\n")
            .lines()
            .map(|line| format!("> {line}"))
            .collect::<Vec<_>>()
            .join("\n"),
        Block::List { start, items } => {
            let mut lines = Vec::new();
            for (i, item) in items.iter().enumerate() {
                let marker = match start {
                    Some(n) => format!("{}. ", n + i as u64),
                    None => "• ".to_string(),
                };
                let indent = " ".repeat(marker.chars().count());
                let body = item
                    .iter()
                    .map(|b| render_block(b, ansi))
                    .collect::<Vec<_>>()
                    .join("\n");
                for (j, line) in body.lines().enumerate() {
                    if j == 0 {
                        lines.push(format!("{marker}{line}"));
                    } else {
                        lines.push(format!("{indent}{line}"));
                    }
                }
            }
            lines.join("\n")
        }
        Block::Rule => "─".repeat(40),
    }
}

fn render_spans(spans: &[Span], ansi: bool) -> String {
    let mut out = String::new();
    for span in spans {
        out.push_str(&paint(span.style.content_style(), span.text.clone(), ansi));
        if let Some(url) = span.link.as_deref().filter(|url| *url != span.text) {
            out.push_str(&format!(" ({url})"));
        }
    }
    out
}

fn paint(style: ContentStyle, text: String, ansi: bool) -> String {
    if ansi && style != ContentStyle::new() {
        style.apply(text).to_string()
    } else {
        text
    }
}

impl Style {
    /// Terminal attributes for this inline style. Code spans are dimmed.
    pub fn content_style(&self) -> ContentStyle {
        let mut style = ContentStyle::new();
        if self.bold {
            style = style.bold();
        }
        if self.italic {
            style = style.italic();
        }
        if self.strike {
            style = style.crossed_out();
        }
        if self.code {
            style = style.dim();
        }
        style
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bold_spans() {
        let blocks = parse("La **fotosíntesis** ocurre en *hojas*");
        match &blocks[0] {
            Block::Paragraph(spans) => {
                assert!(spans.iter().any(|s| s.style.bold && s.text == "fotosíntesis"));
                assert!(spans.iter().any(|s| s.style.italic && s.text == "hojas"));
            }
            other => panic!("Expected paragraph, got {:?}", other),
        }
    }

    #[test]
    fn test_numbered_list_keeps_start() {
        let blocks = parse("3. tres\n4. cuatro");
        match &blocks[0] {
            Block::List { start, items } => {
                assert_eq!(*start, Some(3));
                assert_eq!(items.len(), 2);
            }
            other => panic!("Expected list, got {:?}", other),
        }
        assert_eq!(render_terminal("3. tres\n4. cuatro", false), "3. tres\n4. cuatro");
    }

    #[test]
    fn test_code_block_language() {
        let blocks = parse("```python\nprint(1)\n```");
        assert_eq!(
            blocks,
            vec![Block::Code {
                language: Some("python".to_string()),
                code: "print(1)".to_string(),
            }]
        );
    }

    #[test]
    fn test_heading_and_quote() {
        let blocks = parse("## Resumen\n\n> cita");
        assert!(matches!(blocks[0], Block::Heading { level: 2, .. }));
        assert!(matches!(&blocks[1], Block::Quote(inner) if !inner.is_empty()));
        assert_eq!(render_terminal("> cita", false), "> cita");
    }

    #[test]
    fn test_plain_render_drops_escapes() {
        let out = render_terminal("**Hola** mundo", false);
        assert_eq!(out, "Hola mundo");
        let out = render_terminal("**Hola** mundo", true);
        let bold = ContentStyle::new().bold().apply("Hola").to_string();
        assert!(out.starts_with(&bold));
        assert!(out.ends_with(" mundo"));
    }

    #[test]
    fn test_span_attributes() {
        let style = Style { italic: true, code: true, ..Style::default() };
        let expected = ContentStyle::new().italic().dim();
        assert_eq!(style.content_style(), expected);
        assert_eq!(Style::default().content_style(), ContentStyle::new());
    }

    #[test]
    fn test_link_url_shown() {
        let out = render_terminal("[docs](https://example.com)", false);
        assert_eq!(out, "docs (https://example.com)");
    }

    #[test]
    fn test_unordered_and_rule() {
        let out = render_terminal("- uno\n- dos\n\n---", false);
        assert_eq!(out, format!("• uno\n• dos\n\n{}", "─".repeat(40)));
    }
}
