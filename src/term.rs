//! Raw-mode line input on crossterm. Raw mode is held only while a line is
//! being edited, so everything else prints through the normal cooked stdout.

use std::io::{self, IsTerminal, Write};

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{ContentStyle, Print, Stylize};
use crossterm::terminal::{self, ClearType};
use crossterm::{cursor, execute, queue};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Echo {
    Plain,
    Masked,
}

/// A finished line. `Newline` means the user asked to keep writing on the
/// next line (Shift+Enter or Alt+Enter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Submit(String),
    Newline(String),
}

impl Line {
    pub fn into_text(self) -> String {
        match self {
            Line::Submit(text) | Line::Newline(text) => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Changed,
    Done(Line),
    Cancel,
    Ignored,
}

/// Single-line buffer with a byte cursor that always sits on a char boundary.
#[derive(Debug, Default)]
pub struct LineEditor {
    buffer: String,
    cursor: usize,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn handle(&mut self, key: KeyEvent) -> Edit {
        if key.kind != KeyEventKind::Press {
            return Edit::Ignored;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Enter => {
                let text = std::mem::take(&mut self.buffer);
                self.cursor = 0;
                if key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) {
                    Edit::Done(Line::Newline(text))
                } else {
                    Edit::Done(Line::Submit(text))
                }
            }
            KeyCode::Char('c') if ctrl => Edit::Cancel,
            KeyCode::Char('d') if ctrl => {
                if self.buffer.is_empty() {
                    Edit::Cancel
                } else {
                    self.delete_forward()
                }
            }
            KeyCode::Char('a') if ctrl => self.move_to(0),
            KeyCode::Char('e') if ctrl => self.move_to(self.buffer.len()),
            KeyCode::Char('u') if ctrl => {
                self.buffer.drain(..self.cursor);
                self.cursor = 0;
                Edit::Changed
            }
            KeyCode::Char('k') if ctrl => {
                self.buffer.truncate(self.cursor);
                Edit::Changed
            }
            KeyCode::Char(_) if ctrl => Edit::Ignored,
            KeyCode::Char(c) => {
                self.buffer.insert(self.cursor, c);
                self.cursor += c.len_utf8();
                Edit::Changed
            }
            KeyCode::Backspace => {
                if self.cursor == 0 {
                    return Edit::Ignored;
                }
                let prev = self.prev_boundary();
                self.buffer.drain(prev..self.cursor);
                self.cursor = prev;
                Edit::Changed
            }
            KeyCode::Delete => self.delete_forward(),
            KeyCode::Left => self.move_to(self.prev_boundary()),
            KeyCode::Right => self.move_to(self.next_boundary()),
            KeyCode::Home => self.move_to(0),
            KeyCode::End => self.move_to(self.buffer.len()),
            _ => Edit::Ignored,
        }
    }

    pub fn insert_text(&mut self, text: &str) {
        let text = text.replace(['\r', '\n'], " ");
        self.buffer.insert_str(self.cursor, &text);
        self.cursor += text.len();
    }

    /// What to draw after the prompt.
    pub fn display(&self, echo: Echo) -> String {
        match echo {
            Echo::Plain => self.buffer.clone(),
            Echo::Masked => "*".repeat(self.buffer.chars().count()),
        }
    }

    /// Cursor position in columns from the start of the buffer.
    pub fn column(&self) -> usize {
        self.buffer[..self.cursor].chars().count()
    }

    fn delete_forward(&mut self) -> Edit {
        if self.cursor >= self.buffer.len() {
            return Edit::Ignored;
        }
        let next = self.next_boundary();
        self.buffer.drain(self.cursor..next);
        Edit::Changed
    }

    fn move_to(&mut self, cursor: usize) -> Edit {
        self.cursor = cursor;
        Edit::Changed
    }

    fn prev_boundary(&self) -> usize {
        self.buffer[..self.cursor]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    fn next_boundary(&self) -> usize {
        self.buffer[self.cursor..]
            .chars()
            .next()
            .map(|c| self.cursor + c.len_utf8())
            .unwrap_or(self.buffer.len())
    }
}

struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(io::stdout(), crossterm::event::EnableBracketedPaste)?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), crossterm::event::DisableBracketedPaste, cursor::Show);
        let _ = terminal::disable_raw_mode();
    }
}

/// Puts the terminal back if the process panics while a line is open.
pub fn install_panic_hook() {
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = terminal::disable_raw_mode();
        let _ = execute!(io::stdout(), cursor::Show, crossterm::event::DisableBracketedPaste);
        default_panic(info);
    }));
}

enum Source {
    Terminal(EventStream),
    Piped(Lines<BufReader<Stdin>>),
}

/// Reads lines from the keyboard, or from stdin line by line when it is not
/// a terminal.
pub struct Prompt {
    source: Source,
    styled: bool,
}

impl Prompt {
    pub fn new() -> Self {
        let source = if io::stdin().is_terminal() {
            Source::Terminal(EventStream::new())
        } else {
            Source::Piped(BufReader::new(tokio::io::stdin()).lines())
        };
        Self {
            source,
            styled: io::stdout().is_terminal(),
        }
    }

    /// Whether output may carry terminal styling.
    pub fn styled(&self) -> bool {
        self.styled
    }

    /// `None` when input ends or the user cancels.
    pub async fn read(&mut self, prompt: &str, echo: Echo) -> Result<Option<Line>> {
        match &mut self.source {
            Source::Piped(lines) => {
                print!("{}", prompt);
                io::stdout().flush()?;
                Ok(lines.next_line().await?.map(Line::Submit))
            }
            Source::Terminal(events) => read_key_line(events, prompt, echo).await,
        }
    }
}

async fn read_key_line(events: &mut EventStream, prompt: &str, echo: Echo) -> Result<Option<Line>> {
    let _raw = RawMode::enable()?;
    let mut stdout = io::stdout();
    let mut editor = LineEditor::new();
    redraw(&mut stdout, prompt, &editor, echo)?;

    while let Some(event) = events.next().await {
        let edit = match event? {
            Event::Key(key) => editor.handle(key),
            Event::Paste(text) => {
                editor.insert_text(&text);
                Edit::Changed
            }
            _ => Edit::Ignored,
        };
        match edit {
            Edit::Changed => redraw(&mut stdout, prompt, &editor, echo)?,
            Edit::Ignored => {}
            Edit::Cancel => {
                execute!(stdout, Print("\r\n"))?;
                return Ok(None);
            }
            Edit::Done(line) => {
                execute!(stdout, Print("\r\n"))?;
                return Ok(Some(line));
            }
        }
    }
    Ok(None)
}

fn redraw(stdout: &mut io::Stdout, prompt: &str, editor: &LineEditor, echo: Echo) -> io::Result<()> {
    let column = prompt.chars().count() + editor.column();
    queue!(
        stdout,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(prompt.bold()),
        Print(editor.display(echo)),
        cursor::MoveToColumn(u16::try_from(column).unwrap_or(u16::MAX)),
    )?;
    stdout.flush()
}

/// `text` with `style` applied when output is styled.
pub fn paint(style: ContentStyle, text: &str, styled: bool) -> String {
    if styled {
        style.apply(text).to_string()
    } else {
        text.to_string()
    }
}

/// Output styles used by the shell.
pub fn heading() -> ContentStyle {
    ContentStyle::new().bold()
}

pub fn notice() -> ContentStyle {
    ContentStyle::new().dim()
}

pub fn error() -> ContentStyle {
    ContentStyle::new().red()
}

pub fn speaker() -> ContentStyle {
    ContentStyle::new().cyan().bold()
}
