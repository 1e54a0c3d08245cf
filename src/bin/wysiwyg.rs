use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossterm::{
    event::{
        self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Position},
    text::{Line, Span},
    widgets::Paragraph,
};
use tdoc::{markdown, writer::Writer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use wysiwyg_core::editor::{CallbackPayload, CallbackReply, Enrichment, Key, KeyInput, Ticket};
use wysiwyg_core::render::{TerminalGeometry, render_document};
use wysiwyg_core::theme::Theme;
use wysiwyg_core::{Editor, EditorOptions};

const STATUS_TIMEOUT: Duration = Duration::from_secs(4);
const LOG_ENV: &str = "WYSIWYG_LOG";
const LOG_FILE: &str = "wysiwyg.log";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SaveFormat {
    Html,
    Ftml,
    Markdown,
}

impl SaveFormat {
    fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("md") | Some("markdown") => SaveFormat::Markdown,
            Some("ftml") => SaveFormat::Ftml,
            _ => SaveFormat::Html,
        }
    }
}

fn main() -> Result<()> {
    init_logging()?;
    run()
}

/// Logs go to a file so they never draw over the editor.
fn init_logging() -> Result<()> {
    let Ok(filter) = env::var(LOG_ENV) else {
        return Ok(());
    };
    let file = fs::File::create(LOG_FILE)
        .with_context(|| format!("failed to create {LOG_FILE}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(path_arg) = args.next() else {
        eprintln!("Usage: wysiwyg <file.html> [options.toml]");
        return Ok(());
    };
    let path = PathBuf::from(path_arg);
    let options = match args.next() {
        Some(config) => EditorOptions::from_path(Path::new(&config))
            .with_context(|| format!("failed to load options from {config}"))?,
        None => EditorOptions::new("editor")
            .with_hashtags(true)
            .with_urllinks(true),
    };

    let mut app = App::new(path, options)?;

    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)
        .context("failed to initialize terminal")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().ok();

    let res = run_app(&mut terminal, &mut app).context("application error");

    disable_raw_mode().ok();
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableBracketedPaste
    )
    .ok();
    terminal.show_cursor().ok();

    res
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut needs_redraw = true;

    while !app.quit {
        if needs_redraw {
            let size = terminal.size().context("failed to read terminal size")?;
            app.width = usize::from(size.width).max(1);
            terminal
                .draw(|frame| app.draw(frame))
                .context("failed to draw frame")?;
            needs_redraw = false;
        }

        if event::poll(tick_rate).context("event poll failed")? {
            match event::read().context("failed to read event")? {
                Event::Key(key) if key.kind != KeyEventKind::Release => app.handle_key(key),
                Event::Paste(text) => {
                    let result = app.editor.paste(&text);
                    app.report(result);
                }
                Event::Resize(_, _) => {}
                _ => continue,
            }
            needs_redraw = true;
        } else if app.prune_status_message() {
            needs_redraw = true;
        }
    }
    Ok(())
}

struct App {
    editor: Editor,
    path: PathBuf,
    theme: Theme,
    width: usize,
    dirty: bool,
    quit: bool,
    status_message: Option<(String, Instant)>,
}

impl App {
    fn new(path: PathBuf, mut options: EditorOptions) -> Result<Self> {
        let mut status = None;
        if path.exists() {
            options.html = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
        } else {
            status = Some("New document".to_string());
        }
        let editor = Editor::with_callback(
            options,
            |_ticket: Ticket, _payload: &CallbackPayload| CallbackReply::Done(Enrichment::new()),
        )
        .context("failed to start editor")?;
        info!(path = %path.display(), "document opened");
        Ok(Self {
            editor,
            path,
            theme: Theme::default(),
            width: 80,
            dirty: false,
            quit: false,
            status_message: status.map(|message| (message, Instant::now())),
        })
    }

    fn report<T>(&mut self, result: wysiwyg_core::editor::Result<T>) {
        match result {
            Ok(_) => self.dirty = true,
            Err(error) => {
                warn!(%error, "editor refused input");
                self.status_message = Some((error.to_string(), Instant::now()));
            }
        }
    }

    fn prune_status_message(&mut self) -> bool {
        let expired = self
            .status_message
            .as_ref()
            .is_some_and(|(_, since)| since.elapsed() > STATUS_TIMEOUT);
        if expired {
            self.status_message = None;
        }
        expired
    }

    fn command(&mut self, verb: &str) {
        let result = self.editor.command(verb);
        if let Ok(outcome) = &result {
            self.status_message = Some((format!("{verb}: {outcome:?}"), Instant::now()));
        }
        self.report(result);
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        if ctrl && let KeyCode::Char(ch) = key.code {
            match ch {
                'q' => self.quit = true,
                's' => {
                    if let Err(error) = self.save() {
                        self.status_message = Some((format!("{error:#}"), Instant::now()));
                    }
                }
                'b' => self.command("bold"),
                'i' => self.command("italic"),
                'u' => self.command("underline"),
                'k' => self.command("quote"),
                'l' => self.command("unorderedList"),
                'o' => self.command("orderedList"),
                'd' => self.command("divider"),
                'e' => self.command("alignCenter"),
                'r' => self.command("alignRight"),
                'h' => self.command("h1"),
                _ => {}
            }
            return;
        }

        let mapped = match key.code {
            KeyCode::Char(ch) => Key::Char(ch),
            KeyCode::Enter => Key::Enter,
            KeyCode::Backspace => Key::Backspace,
            KeyCode::Delete => Key::Delete,
            KeyCode::Tab | KeyCode::BackTab => Key::Tab,
            KeyCode::Left => Key::Left,
            KeyCode::Right => Key::Right,
            KeyCode::Up => Key::Up,
            KeyCode::Down => Key::Down,
            KeyCode::Home => Key::Home,
            KeyCode::End => Key::End,
            KeyCode::PageUp => Key::PageUp,
            KeyCode::PageDown => Key::PageDown,
            KeyCode::Esc => {
                self.quit = true;
                return;
            }
            _ => return,
        };
        let mut input = KeyInput::new(mapped);
        if shift || key.code == KeyCode::BackTab {
            input = input.with_shift();
        }
        if key.modifiers.contains(KeyModifiers::ALT) {
            input = input.with_ctrl();
        }
        let geometry = TerminalGeometry { width: self.width };
        let result = self.editor.handle_key_with(input, &geometry);
        self.report(result);
    }

    fn save(&mut self) -> Result<()> {
        let export = self.editor.export().context("failed to export document")?;
        let contents = match SaveFormat::from_path(&self.path) {
            SaveFormat::Html => export.html.into_bytes(),
            SaveFormat::Ftml => Writer::new()
                .write_to_string(&self.editor.to_tdoc())
                .context("failed to render FTML")?
                .into_bytes(),
            SaveFormat::Markdown => {
                let mut contents = Vec::new();
                markdown::write(&mut contents, &self.editor.to_tdoc())
                    .context("failed to render Markdown")?;
                contents
            }
        };
        fs::write(&self.path, contents)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        self.dirty = false;
        let title = if export.title.is_empty() {
            "Saved".to_string()
        } else {
            format!("Saved \"{}\"", export.title)
        };
        self.status_message = Some((title, Instant::now()));
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(frame.area());
        let body = chunks[0];

        let caret = self.editor.caret_position().ok().flatten();
        let rendered = render_document(
            self.editor.document(),
            self.editor.registry(),
            &self.theme,
            usize::from(body.width),
            caret,
        );
        let scroll = rendered
            .cursor
            .map(|cursor| cursor.line.saturating_sub(usize::from(body.height).saturating_sub(1)))
            .unwrap_or(0);
        let scroll = u16::try_from(scroll).unwrap_or(u16::MAX);
        frame.render_widget(Paragraph::new(rendered.lines).scroll((scroll, 0)), body);
        if let Some(cursor) = rendered.cursor {
            let row = u16::try_from(cursor.line)
                .unwrap_or(u16::MAX)
                .saturating_sub(scroll);
            frame.set_cursor_position(Position::new(body.x + cursor.column, body.y + row));
        }

        let name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let marker = if self.dirty { "*" } else { "" };
        let detail = match &self.status_message {
            Some((message, _)) => message.clone(),
            None => self.editor.breadcrumbs().unwrap_or_default().join(" › "),
        };
        let status = Line::from(vec![
            Span::styled(format!(" {name}{marker} "), self.theme.filename_style()),
            Span::raw(format!(" {detail}")),
        ]);
        frame.render_widget(
            Paragraph::new(status).style(self.theme.status_bar_style()),
            chunks[1],
        );
    }
}
