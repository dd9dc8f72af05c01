use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;
use unicode_width::UnicodeWidthChar;

use crate::fetcher::FeedGateway;
use crate::presenter::{Blogroll, MemorySurface, Notice, RenderedItem};

const TEXT_WIDTH: usize = 72;

/// Runs the TUI blogroll browser until the user quits.
/// The blogroll should already have its first page loaded.
pub async fn run_viewer<G: FeedGateway>(blogroll: &mut Blogroll<G, MemorySurface>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, blogroll).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

struct ViewerApp {
    scroll: u16,
    lines: Vec<Line<'static>>,
}

async fn run_app<G: FeedGateway>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    blogroll: &mut Blogroll<G, MemorySurface>,
) -> Result<()> {
    let mut app = ViewerApp {
        scroll: 0,
        lines: feed_lines(blogroll.surface()),
    };

    loop {
        terminal.draw(|f| ui(f, blogroll, &app))?;

        // Poll so the loop stays responsive around async work
        if !event::poll(Duration::from_millis(150))? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            let content_height = app.lines.len() as u16;
            let viewport_height = terminal.size()?.height.saturating_sub(7); // Account for header/footer
            let max_scroll = content_height.saturating_sub(viewport_height);
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    return Ok(());
                }
                KeyCode::Char('m') => {
                    // Only acts while the Show More control is visible
                    if blogroll.surface().show_more_visible() {
                        blogroll.show_more().await;
                        app.lines = feed_lines(blogroll.surface());
                    }
                }
                KeyCode::Char('j') | KeyCode::Down => {
                    if app.scroll < max_scroll {
                        app.scroll = app.scroll.saturating_add(1);
                    }
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    app.scroll = app.scroll.saturating_sub(1);
                }
                KeyCode::PageDown | KeyCode::Char(' ') => {
                    app.scroll = (app.scroll + viewport_height).min(max_scroll);
                }
                KeyCode::PageUp => {
                    app.scroll = app.scroll.saturating_sub(viewport_height);
                }
                KeyCode::Char('g') | KeyCode::Home => {
                    app.scroll = 0;
                }
                KeyCode::Char('G') | KeyCode::End => {
                    app.scroll = max_scroll;
                }
                _ => {}
            }
        }
    }
}

fn ui<G: FeedGateway>(f: &mut Frame, blogroll: &Blogroll<G, MemorySurface>, app: &ViewerApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),  // Header
            Constraint::Min(10),    // Feed items
            Constraint::Length(3),  // Footer
        ])
        .split(f.size());

    render_header(f, chunks[0], blogroll);
    render_feed(f, chunks[1], app);
    render_footer(f, chunks[2], blogroll.surface().show_more_visible());
}

fn render_header<G: FeedGateway>(
    f: &mut Frame,
    area: Rect,
    blogroll: &Blogroll<G, MemorySurface>,
) {
    let header_text = vec![
        Line::from(vec![
            Span::raw("Label: "),
            Span::styled(
                blogroll.config().category_label.clone(),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::raw("Page: "),
            Span::styled(
                blogroll.current_page().to_string(),
                Style::default().fg(Color::Yellow),
            ),
            Span::raw("  Posts: "),
            Span::styled(
                blogroll.surface().items().len().to_string(),
                Style::default().fg(Color::Yellow),
            ),
        ]),
    ];

    let header = Paragraph::new(header_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue))
                .title(" Blogroll ")
                .title_alignment(Alignment::Center),
        )
        .alignment(Alignment::Left);

    f.render_widget(header, area);
}

fn render_feed(f: &mut Frame, area: Rect, app: &ViewerApp) {
    // Calculate visible range
    let viewport_height = area.height as usize;
    let start = app.scroll as usize;
    let end = (start + viewport_height).min(app.lines.len());

    let visible: Vec<Line> = if start < app.lines.len() {
        app.lines[start..end].to_vec()
    } else {
        vec![]
    };

    // Add scroll indicator
    let scroll_indicator = if app.lines.len() > viewport_height {
        format!(" [{}/{}] ", start + 1, app.lines.len())
    } else {
        String::new()
    };

    let paragraph = Paragraph::new(visible)
        .block(
            Block::default()
                .borders(Borders::LEFT | Borders::RIGHT | Borders::BOTTOM)
                .border_style(Style::default().fg(Color::Gray))
                .title(scroll_indicator)
                .title_alignment(Alignment::Right),
        )
        .wrap(Wrap { trim: false }); // Lines are pre-wrapped

    f.render_widget(paragraph, area);
}

fn render_footer(f: &mut Frame, area: Rect, show_more: bool) {
    let mut spans = vec![
        Span::styled(" q ", Style::default().bg(Color::DarkGray).fg(Color::White)),
        Span::raw(" Quit  "),
        Span::styled(" j/k ", Style::default().bg(Color::DarkGray).fg(Color::White)),
        Span::raw(" Scroll  "),
    ];
    if show_more {
        spans.push(Span::styled(
            " m ",
            Style::default().bg(Color::DarkGray).fg(Color::White),
        ));
        spans.push(Span::raw(" Show More  "));
    }

    let footer = Paragraph::new(Line::from(spans))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue)),
        )
        .alignment(Alignment::Center);

    f.render_widget(footer, area);
}

fn feed_lines(surface: &MemorySurface) -> Vec<Line<'static>> {
    if let Some(notice) = surface.notice() {
        let style = match notice {
            Notice::Loading => Style::default().fg(Color::Yellow),
            Notice::NoPosts => Style::default().fg(Color::Gray),
            Notice::LoadFailed => Style::default().fg(Color::Red),
        };
        return vec![Line::from(Span::styled(notice.message(), style))];
    }

    let mut lines = Vec::new();
    for item in surface.items() {
        lines.extend(item_lines(item));
    }
    lines
}

fn item_lines(item: &RenderedItem) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(Span::styled(
        truncate_to_width(&item.feed_title, TEXT_WIDTH),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    ))];
    for wrapped in textwrap::wrap(&item.post_title, TEXT_WIDTH) {
        lines.push(Line::from(Span::styled(
            wrapped.to_string(),
            Style::default().fg(Color::Cyan),
        )));
    }
    lines.push(Line::from(Span::styled(
        format!("{} • {}", item.reading_time, item.relative_date),
        Style::default().fg(Color::DarkGray),
    )));
    lines.push(Line::from(Span::styled(
        truncate_to_width(&item.post_url, TEXT_WIDTH),
        Style::default().fg(Color::Blue),
    )));
    lines.push(Line::from(""));
    lines
}

fn truncate_to_width(text: &str, max_width: usize) -> String {
    let mut width = 0;
    let mut out = String::new();
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if width + w > max_width {
            out.push('…');
            break;
        }
        width += w;
        out.push(ch);
    }
    out
}
