use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use rusqlite::Connection;
use std::io;
use student_tracker::{
    get_all_students, get_batch, get_expected_for_batch, list_batches, ExpectedStudent,
    RegisteredStudent, TrackingService,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Registered,
    Expected,
    Unregistered,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Registered => Page::Expected,
            Page::Expected => Page::Unregistered,
            Page::Unregistered => Page::Registered,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Registered => Page::Unregistered,
            Page::Expected => Page::Registered,
            Page::Unregistered => Page::Expected,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Registered => "Registered",
            Page::Expected => "Expected",
            Page::Unregistered => "Unregistered",
        }
    }
}

/// One table row, whichever list it came from
#[derive(Debug, Clone, PartialEq)]
pub struct StudentRow {
    pub national_id: String,
    pub given_name: String,
    pub family_name: String,
    pub class: String,
    pub grade: u8,
    pub status: String,
}

impl From<&RegisteredStudent> for StudentRow {
    fn from(s: &RegisteredStudent) -> Self {
        Self {
            national_id: s.national_id.to_string(),
            given_name: s.given_name.clone(),
            family_name: s.family_name.clone(),
            class: s.class.code().to_string(),
            grade: s.class.grade(),
            status: s.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

impl From<&ExpectedStudent> for StudentRow {
    fn from(s: &ExpectedStudent) -> Self {
        Self {
            national_id: s.national_id.to_string(),
            given_name: s.given_name.clone(),
            family_name: s.family_name.clone(),
            class: s.class.code().to_string(),
            grade: s.class.grade(),
            status: if s.registered { "registered" } else { "missing" }.to_string(),
        }
    }
}

pub struct App {
    pub batch_id: Option<String>,
    pub registered: Vec<StudentRow>,
    pub expected: Vec<StudentRow>,
    pub unregistered: Vec<StudentRow>,
    pub current_page: Page,
    pub grade_filter: Option<u8>,
    pub state: TableState,
    pub show_detail: bool,
}

impl App {
    pub fn new(
        batch_id: Option<String>,
        registered: &[RegisteredStudent],
        expected: &[ExpectedStudent],
    ) -> Self {
        let unregistered = expected
            .iter()
            .filter(|s| !s.registered)
            .map(StudentRow::from)
            .collect();

        let mut app = Self {
            batch_id,
            registered: registered.iter().map(StudentRow::from).collect(),
            expected: expected.iter().map(StudentRow::from).collect(),
            unregistered,
            current_page: Page::Registered,
            grade_filter: None,
            state: TableState::default(),
            show_detail: false,
        };
        app.reset_selection();
        app
    }

    /// Rows of the current page after the grade filter
    pub fn visible_rows(&self) -> Vec<&StudentRow> {
        let rows = match self.current_page {
            Page::Registered => &self.registered,
            Page::Expected => &self.expected,
            Page::Unregistered => &self.unregistered,
        };

        rows.iter()
            .filter(|r| self.grade_filter.map_or(true, |g| r.grade == g))
            .collect()
    }

    pub fn selected_row(&self) -> Option<&StudentRow> {
        let rows = self.visible_rows();
        self.state.selected().and_then(|i| rows.get(i).copied())
    }

    fn reset_selection(&mut self) {
        let selection = if self.visible_rows().is_empty() { None } else { Some(0) };
        self.state.select(selection);
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
        self.reset_selection();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
        self.reset_selection();
    }

    pub fn set_grade_filter(&mut self, grade: Option<u8>) {
        self.grade_filter = grade;
        self.reset_selection();
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn next(&mut self) {
        let len = self.visible_rows().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible_rows().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.visible_rows().len();
        if len == 0 {
            return;
        }
        let i = self.state.selected().map_or(0, |i| (i + 20).min(len - 1));
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        if self.visible_rows().is_empty() {
            return;
        }
        let i = self.state.selected().map_or(0, |i| i.saturating_sub(20));
        self.state.select(Some(i));
    }

    pub fn registration_rate(&self) -> f64 {
        if self.expected.is_empty() {
            return 1.0;
        }
        (self.expected.len() - self.unregistered.len()) as f64 / self.expected.len() as f64
    }
}

/// Build the dashboard for a batch (latest upload when none is named).
///
/// The batch is reconciled first so flags reflect current registrations.
pub fn load_app(conn: &Connection, batch_id: Option<&str>) -> Result<App> {
    let batch_id = match batch_id {
        Some(id) => {
            if get_batch(conn, id)?.is_none() {
                return Err(anyhow::anyhow!("unknown upload batch: {}", id));
            }
            Some(id.to_string())
        }
        None => list_batches(conn)?.into_iter().next().map(|b| b.batch_id),
    };

    if let Some(id) = &batch_id {
        TrackingService::new("ui").reconcile_batch(conn, id)?;
    }

    let registered = get_all_students(conn)?;
    let expected = match &batch_id {
        Some(id) => get_expected_for_batch(conn, id)?,
        None => Vec::new(),
    };

    Ok(App::new(batch_id, &registered, &expected))
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab => app.next_page(),
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Char('7') => app.set_grade_filter(Some(7)),
                KeyCode::Char('8') => app.set_grade_filter(Some(8)),
                KeyCode::Char('9') => app.set_grade_filter(Some(9)),
                KeyCode::Char('c') => app.set_grade_filter(None),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home if !app.visible_rows().is_empty() => app.state.select(Some(0)),
                KeyCode::End => {
                    let len = app.visible_rows().len();
                    if len > 0 {
                        app.state.select(Some(len - 1));
                    }
                }
                KeyCode::Char('l') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    terminal.clear()?;
                }
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(chunks[1]);

        render_table(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        render_table(f, chunks[1], app);
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in [Page::Registered, Page::Expected, Page::Unregistered]
        .iter()
        .enumerate()
    {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Batch: {}", app.batch_id.as_deref().unwrap_or("-")),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("✓ {}", app.expected.len() - app.unregistered.len()),
        Style::default().fg(Color::Green),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("✗ {}", app.unregistered.len()),
        Style::default().fg(Color::Red),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("{:.0}%", app.registration_rate() * 100.0),
        Style::default().fg(Color::Cyan),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let status_title = if app.current_page == Page::Registered {
        "Registered at"
    } else {
        "Status"
    };

    let header_titles = ["National ID", "Given name", "Family name", "Class", status_title];
    let header_cells = header_titles
        .iter()
        .map(|h| {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows: Vec<Row> = app
        .visible_rows()
        .into_iter()
        .map(|r| {
            let color = match r.status.as_str() {
                "missing" => Color::Red,
                "registered" => Color::Green,
                _ => Color::White,
            };

            Row::new(vec![
                Cell::from(r.national_id.clone()),
                Cell::from(truncate(&r.given_name, 20)),
                Cell::from(truncate(&r.family_name, 24)),
                Cell::from(r.class.clone()),
                Cell::from(r.status.clone()).style(Style::default().fg(color)),
            ])
            .height(1)
        })
        .collect();

    let title = format!(" {} ", app.current_page.title());

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(22),
            Constraint::Length(26),
            Constraint::Length(6),
            Constraint::Length(18),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let lines = match app.selected_row() {
        Some(r) => vec![
            Line::from(""),
            detail_line("National ID", &r.national_id),
            detail_line("Given name", &r.given_name),
            detail_line("Family name", &r.family_name),
            detail_line("Class", &r.class),
            detail_line("Grade", &r.grade.to_string()),
            detail_line("Status", &r.status),
        ],
        None => vec![Line::from("  No student selected")],
    };

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Details "),
    );

    f.render_widget(panel, area);
}

fn detail_line<'a>(label: &'a str, value: &str) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("  {:<12}", label), Style::default().fg(Color::Yellow)),
        Span::raw(value.to_string()),
    ])
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let total = app.visible_rows().len();

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, total),
        Style::default().fg(Color::Cyan),
    )];

    if let Some(grade) = app.grade_filter {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(
            format!("Grade: {}", grade),
            Style::default().fg(Color::Green),
        ));
        status_spans.push(Span::raw(" ("));
        status_spans.push(Span::styled("c", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" clear)"));
    }

    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("7/8/9", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Grade | "));
    status_spans.push(Span::styled("Enter", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Details | "));
    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Nav | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
