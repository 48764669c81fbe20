use crate::controller::{FormController, Phase};
use crate::error::SubmitError;
use crate::optimizer::Optimizer;
use crate::render::DisplayBlock;
use crate::ticker::TickerListView;
use chrono::{DateTime, Local};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io::{self, Stdout};
use std::time::Duration;
use tracing::info;

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Capital,
    DesiredReturn,
    Horizon,
    TickerInput,
    TickerList,
    Submit,
}

impl Focus {
    fn all() -> &'static [Focus] {
        &[
            Focus::Capital,
            Focus::DesiredReturn,
            Focus::Horizon,
            Focus::TickerInput,
            Focus::TickerList,
            Focus::Submit,
        ]
    }

    fn next(self) -> Focus {
        let all = Focus::all();
        let index = all.iter().position(|&f| f == self).unwrap_or(0);
        all[(index + 1) % all.len()]
    }

    fn previous(self) -> Focus {
        let all = Focus::all();
        let index = all.iter().position(|&f| f == self).unwrap_or(0);
        all[(index + all.len() - 1) % all.len()]
    }
}

/// What the event loop should do after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Submit,
    Quit,
}

pub struct App {
    pub controller: FormController,
    pub focus: Focus,
    pub horizons: Vec<String>,
    pub horizon_index: usize,
    pub selected_ticker: usize,
    pub error_dismissed: bool,
    pub spinner_frame: usize,
    pub last_completed: Option<DateTime<Local>>,
}

impl App {
    pub fn new(controller: FormController, horizons: Vec<String>, default_horizon: &str) -> App {
        let horizon_index = horizons
            .iter()
            .position(|h| h == default_horizon)
            .unwrap_or(0);
        let mut app = App {
            controller,
            focus: Focus::Capital,
            horizons,
            horizon_index,
            selected_ticker: 0,
            error_dismissed: false,
            spinner_frame: 0,
            last_completed: None,
        };
        app.sync_horizon();
        app
    }

    fn sync_horizon(&mut self) {
        let horizon = self
            .horizons
            .get(self.horizon_index)
            .cloned()
            .unwrap_or_default();
        self.controller.set_horizon(&horizon);
    }

    fn cycle_horizon(&mut self, forward: bool) {
        if self.horizons.is_empty() {
            return;
        }
        let len = self.horizons.len();
        self.horizon_index = if forward {
            (self.horizon_index + 1) % len
        } else {
            (self.horizon_index + len - 1) % len
        };
        self.sync_horizon();
    }

    fn error_visible(&self) -> bool {
        matches!(self.controller.phase(), Phase::ErrorShown(_)) && !self.error_dismissed
    }

    fn remove_selected_ticker(&mut self) {
        let symbol = self
            .controller
            .tickers()
            .list()
            .get(self.selected_ticker)
            .map(|s| s.as_str().to_string());
        if let Some(symbol) = symbol {
            self.controller.remove_ticker(&symbol);
            let size = self.controller.tickers().size();
            if self.selected_ticker >= size {
                self.selected_ticker = size.saturating_sub(1);
            }
        }
    }

    fn edit_number_field(&mut self, key: KeyCode) {
        let mut text = match self.focus {
            Focus::Capital => self.controller.capital().to_string(),
            Focus::DesiredReturn => self.controller.desired_return().to_string(),
            _ => return,
        };
        match key {
            KeyCode::Backspace => {
                text.pop();
            }
            KeyCode::Char(c) if c.is_ascii_digit() => text.push(c),
            KeyCode::Char('.') if !text.contains('.') => text.push('.'),
            KeyCode::Char('-') if text.is_empty() => text.push('-'),
            _ => return,
        }
        if self.focus == Focus::Capital {
            self.controller.set_capital(&text);
        } else {
            self.controller.set_desired_return(&text);
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Action::Quit;
        }
        if self.controller.is_submitting() {
            return Action::None;
        }
        if self.error_visible() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
                self.error_dismissed = true;
            }
            return Action::None;
        }

        match key.code {
            KeyCode::Esc => return Action::Quit,
            KeyCode::Tab => self.focus = self.focus.next(),
            KeyCode::BackTab => self.focus = self.focus.previous(),
            _ => match self.focus {
                Focus::Capital | Focus::DesiredReturn => match key.code {
                    KeyCode::Enter => return Action::Submit,
                    KeyCode::Down => self.focus = self.focus.next(),
                    KeyCode::Up => self.focus = self.focus.previous(),
                    code => self.edit_number_field(code),
                },
                Focus::Horizon => match key.code {
                    KeyCode::Left | KeyCode::Char('h') => self.cycle_horizon(false),
                    KeyCode::Right | KeyCode::Char('l') | KeyCode::Char(' ') => {
                        self.cycle_horizon(true)
                    }
                    KeyCode::Enter => return Action::Submit,
                    KeyCode::Down => self.focus = self.focus.next(),
                    KeyCode::Up => self.focus = self.focus.previous(),
                    _ => {}
                },
                Focus::TickerInput => match key.code {
                    KeyCode::Enter => {
                        if self.controller.add_ticker_from_input().is_ok() {
                            self.selected_ticker =
                                self.controller.tickers().size().saturating_sub(1);
                        }
                    }
                    KeyCode::Backspace => self.controller.pop_ticker_char(),
                    KeyCode::Char(c) => self.controller.push_ticker_char(c),
                    KeyCode::Down => self.focus = self.focus.next(),
                    KeyCode::Up => self.focus = self.focus.previous(),
                    _ => {}
                },
                Focus::TickerList => match key.code {
                    KeyCode::Char('j') | KeyCode::Down => {
                        let size = self.controller.tickers().size();
                        if self.selected_ticker + 1 < size {
                            self.selected_ticker += 1;
                        } else {
                            self.focus = self.focus.next();
                        }
                    }
                    KeyCode::Char('k') | KeyCode::Up => {
                        if self.selected_ticker > 0 {
                            self.selected_ticker -= 1;
                        } else {
                            self.focus = self.focus.previous();
                        }
                    }
                    KeyCode::Delete
                    | KeyCode::Backspace
                    | KeyCode::Char('d')
                    | KeyCode::Char('x') => self.remove_selected_ticker(),
                    _ => {}
                },
                Focus::Submit => match key.code {
                    KeyCode::Enter | KeyCode::Char(' ') => return Action::Submit,
                    KeyCode::Up => self.focus = self.focus.previous(),
                    KeyCode::Down => self.focus = self.focus.next(),
                    _ => {}
                },
            },
        }
        Action::None
    }
}

pub async fn run_tui(mut app: App, optimizer: &dyn Optimizer) -> eyre::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app, optimizer).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    optimizer: &dyn Optimizer,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if !crossterm::event::poll(Duration::from_millis(100))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match app.handle_key(key) {
            Action::Quit => break,
            Action::Submit => submit(terminal, app, optimizer).await?,
            Action::None => {}
        }
    }
    Ok(())
}

/// Run one submission, redrawing the spinner until the optimizer answers.
/// Keys pressed meanwhile stay queued and are read after the button is
/// enabled again.
async fn submit(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    optimizer: &dyn Optimizer,
) -> io::Result<()> {
    app.error_dismissed = false;
    let Some(request) = app.controller.begin_submit() else {
        return Ok(());
    };
    info!(tickers = ?request.tickers(), "submitting from form");

    let mut pending = optimizer.optimize(&request);
    let mut interval = tokio::time::interval(Duration::from_millis(120));
    let outcome = loop {
        tokio::select! {
            outcome = &mut pending => break outcome,
            _ = interval.tick() => {
                app.spinner_frame = app.spinner_frame.wrapping_add(1);
                if let Err(e) = terminal.draw(|f| ui(f, app)) {
                    app.controller
                        .finish_submit(Err(SubmitError::Transport(format!("terminal error: {e}"))));
                    return Err(e);
                }
            }
        }
    };
    app.controller.finish_submit(outcome);
    app.last_completed = Some(Local::now());
    Ok(())
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    let title = Paragraph::new(Line::from(Span::styled(
        "Portfolio Optimizer",
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(chunks[1]);

    render_form(f, body[0], app);
    render_results(f, body[1], app);
    render_help(f, chunks[2], app);

    if app.error_visible() {
        if let Phase::ErrorShown(message) = app.controller.phase() {
            render_error_popup(f, message);
        }
    }
}

fn field_block(title: &str, focused: bool) -> Block<'_> {
    let border = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Gray)
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(format!(" {title} "))
}

fn text_field<'a>(
    value: &'a str,
    hint: Option<&'a str>,
    title: &'a str,
    focused: bool,
) -> Paragraph<'a> {
    let mut spans = vec![Span::styled(
        value,
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    )];
    if focused {
        spans.push(Span::styled("▌", Style::default().fg(Color::Yellow)));
    }
    if let Some(hint) = hint {
        spans.push(Span::styled(
            format!("  {hint}"),
            Style::default().fg(Color::Yellow),
        ));
    }
    Paragraph::new(Line::from(spans)).block(field_block(title, focused))
}

fn render_form(f: &mut Frame, area: Rect, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(area);

    let controller = &app.controller;

    f.render_widget(
        text_field(
            controller.capital(),
            controller.capital_advisory(),
            "Capital ($)",
            app.focus == Focus::Capital,
        ),
        rows[0],
    );
    f.render_widget(
        text_field(
            controller.desired_return(),
            controller.return_advisory(),
            "Desired Return (%)",
            app.focus == Focus::DesiredReturn,
        ),
        rows[1],
    );

    let horizon_line = if app.horizons.is_empty() {
        Line::from(Span::styled(
            "No horizons configured",
            Style::default().fg(Color::Red),
        ))
    } else {
        Line::from(vec![
            Span::styled("◀ ", Style::default().fg(Color::Gray)),
            Span::styled(
                controller.horizon().to_string(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::styled(" ▶", Style::default().fg(Color::Gray)),
        ])
    };
    f.render_widget(
        Paragraph::new(horizon_line).block(field_block("Horizon", app.focus == Focus::Horizon)),
        rows[2],
    );

    let focused_input = app.focus == Focus::TickerInput;
    let mut ticker_lines = vec![Line::from(vec![
        Span::styled(
            controller.ticker_input().to_string(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            if focused_input { "▌" } else { "" },
            Style::default().fg(Color::Yellow),
        ),
    ])];
    if let Some(error) = controller.ticker_error() {
        ticker_lines.push(Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(Color::Red),
        )));
    }
    f.render_widget(
        Paragraph::new(ticker_lines).block(field_block("Add Ticker (Enter)", focused_input)),
        rows[3],
    );

    render_ticker_list(f, rows[4], app);
    render_submit_button(f, rows[5], app);
}

fn render_ticker_list(f: &mut Frame, area: Rect, app: &App) {
    let focused = app.focus == Focus::TickerList;
    let block = field_block("Stocks", focused);

    let view = app.controller.ticker_view();
    match view {
        TickerListView::Empty => {
            let message = view.message().unwrap_or_default();
            let placeholder = Paragraph::new(message)
                .style(Style::default().fg(Color::Gray))
                .alignment(Alignment::Center)
                .block(block);
            f.render_widget(placeholder, area);
        }
        TickerListView::Tags(tags) => {
            let items: Vec<ListItem> = tags
                .iter()
                .map(|tag| {
                    ListItem::new(Line::from(vec![
                        Span::styled(
                            format!("{:<6}", tag.symbol.as_str()),
                            Style::default().fg(Color::Cyan),
                        ),
                        Span::styled(
                            format!(" ×  {}", tag.remove_hint),
                            Style::default().fg(Color::DarkGray),
                        ),
                    ]))
                })
                .collect();
            let list = List::new(items).block(block).highlight_style(
                Style::default()
                    .fg(Color::Black)
                    .bg(if focused { Color::Yellow } else { Color::Gray }),
            );
            let mut state = ListState::default();
            state.select(Some(app.selected_ticker.min(tags.len().saturating_sub(1))));
            f.render_stateful_widget(list, area, &mut state);
        }
    }
}

fn render_submit_button(f: &mut Frame, area: Rect, app: &App) {
    let ui_state = app.controller.ui_state();
    let focused = app.focus == Focus::Submit;
    let label = if ui_state.loading {
        format!(
            "{} {}",
            SPINNER[app.spinner_frame % SPINNER.len()],
            ui_state.button_label()
        )
    } else {
        ui_state.button_label().to_string()
    };
    let style = if !ui_state.submit_enabled() {
        Style::default().fg(Color::DarkGray)
    } else if focused {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Green)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Green)
    };
    let button = Paragraph::new(label)
        .style(style)
        .alignment(Alignment::Center)
        .block(field_block("Submit", focused));
    f.render_widget(button, area);
}

fn block_lines(block: &DisplayBlock) -> Vec<Line<'_>> {
    let mut lines = vec![Line::from(Span::styled(
        block.title.as_str(),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    ))];
    for line in &block.lines {
        if line.label.is_empty() {
            lines.push(Line::from(format!("  {}", line.value)));
        } else {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("  {}: ", line.label),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::raw(line.value.as_str()),
            ]));
        }
    }
    lines.push(Line::from(""));
    lines
}

fn render_results(f: &mut Frame, area: Rect, app: &App) {
    let title = match app.last_completed {
        Some(at) => format!(" Optimized Portfolio ({}) ", at.format("%H:%M:%S")),
        None => " Optimized Portfolio ".to_string(),
    };
    let block = Block::default().borders(Borders::ALL).title(title);

    let paragraph = match app.controller.phase() {
        Phase::ResultsShown(blocks) => {
            let lines: Vec<Line> = blocks.iter().flat_map(block_lines).collect();
            Paragraph::new(lines).wrap(Wrap { trim: false })
        }
        Phase::Submitting => Paragraph::new("Optimizing...")
            .style(Style::default().fg(Color::Yellow))
            .alignment(Alignment::Center),
        Phase::Idle | Phase::ErrorShown(_) => {
            Paragraph::new("Fill in the form and submit to see an allocation")
                .style(Style::default().fg(Color::Gray))
                .alignment(Alignment::Center)
        }
    };
    f.render_widget(paragraph.block(block), area);
}

fn render_help(f: &mut Frame, area: Rect, app: &App) {
    let help = match app.focus {
        Focus::Horizon => "←/→: Change Horizon | Tab: Next Field | Enter: Submit | Esc: Quit",
        Focus::TickerInput => "Type Letters | Enter: Add Ticker | Tab: Next Field | Esc: Quit",
        Focus::TickerList => "↑/↓: Select | d/Del: Remove Ticker | Tab: Next Field | Esc: Quit",
        _ => "Tab/Shift-Tab: Move | Enter: Submit | Esc: Quit",
    };
    let paragraph = Paragraph::new(help)
        .style(Style::default().fg(Color::Cyan))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(paragraph, area);
}

fn render_error_popup(f: &mut Frame, error: &str) {
    let popup_area = centered_rect(60, 30, f.area());
    f.render_widget(Clear, popup_area);

    let error_paragraph = Paragraph::new(error)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Error (Esc to dismiss)")
                .style(Style::default().fg(Color::Red)),
        )
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    f.render_widget(error_paragraph, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use serde_json::json;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(press(KeyCode::Char(c)));
        }
    }

    fn new_app() -> App {
        App::new(
            FormController::default(),
            vec!["short".to_string(), "medium".to_string(), "long".to_string()],
            "medium",
        )
    }

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| ui(f, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_default_horizon_is_selected() {
        let mut app = new_app();
        assert_eq!(app.controller.horizon(), "medium");
        app.focus = Focus::Horizon;
        app.handle_key(press(KeyCode::Right));
        assert_eq!(app.controller.horizon(), "long");
        app.handle_key(press(KeyCode::Right));
        assert_eq!(app.controller.horizon(), "short");
        app.handle_key(press(KeyCode::Left));
        assert_eq!(app.controller.horizon(), "long");
    }

    #[test]
    fn test_number_fields_accept_digits_only() {
        let mut app = new_app();
        type_text(&mut app, "10a00.5.0");
        assert_eq!(app.controller.capital(), "1000.50");
        app.handle_key(press(KeyCode::Backspace));
        assert_eq!(app.controller.capital(), "1000.5");

        app.handle_key(press(KeyCode::Tab));
        type_text(&mut app, "7.5");
        assert_eq!(app.controller.desired_return(), "7.5");
    }

    #[test]
    fn test_add_and_remove_tickers_with_keys() {
        let mut app = new_app();
        app.focus = Focus::TickerInput;
        type_text(&mut app, "aapl");
        app.handle_key(press(KeyCode::Enter));
        type_text(&mut app, "ms1ft");
        app.handle_key(press(KeyCode::Enter));
        assert_eq!(app.controller.tickers().to_strings(), vec!["AAPL", "MSFT"]);
        assert_eq!(app.selected_ticker, 1);

        app.focus = Focus::TickerList;
        app.handle_key(press(KeyCode::Up));
        app.handle_key(press(KeyCode::Char('d')));
        assert_eq!(app.controller.tickers().to_strings(), vec!["MSFT"]);
    }

    #[test]
    fn test_enter_in_field_requests_submit() {
        let mut app = new_app();
        assert_eq!(app.handle_key(press(KeyCode::Enter)), Action::Submit);
        app.focus = Focus::Submit;
        assert_eq!(app.handle_key(press(KeyCode::Enter)), Action::Submit);
        assert_eq!(app.handle_key(press(KeyCode::Esc)), Action::Quit);
    }

    #[test]
    fn test_keys_ignored_while_submitting() {
        let mut app = new_app();
        app.controller.set_capital("5000");
        app.controller.set_desired_return("10");
        app.controller.add_ticker("AAPL").unwrap();
        app.controller.add_ticker("MSFT").unwrap();
        assert!(app.controller.begin_submit().is_some());

        app.focus = Focus::Submit;
        assert_eq!(app.handle_key(press(KeyCode::Enter)), Action::None);
        assert_eq!(
            app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Action::Quit
        );
    }

    #[test]
    fn test_error_popup_is_dismissed_before_other_keys() {
        let mut app = new_app();
        app.controller
            .finish_submit(Err(SubmitError::Remote("Missing data".to_string())));
        assert!(app.error_visible());
        assert!(screen(&app).contains("Missing data"));

        assert_eq!(app.handle_key(press(KeyCode::Esc)), Action::None);
        assert!(!app.error_visible());
        assert_eq!(app.handle_key(press(KeyCode::Esc)), Action::Quit);
    }

    #[test]
    fn test_screen_shows_empty_state_and_results() {
        let mut app = new_app();
        let idle = screen(&app);
        assert!(idle.contains("No stocks added yet"));
        assert!(idle.contains("Optimize Portfolio"));

        app.controller.add_ticker("AAPL").unwrap();
        app.controller
            .finish_submit(Ok(json!({"AAPL": {"weight": 0.4, "value": 4000}})));
        let shown = screen(&app);
        assert!(shown.contains("Weight: 40.00%"));
        assert!(shown.contains("Value: $4,000.00"));
        assert!(!shown.contains("No stocks added yet"));
    }
}
