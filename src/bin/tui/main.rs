mod app;

use std::io;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use filing_charts::chart::Chart;
use filing_charts::config::TtmNullPolicy;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart as ChartWidget, Dataset, GraphType, Paragraph},
    Frame, Terminal,
};

use app::{format_adjustment, truncate, AppState, ConnectionStatus};

#[derive(Parser, Debug)]
#[command(name = "chart-tui", about = "Price versus fundamentals chart in the terminal")]
struct Args {
    /// Company page URI or ticker, e.g. AAPL-Apple or msft
    uri: String,

    #[arg(long, env = "API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// lenient or strict handling of null quarters in the TTM line
    #[arg(long, env = "TTM_NULL_POLICY", default_value = "lenient")]
    ttm: String,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let args = Args::parse();
    let ttm_policy = match args.ttm.parse::<TtmNullPolicy>() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(io::Error::other)?;

    let mut app = AppState::new(args.api_url.trim_end_matches('/').to_string(), args.uri, ttm_policy);

    // Initial fetch before rendering
    app.load(&client).await;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app, &client).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    client: &reqwest::Client,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| render(f, app))?;

        if !event::poll(Duration::from_millis(250))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(()),
            KeyCode::Char('r') | KeyCode::Char('R') => app.load(client).await,
            KeyCode::Left | KeyCode::Char('h') => app.move_pointer(-1.0),
            KeyCode::Right | KeyCode::Char('l') => app.move_pointer(1.0),
            KeyCode::Char('H') => app.move_pointer(-10.0),
            KeyCode::Char('L') => app.move_pointer(10.0),
            KeyCode::Esc => app.leave_pointer(),
            KeyCode::Char('m') => app.cycle_metric(),
            KeyCode::Char('y') => app.cycle_start_year(),
            KeyCode::Char('g') => app.toggle_log(),
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState) {
    let area = f.area();

    // Outer vertical split: header | chart | hover | footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // chart
            Constraint::Length(3), // hover
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_chart(f, app, chunks[1]);
    render_hover(f, app, chunks[2]);
    render_footer(f, chunks[3]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let (status_text, status_color) = match &app.status {
        ConnectionStatus::Connected => ("● loaded".to_string(), Color::Green),
        ConnectionStatus::Connecting => ("◌ loading".to_string(), Color::Yellow),
        ConnectionStatus::Error(e) => (format!("✗ {}", truncate(e, 50)), Color::Red),
    };

    let title = app
        .company
        .as_ref()
        .map_or(app.uri.clone(), |c| format!("{} {}", c.ticker, truncate(&c.name, 30)));
    let scale = if app.view.log_scale { "log" } else { "linear" };
    let adjustment = app
        .chart
        .as_ref()
        .map_or("—".to_string(), |c| format_adjustment(c.scene().adjustment));

    let spans = vec![
        Span::styled(
            format!(" {title}  "),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  │  "),
        Span::styled(format!("Price vs {}", app.metric_label()), Style::default().fg(Color::White)),
        Span::raw("  │  "),
        Span::styled(app.start_year_label(), Style::default().fg(Color::White)),
        Span::raw("  │  "),
        Span::styled(scale, Style::default().fg(Color::White)),
        Span::raw("  │  "),
        Span::styled(adjustment, Style::default().fg(Color::DarkGray)),
    ];

    let paragraph = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray)));
    f.render_widget(paragraph, area);
}

/// Scene paths use a top-left origin; the terminal chart wants y growing upward.
fn flip(path: &[(f64, f64)], height: f64) -> Vec<(f64, f64)> {
    path.iter().map(|(x, y)| (*x, height - y)).collect()
}

fn axis_labels(ticks: &[filing_charts::chart::engine::Tick]) -> Vec<Line<'static>> {
    match (ticks.first(), ticks.last()) {
        (Some(first), Some(last)) if ticks.len() > 1 => {
            vec![Line::from(first.label.clone()), Line::from(last.label.clone())]
        }
        (Some(only), _) => vec![Line::from(only.label.clone())],
        _ => Vec::new(),
    }
}

fn render_chart(f: &mut Frame, app: &AppState, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let Some(chart) = &app.chart else {
        let msg = if app.no_price_data {
            "No price data for the selected range"
        } else {
            "Loading…"
        };
        f.render_widget(Paragraph::new(msg).block(block), area);
        return;
    };

    render_scene(f, app, chart, block, area);
}

fn render_scene(f: &mut Frame, app: &AppState, chart: &Chart, block: Block, area: Rect) {
    let scene = chart.scene();
    let height = chart.layout().plot_height();
    let width = chart.layout().plot_width();

    let price = flip(&scene.price_path, height);
    let metrics: Vec<Vec<(f64, f64)>> = scene.metric_paths.iter().map(|p| flip(p, height)).collect();
    let ttms: Vec<Vec<(f64, f64)>> = scene.ttm_paths.iter().map(|p| flip(p, height)).collect();
    let cursor: Vec<(f64, f64)> = app
        .hover
        .as_ref()
        .and_then(|h| h.cursor_x)
        .map(|x| vec![(x, 0.0), (x, height)])
        .unwrap_or_default();

    let mut datasets = vec![Dataset::default()
        .name("Price")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&price)];
    for (i, path) in metrics.iter().enumerate() {
        let mut ds = Dataset::default()
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Yellow))
            .data(path);
        if i == 0 {
            ds = ds.name(app.metric_label());
        }
        datasets.push(ds);
    }
    for (i, path) in ttms.iter().enumerate() {
        let mut ds = Dataset::default()
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Magenta))
            .data(path);
        if i == 0 {
            ds = ds.name("TTM");
        }
        datasets.push(ds);
    }
    if !cursor.is_empty() {
        datasets.push(
            Dataset::default()
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::DarkGray))
                .data(&cursor),
        );
    }

    let right_caption = scene
        .right_axis
        .as_ref()
        .and_then(|a| a.label.clone())
        .unwrap_or_default();
    let title = match &scene.last_price {
        Some(marker) => format!(" {} │ {} ", marker.label, right_caption),
        None => format!(" {right_caption} "),
    };

    let widget = ChartWidget::new(datasets)
        .block(block.title(Span::styled(title, Style::default().fg(Color::Cyan))))
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([0.0, width])
                .labels(axis_labels(&scene.x_axis.ticks)),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([0.0, height])
                .labels(axis_labels(&scene.left_axis.ticks)),
        );
    f.render_widget(widget, area);
}

fn render_hover(f: &mut Frame, app: &AppState, area: Rect) {
    let hover = app.hover.as_ref();
    let price = hover
        .and_then(|h| h.price.as_ref())
        .map_or(String::new(), |p| p.label.clone());
    let (callout, link) = hover
        .and_then(|h| h.metric.as_ref())
        .map_or((String::new(), String::new()), |m| (m.caption(), m.filing_link.clone()));

    let line = Line::from(vec![
        Span::styled(format!(" {price} "), Style::default().fg(Color::Cyan)),
        Span::raw("  "),
        Span::styled(callout, Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled(link, Style::default().fg(Color::DarkGray)),
    ]);
    let paragraph = Paragraph::new(line)
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray)));
    f.render_widget(paragraph, area);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[r] ", Style::default().fg(Color::Yellow)),
        Span::raw("reload  "),
        Span::styled("[← → / h l] ", Style::default().fg(Color::Yellow)),
        Span::raw("move cursor  "),
        Span::styled("[esc] ", Style::default().fg(Color::Yellow)),
        Span::raw("hide cursor  "),
        Span::styled("[m] ", Style::default().fg(Color::Yellow)),
        Span::raw("metric  "),
        Span::styled("[y] ", Style::default().fg(Color::Yellow)),
        Span::raw("start year  "),
        Span::styled("[g] ", Style::default().fg(Color::Yellow)),
        Span::raw("log scale"),
    ]);
    let paragraph = Paragraph::new(line).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}
