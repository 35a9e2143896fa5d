use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, View};
use crate::library::{group_by_day, ViewMode};
use crate::models::SummaryRecord;
use crate::overlay::HoverPhase;

const TOOLTIP_MAX_WIDTH: u16 = 60;

pub fn draw(frame: &mut Frame, app: &App) {
    match app.view {
        View::Library => draw_library(frame, app),
        View::Browse => draw_browse(frame, app),
    }

    if app.confirm_clear {
        render_confirm_clear(frame);
    }

    if app.show_help {
        render_help(frame, app.trigger_key());
    }
}

fn draw_library(frame: &mut Frame, app: &App) {
    // Main horizontal split: 2/5 list, 3/5 detail
    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(2, 5), Constraint::Ratio(3, 5)])
        .split(frame.area());

    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(3), // Search
            Constraint::Min(0),    // Record list
            Constraint::Length(1), // Status line
        ])
        .split(main_chunks[0]);

    render_header(frame, app, left_chunks[0]);
    render_search(frame, app, left_chunks[1]);
    render_record_list(frame, app, left_chunks[2]);
    render_status(
        frame,
        app,
        left_chunks[3],
        "j/k:nav  /:search  d:delete  C:clear  v:view  R:re-summarize  ?:help",
    );

    render_detail(frame, app.selected_record(), main_chunks[1]);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let title = format!(" Link Summaries [{}] ", app.view_mode.label());
    let stats = format!(
        " {} Stored | {} Shown",
        app.records.len(),
        app.visible_records().len()
    );

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let paragraph = Paragraph::new(stats).style(Style::default().fg(Color::White));
    frame.render_widget(paragraph, inner);
}

fn render_search(frame: &mut Frame, app: &App, area: Rect) {
    let (border, title) = if app.search_active {
        (Color::Cyan, " Search (Enter to keep, Esc to clear) ")
    } else {
        (Color::DarkGray, " Search (press /) ")
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));

    let mut spans = vec![
        Span::styled("> ", Style::default().fg(Color::Cyan)),
        Span::raw(app.search_query.as_str()),
    ];
    if app.search_active {
        spans.push(Span::styled("_", Style::default().fg(Color::White)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn record_item(record: &SummaryRecord) -> ListItem<'_> {
    let time = record.created_at().format("%H:%M").to_string();
    ListItem::new(Line::from(vec![
        Span::styled(format!("{time} "), Style::default().fg(Color::Blue)),
        Span::styled(record.title.as_str(), Style::default().fg(Color::White)),
    ]))
}

fn render_record_list(frame: &mut Frame, app: &App, area: Rect) {
    let records = app.visible_records();

    if records.is_empty() {
        let message = if app.records.is_empty() {
            "No summaries stored yet."
        } else {
            "No summaries match your search."
        };
        let paragraph = Paragraph::new(message)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(paragraph, area);
        return;
    }

    // Group headers occupy rows, so the highlighted row is offset from the
    // record index by the number of headers above it.
    let (items, selected_row) = match app.view_mode {
        ViewMode::Flat => (
            records.iter().map(|r| record_item(r)).collect::<Vec<_>>(),
            app.selected_index,
        ),
        ViewMode::Grouped => {
            let mut items = Vec::new();
            let mut selected_row = 0;
            let mut record_index = 0;
            for group in group_by_day(&records) {
                items.push(ListItem::new(Line::from(vec![
                    Span::styled(
                        group.date.format("%Y-%m-%d").to_string(),
                        Style::default()
                            .fg(Color::Yellow)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!("  {} summaries", group.records.len()),
                        Style::default().fg(Color::DarkGray),
                    ),
                ])));
                for record in group.records {
                    if record_index == app.selected_index {
                        selected_row = items.len();
                    }
                    items.push(record_item(record));
                    record_index += 1;
                }
            }
            (items, selected_row)
        }
    };

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(Some(selected_row));

    frame.render_stateful_widget(list, area, &mut state);
}

fn render_detail(frame: &mut Frame, record: Option<&SummaryRecord>, area: Rect) {
    let block = Block::default()
        .title(" Summary ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));

    let Some(record) = record else {
        let paragraph = Paragraph::new("No summary selected")
            .block(block)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, area);
        return;
    };

    let created = record.created_at().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let lines = vec![
        Line::from(Span::styled(
            record.title.as_str(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            record.url.as_str(),
            Style::default().fg(Color::Blue),
        )),
        Line::from(Span::styled(
            format!("Created: {created}"),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(""),
        Line::from(record.summary.as_str()),
    ];

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect, hint: &str) {
    let text = if app.is_loading_page {
        "Loading page...".to_string()
    } else if app.is_resummarizing {
        "Summarizing active page...".to_string()
    } else {
        app.status.clone().unwrap_or_else(|| hint.to_string())
    };

    let paragraph = Paragraph::new(text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

fn draw_browse(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Page title
            Constraint::Min(0),    // Links
            Constraint::Length(1), // Status line
        ])
        .split(frame.area());

    let (title, links) = match &app.page {
        Some(page) => (page.title.as_str(), page.links.as_slice()),
        None => ("No page loaded", &[][..]),
    };

    let header = Paragraph::new(app.page.as_ref().map_or("", |p| p.url.as_str()))
        .style(Style::default().fg(Color::Blue))
        .block(
            Block::default()
                .title(format!(" {title} "))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Green)),
        );
    frame.render_widget(header, chunks[0]);

    let items: Vec<ListItem> = links
        .iter()
        .map(|link| {
            ListItem::new(Line::from(vec![
                Span::styled(link.title.as_str(), Style::default().fg(Color::White)),
                Span::styled(format!("  {}", link.url), Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(" Links "))
        .highlight_style(Style::default().add_modifier(Modifier::UNDERLINED | Modifier::BOLD))
        .highlight_symbol("> ");

    let mut state = ListState::default();
    if !links.is_empty() {
        state.select(Some(app.link_index));
    }
    frame.render_stateful_widget(list, chunks[1], &mut state);

    let key = app.trigger_key();
    let hint = match app.overlay.phase() {
        HoverPhase::Pending { .. } => "...".to_string(),
        HoverPhase::Armed { .. } => format!("Press '{key}' to summarize this link"),
        HoverPhase::Requesting { .. } => "Summarizing...".to_string(),
        HoverPhase::Idle => "j/k:hover  tab:tooltip  r:reload  o:open  esc:library".to_string(),
    };
    render_status(frame, app, chunks[2], &hint);

    // Tooltip sits just under the hovered row
    let row = app.link_index.saturating_sub(state.offset()) as u16;
    let anchor = Rect {
        y: chunks[1].y + 1 + row + 1,
        ..chunks[1]
    };
    render_tooltip(frame, app, anchor);
}

fn render_tooltip(frame: &mut Frame, app: &App, anchor: Rect) {
    let Some(tooltip) = app.overlay.tooltip() else {
        return;
    };

    let screen = frame.area();
    let width = TOOLTIP_MAX_WIDTH.min(screen.width.saturating_sub(anchor.x + 4));
    if width < 10 {
        return;
    }

    let wrapped = textwrap::wrap(&tooltip.text, (width - 2) as usize);
    let height = (wrapped.len() as u16 + 4).min(screen.height);
    let y = if anchor.y + height > screen.height {
        screen.height.saturating_sub(height)
    } else {
        anchor.y
    };
    let area = Rect {
        x: anchor.x + 4,
        y,
        width,
        height,
    };

    let border = if app.tooltip_focused {
        Color::Cyan
    } else if tooltip.is_hiding() {
        Color::DarkGray
    } else {
        Color::White
    };

    let button_style = if tooltip.button_enabled() {
        Style::default().fg(Color::White).bg(Color::DarkGray)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let mut lines: Vec<Line> = wrapped
        .into_iter()
        .map(|l| Line::from(l.into_owned()))
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!(" {} ", tooltip.button_label()),
        button_style,
    )));

    let paragraph = Paragraph::new(lines)
        .style(Style::default().fg(Color::Gray).bg(Color::Black))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border)),
        );

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn render_confirm_clear(frame: &mut Frame) {
    let area = centered_rect(40, 20, frame.area());

    let block = Block::default()
        .title(" Clear all ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));

    let paragraph = Paragraph::new("Are you sure you want to delete all summaries? (y/n)")
        .block(block)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::White));

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn render_help(frame: &mut Frame, trigger_key: char) {
    let area = centered_rect(50, 70, frame.area());

    let help_text = [
        String::new(),
        " Library:".to_string(),
        "   j / k    Move down / up".to_string(),
        "   /        Search title, summary and url".to_string(),
        "   d        Delete summary".to_string(),
        "   C        Clear all summaries".to_string(),
        "   v        Toggle by-day / flat view".to_string(),
        "   R        Re-summarize active page".to_string(),
        "   o        Open in browser".to_string(),
        "   b        Browse active page".to_string(),
        String::new(),
        " Browse:".to_string(),
        "   j / k    Hover next / previous link".to_string(),
        format!("   {trigger_key}        Summarize hovered link"),
        "   Tab      Focus tooltip".to_string(),
        "   r        Reload tooltip summary".to_string(),
        "   Esc      Back to library".to_string(),
        String::new(),
        "   q        Quit".to_string(),
        String::new(),
        " Press any key to close".to_string(),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(help_text.join("\n"))
        .block(block)
        .style(Style::default().fg(Color::White));

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
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

    #[test]
    fn centered_rect_stays_inside_parent() {
        let parent = Rect::new(0, 0, 100, 50);
        let inner = centered_rect(50, 20, parent);
        assert!(inner.x >= parent.x && inner.right() <= parent.right());
        assert!(inner.y >= parent.y && inner.bottom() <= parent.bottom());
        assert_eq!(inner.width, 50);
    }
}
