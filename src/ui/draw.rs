use anyhow::Result;
use ratatui::backend::Backend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::line::NORMAL as LINE;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use ratatui_image::{Resize, StatefulImage};

use crate::config::RgbColor;
use crate::country::CountryRecord;

use super::app::{App, CardHit, LoadState};
use super::overlay::OverlayHitArea;
use super::panes::Focus;

const SEARCH_PLACEHOLDER: &str = "Search for a country...";
const READ_MORE: &str = "[ Read more ]";
const CLOSE_BUTTON: &str = "[x]";
const SEARCH_HELP: &str = "Type to filter  Enter/Tab: browse  Esc: grid  F1: help";
const GRID_HELP: &str = "hjkl/arrows: move  Enter: read more  /: search  ?: help  q: quit";
const OVERLAY_HELP: &str = "Esc/q: close  click outside: close";
const HELP_MODAL_FOOTER: &str = "j/k: scroll  Esc/q: close";

pub fn render<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    terminal.draw(|frame| draw_frame(frame, app))?;
    Ok(())
}

fn draw_frame(frame: &mut Frame<'_>, app: &mut App) {
    let size = frame.area();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(size);

    draw_header(frame, layout[0], app);
    draw_search(frame, layout[1], app);
    draw_grid(frame, layout[2], app);
    draw_footer(frame, layout[3], app);
    draw_overlay(frame, size, app);
    draw_help_modal(frame, size, app);
}

fn draw_header(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let header_style = header_text_style(app);
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(24)])
        .split(area);

    let title = Line::from(vec![
        Span::styled("COUNTRYDEX", header_style.add_modifier(Modifier::BOLD)),
        Span::styled("  REST COUNTRIES", header_style),
    ]);
    frame.render_widget(Paragraph::new(title), chunks[0]);

    let counts = match app.load_state {
        LoadState::Loading => "LOADING".to_string(),
        LoadState::Failed => "OFFLINE".to_string(),
        LoadState::Ready => format!("{}/{} countries", app.filtered.len(), app.countries.len()),
    };
    frame.render_widget(
        Paragraph::new(Span::styled(counts, header_style)).alignment(Alignment::Right),
        chunks[1],
    );
}

fn draw_search(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    app.search_area = Some(area);
    let active = app.focus == Focus::Search;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, active))
        .title(Span::styled(
            format!(" {} ", Focus::Search.title()),
            header_text_style(app),
        ));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let value = app.search_input.value();
    if value.is_empty() {
        let placeholder = Span::styled(
            SEARCH_PLACEHOLDER,
            Style::default().add_modifier(Modifier::DIM),
        );
        frame.render_widget(Paragraph::new(placeholder), inner);
    } else {
        let scroll = app.search_input.visual_scroll(inner.width as usize);
        frame.render_widget(
            Paragraph::new(value).scroll((0, scroll as u16)),
            inner,
        );
    }

    if active && !app.overlay.is_open() && app.help_modal.is_none() {
        let scroll = app.search_input.visual_scroll(inner.width as usize);
        let column = app.search_input.visual_cursor().saturating_sub(scroll) as u16;
        frame.set_cursor_position((inner.x.saturating_add(column), inner.y));
    }
}

fn draw_grid(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    let active = app.focus == Focus::Grid;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, active))
        .title(Span::styled(
            format!(" {} ", Focus::Grid.title()),
            header_text_style(app),
        ));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    app.card_hits.clear();

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    if app.filtered.is_empty() {
        let message = app.empty_message();
        render_centered_line(frame, inner, &message);
        return;
    }

    let grid = &app.config().ui.grid;
    let card_width = grid.card_width.min(inner.width).max(1);
    let card_height = grid.card_height.min(inner.height).max(1);
    let columns = (inner.width / card_width).max(1) as usize;
    let rows = (inner.height / card_height).max(1) as usize;
    app.sync_viewport(columns, rows);

    let start = app.scroll_row * columns;
    let end = (start + rows * columns).min(app.filtered.len());
    let mut hits = Vec::with_capacity(end.saturating_sub(start));

    for index in start..end {
        let slot = index - start;
        let card_area = Rect {
            x: inner.x + (slot % columns) as u16 * card_width,
            y: inner.y + (slot / columns) as u16 * card_height,
            width: card_width,
            height: card_height,
        };
        let Some(record) = app.filtered_record(index) else {
            continue;
        };
        let highlight = index == app.selected;
        let button = draw_card(frame, card_area, app, record, highlight);
        hits.push(CardHit {
            area: card_area,
            button,
            index,
        });
    }

    app.card_hits = hits;
}

/// Draw one card and return where its read-more button landed.
fn draw_card(
    frame: &mut Frame<'_>,
    area: Rect,
    app: &App,
    record: &CountryRecord,
    highlight: bool,
) -> Rect {
    let border = if highlight {
        Style::default().fg(color(app.ui_colors().selection_bg))
    } else {
        border_style(app, false)
    };
    let block = Block::default().borders(Borders::ALL).border_style(border);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let label_style = header_text_style(app);
    let name_style = if highlight {
        selection_style(app).add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };

    let lines = vec![
        Line::from(vec![
            Span::raw(format!("{} ", record.flag_emoji())),
            Span::styled(record.common_name().to_string(), name_style),
        ]),
        Line::from(vec![
            Span::styled("Region: ", label_style),
            Span::raw(record.region_text().to_string()),
        ]),
        Line::from(vec![
            Span::styled("Population: ", label_style),
            Span::raw(record.population_text()),
        ]),
        Line::from(Span::styled(
            READ_MORE,
            if highlight {
                selection_style(app)
            } else {
                header_text_style(app)
            },
        )),
    ];
    let button_row = lines.len() as u16 - 1;
    frame.render_widget(Paragraph::new(lines), inner);

    if inner.height <= button_row {
        return Rect::default();
    }
    Rect {
        x: inner.x,
        y: inner.y + button_row,
        width: (READ_MORE.len() as u16).min(inner.width),
        height: 1,
    }
}

fn draw_footer(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let message: String = if app.help_modal.is_some() {
        HELP_MODAL_FOOTER.to_string()
    } else if app.overlay.is_open() {
        OVERLAY_HELP.to_string()
    } else if let Some(status) = &app.status {
        status.clone()
    } else {
        match app.focus {
            Focus::Search => SEARCH_HELP.to_string(),
            Focus::Grid => GRID_HELP.to_string(),
        }
    };
    let colors = app.ui_colors();
    let style = Style::default()
        .fg(color(colors.status_fg))
        .bg(color(colors.status_bg));

    let background = Block::default().style(Style::default().bg(color(colors.status_bg)));
    frame.render_widget(background, area);

    frame.render_widget(Paragraph::new(message).style(style), area);
}

fn draw_overlay(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    let Some(record) = app.overlay_record() else {
        app.overlay_hit = None;
        return;
    };

    let overlay = &app.config().ui.overlay;
    let title = record.title();
    let emoji = record.flag_emoji().to_string();
    let flag_url = record.flag_url().map(str::to_string);
    let details = record.detail_lines();
    let show_flag = overlay.flag_images;

    // Dim everything behind the panel
    frame
        .buffer_mut()
        .set_style(area, Style::default().add_modifier(Modifier::DIM));

    let width = overlay
        .width
        .max(24)
        .min(area.width.saturating_sub(2))
        .max(1)
        .min(area.width);
    let text_width = width.saturating_sub(4).max(1) as usize;
    let label_width = details.iter().map(|d| d.label.len() + 1).max().unwrap_or(0);

    let header_style = header_text_style(app);
    let lines: Vec<Line> = details
        .iter()
        .map(|detail| {
            Line::from(vec![
                Span::styled(
                    format!("{:<width$} ", format!("{}:", detail.label), width = label_width),
                    header_style,
                ),
                Span::raw(detail.value.clone()),
            ])
        })
        .collect();
    let text_rows: usize = details
        .iter()
        .map(|detail| {
            (label_width + 1 + detail.value.chars().count())
                .div_ceil(text_width)
                .max(1)
        })
        .sum();

    let flag_rows = if show_flag {
        overlay.flag_height.saturating_add(1)
    } else {
        0
    };
    let text_rows = u16::try_from(text_rows).unwrap_or(u16::MAX);
    let height = text_rows
        .saturating_add(flag_rows)
        .saturating_add(2)
        .min(area.height.saturating_sub(2))
        .max(3)
        .min(area.height);

    // Too small for a bordered panel; keys still close it
    if width < 3 || height < 3 {
        app.overlay_hit = None;
        return;
    }

    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let panel = Rect::new(x, y, width, height);
    let close_button = Rect::new(
        panel.x + panel.width.saturating_sub(CLOSE_BUTTON.len() as u16 + 1),
        panel.y,
        (CLOSE_BUTTON.len() as u16).min(panel.width),
        1,
    );
    app.overlay_hit = Some(OverlayHitArea {
        panel,
        close_button,
    });

    frame.render_widget(Clear, panel);

    let heading = match emoji.trim() {
        "" => format!(" {title} "),
        flag => format!(" {flag} {title} "),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, true))
        .title(Span::styled(heading, header_style.add_modifier(Modifier::BOLD)));
    let inner = block.inner(panel);
    frame.render_widget(block, panel);
    frame.render_widget(
        Paragraph::new(Span::styled(CLOSE_BUTTON, selection_style(app))),
        close_button,
    );

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let padded = Rect {
        x: inner.x.saturating_add(1),
        width: inner.width.saturating_sub(2),
        ..inner
    };

    let text_area = if show_flag {
        let split = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(flag_rows.saturating_sub(1)),
                Constraint::Length(1),
                Constraint::Min(0),
            ])
            .split(padded);
        draw_flag(frame, split[0], app, &emoji, flag_url.as_deref());
        split[2]
    } else {
        padded
    };

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), text_area);
}

fn draw_flag(
    frame: &mut Frame<'_>,
    area: Rect,
    app: &mut App,
    emoji: &str,
    url: Option<&str>,
) {
    if area.width == 0 || area.height == 0 {
        return;
    }

    frame.render_widget(Clear, area);
    let render_area = image_render_area(app, area);

    if let Some(state) = app.flag_image_state() {
        let widget = StatefulImage::new(None).resize(Resize::Fit);
        frame.render_stateful_widget(widget, render_area, state);
        return;
    }

    // Fallback until an image is available
    let status = if let Some(error) = app.flag_error.as_deref() {
        Some(error)
    } else if app.flag_loading() {
        Some("LOADING FLAG")
    } else {
        None
    };
    let mut lines: Vec<Line> = Vec::new();
    if !emoji.trim().is_empty() {
        lines.push(Line::from(emoji.trim().to_string()));
    }
    if let Some(status) = status {
        lines.push(Line::from(Span::styled(status, header_text_style(app))));
    }
    match url {
        Some(url) => lines.push(Line::from(Span::styled(
            url.to_string(),
            Style::default().add_modifier(Modifier::DIM),
        ))),
        None if lines.is_empty() => lines.push(Line::from("NO FLAG AVAILABLE")),
        None => {}
    }
    render_centered_lines(frame, area, lines);
}

fn image_render_area(app: &App, area: Rect) -> Rect {
    if area.width == 0 || area.height == 0 {
        return area;
    }

    let Some(flag) = app.flag_data.as_ref() else {
        return area;
    };

    let (font_w, font_h) = app.image_font_size();
    if font_w == 0 || font_h == 0 {
        return area;
    }

    let desired_width = div_ceil_u32(flag.image().width(), u32::from(font_w));
    let desired_height = div_ceil_u32(flag.image().height(), u32::from(font_h));

    if desired_width == 0 || desired_height == 0 {
        return area;
    }

    let desired_width = desired_width.min(u32::from(u16::MAX)) as u16;
    let desired_height = desired_height.min(u32::from(u16::MAX)) as u16;

    let target_width = desired_width.min(area.width);
    let target_height = desired_height.min(area.height);

    let wratio = target_width as f64 / desired_width as f64;
    let hratio = target_height as f64 / desired_height as f64;
    let mut ratio = wratio.min(hratio);
    if !ratio.is_finite() || ratio <= 0.0 {
        ratio = 1.0;
    }

    let width = (desired_width as f64 * ratio)
        .round()
        .clamp(1.0, area.width as f64) as u16;
    let height = (desired_height as f64 * ratio)
        .round()
        .clamp(1.0, area.height as f64) as u16;

    let offset_x = area.width.saturating_sub(width) / 2;
    let offset_y = area.height.saturating_sub(height) / 2;

    Rect {
        x: area.x.saturating_add(offset_x),
        y: area.y.saturating_add(offset_y),
        width: width.max(1),
        height: height.max(1),
    }
}

fn div_ceil_u32(value: u32, divisor: u32) -> u32 {
    if divisor == 0 {
        return 0;
    }
    value / divisor + u32::from(value % divisor != 0)
}

fn draw_help_modal(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    if app.help_modal.is_none() {
        return;
    }

    // Calculate modal size: 2/3 width, 80% height
    let width = area.width.saturating_mul(2).saturating_div(3).max(40).min(area.width);
    let height = area.height.saturating_mul(4).saturating_div(5).max(10).min(area.height);

    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let modal_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, modal_area);

    // Get styles before any mutable borrows
    let header_style = header_text_style(app);
    let border_s = border_style(app, true);

    let sections = app.help_entries();
    let mut lines: Vec<Line> = Vec::new();

    let content_width = width.saturating_sub(4) as usize;
    let action_width = 20usize;

    for (section_idx, section) in sections.iter().enumerate() {
        let header_text = format!(" {} ", section.title);
        let padding_total = content_width.saturating_sub(header_text.len());
        let left_pad = padding_total / 2;
        let right_pad = padding_total - left_pad;
        let header_line = format!(
            "{}{}{}",
            LINE.horizontal.to_string().repeat(left_pad),
            header_text,
            LINE.horizontal.to_string().repeat(right_pad)
        );
        lines.push(Line::from(Span::styled(header_line, header_style)));

        for entry in &section.entries {
            let action = format!("{:<width$}", entry.action, width = action_width);
            lines.push(Line::from(vec![
                Span::styled(action, Style::default()),
                Span::styled(entry.keys.clone(), header_style),
            ]));
        }

        if section_idx < sections.len() - 1 {
            lines.push(Line::from(""));
        }
    }

    let total_lines = lines.len();
    // borders (2) + footer line (1)
    let inner_height = height.saturating_sub(3) as usize;

    let Some(modal) = app.help_modal.as_mut() else {
        return;
    };
    modal.total_lines = total_lines;
    modal.viewport_height = inner_height;

    let max_scroll = modal.total_lines.saturating_sub(modal.viewport_height);
    if modal.scroll > max_scroll {
        modal.scroll = max_scroll;
    }

    let scroll = modal.scroll;
    let viewport_height = modal.viewport_height;
    let scroll_indicator = match (modal.can_scroll_up(), modal.can_scroll_down()) {
        (true, true) => "▲▼",
        (true, false) => "▲ ",
        (false, true) => " ▼",
        (false, false) => "  ",
    };

    let visible_lines: Vec<Line> = lines
        .into_iter()
        .skip(scroll)
        .take(viewport_height)
        .collect();

    let title = Line::from(vec![
        Span::styled(" HELP ", header_style),
        Span::styled(scroll_indicator, header_style),
    ]);
    let footer = Line::from(Span::styled(
        format!(" {} ", HELP_MODAL_FOOTER),
        header_style,
    ));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_s)
        .title(title)
        .title_bottom(footer)
        .title_alignment(Alignment::Center);

    let inner = block.inner(modal_area);
    frame.render_widget(block, modal_area);
    frame.render_widget(Paragraph::new(visible_lines), inner);
}

fn selection_style(app: &App) -> Style {
    let colors = app.ui_colors();
    Style::default()
        .fg(color(colors.selection_fg))
        .bg(color(colors.selection_bg))
}

fn border_style(app: &App, active: bool) -> Style {
    let colors = app.ui_colors();
    let style = Style::default().fg(color(colors.border));
    if active {
        style.add_modifier(Modifier::BOLD)
    } else {
        style
    }
}

fn header_text_style(app: &App) -> Style {
    let colors = app.ui_colors();
    Style::default().fg(color(colors.separator))
}

fn render_centered_line(frame: &mut Frame<'_>, area: Rect, text: &str) {
    if area.width == 0 || area.height == 0 {
        return;
    }

    let target = Rect {
        y: area.y + (area.height.saturating_sub(1)) / 2,
        height: 1,
        ..area
    };
    frame.render_widget(
        Paragraph::new(text.to_string()).alignment(Alignment::Center),
        target,
    );
}

fn render_centered_lines(frame: &mut Frame<'_>, area: Rect, mut lines: Vec<Line<'_>>) {
    if area.width == 0 || area.height == 0 || lines.is_empty() {
        return;
    }

    lines.truncate(area.height as usize);
    let height = lines.len() as u16;
    let target = Rect {
        y: area.y + (area.height.saturating_sub(height)) / 2,
        height,
        ..area
    };
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), target);
}

fn color(rgb: RgbColor) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}
