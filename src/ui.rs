use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use crate::app::{App, ConfigField, InputLine, InputMode, Screen};
use crate::credentials::mask_secret;
use crate::transcript::Sender;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Config => render_config_screen(app, frame, body_area),
        Screen::Chat => render_chat_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" JMeter Chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!("{} ", app.server_url()), Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.screen {
        Screen::Config => " CONFIG ",
        Screen::Chat => " CHAT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match (app.screen, app.input_mode) {
        (Screen::Config, _) => vec![
            Span::styled(" Tab ", key_style),
            Span::styled(" next field ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" validate & save ", label_style),
            Span::styled(" Ctrl+C ", key_style),
            Span::styled(" quit ", label_style),
        ],
        (Screen::Chat, InputMode::Editing) => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" commands ", label_style),
        ],
        (Screen::Chat, InputMode::Normal) => {
            let mut hints = vec![
                Span::styled(" j/k ", key_style),
                Span::styled(" select ", label_style),
            ];
            if app.selected_command().is_some() {
                hints.extend(vec![
                    Span::styled(" c ", key_style),
                    Span::styled(format!(" {} ", app.copy_label()), label_style),
                ]);
            }
            hints.extend(vec![
                Span::styled(" t ", key_style),
                Span::styled(if app.show_status_panel { " hide status " } else { " show status " }, label_style),
                Span::styled(" r ", key_style),
                Span::styled(" refresh ", label_style),
                Span::styled(" C ", key_style),
                Span::styled(" clear ", label_style),
                Span::styled(" s ", key_style),
                Span::styled(" settings ", label_style),
                Span::styled(" i ", key_style),
                Span::styled(" type ", label_style),
                Span::styled(" q ", key_style),
                Span::styled(" quit ", label_style),
            ]);
            hints
        }
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

/// Render a bordered single-line input, scrolled horizontally to keep the
/// cursor visible. `display` must have one char per char of `input`.
fn render_input(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    input: &InputLine,
    display: String,
    focused: bool,
) {
    let border_color = if focused { Color::Yellow } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title.to_string());

    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = input.cursor();

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = display.chars().skip(scroll_offset).take(inner_width).collect();

    let paragraph = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(paragraph, area);

    if focused {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_config_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let form_width = 70.min(area.width.saturating_sub(4));
    let form_height = 13.min(area.height);
    let form_area = Rect::new(
        area.x + (area.width.saturating_sub(form_width)) / 2,
        area.y + (area.height.saturating_sub(form_height)) / 2,
        form_width,
        form_height,
    );

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Configuration ");
    let inner = block.inner(form_area);
    frame.render_widget(block, form_area);

    let [intro_area, path_area, key_area, status_area] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(inner);

    let intro = Paragraph::new("Enter your JMeter executable path and OpenAI API key.")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(intro, intro_area);

    render_input(
        frame,
        path_area,
        " JMeter Path ",
        &app.jmeter_path_input,
        app.jmeter_path_input.value().to_string(),
        app.config_field == ConfigField::JmeterPath,
    );

    // Mask the key, keeping the last four characters visible
    render_input(
        frame,
        key_area,
        " OpenAI API Key ",
        &app.openai_key_input,
        mask_secret(app.openai_key_input.value()),
        app.config_field == ConfigField::OpenaiKey,
    );

    let status = if app.is_validating() {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        Paragraph::new(format!("Validating{}", dots))
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC))
    } else if let Some(error) = &app.config_error {
        Paragraph::new(error.as_str()).style(Style::default().fg(Color::Red))
    } else {
        Paragraph::new("")
    };
    frame.render_widget(status.wrap(Wrap { trim: true }), status_area);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let (chat_area, status_area) = if app.show_status_panel {
        let [chat, status] = Layout::horizontal([
            Constraint::Percentage(65),
            Constraint::Percentage(35),
        ])
        .areas(area);
        (chat, Some(status))
    } else {
        (area, None)
    };

    let error_height = if app.chat_error.is_some() { 1 } else { 0 };
    let [transcript_area, error_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(error_height),
        Constraint::Length(3),
    ])
    .areas(chat_area);

    render_transcript(app, frame, transcript_area);

    if let Some(error) = &app.chat_error {
        let error_line = Paragraph::new(error.as_str()).style(Style::default().fg(Color::Red));
        frame.render_widget(error_line, error_area);
    }

    render_input(
        frame,
        input_area,
        " Message ",
        &app.chat_input,
        app.chat_input.value().to_string(),
        app.input_mode == InputMode::Editing,
    );

    if let Some(status_area) = status_area {
        render_status_panel(app, frame, status_area);
    }
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store dimensions for scroll calculations and mouse hit-testing
    app.transcript_area = Some(area);
    app.transcript_height = area.height.saturating_sub(2);
    app.transcript_width = area.width.saturating_sub(2);

    let focused = app.input_mode == InputMode::Normal;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }))
        .title(" Chat ");

    let text = if app.transcript.is_empty() {
        Text::from(Span::styled(
            "Ask about your JMeter test plans...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let placeholder = app.placeholder_id();
        let mut lines: Vec<Line> = Vec::new();

        for (index, (id, message)) in app.transcript.iter().enumerate() {
            let selected = app.selected_message == Some(index);
            let highlight = if selected {
                Style::default().bg(Color::DarkGray)
            } else {
                Style::default()
            };

            let label = match message.sender {
                Sender::User => Span::styled("You:", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
                Sender::Bot => Span::styled("Bot:", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            };
            lines.push(Line::from(label).style(highlight));

            if Some(id) == placeholder {
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat((app.animation_frame as usize) + 1);
                lines.push(Line::from(Span::styled(
                    format!("Thinking{}", dots),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
            } else {
                let body_style = if message.technical {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default()
                };
                for line in message.text.lines() {
                    lines.push(Line::from(Span::styled(line.to_string(), body_style)).style(highlight));
                }
            }

            if message.command().is_some() {
                let hint = if selected {
                    format!("[c] {}", app.copy_label())
                } else {
                    "[select to copy]".to_string()
                };
                lines.push(Line::from(Span::styled(hint, Style::default().fg(Color::Magenta))));
            }
            lines.push(Line::default());
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.transcript_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_status_panel(app: &App, frame: &mut Frame, area: Rect) {
    let mut title = vec![Span::raw(" Job Status ")];
    if app.panel.running {
        let spinner = ["|", "/", "-"][app.animation_frame as usize % 3];
        title.push(Span::styled(
            format!("{} running ", spinner),
            Style::default().fg(Color::Yellow),
        ));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(Line::from(title));

    let text = if app.panel.is_empty() {
        Text::from(Span::styled("Waiting for status...", Style::default().fg(Color::DarkGray)))
    } else {
        let mut lines: Vec<Line> = Vec::new();
        for entry in &app.panel.entries {
            lines.push(Line::from(Span::styled(
                format!("{}:", entry.label),
                Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
            )));
            for line in entry.text.lines() {
                lines.push(Line::from(line.to_string()));
            }
            lines.push(Line::default());
        }
        Text::from(lines)
    };

    let panel = Paragraph::new(text).block(block).wrap(Wrap { trim: false });
    frame.render_widget(panel, area);
}
