use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    style::Stylize,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row as TableRow, Table},
};

use crate::domain::HELP_TEXT;
use crate::model::{Popup, UIData};
use crate::store::{ColumnConfig, SortDirection};

const COLUMN_WIDTH_MARGIN: usize = 2;

/// Renders one frame from the prepared UI data. This layer owns no
/// table state; it draws what the model derived.
pub fn draw(data: &UIData, frame: &mut Frame) {
    if data.loading {
        let message = Paragraph::new("Restoring session ...")
            .centered()
            .block(Block::bordered().title(" ted "));
        frame.render_widget(message, frame.area());
        return;
    }

    let [main_area, status_area] =
        Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(frame.area());

    match &data.columns_panel {
        Some((columns, selected)) => draw_column_manager(frame, main_area, columns, *selected),
        None => draw_table(data, frame, main_area),
    }

    draw_status_line(data, frame, status_area);

    if let Some(popup) = &data.popup {
        draw_popup(popup, frame);
    }
}

fn draw_table(data: &UIData, frame: &mut Frame, area: Rect) {
    let widths: Vec<Constraint> = data
        .view
        .visible_columns
        .iter()
        .map(|col| {
            let content = data
                .view
                .page_rows
                .iter()
                .map(|row| row.get(&col.id).map(|v| v.to_string().len()).unwrap_or(0))
                .max()
                .unwrap_or(0);
            let width = std::cmp::max(col.label.len() + COLUMN_WIDTH_MARGIN, content)
                .min(data.max_column_width);
            Constraint::Length(width as u16)
        })
        .collect();

    let header = TableRow::new(data.view.visible_columns.iter().map(|col| {
        let marker = match &data.sort {
            Some((id, SortDirection::Asc)) if *id == col.id => " ▲",
            Some((id, SortDirection::Desc)) if *id == col.id => " ▼",
            _ => "",
        };
        Cell::from(format!("{}{marker}", col.label).bold())
    }));

    let rows = data.view.page_rows.iter().enumerate().map(|(ridx, row)| {
        TableRow::new(data.view.visible_columns.iter().enumerate().map(
            |(cidx, col)| {
                let content = truncated(
                    &row.get(&col.id).map(|v| v.to_string()).unwrap_or_default(),
                    data.max_column_width,
                );
                if (ridx, cidx) == data.selected {
                    Cell::from(content.reversed())
                } else {
                    Cell::from(content)
                }
            },
        ))
    });

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(Block::bordered().title(Line::from(" ted ".bold()).centered()));
    frame.render_widget(table, area);
}

fn draw_column_manager(frame: &mut Frame, area: Rect, columns: &[ColumnConfig], selected: usize) {
    let lines: Vec<Line> = columns
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let mark = if col.visible { "[x]" } else { "[ ]" };
            let text = format!(" {mark} {} ({})", col.label, col.id);
            if idx == selected {
                Line::from(text.reversed())
            } else {
                Line::from(text)
            }
        })
        .collect();

    let block = Block::bordered()
        .title(Line::from(" Columns ".bold()).centered())
        .title_bottom(Line::from(" Space toggle │ n new │ Esc back ").centered());
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_status_line(data: &UIData, frame: &mut Frame, area: Rect) {
    if let Some((prompt, input)) = &data.input {
        let line = Line::from(vec![
            Span::from(prompt.clone()).bold(),
            Span::from(input.text.clone()),
        ]);
        frame.render_widget(Paragraph::new(line), area);
        frame.set_cursor_position(Position::new(
            area.x + (prompt.chars().count() + input.cursor) as u16,
            area.y,
        ));
        return;
    }

    let mut spans = Vec::new();
    if !data.search_query.is_empty() {
        spans.push(Span::from(format!("/{} ", data.search_query)).yellow());
    }
    spans.push(Span::from(data.status_message.clone()));

    let right = format!(
        "page {}/{} │ {} rows │ {}/page │ ? help",
        data.current_page + 1,
        data.page_count,
        data.total_matches,
        data.rows_per_page,
    );
    let pad = (area.width as usize)
        .saturating_sub(spans.iter().map(|s| s.content.chars().count()).sum::<usize>())
        .saturating_sub(right.chars().count());
    spans.push(Span::from(" ".repeat(pad)));
    spans.push(Span::from(right).dim());

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_popup(popup: &Popup, frame: &mut Frame) {
    let (title, body) = match popup {
        Popup::Help => (" Help ".to_string(), HELP_TEXT.to_string()),
        Popup::Alert(message) => (" Error ".to_string(), format!("\n {message}\n\n (press any key)")),
        Popup::ConfirmDelete { row_id } => (
            " Confirm delete ".to_string(),
            format!("\n Delete row {row_id}? This cannot be undone.\n\n (y confirms, any other key cancels)"),
        ),
    };

    let lines: Vec<&str> = body.lines().collect();
    let height = (lines.len() as u16 + 2).min(frame.area().height);
    let width = lines
        .iter()
        .map(|l| l.chars().count() as u16 + 4)
        .max()
        .unwrap_or(20)
        .max(title.len() as u16 + 4)
        .min(frame.area().width);
    let area = centered_rect(frame.area(), width, height);

    let block = Block::bordered().title(Line::from(title.bold()).centered());
    frame.render_widget(Clear, area);
    frame.render_widget(Paragraph::new(body).block(block), area);
}

fn centered_rect(outer: Rect, width: u16, height: u16) -> Rect {
    let x = outer.x + outer.width.saturating_sub(width) / 2;
    let y = outer.y + outer.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(outer.width), height.min(outer.height))
}

fn truncated(content: &str, width: usize) -> String {
    if content.chars().count() <= width {
        return content.to_string();
    }
    if width < 3 {
        // No room for an ellipsis; show what fits.
        return content.chars().take(width).collect();
    }
    let mut reduced: String = content.chars().take(width - 3).collect();
    reduced.push_str("...");
    reduced
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_keeps_short_values_and_marks_long_ones() {
        assert_eq!(truncated("short", 10), "short");
        assert_eq!(truncated("a very long cell value", 10), "a very ...");
        assert_eq!(truncated("anything", 2), "an");
        assert_eq!(truncated("anything", 0), "");
    }

    #[test]
    fn centered_rect_stays_inside_the_outer_area() {
        let outer = Rect::new(0, 0, 80, 24);
        let inner = centered_rect(outer, 40, 10);
        assert!(inner.x + inner.width <= outer.width);
        assert!(inner.y + inner.height <= outer.height);
    }
}
