use crate::board::{freeze_button_label, not_shown_notice, BoardRow, BoardView, PLACEHOLDER_CELL};
use crate::hotkeys::dashboard_controls_legend;
use ratatui::backend::TestBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};
use ratatui::Terminal;

/// Borders (2) + header (1) + the fixed ten rows.
const TABLE_HEIGHT: u16 = 13;

/// Renders one dashboard frame into a plain string. Frames go to the
/// `Terminal` runtime trait as text, so the same renderer serves the
/// interactive loop, headless runs, and tests.
pub fn render_dashboard(
    view: &BoardView,
    action_cells: &[String],
    selected_row: Option<usize>,
    width: u16,
    height: u16,
) -> String {
    let backend = TestBackend::new(width, height);
    let mut terminal = Terminal::new(backend).expect("terminal");
    terminal
        .draw(|frame| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(TABLE_HEIGHT),
                    Constraint::Length(1),
                    Constraint::Length(1),
                    Constraint::Length(1),
                ])
                .split(frame.area());

            let rows = view
                .rows
                .iter()
                .enumerate()
                .map(|(index, row)| {
                    let action = action_cells
                        .get(index)
                        .map(String::as_str)
                        .unwrap_or(PLACEHOLDER_CELL);
                    let mut table_row = match row {
                        BoardRow::Worker {
                            worker_id,
                            task_description,
                            status_label,
                            ..
                        } => Row::new(vec![
                            Cell::from(worker_id.clone())
                                .style(Style::default().fg(Color::Cyan)),
                            Cell::from(task_description.clone()),
                            Cell::from(*status_label).style(status_style(status_label)),
                            Cell::from(action.to_string()),
                        ]),
                        BoardRow::Placeholder => Row::new(vec![
                            Cell::from(PLACEHOLDER_CELL),
                            Cell::from(PLACEHOLDER_CELL),
                            Cell::from(PLACEHOLDER_CELL),
                            Cell::from(PLACEHOLDER_CELL),
                        ]),
                    };
                    if selected_row == Some(index) {
                        table_row = table_row
                            .style(Style::default().add_modifier(Modifier::REVERSED));
                    }
                    table_row
                })
                .collect::<Vec<_>>();

            let table = Table::new(
                rows,
                [
                    Constraint::Length(16),
                    Constraint::Min(28),
                    Constraint::Length(12),
                    Constraint::Min(24),
                ],
            )
            .header(
                Row::new(vec!["ID", "Task Description", "Status", "Actions"])
                    .style(Style::default().add_modifier(Modifier::BOLD)),
            )
            .block(Block::default().borders(Borders::ALL).title("Worker Status"));
            frame.render_widget(table, chunks[0]);

            let notice = not_shown_notice(view.not_shown_count).unwrap_or_default();
            frame.render_widget(
                Paragraph::new(notice).style(Style::default().add_modifier(Modifier::ITALIC)),
                chunks[1],
            );

            frame.render_widget(
                Paragraph::new(format!("[ {} ]", freeze_button_label(view.frozen))),
                chunks[2],
            );

            frame.render_widget(
                Paragraph::new(dashboard_controls_legend())
                    .style(Style::default().fg(Color::DarkGray)),
                chunks[3],
            );
        })
        .expect("draw");

    let buffer = terminal.backend().buffer().clone();
    let mut out = String::new();
    for y in 0..height {
        for x in 0..width {
            if let Some(cell) = buffer.cell((x, y)) {
                out.push_str(cell.symbol());
            }
        }
        out.push('\n');
    }
    out
}

fn status_style(status_label: &str) -> Style {
    match status_label {
        "Failed" => Style::default().fg(Color::Red),
        "Completed" => Style::default().fg(Color::Green),
        "In Progress" => Style::default().fg(Color::Yellow),
        "Unknown" => Style::default().fg(Color::Magenta),
        _ => Style::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::render_dashboard;
    use crate::board::{derive_board, PLACEHOLDER_CELL, VISIBLE_ROWS};
    use crate::types::WorkerRecord;

    fn worker(id: &str, status: &str) -> WorkerRecord {
        WorkerRecord {
            worker_id: id.to_string(),
            task_description: format!("task {id}"),
            status: status.to_string(),
        }
    }

    fn placeholder_cells(view_rows: usize) -> Vec<String> {
        vec![PLACEHOLDER_CELL.to_string(); view_rows]
    }

    #[test]
    fn frame_contains_headers_board_rows_and_controls() {
        let view = derive_board(&[worker("w-1", "failed")], false);
        let mut cells = placeholder_cells(VISIBLE_ROWS);
        cells[0] = "Complete".to_string();

        let frame = render_dashboard(&view, &cells, Some(0), 100, 24);
        assert!(frame.contains("Worker Status"));
        assert!(frame.contains("Task Description"));
        assert!(frame.contains("w-1"));
        assert!(frame.contains("Failed"));
        assert!(frame.contains("Complete"));
        assert!(frame.contains("Freeze Worker Creation"));
        assert!(frame.contains("Keys:"));
    }

    #[test]
    fn frozen_view_shows_unfreeze_label() {
        let view = derive_board(&[], true);
        let frame = render_dashboard(&view, &placeholder_cells(VISIBLE_ROWS), None, 100, 24);
        assert!(frame.contains("Unfreeze Worker Creation"));
    }

    #[test]
    fn overflow_notice_appears_under_the_table() {
        let workers = (0..15)
            .map(|i| worker(&format!("w-{i:02}"), "completed"))
            .collect::<Vec<_>>();
        let view = derive_board(&workers, false);
        let frame = render_dashboard(&view, &placeholder_cells(VISIBLE_ROWS), None, 100, 24);
        assert!(frame.contains("5 workers not shown"));
    }

    #[test]
    fn zero_viewport_renders_empty() {
        let view = derive_board(&[], false);
        let frame = render_dashboard(&view, &placeholder_cells(VISIBLE_ROWS), None, 0, 0);
        assert!(frame.is_empty());
    }
}
