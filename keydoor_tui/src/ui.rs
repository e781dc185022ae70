use keydoor_core::{Cell, GridMap, Plan, State};
use ratatui::{prelude::*, widgets::*};

use crate::App;

/// Renders the user interface.
pub fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(70), // Map and plan
            Constraint::Percentage(20), // Agent state
            Constraint::Percentage(10), // Help
        ])
        .split(frame.area());

    let top_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(main_layout[0]);

    render_map(frame, top_layout[0], &app.map, app.current_state());
    render_plan(frame, top_layout[1], &app.plan, app.step);
    render_state(frame, main_layout[1], app);

    let help_text = Paragraph::new(
        "'q'/Esc quit, space pause/resume, →/'n' next step, ←/'p' previous step, 'r' restart",
    )
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

/// Renders the grid with the agent onto the frame.
fn render_map(frame: &mut Frame, area: Rect, map: &GridMap, state: &State) {
    let mut lines: Vec<Line> = Vec::with_capacity(map.height());

    for (row, cells) in map.rows().enumerate() {
        let spans: Vec<Span> = cells
            .iter()
            .enumerate()
            .map(|(col, cell)| {
                if state.position.row == row && state.position.col == col {
                    Span::styled("@", Style::default().fg(Color::Red).bold())
                } else {
                    cell_span(*cell, state)
                }
            })
            .collect();
        lines.push(Line::from(spans));
    }

    let map_paragraph = Paragraph::new(lines)
        .block(Block::default().title("Key & Door").borders(Borders::ALL))
        .alignment(Alignment::Center);

    frame.render_widget(map_paragraph, area);
}

fn cell_span(cell: Cell, state: &State) -> Span<'static> {
    match cell {
        Cell::Empty => Span::raw(" "),
        Cell::Start => Span::styled("s", Style::default().fg(Color::DarkGray)),
        Cell::Wall => Span::styled("#", Style::default().fg(Color::DarkGray)),
        // Picked up keys leave the floor empty
        Cell::Key if state.holds_key => Span::raw(" "),
        Cell::Key => Span::styled("k", Style::default().fg(Color::Yellow)),
        Cell::Door if state.door_unlocked => Span::styled("+", Style::default().fg(Color::Yellow)),
        Cell::Door => Span::styled("|", Style::default().fg(Color::Yellow)),
        Cell::Goal => Span::styled("g", Style::default().fg(Color::Green)),
    }
}

/// Renders the plan, highlighting the action that produced the current state.
fn render_plan(frame: &mut Frame, area: Rect, plan: &Plan, step: usize) {
    let items: Vec<ListItem> = plan
        .iter()
        .enumerate()
        .map(|(index, action)| {
            let style = if index + 1 == step {
                Style::default().fg(Color::Black).bg(Color::Yellow)
            } else if index < step {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(Span::styled(
                format!("{:>3}. {action}", index + 1),
                style,
            )))
        })
        .collect();

    let plan_widget = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Plan ({} actions)", plan.len())),
    );
    frame.render_widget(plan_widget, area);
}

fn render_state(frame: &mut Frame, area: Rect, app: &App) {
    let state = app.current_state();
    let last_action = app
        .step
        .checked_sub(1)
        .and_then(|index| app.plan.actions().get(index))
        .map_or_else(|| "-".to_string(), ToString::to_string);
    let status = if app.is_finished() {
        "finished"
    } else if app.paused {
        "paused"
    } else {
        "running"
    };

    let lines = vec![
        Line::from(format!(
            "Step {}/{} ({status})   Last action: {last_action}",
            app.step,
            app.plan.len()
        )),
        Line::from(vec![
            Span::raw(format!("Position: {}   Key: ", state.position)),
            flag_span(state.holds_key, "held", "not held"),
            Span::raw("   Door: "),
            flag_span(state.door_unlocked, "unlocked", "locked"),
        ]),
    ];

    let state_widget =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Agent"));
    frame.render_widget(state_widget, area);
}

fn flag_span(value: bool, yes: &'static str, no: &'static str) -> Span<'static> {
    if value {
        Span::styled(yes, Style::default().fg(Color::Green))
    } else {
        Span::styled(no, Style::default().fg(Color::Red))
    }
}

/// Plain-text map with the agent drawn as `A`, one row per line.
pub fn text_map(map: &GridMap, state: &State) -> String {
    map.rows()
        .enumerate()
        .map(|(row, cells)| {
            cells
                .iter()
                .enumerate()
                .map(|(col, cell)| {
                    if state.position.row == row && state.position.col == col {
                        'A'
                    } else {
                        cell.marker()
                    }
                })
                .map(String::from)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use keydoor_core::Position;

    #[test]
    fn test_text_map_marks_agent() {
        let map: GridMap = "S.K\n.DG".parse().unwrap();
        let text = text_map(&map, &State::new(Position::new(1, 0)));
        assert_eq!(text, "S . K\nA D G");
    }
}
