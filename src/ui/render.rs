use super::DashboardState;
use crate::simulation::environment::Phase;
use ratatui::{
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

/// Grid cell containing the point `(x, y)` of `[-1, 1]²`; row 0 is `y = 1`.
#[allow(clippy::cast_precision_loss)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[must_use]
pub fn world_to_grid_coords(x: f64, y: f64, rows: usize, cols: usize) -> (usize, usize) {
    let c = ((x + 1.0) / 2.0 * cols as f64).floor().max(0.0) as usize;
    let r = ((1.0 - y) / 2.0 * rows as f64).floor().max(0.0) as usize;
    (
        r.min(rows.saturating_sub(1)),
        c.min(cols.saturating_sub(1)),
    )
}

/// Writes `marker` into the grid at `(row, col)` if it exists.
pub fn overlay(grid: &mut [String], row: usize, col: usize, marker: char) {
    if let Some(line) = grid.get_mut(row) {
        if let Some((start, ch)) = line.char_indices().nth(col) {
            line.replace_range(start..start + ch.len_utf8(), marker.encode_utf8(&mut [0; 4]));
        }
    }
}

/// HUD colour for each phase of the run.
#[must_use]
pub const fn phase_color(phase: Phase) -> Color {
    match phase {
        Phase::Supervised => Color::Green,
        Phase::Unsupervised => Color::Yellow,
        Phase::Testing => Color::Cyan,
        Phase::Finished => Color::DarkGray,
    }
}

/// Draws the HUD line, tinted by phase, above the contentment field.
pub fn draw_ui(f: &mut Frame, grid_lines: Vec<String>, dashboard: &DashboardState) {
    let [hud_area, field_area] =
        Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(f.area());

    let hud_style = Style::default()
        .fg(Color::Black)
        .bg(phase_color(dashboard.phase))
        .add_modifier(Modifier::BOLD);
    f.render_widget(
        Paragraph::new(Line::from(Span::styled(dashboard.hud_line(), hud_style))),
        hud_area,
    );

    let field = Paragraph::new(grid_lines.into_iter().map(Line::from).collect::<Vec<_>>())
        .style(Style::default().fg(Color::White).bg(Color::Black));
    f.render_widget(field, field_area);
}
