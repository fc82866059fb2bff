use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::Datelike;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::grid::{DayCell, GridCell};
use crate::picker::{CalendarView, PaneView};

const CELL_WIDTH: usize = 3;
const WEEK_COLUMN_WIDTH: usize = 4;

/// Terminal rendering of a [`CalendarView`].
#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    /// Renderer that never emits escape codes.
    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, writer, view), fields(panes = view.panes.len()))]
    pub fn write_view<W: Write>(&self, mut writer: W, view: &CalendarView) -> anyhow::Result<()> {
        for (idx, pane) in view.panes.iter().enumerate() {
            if idx > 0 {
                writeln!(writer)?;
            }
            self.write_pane(&mut writer, view, pane)?;
        }
        Ok(())
    }

    fn write_pane<W: Write>(&self, writer: &mut W, view: &CalendarView, pane: &PaneView) -> anyhow::Result<()> {
        let lead = if view.show_week_number { WEEK_COLUMN_WIDTH } else { 0 };
        let width = lead + CELL_WIDTH * 7 - 1;

        let title = if pane.title.show_month_after_year {
            format!("{} {}", pane.title.year_label, pane.title.month_label)
        } else {
            format!("{} {}", pane.title.month_label, pane.title.year_label)
        };
        let prev = match pane.title.prev_enabled {
            Some(true) => "<",
            _ => " ",
        };
        let next = match pane.title.next_enabled {
            Some(true) => ">",
            _ => " ",
        };
        let inner = width.saturating_sub(2);
        writeln!(writer, "{prev}{}{next}", center(&title, inner))?;

        let mut headers: Vec<String> = view
            .weekdays
            .iter()
            .map(|day| {
                let label = fit(&day.abbr, CELL_WIDTH - 1);
                if day.is_weekend { self.paint(&label, "2") } else { label }
            })
            .collect();
        if view.is_rtl {
            headers.reverse();
        }
        writeln!(writer, "{}{}", " ".repeat(lead), headers.join(" "))?;

        for row in &pane.grid.rows {
            let mut cells: Vec<String> = row.cells.iter().map(|cell| self.format_cell(cell)).collect();
            if view.is_rtl {
                cells.reverse();
            }
            let week = row
                .week_number
                .map(|week| format!("{:>2}  ", week))
                .unwrap_or_default();
            let line = cells.join(" ");
            let line = if row.is_selected { self.paint(&line, "4") } else { line };
            writeln!(writer, "{week}{line}")?;
        }

        Ok(())
    }

    fn format_cell(&self, cell: &GridCell) -> String {
        match cell {
            GridCell::Placeholder => " ".repeat(CELL_WIDTH - 1),
            GridCell::Day(day) => {
                let label = format!("{:>2}", day.date.day());
                match cell_style(day) {
                    Some(code) => self.paint(&label, code),
                    None => label,
                }
            }
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn cell_style(day: &DayCell) -> Option<&'static str> {
    if day.is_selected || day.is_start_range || day.is_end_range {
        Some("7")
    } else if day.is_in_range {
        Some("46")
    } else if day.is_disabled {
        Some("2")
    } else if day.is_today {
        Some("1;4")
    } else if day.has_event {
        Some("33")
    } else if day.is_empty {
        Some("90")
    } else {
        None
    }
}

fn center(text: &str, width: usize) -> String {
    let visible = UnicodeWidthStr::width(text);
    if visible >= width {
        return text.to_string();
    }
    let left = (width - visible) / 2;
    let right = width - visible - left;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(right))
}

/// Truncates or pads `text` to `width` display columns.
fn fit(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = UnicodeWidthStr::width(ch.encode_utf8(&mut [0; 4]) as &str);
        if used + w > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push_str(&" ".repeat(width - used));
    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{Renderer, fit};
    use crate::options::OptionsPatch;
    use crate::picker::Picker;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn render(renderer: &Renderer, picker: &Picker) -> String {
        let mut buf = Vec::new();
        renderer.write_view(&mut buf, &picker.compute_view()).expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn plain_month_layout() {
        let patch = OptionsPatch {
            first_day: Some(1),
            ..OptionsPatch::default()
        };
        let picker = Picker::with_today(&patch, ymd(2021, 8, 10));
        let text = render(&Renderer::plain(), &picker);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0].trim_matches(|c| c == '<' || c == '>').trim(), "August 2021");
        assert_eq!(lines[1], "Mo Tu We Th Fr Sa Su");
        assert_eq!(lines[2], format!("{} 1", " ".repeat(18)));
        assert_eq!(lines[3], " 2  3  4  5  6  7  8");
        assert_eq!(lines.last().copied(), Some(format!("30 31{}", " ".repeat(15)).as_str()));
    }

    #[test]
    fn rtl_headers_dim_weekend_columns() {
        let patch = OptionsPatch {
            first_day: Some(1),
            is_rtl: Some(true),
            ..OptionsPatch::default()
        };
        let picker = Picker::with_today(&patch, ymd(2021, 8, 10));
        let text = render(&Renderer { color: true }, &picker);
        let headers = text.lines().nth(1).expect("header line");

        assert!(headers.starts_with("\x1b[2mSu\x1b[0m \x1b[2mSa\x1b[0m Fr Th"));
        assert!(headers.ends_with(" Tu Mo"));
    }

    #[test]
    fn fit_handles_wide_characters() {
        assert_eq!(fit("Sun", 2), "Su");
        assert_eq!(fit("日", 2), "日");
        assert_eq!(fit("x", 2), "x ");
    }
}
