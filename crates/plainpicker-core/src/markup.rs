//! Render tree for a drawn picker.
//!
//! Pure translation of a [`CalendarView`] into elements; serialising the
//! tree to HTML is a separate step so another backend can consume the
//! tree directly.

use std::fmt::Write as _;

use serde::Serialize;

use crate::grid::{DayCell, GridCell, WeekRow};
use crate::picker::{CalendarView, PaneView, WeekdayHeader};
use crate::title::{SelectOption, TitleBar};

const CLASS_PREFIX: &str = "datepicker";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: impl ToString) -> Self {
        self.attrs.push((name.to_string(), value.to_string()));
        self
    }

    /// Adds a class attribute from the non-empty names.
    pub fn classes(self, names: &[&str]) -> Self {
        let joined = names
            .iter()
            .filter(|name| !name.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        if joined.is_empty() {
            self
        } else {
            self.attr("class", joined)
        }
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn children<I>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = Node>,
    {
        self.children.extend(nodes);
        self
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::Text(text)
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Text(text.to_string())
    }
}

fn class(suffix: &str) -> String {
    format!("{CLASS_PREFIX}-{suffix}")
}

pub fn render_view(view: &CalendarView) -> Node {
    let mut root_classes = vec![class("single")];
    if view.is_rtl {
        root_classes.push("is-rtl".to_string());
    }
    if let Some(theme) = &view.theme {
        root_classes.push(theme.clone());
    }
    let root_classes: Vec<&str> = root_classes.iter().map(String::as_str).collect();

    Element::new("div")
        .classes(&root_classes)
        .children(view.panes.iter().map(|pane| render_pane(view, pane)))
        .into()
}

fn render_pane(view: &CalendarView, pane: &PaneView) -> Node {
    Element::new("div")
        .classes(&[class("calendar").as_str()])
        .child(render_title(&pane.title))
        .child(
            Element::new("table")
                .classes(&[class("table").as_str()])
                .attr("role", "grid")
                .child(render_head(view))
                .child(
                    Element::new("tbody").children(pane.grid.rows.iter().map(|row| render_row(view, row))),
                ),
        )
        .into()
}

fn render_title(title: &TitleBar) -> Node {
    let month = Element::new("div")
        .classes(&[class("label").as_str()])
        .child(title.month_label.as_str())
        .child(render_select(&title.months, "month"));
    let year = Element::new("div")
        .classes(&[class("label").as_str()])
        .child(title.year_label.as_str())
        .child(render_select(&title.years, "year"));

    let mut el = Element::new("div")
        .classes(&[class("title").as_str()])
        .attr("role", "heading")
        .attr("aria-live", "assertive");
    el = if title.show_month_after_year {
        el.child(year).child(month)
    } else {
        el.child(month).child(year)
    };

    if let Some(enabled) = title.prev_enabled {
        el = el.child(nav_button("prev", enabled, &title.prev_label));
    }
    if let Some(enabled) = title.next_enabled {
        el = el.child(nav_button("next", enabled, &title.next_label));
    }
    el.into()
}

fn nav_button(kind: &str, enabled: bool, label: &str) -> Element {
    let kind_class = class(kind);
    Element::new("button")
        .classes(&[kind_class.as_str(), if enabled { "" } else { "is-disabled" }])
        .attr("type", "button")
        .child(label)
}

fn render_select(options: &[SelectOption], kind: &str) -> Element {
    let kind_class = class(&format!("select-{kind}"));
    Element::new("select")
        .classes(&[class("select").as_str(), kind_class.as_str()])
        .attr("tabindex", "-1")
        .children(options.iter().map(|option| {
            let mut el = Element::new("option").attr("value", option.value);
            if option.selected {
                el = el.attr("selected", "selected");
            }
            if option.disabled {
                el = el.attr("disabled", "disabled");
            }
            el.child(option.label.as_str()).into()
        }))
}

fn render_head(view: &CalendarView) -> Node {
    let mut headers: Vec<Node> = view.weekdays.iter().map(render_weekday).collect();
    if view.is_rtl {
        headers.reverse();
    }
    let mut row = Element::new("tr");
    if view.show_week_number {
        row = row.child(Element::new("th"));
    }
    Element::new("thead").child(row.children(headers)).into()
}

fn render_weekday(day: &WeekdayHeader) -> Node {
    Element::new("th")
        .attr("scope", "col")
        .child(Element::new("abbr").attr("title", &day.name).child(day.abbr.as_str()))
        .into()
}

fn render_row(view: &CalendarView, row: &WeekRow) -> Node {
    let mut cells: Vec<Node> = row.cells.iter().map(render_cell).collect();
    if view.is_rtl {
        cells.reverse();
    }
    if let Some(week) = row.week_number {
        cells.insert(
            0,
            Element::new("td").classes(&[class("week").as_str()]).child(week.to_string()).into(),
        );
    }

    let row_class = class("row");
    Element::new("tr")
        .classes(&[
            row_class.as_str(),
            if view.pick_whole_week { "pick-whole-week" } else { "" },
            if row.is_selected { "is-selected" } else { "" },
        ])
        .children(cells)
        .into()
}

fn render_cell(cell: &GridCell) -> Node {
    match cell {
        GridCell::Placeholder => Element::new("td").classes(&["is-empty"]).into(),
        GridCell::Day(day) => render_day(day),
    }
}

/// Day cell. The button carries the date so a click handler never has to
/// derive it from the grid position; the month is 0-based.
fn render_day(day: &DayCell) -> Node {
    use chrono::Datelike;

    let flags = [
        (day.is_empty, "is-outside-current-month"),
        (day.is_empty && !day.is_selectable, "is-selection-disabled"),
        (day.is_disabled, "is-disabled"),
        (day.is_today, "is-today"),
        (day.is_selected, "is-selected"),
        (day.has_event, "has-event"),
        (day.is_in_range, "is-inrange"),
        (day.is_start_range, "is-startrange"),
        (day.is_end_range, "is-endrange"),
    ];
    let classes: Vec<&str> = flags
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, name)| *name)
        .collect();

    let button_class = class("button");
    let day_class = class("day");
    Element::new("td")
        .attr("data-day", day.date.day())
        .classes(&classes)
        .attr("aria-selected", day.is_selected)
        .child(
            Element::new("button")
                .classes(&[button_class.as_str(), day_class.as_str()])
                .attr("type", "button")
                .attr("data-datepicker-year", day.date.year())
                .attr("data-datepicker-month", day.date.month0())
                .attr("data-datepicker-day", day.date.day())
                .child(day.date.day().to_string()),
        )
        .into()
}

/// Serialises a render tree to HTML.
pub fn to_html(node: &Node) -> String {
    let mut out = String::new();
    write_node(&mut out, node);
    out
}

fn write_node(out: &mut String, node: &Node) {
    match node {
        Node::Text(text) => out.push_str(&escape(text)),
        Node::Element(el) => {
            let _ = write!(out, "<{}", el.tag);
            for (name, value) in &el.attrs {
                let _ = write!(out, " {}=\"{}\"", name, escape(value));
            }
            out.push('>');
            for child in &el.children {
                write_node(out, child);
            }
            let _ = write!(out, "</{}>", el.tag);
        }
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
