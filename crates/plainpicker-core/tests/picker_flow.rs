use std::cell::RefCell;
use std::fs;
use std::io::Cursor;
use std::rc::Rc;
use std::time::Duration;

use chrono::NaiveDate;
use plainpicker_core::cli::{Invocation, OutputMode};
use plainpicker_core::commands::{dispatch_to, run_script};
use plainpicker_core::config::Config;
use plainpicker_core::events::PickerEvent;
use plainpicker_core::grid::GridCell;
use plainpicker_core::render::Renderer;
use plainpicker_core::{OptionsPatch, PickRanger, Picker, RangeLimits};
use tempfile::tempdir;

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[test]
fn config_drives_picker_options() {
    let temp = tempdir().expect("tempdir");
    let locale = temp.path().join("de.toml");
    fs::write(
        &locale,
        "previous_month = \"Vorheriger Monat\"\n\
         next_month = \"Nächster Monat\"\n\
         months = [\"Januar\", \"Februar\", \"März\", \"April\", \"Mai\", \"Juni\", \"Juli\", \"August\", \"September\", \"Oktober\", \"November\", \"Dezember\"]\n\
         weekdays = [\"Sonntag\", \"Montag\", \"Dienstag\", \"Mittwoch\", \"Donnerstag\", \"Freitag\", \"Samstag\"]\n\
         weekdays_short = [\"So\", \"Mo\", \"Di\", \"Mi\", \"Do\", \"Fr\", \"Sa\"]\n",
    )
    .expect("write locale");
    let rc = temp.path().join("pickerrc");
    fs::write(
        &rc,
        format!(
            "picker.first_day = 1\n\
             picker.format = %d.%m.%Y\n\
             picker.min_date = 2021-08-05\n\
             i18n.file = {}\n",
            locale.display()
        ),
    )
    .expect("write rc");

    let cfg = Config::load(Some(rc.as_path())).expect("load config");
    let today = ymd(2021, 8, 10);
    let patch = OptionsPatch::from_config(&cfg, today).expect("options");
    let mut picker = Picker::with_today(&patch, today);

    assert!(picker.set_date_str("02.08.2021", false));
    assert_eq!(picker.get_date(), Some(ymd(2021, 8, 5)));
    assert_eq!(picker.to_string(), "05.08.2021");

    let view = picker.compute_view();
    assert_eq!(view.weekdays[0].abbr, "Mo");
    assert_eq!(view.panes[0].title.month_label, "August");
    let first_row = &view.panes[0].grid.rows[0];
    assert!(matches!(first_row.cells[5], GridCell::Placeholder));
    assert_eq!(first_row.cells[6].day().map(|cell| cell.date), Some(ymd(2021, 8, 1)));
}

#[test]
fn scripted_interaction_reports_events() {
    let patch = OptionsPatch {
        field: Some("2021-08-10".to_string()),
        ..OptionsPatch::default()
    };
    let mut picker = Picker::with_today(&patch, ymd(2021, 8, 20));
    let script = "\
focus
key right
key right
blur
pointer
tick 100
key enter
";
    let mut out = Vec::new();
    run_script(
        &mut picker,
        Cursor::new(script),
        &Renderer::plain(),
        OutputMode::Terminal,
        &mut out,
    )
    .expect("script runs");
    let output = String::from_utf8(out).expect("utf8");

    assert_eq!(
        output.lines().collect::<Vec<_>>(),
        vec![
            "event open",
            "event field \"2021-08-11\"",
            "event select 2021-08-11",
            "event field \"2021-08-12\"",
            "event select 2021-08-12",
            "event close",
        ]
    );
    assert_eq!(picker.field_value(), Some("2021-08-12"));
}

#[test]
fn range_wrapper_keeps_markers_in_sync() {
    let limits = RangeLimits {
        min_range: Some(3),
        max_range: Some(10),
    };
    let mut ranger = PickRanger::with_today(
        &OptionsPatch::default(),
        &OptionsPatch::default(),
        limits,
        ymd(2021, 5, 20),
    );

    let selects = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&selects);
    ranger.end_mut().subscribe(move |event| {
        if let PickerEvent::Select(date) = event {
            sink.borrow_mut().push(*date);
        }
    });

    ranger.select_start(Some(ymd(2021, 6, 1)));
    assert_eq!(ranger.end().min_date(), Some(ymd(2021, 6, 4)));
    assert_eq!(ranger.end().max_date(), Some(ymd(2021, 6, 11)));

    ranger.end_mut().goto_date(ymd(2021, 6, 1));
    assert!(!ranger.click_end(ymd(2021, 6, 2), Duration::ZERO));
    assert!(ranger.click_end(ymd(2021, 6, 8), Duration::ZERO));
    assert_eq!(selects.borrow().as_slice(), &[ymd(2021, 6, 8)]);

    let view = ranger.start().compute_view();
    let in_range = view.panes[0]
        .grid
        .cells()
        .filter_map(GridCell::day)
        .filter(|cell| cell.is_in_range)
        .count();
    assert_eq!(in_range, 6);
}

#[test]
fn html_output_carries_date_attributes() {
    let temp = tempdir().expect("tempdir");
    let rc = temp.path().join("pickerrc");
    fs::write(&rc, "picker.number_of_months = 2\ncolor = off\n").expect("write rc");
    let cfg = Config::load(Some(rc.as_path())).expect("load config");

    let inv = Invocation {
        command: "show".to_string(),
        command_args: vec!["2021-08-14".to_string()],
    };
    let mut out = Vec::new();
    dispatch_to(&cfg, &Renderer::plain(), &inv, OutputMode::Html, &mut out).expect("show");
    let html = String::from_utf8(out).expect("utf8");

    assert!(html.contains("data-datepicker-year=\"2021\" data-datepicker-month=\"7\" data-datepicker-day=\"14\""));
    assert!(html.contains("data-datepicker-month=\"8\""));
    assert_eq!(html.matches("<table").count(), 2);
}
