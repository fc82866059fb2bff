use std::cell::RefCell;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::cli::{Invocation, OutputMode};
use crate::config::{Config, expand_tilde};
use crate::datetime::{self, parse_date_expr};
use crate::events::PickerEvent;
use crate::markup::{render_view, to_html};
use crate::options::OptionsPatch;
use crate::picker::{CalendarView, Key, Picker};
use crate::ranger::{PickRanger, RangeLimits};
use crate::render::Renderer;

pub fn known_command_names() -> Vec<&'static str> {
    vec!["show", "range", "script", "config", "help", "version"]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if token.is_empty() {
        return None;
    }
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(cfg, renderer, inv))]
pub fn dispatch(cfg: &Config, renderer: &Renderer, inv: Invocation, mode: OutputMode) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    dispatch_to(cfg, renderer, &inv, mode, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Runs a command, writing its output to `out`.
pub fn dispatch_to<W: Write>(
    cfg: &Config,
    renderer: &Renderer,
    inv: &Invocation,
    mode: OutputMode,
    out: &mut W,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    debug!(command, args = ?inv.command_args, ?mode, "dispatching command");

    match command {
        "show" => cmd_show(cfg, renderer, &inv.command_args, mode, out),
        "range" => cmd_range(cfg, renderer, &inv.command_args, mode, out),
        "script" => cmd_script(cfg, renderer, &inv.command_args, mode, out),
        "config" => cmd_config(cfg, out),
        "help" => cmd_help(out),
        "version" => {
            writeln!(out, "{}", env!("CARGO_PKG_VERSION"))?;
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// "Today" in the configured timezone.
fn today_for(cfg: &Config) -> NaiveDate {
    let tz = datetime::resolve_timezone(cfg.get("picker.timezone").as_deref());
    datetime::today_in(tz)
}

fn picker_from_config(cfg: &Config, today: NaiveDate) -> anyhow::Result<Picker> {
    let patch = OptionsPatch::from_config(cfg, today).context("invalid picker settings")?;
    Ok(Picker::with_today(&patch, today))
}

#[instrument(skip(cfg, renderer, args, out))]
fn cmd_show<W: Write>(
    cfg: &Config,
    renderer: &Renderer,
    args: &[String],
    mode: OutputMode,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command show");
    let today = today_for(cfg);
    let mut picker = picker_from_config(cfg, today)?;

    if let Some(raw) = args.first() {
        let date = picker
            .parse_input(raw)
            .ok_or_else(|| anyhow!("invalid date: {raw}"))?;
        picker.set_date(Some(date), true);
    }
    picker.show();

    write_view(renderer, mode, &picker.compute_view(), out)?;
    if mode == OutputMode::Terminal && picker.get_date().is_some() {
        writeln!(out, "\nSelected: {picker}")?;
    }
    Ok(())
}

#[instrument(skip(cfg, renderer, args, out))]
fn cmd_range<W: Write>(
    cfg: &Config,
    renderer: &Renderer,
    args: &[String],
    mode: OutputMode,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command range");
    let [start_raw, end_raw] = args else {
        return Err(anyhow!("usage: range START END"));
    };

    let today = today_for(cfg);
    let patch = OptionsPatch::from_config(cfg, today).context("invalid picker settings")?;
    let limits = range_limits(cfg)?;
    let mut ranger = PickRanger::with_today(&patch, &patch, limits, today);

    let start = parse_date_expr(start_raw, today).with_context(|| format!("invalid start date: {start_raw}"))?;
    let end = parse_date_expr(end_raw, today).with_context(|| format!("invalid end date: {end_raw}"))?;
    ranger.select_start(Some(start));
    ranger.select_end(Some(end));
    ranger.start_mut().show();
    ranger.end_mut().show();

    let start_view = ranger.start().compute_view();
    let end_view = ranger.end().compute_view();
    match mode {
        OutputMode::Json => {
            let doc = RangeOutput {
                start: &start_view,
                end: &end_view,
                range: [ranger.start().get_date(), ranger.end().get_date()],
            };
            writeln!(out, "{}", serde_json::to_string_pretty(&doc)?)?;
        }
        OutputMode::Html | OutputMode::Terminal => {
            write_view(renderer, mode, &start_view, out)?;
            writeln!(out)?;
            write_view(renderer, mode, &end_view, out)?;
            if mode == OutputMode::Terminal {
                writeln!(out, "\nRange: {} - {}", display_or_none(ranger.start()), display_or_none(ranger.end()))?;
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct RangeOutput<'a> {
    start: &'a CalendarView,
    end: &'a CalendarView,
    range: [Option<NaiveDate>; 2],
}

/// `range.min_range` / `range.max_range`, in days.
fn range_limits(cfg: &Config) -> anyhow::Result<RangeLimits> {
    let days = |key: &str| -> anyhow::Result<Option<u32>> {
        cfg.get(key)
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| {
                raw.trim()
                    .parse::<u32>()
                    .with_context(|| format!("invalid {key}: {raw}"))
            })
            .transpose()
    };
    Ok(RangeLimits {
        min_range: days("range.min_range")?,
        max_range: days("range.max_range")?,
    })
}

fn display_or_none(picker: &Picker) -> String {
    if picker.get_date().is_some() {
        picker.to_string()
    } else {
        "(none)".to_string()
    }
}

#[instrument(skip(cfg, renderer, args, out))]
fn cmd_script<W: Write>(
    cfg: &Config,
    renderer: &Renderer,
    args: &[String],
    mode: OutputMode,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command script");
    let source = args.first().map(String::as_str).unwrap_or("-");
    let mut picker = picker_from_config(cfg, today_for(cfg))?;

    if source == "-" {
        let stdin = io::stdin();
        run_script(&mut picker, stdin.lock(), renderer, mode, out)
    } else {
        let path = expand_tilde(Path::new(source));
        let file = fs::File::open(&path).with_context(|| format!("failed to open script {}", path.display()))?;
        run_script(&mut picker, BufReader::new(file), renderer, mode, out)
            .with_context(|| format!("script {} failed", path.display()))
    }
}

/// One line of a picker script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptAction {
    Next,
    Prev,
    Goto(String),
    Month(String),
    Year(String),
    Select(Option<String>),
    Click(String),
    Key(Key),
    Min(Option<String>),
    Max(Option<String>),
    Show,
    Hide,
    Focus,
    Blur,
    PointerDown,
    Input(String),
    Tick(u64),
    Print,
}

impl FromStr for ScriptAction {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let arg = |name: &str| -> anyhow::Result<String> {
            if rest.is_empty() {
                Err(anyhow!("{name} needs an argument"))
            } else {
                Ok(rest.to_string())
            }
        };
        let optional_date = || (!rest.eq_ignore_ascii_case("none")).then(|| rest.to_string());

        let action = match verb.to_ascii_lowercase().as_str() {
            "next" => Self::Next,
            "prev" => Self::Prev,
            "goto" => Self::Goto(arg("goto")?),
            "month" => Self::Month(arg("month")?),
            "year" => Self::Year(arg("year")?),
            "select" => {
                arg("select")?;
                Self::Select(optional_date())
            }
            "click" => Self::Click(arg("click")?),
            "key" => Self::Key(arg("key")?.parse()?),
            "min" => {
                arg("min")?;
                Self::Min(optional_date())
            }
            "max" => {
                arg("max")?;
                Self::Max(optional_date())
            }
            "show" => Self::Show,
            "hide" => Self::Hide,
            "focus" => Self::Focus,
            "blur" => Self::Blur,
            "pointer" => Self::PointerDown,
            "input" => Self::Input(rest.to_string()),
            "tick" => {
                let raw = arg("tick")?;
                Self::Tick(raw.parse().with_context(|| format!("invalid tick duration: {raw}"))?)
            }
            "print" => Self::Print,
            other => return Err(anyhow!("unknown script action: {other}")),
        };
        Ok(action)
    }
}

/// Runs script lines against `picker` on a virtual clock starting at zero.
///
/// Events the picker emits are written as `event ...` lines after the
/// action that caused them. Blank lines and `#` comments are skipped.
pub fn run_script<R: BufRead, W: Write>(
    picker: &mut Picker,
    reader: R,
    renderer: &Renderer,
    mode: OutputMode,
    out: &mut W,
) -> anyhow::Result<()> {
    let events: Rc<RefCell<Vec<PickerEvent>>> = Rc::default();
    let sink = Rc::clone(&events);
    let subscription = picker.subscribe(move |event| {
        if !matches!(event, PickerEvent::Draw) {
            sink.borrow_mut().push(event.clone());
        }
    });

    let mut now = Duration::ZERO;
    let result = (|| -> anyhow::Result<()> {
        for (line_num, line) in reader.lines().enumerate() {
            let line = line.context("failed to read script")?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let action: ScriptAction = trimmed
                .parse()
                .with_context(|| format!("line {}: {trimmed}", line_num + 1))?;
            debug!(line = line_num + 1, ?action, "script action");
            apply_action(picker, &action, &mut now, renderer, mode, out)
                .with_context(|| format!("line {}: {trimmed}", line_num + 1))?;
            picker.flush_frame();

            for event in events.borrow_mut().drain(..) {
                writeln!(out, "{}", describe_event(&event))?;
            }
        }
        Ok(())
    })();

    picker.unsubscribe(subscription);
    result
}

fn apply_action<W: Write>(
    picker: &mut Picker,
    action: &ScriptAction,
    now: &mut Duration,
    renderer: &Renderer,
    mode: OutputMode,
    out: &mut W,
) -> anyhow::Result<()> {
    let date = |picker: &Picker, raw: &str| {
        picker
            .parse_input(raw)
            .ok_or_else(|| anyhow!("invalid date: {raw}"))
    };

    match action {
        ScriptAction::Next => {
            picker.next_month();
        }
        ScriptAction::Prev => {
            picker.prev_month();
        }
        ScriptAction::Goto(raw) => {
            let target = date(picker, raw)?;
            picker.goto_date(target);
        }
        ScriptAction::Month(raw) => {
            if !picker.goto_month_str(raw) {
                return Err(anyhow!("invalid month: {raw}"));
            }
        }
        ScriptAction::Year(raw) => {
            if !picker.goto_year_str(raw) {
                return Err(anyhow!("invalid year: {raw}"));
            }
        }
        ScriptAction::Select(raw) => {
            let target = raw.as_deref().map(|raw| date(picker, raw)).transpose()?;
            picker.set_date(target, false);
        }
        ScriptAction::Click(raw) => {
            let target = date(picker, raw)?;
            if !picker.click_day(target, *now) {
                writeln!(out, "ignored click {target}")?;
            }
        }
        ScriptAction::Key(key) => picker.handle_key(*key),
        ScriptAction::Min(raw) => {
            let bound = raw.as_deref().map(|raw| date(picker, raw)).transpose()?;
            picker.set_min_date(bound);
        }
        ScriptAction::Max(raw) => {
            let bound = raw.as_deref().map(|raw| date(picker, raw)).transpose()?;
            picker.set_max_date(bound);
        }
        ScriptAction::Show => picker.show(),
        ScriptAction::Hide => picker.hide(),
        ScriptAction::Focus => picker.on_field_focus(),
        ScriptAction::Blur => picker.on_field_blur(*now),
        ScriptAction::PointerDown => picker.pointer_down(),
        ScriptAction::Input(value) => picker.on_field_change(value, None),
        ScriptAction::Tick(ms) => {
            *now = now.saturating_add(Duration::from_millis(*ms));
            picker.tick(*now);
        }
        ScriptAction::Print => {
            if picker.is_visible() {
                write_view(renderer, mode, &picker.compute_view(), out)?;
            } else {
                writeln!(out, "(hidden)")?;
            }
        }
    }
    Ok(())
}

fn describe_event(event: &PickerEvent) -> String {
    match event {
        PickerEvent::Select(date) => format!("event select {date}"),
        PickerEvent::RangeSelect { start, end } => format!("event range {start} {end}"),
        PickerEvent::Open => "event open".to_string(),
        PickerEvent::Close => "event close".to_string(),
        PickerEvent::Draw => "event draw".to_string(),
        PickerEvent::FieldChange { value, .. } => format!("event field {value:?}"),
    }
}

fn write_view<W: Write>(renderer: &Renderer, mode: OutputMode, view: &CalendarView, out: &mut W) -> anyhow::Result<()> {
    match mode {
        OutputMode::Terminal => renderer.write_view(&mut *out, view),
        OutputMode::Html => {
            writeln!(out, "{}", to_html(&render_view(view)))?;
            Ok(())
        }
        OutputMode::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(view)?)?;
            Ok(())
        }
    }
}

fn cmd_config<W: Write>(cfg: &Config, out: &mut W) -> anyhow::Result<()> {
    for (key, value) in cfg.sorted() {
        writeln!(out, "{key}={value}")?;
    }
    for file in &cfg.loaded_files {
        writeln!(out, "# loaded {}", file.display())?;
    }
    Ok(())
}

fn cmd_help<W: Write>(out: &mut W) -> anyhow::Result<()> {
    writeln!(
        out,
        "plainpicker [--html|--json] [-v|-q] [--pickerrc FILE] [rc.KEY=VALUE] COMMAND\n\n\
         commands:\n  \
           show [DATE]        print the calendar around DATE (default today)\n  \
           range START END    print a start/end pair of pickers\n  \
           script FILE|-      run picker actions line by line\n  \
           config             print effective settings\n  \
           help | version\n\n\
         script actions:\n  \
           next | prev | goto DATE | month N (0-11) | year Y\n  \
           select DATE|none | click DATE | key left|right|up|down|enter|escape\n  \
           min DATE|none | max DATE|none | show | hide\n  \
           focus | blur | pointer | input TEXT | tick MS | print"
    )?;
    Ok(())
}
