pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod events;
pub mod grid;
pub mod i18n;
pub mod markup;
pub mod options;
pub mod picker;
pub mod ranger;
pub mod render;
pub mod timer;
pub mod title;

use std::ffi::OsString;

use clap::Parser;
use tracing::{
  debug,
  info
};

pub use crate::options::{
  OptionsPatch,
  PickerOptions
};
pub use crate::picker::Picker;
pub use crate::ranger::{
  PickRanger,
  RangeLimits
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting plainpicker CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.pickerrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .iter()
        .cloned()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let renderer =
    render::Renderer::new(&cfg)?;
  let mode = cli.output_mode();
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  commands::dispatch(
    &cfg, &renderer, inv, mode
  )?;

  info!("done");
  Ok(())
}
