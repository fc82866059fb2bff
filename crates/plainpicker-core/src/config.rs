use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow,
  ensure
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

/// Flat `key = value` settings loaded
/// from a pickerrc over built-in
/// defaults.
#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    map.insert(
      "default.command".to_string(),
      "show".to_string()
    );
    map.insert(
      "color".to_string(),
      "on".to_string()
    );
    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    pickerrc_override
  ))]
  pub fn load(
    pickerrc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    if let Some(path) =
      locate_pickerrc(pickerrc_override)
    {
      info!(pickerrc = %path.display(), "loading pickerrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no pickerrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn set(
    &mut self,
    key: &str,
    value: &str
  ) {
    self.map.insert(
      key.to_string(),
      value.to_string()
    );
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  /// Settings sorted by key.
  pub fn sorted(
    &self
  ) -> Vec<(&String, &String)> {
    let mut out: Vec<_> =
      self.map.iter().collect();
    out.sort();
    out
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    if self.loaded_files.contains(&path)
    {
      warn!(file = %path.display(), "pickerrc already loaded; skipping cyclic include");
      return Ok(());
    }

    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }
      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          include_target(
            &base_dir,
            include_rest
          )
          .with_context(|| {
            format!(
              "{}:{}",
              path.display(),
              line_num + 1
            )
          })?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

const PICKERRC_ENV: &str = "PICKERRC";
const PICKERRC_NAME: &str = ".pickerrc";
const DISABLED_RC: &str = "/dev/null";

/// The explicit path, then `$PICKERRC`,
/// then `~/.pickerrc` if present.
/// `PICKERRC=/dev/null` disables
/// loading.
fn locate_pickerrc(
  explicit: Option<&Path>
) -> Option<PathBuf> {
  explicit.map(Path::to_path_buf).or_else(
    || match std::env::var_os(
      PICKERRC_ENV
    ) {
      | Some(value)
        if value == DISABLED_RC =>
      {
        None
      }
      | Some(value) => {
        Some(PathBuf::from(value))
      }
      | None => dirs::home_dir()
        .map(|home| {
          home.join(PICKERRC_NAME)
        })
        .filter(|rc| rc.is_file())
    }
  )
}

/// Relative includes resolve against
/// the including file's directory.
fn include_target(
  base_dir: &Path,
  raw: &str
) -> anyhow::Result<PathBuf> {
  let raw = raw.trim();
  ensure!(
    !raw.is_empty(),
    "include path cannot be empty"
  );
  Ok(base_dir
    .join(expand_tilde(Path::new(raw))))
}

pub(crate) fn expand_tilde(
  path: &Path
) -> PathBuf {
  match (
    path.strip_prefix("~"),
    dirs::home_dir()
  ) {
    | (Ok(rest), Some(home)) => {
      home.join(rest)
    }
    | _ => path.to_path_buf()
  }
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
