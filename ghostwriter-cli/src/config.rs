use std::collections::BTreeMap;
use std::env;
use std::sync::Arc;

use anyhow::{bail, Context, Error};
use clap::ArgMatches;
use ghostwriter::{FormatType, Limits, UndefinedPolicy};
use minijinja::Value;
use serde::{Deserialize, Serialize};

/// Holds in-memory config state for the execution.
///
/// Values are layered: defaults, then the config file, then `GHOSTWRITER_*`
/// environment variables and finally the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    format: String,
    output_format: String,
    strict: bool,
    newline: bool,
    max_file_size: u64,
    max_output_size: u64,
    max_range_size: u64,
    csv_rows_name: String,
    fill_nan: bool,
    fill_nan_with: String,
    defines: Arc<BTreeMap<String, Value>>,
}

impl Default for Config {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            format: "auto".to_string(),
            output_format: FormatType::Raw.name().to_string(),
            strict: false,
            newline: true,
            max_file_size: limits.max_file_size,
            max_output_size: limits.max_output_size,
            max_range_size: limits.max_range_size,
            csv_rows_name: "csv_rows".to_string(),
            fill_nan: false,
            fill_nan_with: String::new(),
            defines: Default::default(),
        }
    }
}

impl Config {
    pub fn update_from_matches(&mut self, matches: &ArgMatches) -> Result<(), Error> {
        if let Some(format) = matches.get_one::<String>("format") {
            self.format = format.clone();
        }
        if let Some(output_format) = matches.get_one::<String>("output-format") {
            self.output_format = output_format.clone();
        }
        if matches.get_flag("strict") {
            self.strict = true;
        }
        if matches.get_flag("no-newline") {
            self.newline = false;
        }
        if let Some(size) = matches.get_one::<u64>("max-file-size") {
            self.max_file_size = *size;
        }
        if let Some(size) = matches.get_one::<u64>("max-output-size") {
            self.max_output_size = *size;
        }
        if let Some(size) = matches.get_one::<u64>("max-range-size") {
            self.max_range_size = *size;
        }
        #[cfg(feature = "csv")]
        {
            if let Some(name) = matches.get_one::<String>("csv-rows-name") {
                self.csv_rows_name = name.clone();
            }
            if matches.get_flag("fill-nan") {
                self.fill_nan = true;
            }
            if let Some(fill) = matches.get_one::<String>("fill-nan-with") {
                self.fill_nan = true;
                self.fill_nan_with = fill.clone();
            }
        }
        self.add_defines_from_matches(matches)?;
        // fail early rather than after the template was loaded
        self.output_format()?;
        Ok(())
    }

    #[cfg(feature = "toml")]
    pub fn load_from_toml(p: &std::path::Path) -> Result<Config, Error> {
        let contents = std::fs::read_to_string(p)
            .with_context(|| format!("unable to read config file '{}'", p.display()))?;
        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("invalid config file '{}'", p.display()))?;
        Ok(cfg)
    }

    pub fn update_from_env(&mut self) -> Result<(), Error> {
        if let Ok(format) = env::var("GHOSTWRITER_FORMAT") {
            self.format = format;
        }
        if let Ok(output_format) = env::var("GHOSTWRITER_OUTPUT_FORMAT") {
            self.output_format = output_format;
        }
        if let Ok(strict) = env::var("GHOSTWRITER_STRICT") {
            self.strict = parse_env_bool(&strict, "GHOSTWRITER_STRICT")?;
        }
        if let Ok(newline) = env::var("GHOSTWRITER_NEWLINE") {
            self.newline = parse_env_bool(&newline, "GHOSTWRITER_NEWLINE")?;
        }
        if let Ok(size) = env::var("GHOSTWRITER_MAX_FILE_SIZE") {
            self.max_file_size = parse_env_u64(&size, "GHOSTWRITER_MAX_FILE_SIZE")?;
        }
        if let Ok(size) = env::var("GHOSTWRITER_MAX_OUTPUT_SIZE") {
            self.max_output_size = parse_env_u64(&size, "GHOSTWRITER_MAX_OUTPUT_SIZE")?;
        }
        if let Ok(size) = env::var("GHOSTWRITER_MAX_RANGE_SIZE") {
            self.max_range_size = parse_env_u64(&size, "GHOSTWRITER_MAX_RANGE_SIZE")?;
        }
        if let Ok(name) = env::var("GHOSTWRITER_CSV_ROWS_NAME") {
            self.csv_rows_name = name;
        }
        if let Ok(fill_nan) = env::var("GHOSTWRITER_FILL_NAN") {
            self.fill_nan = parse_env_bool(&fill_nan, "GHOSTWRITER_FILL_NAN")?;
        }
        if let Ok(fill) = env::var("GHOSTWRITER_FILL_NAN_WITH") {
            self.fill_nan_with = fill;
        }
        Ok(())
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn newline(&self) -> bool {
        self.newline
    }

    pub fn policy(&self) -> UndefinedPolicy {
        UndefinedPolicy::from_strict(self.strict)
    }

    pub fn output_format(&self) -> Result<FormatType, Error> {
        self.output_format
            .parse::<FormatType>()
            .with_context(|| format!("invalid output format '{}'", self.output_format))
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_file_size: self.max_file_size,
            max_output_size: self.max_output_size,
            max_range_size: self.max_range_size,
        }
    }

    #[cfg_attr(not(feature = "csv"), allow(dead_code))]
    pub fn csv_rows_name(&self) -> &str {
        &self.csv_rows_name
    }

    /// The replacement for missing CSV cells if filling is on.
    #[cfg_attr(not(feature = "csv"), allow(dead_code))]
    pub fn csv_fill(&self) -> Option<&str> {
        self.fill_nan.then_some(self.fill_nan_with.as_str())
    }

    pub fn defines(&self) -> Value {
        Value::from_dyn_object(self.defines.clone())
    }

    fn add_defines_from_matches(&mut self, matches: &ArgMatches) -> Result<(), Error> {
        let defines = Arc::make_mut(&mut self.defines);
        if let Some(items) = matches.get_many::<String>("define") {
            for item in items {
                if let Some((key, raw_value)) = item.split_once(":=") {
                    defines.insert(key.to_string(), interpret_raw_value(raw_value)?);
                } else if let Some((key, string_value)) = item.split_once('=') {
                    defines.insert(key.to_string(), Value::from(string_value));
                } else {
                    defines.insert(item.to_string(), Value::from(true));
                }
            }
        }
        Ok(())
    }
}

fn interpret_raw_value(s: &str) -> Result<Value, Error> {
    serde_json::from_str::<Value>(s)
        .with_context(|| format!("invalid raw value '{}' (not valid JSON)", s))
}

fn parse_env_bool(s: &str, var_name: &str) -> Result<bool, Error> {
    match s.to_lowercase().as_str() {
        "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        _ => bail!("Invalid boolean value for {}: {}", var_name, s),
    }
}

fn parse_env_u64(s: &str, var_name: &str) -> Result<u64, Error> {
    s.trim()
        .parse()
        .with_context(|| format!("Invalid size for {}: {}", var_name, s))
}
