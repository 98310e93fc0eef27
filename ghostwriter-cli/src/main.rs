use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Error};
use clap::ArgMatches;
use ghostwriter::{Document, Limits};
use minijinja::{context, Value};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::output::{Output, STDIN_STDOUT};

mod command;
mod config;
#[cfg(feature = "csv")]
mod csv_data;
mod output;

const STDIN_TEMPLATE_NAME: &str = "<stdin>";

fn detect_format<'a>(format: &'a str, path: &Path, stdin_used: bool) -> Result<&'a str, Error> {
    if format != "auto" {
        return Ok(format);
    }
    if stdin_used {
        bail!("auto detection does not work with data from stdin");
    }
    let ext = path.extension().and_then(|x| x.to_str()).unwrap_or("");
    command::SUPPORTED_FORMATS
        .iter()
        .find(|(_, _, exts)| exts.contains(&ext))
        .map(|(fmt, _, _)| *fmt)
        .ok_or_else(|| anyhow!("cannot auto detect format from extension"))
}

fn load_data(
    config: &Config,
    path: &Path,
    selector: Option<&str>,
) -> Result<(BTreeMap<String, Value>, bool), Error> {
    let (contents, stdin_used) = if path == Path::new(STDIN_STDOUT) {
        (
            io::read_to_string(io::stdin()).context("unable to read data from stdin")?,
            true,
        )
    } else {
        (
            fs::read_to_string(path)
                .with_context(|| format!("unable to read data file '{}'", path.display()))?,
            false,
        )
    };

    let mut data: Value = match detect_format(config.format(), path, stdin_used)? {
        "json" => serde_json::from_str(&contents)?,
        #[cfg(feature = "yaml")]
        "yaml" => {
            // merge keys are only resolved on a serde_yaml::Value
            let mut v: serde_yaml::Value = serde_yaml::from_str(&contents)?;
            v.apply_merge()?;
            Value::from_serialize(v)
        }
        #[cfg(feature = "toml")]
        "toml" => toml::from_str(&contents)?,
        #[cfg(feature = "csv")]
        "csv" => csv_data::read_rows(
            &contents,
            csv_data::CsvOptions {
                rows_name: config.csv_rows_name(),
                fill: config.csv_fill(),
            },
        )?,
        other => bail!("unsupported data format '{}'", other),
    };
    tracing::debug!(path = %path.display(), kind = %data.kind(), "data loaded");

    if let Some(selector) = selector {
        for part in selector.split('.') {
            data = if let Ok(idx) = part.parse::<usize>() {
                data.get_item_by_index(idx)
            } else {
                data.get_attr(part)
            }
            .ok()
            .filter(|x| !x.is_undefined())
            .with_context(|| {
                format!(
                    "unable to select {:?} in {:?} (value was {})",
                    part,
                    selector,
                    data.kind()
                )
            })?;
        }
    }

    Ok((
        Deserialize::deserialize(data).context("failed to interpret input data as object")?,
        stdin_used,
    ))
}

fn load_template(path: &str, limits: Limits, stdin_used: bool) -> Result<Document, Error> {
    if path == STDIN_STDOUT {
        if stdin_used {
            bail!("cannot load template from stdin when data is from stdin");
        }
        let mut bytes = Vec::new();
        io::stdin()
            .read_to_end(&mut bytes)
            .context("failed to read template from stdin")?;
        Ok(Document::load(STDIN_TEMPLATE_NAME, Cursor::new(bytes), limits))
    } else {
        let file =
            fs::File::open(path).with_context(|| format!("unable to open template '{}'", path))?;
        Ok(Document::load(path, file, limits))
    }
}

fn load_config(matches: &ArgMatches) -> Result<Config, Error> {
    #[cfg(feature = "toml")]
    let mut config = match find_config_file(matches) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config file");
            Config::load_from_toml(&path)?
        }
        None => Config::default(),
    };
    #[cfg(not(feature = "toml"))]
    let mut config = Config::default();

    config.update_from_env()?;
    config.update_from_matches(matches)?;
    Ok(config)
}

#[cfg(feature = "toml")]
fn find_config_file(matches: &ArgMatches) -> Option<PathBuf> {
    if let Some(path) = matches.get_one::<PathBuf>("config-file") {
        return Some(path.clone());
    }
    if let Some(path) = std::env::var_os("GHOSTWRITER_CONFIG_FILE") {
        return Some(PathBuf::from(path));
    }
    home::home_dir()
        .map(|home| home.join(".ghostwriter.toml"))
        .filter(|path| path.is_file())
}

fn print_config(config: &Config) -> Result<(), Error> {
    #[cfg(feature = "toml")]
    {
        print!("{}", toml::to_string_pretty(config)?);
    }
    #[cfg(not(feature = "toml"))]
    {
        println!("{}", serde_json::to_string_pretty(config)?);
    }
    Ok(())
}

fn execute() -> Result<i32, Error> {
    let matches = command::make_command().get_matches();
    let config = load_config(&matches)?;

    if matches.get_flag("print-config") {
        print_config(&config)?;
        return Ok(0);
    }

    let (base, stdin_used) = if let Some(data) = matches.get_one::<PathBuf>("data_file") {
        load_data(
            &config,
            data,
            matches.get_one::<String>("select").map(|x| x.as_str()),
        )?
    } else {
        (Default::default(), false)
    };

    let template = matches
        .get_one::<String>("template_file")
        .map(|x| x.as_str())
        .unwrap_or(STDIN_STDOUT);
    let mut doc = load_template(template, config.limits(), stdin_used)?;
    if let Some(message) = doc.error_message() {
        bail!("{} in '{}'", message, doc.name());
    }

    if matches.get_flag("check") {
        println!("ok");
        return Ok(0);
    }

    let mut output = Output::new(
        matches
            .get_one::<PathBuf>("output")
            .map(|x| x.as_path())
            .unwrap_or(Path::new(STDIN_STDOUT)),
    )?;
    let ctx = context!(..config.defines(), ..base);
    let outcome = doc.apply(&ctx, config.output_format()?, config.policy());
    match outcome.into_result() {
        Ok(rendered) => output.emit(&rendered, config.newline())?,
        Err(message) => bail!("{} in '{}'", message, doc.name()),
    }

    output.commit()?;
    Ok(0)
}

pub fn print_error(err: &Error) {
    eprintln!("error: {err}");
    let mut source_opt = err.source();
    while let Some(source) = source_opt {
        eprintln!();
        eprintln!("caused by: {source}");
        source_opt = source.source();
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_env("GHOSTWRITER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

fn main() {
    init_logging();
    match execute() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            print_error(&err);
            std::process::exit(1);
        }
    }
}
