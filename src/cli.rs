//! A core module for command line interface.
//!
//! See [`Cli`] for more information.

use std::path::PathBuf;

use clap::builder::{PathBufValueParser, TypedValueParser};
use clap::error::ErrorKind;
use clap::Command;
pub use clap::{CommandFactory, Parser};
use dialoguer::Editor;

use crate::config::{Config, Validate, DEFAULT_CONFIG_STR};

const EDITOR_EXTENSION: &str = ".toml";

/// [`clap`] command line interface.
///
/// The [`Self::parse`] trait and [`Self::get_config_from_editor`]
/// will use [`toml`] to parse the config file,
/// then use [`Config::validate`] to validate the config.
///
/// # Example
///
/// ```no_run
/// use booru_browse::cli::{Cli, Parser as _};
///
/// let cli = Cli::parse();
/// ```
#[non_exhaustive]
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// The config file to use.
    ///
    /// If `None`, you can use [`Self::get_config_from_editor`]
    /// to open an editor to ask the user to write a temp config file.
    #[arg(value_name = "PATH")]
    #[arg(value_parser = PathBufValueParser::new().try_map(Self::parse_config_from_filepath))]
    pub config: Option<Config>,

    /// Log more, `-v` for debug and `-vv` for trace. `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    #[inline]
    fn parse_config_from_filepath(path: PathBuf) -> anyhow::Result<Config> {
        Self::parse_config(&std::fs::read_to_string(path)?)
    }

    /// Deserialize and validate a TOML config, from a file or the editor alike.
    fn parse_config(text: &str) -> anyhow::Result<Config> {
        let config = toml::from_str::<Config>(text)?;
        config.validate()?;
        Ok(config)
    }

    /// The default log filter for [`Self::verbose`].
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "booru_browse=info",
            1 => "booru_browse=debug",
            _ => "booru_browse=trace",
        }
    }

    /// Open an editor on the commented default config, so the user can pick
    /// the booru `url`, the `tags` to browse and the range of posts to print.
    ///
    /// The edited text goes through the same [`toml`] parsing and [`Config::validate`]
    /// as a config file given on the command line.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use booru_browse::cli::{Cli, CommandFactory as _};
    ///
    /// let config = Cli::get_config_from_editor(&mut Cli::command())?;
    /// println!("browsing {} for {:?}", config.url, config.tags);
    ///
    /// Ok::<(), clap::Error>(())
    /// ```
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Io`] if no editor could be run. [`ErrorKind::ValueValidation`]
    /// if the buffer was not saved, is not TOML, or fails validation
    /// (e.g. a `url` without scheme, or a tag containing whitespace).
    pub fn get_config_from_editor(cmd: &mut Command) -> Result<Config, clap::Error> {
        let edited = Editor::new()
            .extension(EDITOR_EXTENSION)
            .edit(DEFAULT_CONFIG_STR)
            .map_err(|err| cmd.error(ErrorKind::Io, err))?
            .ok_or_else(|| {
                cmd.error(
                    ErrorKind::ValueValidation,
                    "The config was not saved, nothing to browse.",
                )
            })?;

        // `{:#}` keeps the toml or validator cause in the message
        Self::parse_config(&edited)
            .map_err(|err| cmd.error(ErrorKind::ValueValidation, format!("{err:#}")))
    }
}
