//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;
use mediabatch_core::{ConfigField, PresetAnswers};

/// Fetch every URL in a list and deliver the results.
///
/// Batch parameters not given as flags are asked for interactively.
#[derive(Parser, Debug)]
#[command(name = "mediabatch")]
#[command(author, version, about)]
pub struct Args {
    /// Text file with one URL per line
    pub input: PathBuf,

    /// Media kind: video, audio, or pdf
    #[arg(short = 'k', long)]
    pub kind: Option<String>,

    /// 1-based position of the first URL to process
    #[arg(short = 's', long)]
    pub start: Option<usize>,

    /// Batch name used in captions ('d' for the input file name)
    #[arg(short = 'n', long)]
    pub name: Option<String>,

    /// Target video height (144, 240, 360, 480, 720, 1080); anything else is unconstrained
    #[arg(short = 'r', long)]
    pub resolution: Option<String>,

    /// Credit shown in captions ('de' for the default)
    #[arg(long)]
    pub credit: Option<String>,

    /// Access token for relay stream URLs
    #[arg(long)]
    pub token: Option<String>,

    /// Thumbnail URL used for every video ('no' to extract one per video)
    #[arg(long)]
    pub thumbnail: Option<String>,

    /// Answer every unasked question with its default instead of prompting
    #[arg(short = 'y', long)]
    pub defaults: bool,

    /// Directory the fetch engine writes into
    #[arg(short = 'w', long)]
    pub work_dir: Option<PathBuf>,

    /// Directory delivered files are copied to
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Config file (defaults to $XDG_CONFIG_HOME/mediabatch/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Actor id the batch runs under
    #[arg(long, default_value_t = 0)]
    pub actor: u64,

    /// Print the final summary as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored log output
    #[arg(long)]
    pub no_color: bool,
}

impl Args {
    /// Answer given on the command line for a configuration field.
    #[must_use]
    pub fn preset_answer(&self, field: ConfigField) -> Option<String> {
        match field {
            ConfigField::StartIndex => self.start.map(|s| s.to_string()),
            ConfigField::BatchName => self.name.clone(),
            ConfigField::Kind => self.kind.clone(),
            ConfigField::Resolution => self.resolution.clone(),
            ConfigField::Credit => self.credit.clone(),
            ConfigField::Token => self.token.clone(),
            ConfigField::Thumbnail => self.thumbnail.clone(),
        }
    }

    /// Answer used with `--defaults` when no flag was given.
    #[must_use]
    pub fn default_answer(field: ConfigField) -> &'static str {
        match field {
            ConfigField::StartIndex => "1",
            ConfigField::BatchName => "d",
            ConfigField::Kind => "video",
            ConfigField::Resolution => "",
            ConfigField::Credit => "de",
            ConfigField::Token => "unknown",
            ConfigField::Thumbnail => "no",
        }
    }

    /// Answers that skip the prompt: flags first, then `--defaults`.
    #[must_use]
    pub fn presets(&self) -> PresetAnswers {
        let mut presets = PresetAnswers::new();
        for field in ConfigField::ALL {
            if let Some(answer) = self.preset_answer(field) {
                presets.set(field, answer);
            } else if self.defaults {
                presets.set(field, Self::default_answer(field));
            }
        }
        presets
    }

    /// Default log level from the verbosity flags.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_minimal_args_parses_successfully() {
        let args = Args::try_parse_from(["mediabatch", "links.txt"]).unwrap();
        assert_eq!(args.input, PathBuf::from("links.txt"));
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(!args.json);
        assert_eq!(args.actor, 0);
        assert!(args.kind.is_none());
    }

    #[test]
    fn test_cli_missing_input_is_error() {
        let err = Args::try_parse_from(["mediabatch"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["mediabatch", "l.txt", "-v"]).unwrap();
        assert_eq!(args.default_log_level(), "debug");

        let args = Args::try_parse_from(["mediabatch", "l.txt", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
        assert_eq!(args.default_log_level(), "trace");
    }

    #[test]
    fn test_cli_quiet_wins_over_verbose() {
        let args = Args::try_parse_from(["mediabatch", "l.txt", "-q", "-v"]).unwrap();
        assert_eq!(args.default_log_level(), "error");
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["mediabatch", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["mediabatch", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["mediabatch", "l.txt", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_start_must_be_a_number() {
        let err = Args::try_parse_from(["mediabatch", "l.txt", "--start", "two"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_preset_answers_follow_flags() {
        let args = Args::try_parse_from([
            "mediabatch",
            "l.txt",
            "-k",
            "pdf",
            "-s",
            "3",
            "--name",
            "Physics",
            "--thumbnail",
            "no",
        ])
        .unwrap();
        assert_eq!(args.preset_answer(ConfigField::Kind).as_deref(), Some("pdf"));
        assert_eq!(args.preset_answer(ConfigField::StartIndex).as_deref(), Some("3"));
        assert_eq!(args.preset_answer(ConfigField::BatchName).as_deref(), Some("Physics"));
        assert_eq!(args.preset_answer(ConfigField::Thumbnail).as_deref(), Some("no"));
        assert_eq!(args.preset_answer(ConfigField::Token), None);
    }

    #[test]
    fn test_default_answers_produce_unconstrained_video() {
        assert_eq!(Args::default_answer(ConfigField::Kind), "video");
        assert_eq!(Args::default_answer(ConfigField::Token), "unknown");
        assert_eq!(Args::default_answer(ConfigField::Thumbnail), "no");
    }

    #[test]
    fn test_presets_without_defaults_only_cover_flags() {
        let args = Args::try_parse_from(["mediabatch", "l.txt", "-k", "audio"]).unwrap();
        let presets = args.presets();
        assert_eq!(presets.len(), 1);
        assert_eq!(presets.get(ConfigField::Kind), Some("audio"));
        assert_eq!(presets.get(ConfigField::StartIndex), None);
    }

    #[test]
    fn test_presets_with_defaults_cover_every_field_and_flags_win() {
        let args = Args::try_parse_from(["mediabatch", "l.txt", "-y", "--credit", "Ops"]).unwrap();
        let presets = args.presets();
        assert_eq!(presets.len(), ConfigField::ALL.len());
        assert_eq!(presets.get(ConfigField::Credit), Some("Ops"));
        assert_eq!(presets.get(ConfigField::Kind), Some("video"));
    }
}
