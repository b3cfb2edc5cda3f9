//! # CLI Argument Definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Suffix appended to encrypted files when no output path is given.
pub(crate) const ENCRYPTED_SUFFIX: &str = "enc";

/// Suffix used for decrypted files whose input lacks [`ENCRYPTED_SUFFIX`].
pub(crate) const DECRYPTED_SUFFIX: &str = "dec";

/// Default environment variable holding the password.
pub(crate) const DEFAULT_PASSWORD_ENV: &str = "FILEVAULT_PASSWORD";

/// The main CLI structure parsing command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "filevault")]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(arg_required_else_help = true)]
#[command(about = "Password-based file encryption into self-contained vault containers")]
pub(crate) struct Cli {
    /// Settings file (TOML, JSON, ...). Defaults to `filevault.*` in the working directory.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter directives, overriding the configured level (e.g. `fv_vault=debug`).
    #[arg(long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Encrypt a file into a vault container
    Encrypt(Transform),
    /// Decrypt a vault container back into the original file
    Decrypt(Transform),
    /// Print the header of a vault container without decrypting it
    Inspect {
        /// Container to inspect
        input: PathBuf,
    },
}

#[derive(Debug, Args)]
pub(crate) struct Transform {
    /// File to read
    pub input: PathBuf,

    /// File to write; derived from the input name when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Environment variable that holds the password
    #[arg(long, default_value = DEFAULT_PASSWORD_ENV)]
    pub password_env: String,

    /// Replace the output file if it already exists
    #[arg(short, long)]
    pub force: bool,
}

impl Transform {
    /// `<input>.enc` for encryption.
    pub(crate) fn encrypted_output(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| self.input_with_suffix(ENCRYPTED_SUFFIX))
    }

    /// `<input>` without `.enc`, or `<input>.dec` if it has no such suffix.
    pub(crate) fn decrypted_output(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            if self.input.extension().is_some_and(|ext| ext == ENCRYPTED_SUFFIX) {
                self.input.with_extension("")
            } else {
                self.input_with_suffix(DECRYPTED_SUFFIX)
            }
        })
    }

    fn input_with_suffix(&self, suffix: &str) -> PathBuf {
        let mut name = self.input.clone().into_os_string();
        name.push(".");
        name.push(suffix);
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn transform(input: &str) -> Transform {
        Transform {
            input: input.into(),
            output: None,
            password_env: DEFAULT_PASSWORD_ENV.to_owned(),
            force: false,
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn output_names_follow_the_input() {
        assert_eq!(transform("report.pdf").encrypted_output(), PathBuf::from("report.pdf.enc"));
        assert_eq!(transform("report.pdf.enc").decrypted_output(), PathBuf::from("report.pdf"));
        assert_eq!(transform("report.bin").decrypted_output(), PathBuf::from("report.bin.dec"));
    }

    #[test]
    fn decrypted_names_keep_distinct_inputs_apart() {
        assert_eq!(transform("a.bin").decrypted_output(), PathBuf::from("a.bin.dec"));
        assert_eq!(transform("a.txt").decrypted_output(), PathBuf::from("a.txt.dec"));
        assert_eq!(transform("archive").decrypted_output(), PathBuf::from("archive.dec"));
    }

    #[test]
    fn explicit_output_wins() {
        let mut t = transform("a.txt");
        t.output = Some("b.vault".into());
        assert_eq!(t.encrypted_output(), PathBuf::from("b.vault"));
        assert_eq!(t.decrypted_output(), PathBuf::from("b.vault"));
    }
}
