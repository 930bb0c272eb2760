//! CLI subcommands
//!
//! Payload commands read all of their input, transform it with a [`Kms`] and
//! write the result. Text form (the default) is padded URL-safe base64 on one
//! line; `--raw` passes bytes through unencoded.

use std::io::{Read, Write};

use chrono::{DateTime, Utc};
use clap::Subcommand;
use epochkms_core::{Environment, KeyError, KeyIdScheme, KeyStore, Kms, KmsConfig};
use serde_json::json;

use crate::error::RuntimeError;

/// What to do with stdin.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Encrypt stdin under the current key
    Encrypt {
        /// Write raw bytes instead of base64 text
        #[arg(long)]
        raw: bool,
    },
    /// Decrypt a payload produced by `encrypt`
    Decrypt {
        /// Read raw bytes instead of base64 text
        #[arg(long)]
        raw: bool,
    },
    /// Sign stdin under the current key
    Sign {
        /// Write raw bytes instead of base64 text
        #[arg(long)]
        raw: bool,
    },
    /// Verify a payload produced by `sign` and print its content
    Verify {
        /// Read raw bytes instead of base64 text
        #[arg(long)]
        raw: bool,
    },
    /// Print the id of the current key window
    CurrentId,
    /// Validate the effective configuration and print it as JSON
    CheckConfig,
}

impl Command {
    /// Whether the command needs a key store.
    pub fn needs_store(self) -> bool {
        !matches!(self, Self::CheckConfig)
    }
}

/// Run a store-backed command.
///
/// `CheckConfig` is handled by [`check_config`] and writes nothing here.
pub fn run<S: KeyStore, E: Environment>(
    command: Command,
    kms: &Kms<S, E>,
    input: &mut impl Read,
    output: &mut impl Write,
) -> Result<(), RuntimeError> {
    match command {
        Command::Encrypt { raw: true } => output.write_all(&kms.encrypt(&read_all(input)?)?)?,
        Command::Encrypt { raw: false } => {
            writeln!(output, "{}", kms.encrypt_text(&read_all(input)?)?)?;
        },
        Command::Decrypt { raw: true } => output.write_all(&kms.decrypt(&read_all(input)?)?)?,
        Command::Decrypt { raw: false } => {
            output.write_all(&kms.decrypt_text(&read_text(input)?)?)?;
        },
        Command::Sign { raw: true } => output.write_all(&kms.sign(&read_all(input)?)?)?,
        Command::Sign { raw: false } => {
            writeln!(output, "{}", kms.sign_text(&read_all(input)?)?)?;
        },
        Command::Verify { raw: true } => output.write_all(&kms.verify(&read_all(input)?)?)?,
        Command::Verify { raw: false } => {
            output.write_all(&kms.verify_text(&read_text(input)?)?)?;
        },
        Command::CurrentId => writeln!(output, "{}", kms.current_key_id())?,
        Command::CheckConfig => {},
    }

    output.flush()?;
    Ok(())
}

/// Print the effective configuration with the id it yields at `now`.
pub fn check_config(
    config: &KmsConfig,
    scheme: &KeyIdScheme,
    now: DateTime<Utc>,
    output: &mut impl Write,
) -> Result<(), RuntimeError> {
    let report = json!({
        "config": config,
        "key_id_width": scheme.width(),
        "current_key_id": scheme.current(now).as_str(),
    });

    let text = serde_json::to_string_pretty(&report).map_err(report_error)?;
    writeln!(output, "{text}")?;
    output.flush()?;
    Ok(())
}

fn report_error(err: serde_json::Error) -> RuntimeError {
    RuntimeError::Config(format!("cannot render config report: {err}"))
}

fn read_all(input: &mut impl Read) -> Result<Vec<u8>, RuntimeError> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Read base64 text, ignoring surrounding whitespace such as a trailing
/// newline.
fn read_text(input: &mut impl Read) -> Result<String, RuntimeError> {
    let bytes = read_all(input)?;
    let text = String::from_utf8(bytes)
        .map_err(|e| KeyError::Decode { reason: e.to_string() })?;
    Ok(text.trim().to_owned())
}
