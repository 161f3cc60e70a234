//! External passphrase generator.
//!
//! The generator must print the passphrase on standard output. Nothing is
//! read from a clipboard or any other shared channel.

use anyhow::{bail, Context, Result};

use super::Secret;
use crate::process::Cmd;
use crate::tools::SecretSource;

/// A configured generator command, e.g. `pwgen -s -y 32 1`.
#[derive(Debug, Clone)]
pub struct PassphraseCommand {
    program: String,
    args: Vec<String>,
}

impl PassphraseCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from `[program, args...]` as written in the configuration.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let Some((program, args)) = argv.split_first() else {
            bail!("tools.passphrase is empty; configure a passphrase generator command");
        };
        Ok(Self::new(program.clone(), args.to_vec()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl SecretSource for PassphraseCommand {
    fn generate(&self) -> Result<Secret> {
        let stdout = Cmd::new(&self.program)
            .args(&self.args)
            .error_msg(format!("Passphrase generator '{}' failed", self.program))
            .run_secret_stdout()?;
        let text = std::str::from_utf8(&stdout)
            .with_context(|| format!("'{}' printed non-UTF-8 output", self.program))?;
        Ok(Secret::new(text.trim_end_matches(['\r', '\n']).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_secret_from_stdout() {
        let cmd = PassphraseCommand::new("printf", vec!["correct horse\\n".to_string()]);
        let secret = cmd.generate().unwrap();
        assert_eq!(secret.expose(), "correct horse");
    }

    #[test]
    fn test_missing_generator_is_an_error() {
        let cmd = PassphraseCommand::new("goldbox_no_such_generator_12345", vec![]);
        assert!(cmd.generate().is_err());
    }

    #[test]
    fn test_failing_generator_is_an_error() {
        let cmd = PassphraseCommand::new("false", vec![]);
        assert!(cmd.generate().is_err());
    }

    #[test]
    fn test_from_argv_requires_program() {
        assert!(PassphraseCommand::from_argv(&[]).is_err());
        let cmd = PassphraseCommand::from_argv(&["pwgen".to_string(), "32".to_string()]).unwrap();
        assert_eq!(cmd.program(), "pwgen");
    }
}
