//! NVM line tokenizer.
//!
//! A line looks like `#NVM PREAMP 2 0 0 IRADIO OFF OFF OFF ON "iRadio" OFF`:
//! a sentinel, a command name, then positional arguments. Double quotes group
//! free text and are stripped.

use crate::error::{NaimError, Result};

/// Sentinel that starts every inbound NVM line.
pub const NVM_SENTINEL: &str = "#NVM";
/// Token the device uses for "no value".
pub const NOT_AVAILABLE: &str = "NA";

/// Quote-aware whitespace tokenization.
pub fn tokenize(line: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                in_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if in_quotes {
        return Err(NaimError::Frame(format!("unterminated quote in `{line}`")));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Replace the characters that cannot appear in a handler key.
pub fn normalize_command_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            ':' => out.push_str("_COLON_"),
            '-' => out.push_str("_MINUS_"),
            '+' => out.push_str("_PLUS_"),
            c => out.push(c),
        }
    }
    out
}

/// One tokenized inbound line, sentinel removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvmLine {
    /// Command name as sent by the device.
    pub command: String,
    /// Positional arguments after the command name.
    pub args: Vec<String>,
}

impl NvmLine {
    /// Tokenize a line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<NvmLine>> {
        let mut tokens = tokenize(line)?.into_iter();
        let Some(sentinel) = tokens.next() else {
            return Ok(None);
        };
        if !sentinel.starts_with('#') {
            tracing::debug!(%sentinel, "nvm line with unexpected sentinel");
        }
        let command = tokens
            .next()
            .ok_or_else(|| NaimError::Frame(format!("nvm line without a command: `{line}`")))?;
        Ok(Some(NvmLine {
            command,
            args: tokens.collect(),
        }))
    }

    /// Registry key for this line's command.
    pub fn key(&self) -> String {
        normalize_command_name(&self.command)
    }

    /// Token `index`, or an arity error naming the command.
    pub fn arg(&self, index: usize) -> Result<&str> {
        self.args
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| NaimError::Arity {
                command: self.command.clone(),
                expected: index + 1,
                got: self.args.len(),
            })
    }

    /// Token `index` with `NA` mapped to `None`.
    pub fn optional_arg(&self, index: usize) -> Result<Option<String>> {
        let v = self.arg(index)?;
        Ok((v != NOT_AVAILABLE).then(|| v.to_string()))
    }

    /// Token `index` parsed as an unsigned number.
    pub fn number_arg(&self, index: usize) -> Result<u32> {
        let v = self.arg(index)?;
        v.parse::<u32>().map_err(|e| {
            NaimError::InvalidValue(format!("{} token {index} `{v}`: {e}", self.command))
        })
    }

    /// Fail unless at least `n` arguments are present.
    pub fn require(&self, n: usize) -> Result<()> {
        if self.args.len() < n {
            return Err(NaimError::Arity {
                command: self.command.clone(),
                expected: n,
                got: self.args.len(),
            });
        }
        Ok(())
    }
}
