// src/prompt.rs

use anyhow::{bail, Result};
use std::io::{BufRead, Write};

/// Ask `question` until `parse` accepts the answer.
///
/// An empty answer takes `default`. Rejected answers print the parser's
/// message and ask again; closed input is an error.
pub fn prompt_until<T, R, W, F>(
    input: &mut R,
    output: &mut W,
    question: &str,
    default: &str,
    parse: F,
) -> Result<T>
where
    R: BufRead,
    W: Write,
    F: Fn(&str) -> Result<T, String>,
{
    loop {
        write!(output, "{} [{}]: ", question, default)?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            bail!("input closed while waiting for: {}", question);
        }
        let answer = match line.trim() {
            "" => default,
            answer => answer,
        };

        match parse(answer) {
            Ok(value) => return Ok(value),
            Err(msg) => writeln!(output, "{}", msg)?,
        }
    }
}
