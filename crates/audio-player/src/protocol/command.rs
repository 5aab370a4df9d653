//! Remote command parsing.

use std::fmt;

use crate::session::SeekTarget;

/// A parsed remote command.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Load(String),
    /// `None` when the argument is missing; ignored by the player.
    Jump(Option<SeekTarget>),
    Stop,
    /// `None` when the argument is missing; ignored by the player.
    Volume(Option<f32>),
    Pause,
    Quit,
}

/// User input errors. The `Display` text is the `@E` payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandError {
    Unknown(String),
    MissingArgument(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(verb) => write!(f, "Unknown command '{verb}'"),
            Self::MissingArgument(verb) => write!(f, "Missing argument to '{verb}'"),
        }
    }
}

impl std::error::Error for CommandError {}

impl Command {
    /// Parse one line. Blank lines yield `Ok(None)`.
    ///
    /// The verb is everything before the first space and matches case-insensitively; the
    /// rest, trimmed, is the argument.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (verb, arg) = match line.split_once(' ') {
            Some((verb, rest)) => (verb, Some(rest.trim()).filter(|a| !a.is_empty())),
            None => (line, None),
        };

        let cmd = match verb.to_ascii_uppercase().as_str() {
            "L" | "LOAD" => {
                let path = arg.ok_or_else(|| CommandError::MissingArgument(verb.to_string()))?;
                Self::Load(path.to_string())
            }
            "J" | "JUMP" => Self::Jump(arg.map(parse_seek)),
            "S" | "STOP" => Self::Stop,
            "V" | "VOLUME" => Self::Volume(arg.map(parse_volume)),
            "P" | "PAUSE" => Self::Pause,
            "Q" | "QUIT" => Self::Quit,
            _ => return Err(CommandError::Unknown(verb.to_string())),
        };
        Ok(Some(cmd))
    }
}

/// `+N`/`-N` seeks relative to the current position, a bare `N` is absolute.
///
/// Only the leading digits are read (`"+5s"` is `+5`); an argument without digits reads as
/// zero, so `JUMP soon` rewinds to the start and `JUMP +x` stays put.
fn parse_seek(arg: &str) -> SeekTarget {
    match arg.as_bytes().first() {
        Some(b'+') => SeekTarget::Relative(leading_integer(&arg[1..])),
        Some(b'-') => SeekTarget::Relative(-leading_integer(&arg[1..])),
        _ => SeekTarget::Absolute(leading_integer(arg)),
    }
}

fn leading_integer(s: &str) -> i64 {
    s.bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| acc.saturating_mul(10).saturating_add(i64::from(d - b'0')))
}

/// The longest leading decimal number in `arg`, or `0.0` when there is none.
///
/// `0.5abc` is `0.5`; `inf` and `nan` are taken as written.
fn parse_volume(arg: &str) -> f32 {
    if let Ok(v) = arg.parse::<f32>() {
        return v;
    }
    let b = arg.as_bytes();
    let digits_from = |i: usize| i + b[i..].iter().take_while(|c| c.is_ascii_digit()).count();

    let mut end = usize::from(matches!(b.first(), Some(b'+' | b'-')));
    let int_end = digits_from(end);
    let mut mantissa_digits = int_end - end;
    end = int_end;
    if b.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa_digits += frac_end - end - 1;
        end = frac_end;
    }
    if mantissa_digits == 0 {
        return 0.0;
    }
    if matches!(b.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(b.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }
    arg[..end].parse().unwrap_or(0.0)
}
