use beacon_gateway::{CredentialRef, Target};

use crate::error::CommandError;

/// A recognised operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start(Target),
    Stop(Target),
    Restart(Target),
    /// `status` is kept raw; the supervisor validates it.
    Status {
        status: String,
        target: Target,
    },
    List,
    Ping,
    Help,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start(_) => "start",
            Self::Stop(_) => "stop",
            Self::Restart(_) => "restart",
            Self::Status { .. } => "status",
            Self::List => "list",
            Self::Ping => "ping",
            Self::Help => "help",
        }
    }
}

const UNITS: [&str; 20] = [
    "zero",
    "one",
    "two",
    "three",
    "four",
    "five",
    "six",
    "seven",
    "eight",
    "nine",
    "ten",
    "eleven",
    "twelve",
    "thirteen",
    "fourteen",
    "fifteen",
    "sixteen",
    "seventeen",
    "eighteen",
    "nineteen",
];

const TENS: [&str; 8] = [
    "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

/// Parse one line of operator input.
///
/// Returns `Ok(None)` when the line does not start with `prefix` or names an
/// unknown command; those lines are ignored rather than answered.
pub fn parse(prefix: &str, line: &str) -> Result<Option<Command>, CommandError> {
    let Some(body) = line.trim_start().strip_prefix(prefix) else {
        return Ok(None);
    };
    let mut words = body.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();
    let first = args.first().copied();

    let command = match name.to_lowercase().as_str() {
        "start" | "start-token" | "start_token" => Command::Start(parse_target(first)),
        "stop" | "stop-token" | "stop_token" => Command::Stop(parse_target(first)),
        "restart" | "restart-token" | "restart_token" => Command::Restart(parse_target(first)),
        "status" | "edit-status" | "edit_status" | "editstatus" => {
            let Some(status) = first else {
                return Err(CommandError::MissingStatus);
            };
            Command::Status {
                status: status.to_lowercase(),
                target: parse_target(args.get(1).copied()),
            }
        },
        "list" | "sessions" => Command::List,
        "ping" => Command::Ping,
        "help" => Command::Help,
        _ => return Ok(None),
    };
    Ok(Some(command))
}

/// `all`, `-1` or nothing target every credential. Integers and English
/// number words (`two`, `twenty-one`, `one-hundred-five`) are 1-based
/// positions; anything else is a raw value.
pub fn parse_target(arg: Option<&str>) -> Target {
    let Some(arg) = arg.map(str::trim).filter(|a| !a.is_empty()) else {
        return Target::All;
    };
    if arg.eq_ignore_ascii_case("all") {
        return Target::All;
    }
    if let Ok(n) = arg.parse::<i64>() {
        return if n == -1 {
            Target::All
        } else {
            Target::index(n)
        };
    }
    if let Some(n) = number_word(&arg.to_lowercase()) {
        return Target::index(n);
    }
    Target::One(CredentialRef::ByValue(arg.to_string()))
}

/// Hyphen-joined English cardinal below one million, e.g. `forty-two` or
/// `two-thousand-three-hundred`. Words must appear in spoken order.
fn number_word(word: &str) -> Option<i64> {
    let parts: Vec<&str> = word.split('-').collect();
    let mut total = 0;
    let mut current: i64 = 0;
    for part in &parts {
        match *part {
            "hundred" if current > 0 && current < 10 => current *= 100,
            "thousand" if current > 0 && total == 0 => {
                total = current * 1000;
                current = 0;
            },
            _ => {
                let value = match UNITS.iter().position(|w| w == part) {
                    Some(n) => n as i64,
                    None => (TENS.iter().position(|w| w == part)? as i64 + 2) * 10,
                };
                let below_hundred = current % 100;
                let fits = match value {
                    0 => parts.len() == 1,
                    1..=9 => below_hundred == 0 || (below_hundred >= 20 && below_hundred % 10 == 0),
                    _ => below_hundred == 0,
                };
                if !fits {
                    return None;
                }
                current += value;
            },
        }
    }
    Some(total + current)
}
