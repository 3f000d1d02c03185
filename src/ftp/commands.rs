//! FTP command parsing.

/// Commands the control loop understands. Everything else is UNKNOWN and
/// answered with a 500.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    USER(String),
    PASS(String),
    QUIT,
    LOGOUT,
    PWD,
    CWD(String),
    LIST,
    RETR(String),
    STOR(String),
    DELE(String),
    PASV,
    PORT(String),
    TYPE(String),
    SYST,
    NOOP,
    UNKNOWN,
}

/// Parses a raw control line into a Command. The verb is case-insensitive,
/// the argument is everything after the first whitespace.
pub fn parse_command(raw: &str) -> Command {
    let trimmed = raw.trim();
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or("").to_ascii_uppercase();
    let arg = parts.next().unwrap_or("").trim();

    match cmd.as_str() {
        "USER" => Command::USER(arg.to_string()),
        "PASS" => Command::PASS(arg.to_string()),
        "QUIT" | "Q" => Command::QUIT,
        "LOGOUT" => Command::LOGOUT,
        "PWD" => Command::PWD,
        "CWD" => Command::CWD(arg.to_string()),
        "LIST" => Command::LIST,
        "RETR" => Command::RETR(arg.to_string()),
        "STOR" => Command::STOR(arg.to_string()),
        "DELE" | "DEL" => Command::DELE(arg.to_string()),
        "PASV" => Command::PASV,
        "PORT" => Command::PORT(arg.to_string()),
        "TYPE" => Command::TYPE(arg.to_string()),
        "SYST" => Command::SYST,
        "NOOP" => Command::NOOP,
        _ => Command::UNKNOWN,
    }
}
