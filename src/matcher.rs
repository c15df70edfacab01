//! Failed-login line matching
//!
//! Recognizes the sshd `Failed password for [invalid user ]<user> from <addr>`
//! family and pulls out the source address. Anything else is simply not a
//! signal.

use regex::Regex;
use std::sync::LazyLock;

/// "Failed password for [invalid user ]<user> from <addr> ..."
static FAILED_LOGIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"Failed password for (?:invalid user (?P<invalid>.*?)|(?P<user>.+?)) from (?P<ip>[0-9A-Fa-f:.]*[0-9A-Fa-f])(?:\s|$)",
    )
    .expect("failed-login regex")
});

/// A matched failed-login line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailedLogin<'a> {
    pub ip: &'a str,
    pub user: &'a str,
    pub invalid_user: bool,
}

/// Stateless matcher for failed-login lines
#[derive(Debug, Clone, Copy, Default)]
pub struct LineMatcher;

impl LineMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Source address of a failed-login line, if the line is one
    pub fn extract<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.parse(line).map(|login| login.ip)
    }

    /// Full match details for a failed-login line
    pub fn parse<'a>(&self, line: &'a str) -> Option<FailedLogin<'a>> {
        let captures = FAILED_LOGIN.captures(line)?;
        let ip = captures.name("ip")?.as_str();

        // sshd leaves the name empty for "invalid user  from ..."
        let (user, invalid_user) = match captures.name("invalid") {
            Some(name) => (name.as_str(), true),
            None => (captures.name("user")?.as_str(), false),
        };

        Some(FailedLogin {
            ip,
            user,
            invalid_user,
        })
    }
}
