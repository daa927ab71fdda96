/// A `/command args` line typed by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCommandInput {
    pub command: String,
    pub arguments: String,
}

/// Split `/review src lib` into `review` and `src lib`. The leading slash is
/// optional and argument whitespace collapses to single spaces.
pub fn parse_session_command_input(value: &str) -> Option<SessionCommandInput> {
    let line = value.trim();
    let line = line.strip_prefix('/').unwrap_or(line);
    let mut words = line.split_whitespace();
    let command = words.next()?;
    Some(SessionCommandInput {
        command: command.to_string(),
        arguments: words.collect::<Vec<_>>().join(" "),
    })
}
