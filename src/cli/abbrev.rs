// Command abbreviation matching for the focus CLI

/// Find all commands that start with the given prefix (case-insensitive)
pub fn find_matching_commands<'a>(prefix: &str, commands: &'a [&str]) -> Vec<&'a str> {
    let prefix_lower = prefix.to_lowercase();
    commands.iter()
        .filter(|cmd| cmd.to_lowercase().starts_with(&prefix_lower))
        .copied()
        .collect()
}

/// Find a unique command match for the given prefix
/// Returns Ok(command) if exactly one match, Err(matches) if ambiguous, Err(empty) if no match
/// Exact matches take precedence over prefix matches
pub fn find_unique_command<'a>(prefix: &str, commands: &'a [&str]) -> Result<&'a str, Vec<&'a str>> {
    let prefix_lower = prefix.to_lowercase();
    for cmd in commands {
        if cmd.to_lowercase() == prefix_lower {
            return Ok(*cmd);
        }
    }

    let matches = find_matching_commands(prefix, commands);

    if matches.is_empty() {
        Err(Vec::new())
    } else if matches.len() == 1 {
        Ok(matches[0])
    } else {
        Err(matches)
    }
}

/// Top-level commands
pub const TOP_LEVEL_COMMANDS: &[&str] = &[
    "add", "list", "show", "modify", "done", "undone", "move", "delete", "clear",
    "matrix", "rollover", "remind", "ics", "stats", "status",
    "register", "login", "logout", "whoami", "profile", "passwd", "admin",
    "vault", "backup", "drive", "team",
];

pub const REMIND_COMMANDS: &[&str] = &["add", "list", "modify", "delete", "due"];

pub const ICS_COMMANDS: &[&str] = &["import", "export"];

pub const STATS_COMMANDS: &[&str] = &["summary", "period", "daily", "score", "streak"];

pub const ADMIN_COMMANDS: &[&str] = &["users", "modify", "toggle", "delete"];

pub const VAULT_COMMANDS: &[&str] = &["init", "status", "unlock", "recovery", "rotate", "wipe"];

pub const BACKUP_COMMANDS: &[&str] = &["export", "import"];

pub const DRIVE_COMMANDS: &[&str] = &["push", "pull"];

pub const TEAM_COMMANDS: &[&str] = &["create", "invite", "list"];

/// Task subcommands (used with the `focus <id> <subcommand>` pattern)
pub const TASK_SUBCOMMANDS: &[&str] = &[
    "show", "modify", "done", "undone", "move", "delete"
];

/// Get subcommands for a given top-level command
pub fn get_subcommands(command: &str) -> Option<&'static [&'static str]> {
    match command {
        "remind" => Some(REMIND_COMMANDS),
        "ics" => Some(ICS_COMMANDS),
        "stats" => Some(STATS_COMMANDS),
        "admin" => Some(ADMIN_COMMANDS),
        "vault" => Some(VAULT_COMMANDS),
        "backup" => Some(BACKUP_COMMANDS),
        "drive" => Some(DRIVE_COMMANDS),
        "team" => Some(TEAM_COMMANDS),
        _ => None,
    }
}

fn ambiguity(kind: &str, arg: &str, matches: &[&str]) -> String {
    format!("Ambiguous {} '{}'. Did you mean one of: {}?", kind, arg, matches.join(", "))
}

/// Expand command abbreviations in argument list
/// Returns expanded args or error message
pub fn expand_command_abbreviations(args: Vec<String>) -> Result<Vec<String>, String> {
    let Some(first) = args.first() else {
        return Ok(args);
    };

    // focus <id> <subcommand> ... -> focus <subcommand> <id> ...
    if first.parse::<i64>().is_ok() {
        if let Some(next) = args.get(1).filter(|a| !a.starts_with('-')) {
            return match find_unique_command(next, TASK_SUBCOMMANDS) {
                Ok(sub) => {
                    let mut expanded = vec![sub.to_string(), first.clone()];
                    expanded.extend(args[2..].iter().cloned());
                    Ok(expanded)
                }
                Err(matches) if matches.is_empty() => Ok(args),
                Err(matches) => Err(ambiguity("task subcommand", next, &matches)),
            };
        }
        return Ok(args);
    }

    if first.starts_with('-') {
        return Ok(args);
    }

    let command = match find_unique_command(first, TOP_LEVEL_COMMANDS) {
        Ok(command) => command,
        // No match: let clap report it
        Err(matches) if matches.is_empty() => return Ok(args),
        Err(matches) => return Err(ambiguity("command", first, &matches)),
    };

    let mut expanded = vec![command.to_string()];
    let mut rest = args[1..].iter();
    if let Some(subcommands) = get_subcommands(command) {
        if let Some(next) = args.get(1).filter(|a| !a.starts_with('-') && a.parse::<i64>().is_err()) {
            match find_unique_command(next, subcommands) {
                Ok(sub) => expanded.push(sub.to_string()),
                Err(matches) if matches.is_empty() => expanded.push(next.clone()),
                Err(matches) => return Err(ambiguity("subcommand", next, &matches)),
            }
            rest.next();
        }
    }
    expanded.extend(rest.cloned());
    Ok(expanded)
}
