//! The command list registered with Telegram.

use janbot_telegram::Command;
use teloxide::utils::command::BotCommands;

#[test]
fn test_every_command_is_registered() {
    let names: Vec<String> = Command::bot_commands()
        .into_iter()
        .map(|c| c.command.trim_start_matches('/').to_string())
        .collect();

    for expected in [
        "start",
        "help",
        "ping",
        "hello",
        "summarize",
        "summarize_link",
        "todo_create",
        "todo_list",
        "todo_update",
        "todo_delete",
        "cancel",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing /{}", expected);
    }
}

#[test]
fn test_unknown_command_does_not_parse() {
    assert!(Command::parse("/connect foo", "janbot").is_err());
}
