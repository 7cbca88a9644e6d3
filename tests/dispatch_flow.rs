//! End-to-end dispatch over the real plugin registry.

mod common;

use common::TestBot;

#[tokio::test(start_paused = true)]
async fn ordinary_chat_produces_no_output() {
    let mut bot = TestBot::new();
    bot.say("alice", "how do I reverse a string?").await;
    assert!(bot.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn help_lists_public_commands_sorted() {
    let mut bot = TestBot::new();
    bot.say("alice", "-help").await;

    let lines = bot.drain();
    assert_eq!(lines.len(), 1);
    let line = &lines[0];
    assert!(line.starts_with("PRIVMSG #ember :Available commands: "));

    // The default plugin set is one page, sorted, comma-separated.
    let listing = line.split(": ").nth(1).unwrap();
    let names: Vec<&str> = listing.split(", ").collect();
    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(names, sorted);
    assert!(names.contains(&"google"));
    assert!(names.contains(&"help"));

    // Restricted commands never show up in the public listing.
    assert!(!names.contains(&"quit"));
    assert!(!names.contains(&"help2"));
}

#[tokio::test(start_paused = true)]
async fn restricted_help_requires_authorization() {
    let mut bot = TestBot::new();

    bot.say("alice", "-help2").await;
    assert!(bot.drain().is_empty());

    bot.say("admin", "-help2").await;
    let lines = bot.drain();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("quit"));
    assert!(lines[0].contains("reload"));
}

#[tokio::test(start_paused = true)]
async fn search_builds_a_query_url() {
    let mut bot = TestBot::new();
    bot.say("alice", "-google borrow checker").await;

    assert_eq!(
        bot.drain(),
        ["PRIVMSG #ember :http://www.google.com/search?q=borrow+checker"]
    );
}

#[tokio::test(start_paused = true)]
async fn admin_commands_are_silent_for_unauthorized_users() {
    let mut bot = TestBot::new();

    bot.say("mallory", "-join #secret").await;
    bot.say("mallory", "-reload").await;
    assert!(bot.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn admin_join_goes_to_the_outbound_queue() {
    let mut bot = TestBot::new();

    bot.say("admin", "-join #elsewhere").await;
    assert_eq!(bot.drain(), ["JOIN #elsewhere"]);
}

#[tokio::test(start_paused = true)]
async fn admin_reload_reports_back() {
    let mut bot = TestBot::new();

    bot.say("admin", "-reload").await;
    assert_eq!(bot.drain(), ["PRIVMSG #ember :Reloaded commands."]);
}

#[tokio::test(start_paused = true)]
async fn admin_quit_enqueues_quit_and_cancels() {
    let mut bot = TestBot::new();

    bot.say("admin", "-quit").await;
    assert_eq!(bot.drain(), ["QUIT :Leaving!"]);
    assert!(bot.state.shutdown.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn factoid_lifecycle() {
    let mut bot = TestBot::new();

    // Add a factoid in a channel.
    bot.say("alice", "-addfactoid greet Hello from the bot.").await;
    assert_eq!(bot.drain(), ["PRIVMSG #ember :-greet is now: Hello from the bot."]);

    // The stored name now works as a command.
    bot.say("bob", "-greet").await;
    assert_eq!(bot.drain(), ["PRIVMSG #ember :Hello from the bot."]);

    // Addressed form lowercases the first letter.
    bot.say("bob", "-greet carol").await;
    assert_eq!(bot.drain(), ["PRIVMSG #ember :carol, hello from the bot."]);

    // And it appears in help.
    bot.say("carol", "-help").await;
    let lines = bot.drain();
    assert!(lines[0].contains("greet"));
}

#[tokio::test(start_paused = true)]
async fn factoid_add_requires_a_channel() {
    let mut bot = TestBot::new();

    bot.whisper("alice", "-addfactoid greet Hello.").await;
    assert_eq!(
        bot.drain(),
        ["PRIVMSG alice :alice, this command only works in channels."]
    );
}

#[tokio::test(start_paused = true)]
async fn factoid_host_is_sent_privately_to_authorized_users() {
    let mut bot = TestBot::with_factoids("greet\nolaf!olaf@somewhere.example\nHello.\n");

    bot.say("admin", "-factoidhost greet").await;
    assert_eq!(
        bot.drain(),
        ["PRIVMSG admin :The factoid -greet was last updated by: olaf!olaf@somewhere.example"]
    );

    // Unauthorized callers get nothing at all.
    bot.say("alice", "-factoidhost greet").await;
    assert!(bot.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn translate_links_the_callers_last_line() {
    let mut bot = TestBot::new();

    bot.say("alice", "-translate").await;
    let lines = bot.drain();
    assert_eq!(lines.len(), 1);
    // The dispatcher records the message before dispatch, so the
    // caller's own command line is what gets translated.
    assert_eq!(
        lines[0],
        "PRIVMSG #ember :http://translate.google.com/#auto%7cen%7c-translate"
    );
}

#[tokio::test(start_paused = true)]
async fn duplicate_lines_mute_the_sender() {
    let mut bot = TestBot::new();

    bot.say("alice", "-google rust").await;
    assert_eq!(bot.drain().len(), 1);

    // Identical repeat inside the window: dropped, mute installed.
    bot.say("alice", "-google rust").await;
    assert!(bot.drain().is_empty());

    // A different command is still dropped while muted.
    bot.say("alice", "-help").await;
    assert!(bot.drain().is_empty());

    // Another user is unaffected.
    bot.say("bob", "-help").await;
    assert_eq!(bot.drain().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn mute_expires_after_a_minute() {
    let mut bot = TestBot::new();

    bot.say("alice", "-google rust").await;
    bot.say("alice", "-google rust").await;
    bot.drain();

    tokio::time::advance(std::time::Duration::from_millis(60_001)).await;

    bot.say("alice", "-help").await;
    assert_eq!(bot.drain().len(), 1);
}
