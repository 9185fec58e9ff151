diesel::table! {
    message_links (id) {
        id -> Integer,
        discord_message_id -> BigInt,
        qq_message_id -> BigInt,
    }
}
