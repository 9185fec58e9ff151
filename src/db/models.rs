/// One correlation record: a Discord message id paired with the QQ message
/// id it was mirrored to (or from). A Discord message that fans out into
/// several QQ sends owns several records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLink {
    pub id: i64,
    pub discord_message_id: i64,
    pub qq_message_id: i64,
}
