pub use self::guild_to_group::{GroupSendPlan, OutgoingFile, translate_guild_message};
pub use self::group_to_guild::translate_group_message;

pub mod guild_to_group;
pub mod group_to_guild;
pub mod lookup;
