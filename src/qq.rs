pub use self::api::{GroupMemberInfo, LoginInfo, OneBotApi, VersionInfo};
pub use self::emoji::face_name;
pub use self::http::OneBotHttpClient;
pub use self::segment::{QqSegment, RawSegment, encode_all};

pub mod api;
pub mod emoji;
pub mod http;
pub mod segment;
