use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// One OneBot v11 message segment as it appears on the wire:
/// `{"type": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

/// Typed view over the closed set of segment kinds the relay understands.
/// Anything else, or a known kind with an unexpected payload shape, decodes
/// to `Unsupported` so that translation can still render a visible
/// placeholder instead of dropping content.
#[derive(Debug, Clone, PartialEq)]
pub enum QqSegment {
    Text { text: String },
    Face { id: String },
    MFace { summary: Option<String>, url: Option<String>, emoji_id: Option<String> },
    MarketFace { summary: String, face_id: String },
    At { qq: String, name: Option<String> },
    Image { file: String, url: Option<String> },
    Record { file: String },
    Video { file: String },
    File { file: String, name: String },
    Reply { id: String },
    Share { title: String, url: String, content: Option<String>, image: Option<String> },
    Contact { kind: String, id: String },
    Location { lat: String, lon: String, title: Option<String>, content: Option<String> },
    Music,
    Forward,
    Rps,
    Dice,
    Xml { data: String },
    Json { data: String },
    Unsupported { kind: String, data: Value },
}

fn str_field(data: &Value, key: &str) -> Option<String> {
    match data.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

impl QqSegment {
    pub fn from_raw(raw: &RawSegment) -> QqSegment {
        let data = &raw.data;
        let unsupported = || QqSegment::Unsupported {
            kind: raw.kind.clone(),
            data: raw.data.clone(),
        };

        match raw.kind.as_str() {
            "text" => match str_field(data, "text") {
                Some(text) => QqSegment::Text { text },
                None => unsupported(),
            },
            "face" => match str_field(data, "id") {
                Some(id) => QqSegment::Face { id },
                None => unsupported(),
            },
            "mface" => QqSegment::MFace {
                summary: str_field(data, "summary").filter(|s| !s.is_empty()),
                url: str_field(data, "url").filter(|s| !s.is_empty()),
                emoji_id: str_field(data, "emoji_id").or_else(|| str_field(data, "id")),
            },
            "marketface" => match (str_field(data, "summary"), str_field(data, "face_id")) {
                (Some(summary), Some(face_id)) => QqSegment::MarketFace { summary, face_id },
                _ => unsupported(),
            },
            "at" => match str_field(data, "user_id").or_else(|| str_field(data, "qq")) {
                Some(qq) => QqSegment::At {
                    qq,
                    name: str_field(data, "name").filter(|s| !s.is_empty()),
                },
                None => unsupported(),
            },
            "image" => match str_field(data, "file") {
                Some(file) => QqSegment::Image {
                    file,
                    url: str_field(data, "url"),
                },
                None => unsupported(),
            },
            "record" => match str_field(data, "file") {
                Some(file) => QqSegment::Record { file },
                None => unsupported(),
            },
            "video" => match str_field(data, "file") {
                Some(file) => QqSegment::Video { file },
                None => unsupported(),
            },
            "file" => match str_field(data, "file") {
                Some(file) => QqSegment::File {
                    name: str_field(data, "name").unwrap_or_else(|| file.clone()),
                    file,
                },
                None => unsupported(),
            },
            "reply" => match str_field(data, "id") {
                Some(id) => QqSegment::Reply { id },
                None => unsupported(),
            },
            "share" => match (str_field(data, "title"), str_field(data, "url")) {
                (Some(title), Some(url)) => QqSegment::Share {
                    title,
                    url,
                    content: str_field(data, "content"),
                    image: str_field(data, "image"),
                },
                _ => unsupported(),
            },
            "contact" => match (str_field(data, "type"), str_field(data, "id")) {
                (Some(kind), Some(id)) => QqSegment::Contact { kind, id },
                _ => unsupported(),
            },
            "location" => match (str_field(data, "lat"), str_field(data, "lon")) {
                (Some(lat), Some(lon)) => QqSegment::Location {
                    lat,
                    lon,
                    title: str_field(data, "title"),
                    content: str_field(data, "content"),
                },
                _ => unsupported(),
            },
            "music" => QqSegment::Music,
            "forward" => QqSegment::Forward,
            "rps" => QqSegment::Rps,
            "dice" => QqSegment::Dice,
            "xml" => match str_field(data, "data") {
                Some(data) => QqSegment::Xml { data },
                None => unsupported(),
            },
            "json" => match str_field(data, "data") {
                Some(data) => QqSegment::Json { data },
                None => unsupported(),
            },
            _ => unsupported(),
        }
    }

    pub fn decode_all(raw: &[RawSegment]) -> Vec<QqSegment> {
        raw.iter().map(QqSegment::from_raw).collect()
    }

    pub fn to_raw(&self) -> RawSegment {
        let (kind, data) = match self {
            QqSegment::Text { text } => ("text", json!({ "text": text })),
            QqSegment::Face { id } => ("face", json!({ "id": id })),
            QqSegment::MFace { summary, url, emoji_id } => (
                "mface",
                json!({ "summary": summary, "url": url, "emoji_id": emoji_id }),
            ),
            QqSegment::MarketFace { summary, face_id } => (
                "marketface",
                json!({ "summary": summary, "face_id": face_id }),
            ),
            QqSegment::At { qq, name } => ("at", json!({ "qq": qq, "name": name })),
            QqSegment::Image { file, url } => ("image", json!({ "file": file, "url": url })),
            QqSegment::Record { file } => ("record", json!({ "file": file })),
            QqSegment::Video { file } => ("video", json!({ "file": file })),
            QqSegment::File { file, name } => ("file", json!({ "file": file, "name": name })),
            QqSegment::Reply { id } => ("reply", json!({ "id": id })),
            QqSegment::Share { title, url, content, image } => (
                "share",
                json!({ "title": title, "url": url, "content": content, "image": image }),
            ),
            QqSegment::Contact { kind, id } => ("contact", json!({ "type": kind, "id": id })),
            QqSegment::Location { lat, lon, title, content } => (
                "location",
                json!({ "lat": lat, "lon": lon, "title": title, "content": content }),
            ),
            QqSegment::Music => ("music", json!({})),
            QqSegment::Forward => ("forward", json!({})),
            QqSegment::Rps => ("rps", json!({})),
            QqSegment::Dice => ("dice", json!({})),
            QqSegment::Xml { data } => ("xml", json!({ "data": data })),
            QqSegment::Json { data } => ("json", json!({ "data": data })),
            QqSegment::Unsupported { kind, data } => {
                return RawSegment {
                    kind: kind.clone(),
                    data: data.clone(),
                };
            }
        };
        RawSegment {
            kind: kind.to_string(),
            data,
        }
    }

    pub fn text(text: impl Into<String>) -> QqSegment {
        QqSegment::Text { text: text.into() }
    }

    /// Inline binary payload, OneBot `base64://` form.
    pub fn image_bytes(bytes: &[u8]) -> QqSegment {
        QqSegment::Image {
            file: format!("base64://{}", BASE64.encode(bytes)),
            url: None,
        }
    }

    pub fn record_bytes(bytes: &[u8]) -> QqSegment {
        QqSegment::Record {
            file: format!("base64://{}", BASE64.encode(bytes)),
        }
    }

    pub fn video_bytes(bytes: &[u8]) -> QqSegment {
        QqSegment::Video {
            file: format!("base64://{}", BASE64.encode(bytes)),
        }
    }

    pub fn file_bytes(name: impl Into<String>, bytes: &[u8]) -> QqSegment {
        QqSegment::File {
            file: format!("base64://{}", BASE64.encode(bytes)),
            name: name.into(),
        }
    }

    pub fn reply(message_id: i64) -> QqSegment {
        QqSegment::Reply {
            id: message_id.to_string(),
        }
    }

    pub fn at_all() -> QqSegment {
        QqSegment::At {
            qq: "all".to_string(),
            name: None,
        }
    }
}

pub fn encode_all(segments: &[QqSegment]) -> Vec<RawSegment> {
    segments.iter().map(QqSegment::to_raw).collect()
}
