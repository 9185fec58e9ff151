use std::collections::HashMap;

use once_cell::sync::Lazy;

// Built-in QQ face ids and their display names. Ids missing from the table
// render as "QQemojiID:<id>" upstream.
static FACE_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("0", "惊讶"),
        ("1", "撇嘴"),
        ("2", "色"),
        ("3", "发呆"),
        ("4", "得意"),
        ("5", "流泪"),
        ("6", "害羞"),
        ("7", "闭嘴"),
        ("8", "睡"),
        ("9", "大哭"),
        ("10", "尴尬"),
        ("11", "发怒"),
        ("12", "调皮"),
        ("13", "呲牙"),
        ("14", "微笑"),
        ("15", "难过"),
        ("16", "酷"),
        ("18", "抓狂"),
        ("19", "吐"),
        ("20", "偷笑"),
        ("21", "可爱"),
        ("22", "白眼"),
        ("23", "傲慢"),
        ("24", "饥饿"),
        ("25", "困"),
        ("26", "惊恐"),
        ("27", "流汗"),
        ("28", "憨笑"),
        ("29", "悠闲"),
        ("30", "奋斗"),
        ("31", "咒骂"),
        ("32", "疑问"),
        ("33", "嘘"),
        ("34", "晕"),
        ("38", "敲打"),
        ("39", "再见"),
        ("41", "发抖"),
        ("42", "爱情"),
        ("43", "跳跳"),
        ("46", "猪头"),
        ("49", "拥抱"),
        ("53", "蛋糕"),
        ("60", "咖啡"),
        ("63", "玫瑰"),
        ("64", "凋谢"),
        ("66", "爱心"),
        ("67", "心碎"),
        ("74", "太阳"),
        ("75", "月亮"),
        ("76", "赞"),
        ("77", "踩"),
        ("78", "握手"),
        ("79", "胜利"),
        ("96", "冷汗"),
        ("97", "擦汗"),
        ("98", "抠鼻"),
        ("99", "鼓掌"),
        ("100", "糗大了"),
        ("109", "左亲亲"),
        ("111", "可怜"),
        ("116", "示爱"),
        ("118", "抱拳"),
        ("120", "拳头"),
        ("123", "NO"),
        ("124", "OK"),
        ("146", "爆筋"),
        ("147", "棒棒糖"),
        ("171", "茶"),
        ("173", "泪奔"),
        ("174", "无奈"),
        ("175", "卖萌"),
        ("176", "小纠结"),
        ("178", "斜眼笑"),
        ("179", "doge"),
        ("182", "笑哭"),
        ("187", "幽灵"),
        ("201", "点赞"),
        ("212", "托腮"),
        ("262", "脑阔疼"),
        ("264", "捂脸"),
        ("265", "辣眼睛"),
        ("266", "哦哟"),
        ("267", "头秃"),
        ("277", "汪汪"),
    ])
});

pub fn face_name(id: &str) -> Option<&'static str> {
    FACE_NAMES.get(id).copied()
}
