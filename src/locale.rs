//! User-facing message table.
//!
//! Messages are looked up by `(Language, MessageKind)` in a static table.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Display languages supported by the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English.
    En,
    /// Bahasa Malaysia.
    Bm,
    /// Simplified Chinese.
    #[default]
    Cn,
}

impl Language {
    /// All languages, in table order.
    pub const ALL: [Language; 3] = [Language::En, Language::Bm, Language::Cn];

    /// Returns the short language code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Bm => "bm",
            Self::Cn => "cn",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "en" => Ok(Self::En),
            "bm" | "ms" => Ok(Self::Bm),
            "cn" | "zh" => Ok(Self::Cn),
            other => Err(format!("unsupported language: {other}")),
        }
    }
}

/// Kinds of user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Generation requested before a door photo was uploaded.
    UploadFirst,
    /// Missing credential or other configuration problem.
    Config,
    /// Remote quota or rate limit exceeded.
    Quota,
    /// Remote call exceeded its deadline.
    Timeout,
    /// Generation cancelled by the user.
    Cancelled,
    /// Any other failure.
    Generic,
    /// Status line while a generation is running.
    Generating,
    /// Status line after a preview was produced.
    Success,
}

impl MessageKind {
    const COUNT: usize = 8;

    fn index(self) -> usize {
        match self {
            Self::UploadFirst => 0,
            Self::Config => 1,
            Self::Quota => 2,
            Self::Timeout => 3,
            Self::Cancelled => 4,
            Self::Generic => 5,
            Self::Generating => 6,
            Self::Success => 7,
        }
    }
}

fn language_index(language: Language) -> usize {
    match language {
        Language::En => 0,
        Language::Bm => 1,
        Language::Cn => 2,
    }
}

static MESSAGES: [[&str; MessageKind::COUNT]; 3] = [
    [
        "Please upload a photo of your door first.",
        "The AI service is not configured. Please set the API key.",
        "The AI service is busy (quota exceeded). Please try again in a minute.",
        "The AI service took too long to respond. Please try again.",
        "Generation cancelled.",
        "Generation failed. Please try a different photo.",
        "Installing your smart lock...",
        "Your preview is ready.",
    ],
    [
        "Sila muat naik foto pintu anda dahulu.",
        "Perkhidmatan AI belum dikonfigurasi. Sila tetapkan kunci API.",
        "Perkhidmatan AI sibuk (kuota melebihi had). Sila cuba lagi sebentar.",
        "Perkhidmatan AI mengambil masa terlalu lama. Sila cuba lagi.",
        "Penjanaan dibatalkan.",
        "Penjanaan gagal. Sila cuba foto lain.",
        "Sedang memasang kunci pintar anda...",
        "Pratonton anda sudah siap.",
    ],
    [
        "请先上传您的大门照片。",
        "AI 服务尚未配置，请设置 API 密钥。",
        "AI 服务繁忙（配额已用完），请稍后再试。",
        "AI 服务响应超时，请重试。",
        "已取消生成。",
        "生成失败，请尝试其他照片。",
        "正在为您安装智能锁...",
        "效果图已生成。",
    ],
];

/// Returns the message for the given language and kind.
pub fn message(language: Language, kind: MessageKind) -> &'static str {
    MESSAGES[language_index(language)][kind.index()]
}
