//! Search keywords derived from the user's need and chosen category.
//!
//! The keyword model answers with one comma-separated line; each keyword
//! becomes one nearby search.

use log::{error, info};
use std::fmt;

use crate::services::chat_service::{ChatCompletion, ChatError, GenerationConfig};

pub const KEYWORD_COUNT: usize = 3;
pub const MAX_KEYWORD_CHARS: usize = 10;

const KEYWORD_SYSTEM_PROMPT: &str = "\
你是一位心理洞察師，你能從文字中清楚知道使用者實際在想什麼
對於模糊的敘述，都能給出精準的猜測，讓使用者知道他要什麼
所以你的任務是「根據使用者的文字與地點類型，給出合適的地點關鍵字，同時每個關鍵字限制在10字以內」
關鍵字也就是更詳細的地點類型敘述，例如：古蹟、小吃店、遊樂園

請嚴格依照回覆格式做回應

回覆格式:
1. 將每個關鍵字以逗號做區隔，並寫在同一行
2. 只產生三個關鍵字

範例：
\"關鍵字1, 關鍵字2, 關鍵字3\"
";

#[derive(Debug)]
pub enum KeywordError {
    Generation(ChatError),
}

impl fmt::Display for KeywordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeywordError::Generation(err) => write!(f, "Keyword generation failed: {}", err),
        }
    }
}

impl std::error::Error for KeywordError {}

impl From<ChatError> for KeywordError {
    fn from(err: ChatError) -> Self {
        KeywordError::Generation(err)
    }
}

pub fn keyword_prompt(need: &str, category: &str) -> String {
    format!(
        "我目前想要找的地點類型是{category}\n\
         我的需求是「{need}」\n\n\
         關鍵字也就是更詳細的地點敘述\n\
         請生成{KEYWORD_COUNT}個個別約{MAX_KEYWORD_CHARS}字以內的關鍵字，猜測我想要去的地點，關鍵字就例如:小吃店、名勝古蹟、公園等\n"
    )
}

/// Strip one layer of surrounding quotes and split on commas.
///
/// Count and length are not validated: a sloppy reply simply yields fewer or
/// odd keywords.
pub fn parse_key_output(text: &str) -> Vec<String> {
    let text = text.trim();
    let text = text.strip_prefix('"').unwrap_or(text);
    let text = text.strip_suffix('"').unwrap_or(text);

    text.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Ask the model for concrete place types matching `need` within `category`.
///
/// A failed call fails the round; no fallback keywords are made up.
pub async fn derive_keywords(
    chat: &dyn ChatCompletion,
    generation: &GenerationConfig,
    need: &str,
    category: &str,
) -> Result<(Vec<String>, String), KeywordError> {
    let prompt = keyword_prompt(need, category);

    let reply = chat
        .complete(KEYWORD_SYSTEM_PROMPT, &[], &prompt, generation)
        .await
        .map_err(|e| {
            error!("Keyword derivation failed: {}", e);
            KeywordError::from(e)
        })?;

    let keywords = parse_key_output(&reply);
    info!("Derived keywords {:?} for category '{}'", keywords, category);

    Ok((keywords, reply))
}
