//! The grounded recommendation call.
//!
//! Builds one prompt out of the fixed guide persona, the retrieved reference
//! text, the session's recent turns and the store list, calls the model once,
//! and records the exchange in the session memory on success.

use log::{error, info};
use std::fmt;

use crate::models::{
    conversation::ConversationMemory,
    place::CandidatePlaceSet,
    request::RequestContext,
};
use crate::services::{
    chat_service::{ChatCompletion, ChatError, GenerationConfig},
    prompt_builder::{grounded_user_prompt, options_prompt},
    reply_grammar::{GrammarEntry, ReplyGrammar},
};

#[derive(Debug)]
pub enum SynthesisError {
    Generation(ChatError),
}

impl fmt::Display for SynthesisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthesisError::Generation(err) => write!(f, "Recommendation generation failed: {}", err),
        }
    }
}

impl std::error::Error for SynthesisError {}

impl From<ChatError> for SynthesisError {
    fn from(err: ChatError) -> Self {
        SynthesisError::Generation(err)
    }
}

#[derive(Debug)]
pub struct SynthesisOutput {
    pub reply: String,
    /// The user turn that was sent, reference text included.
    pub user_prompt: String,
    pub memory: ConversationMemory,
}

/// Fixed instruction for the recommendation model, rendered from `grammar`.
pub fn system_prompt(grammar: &ReplyGrammar) -> String {
    let examples = grammar.render_reply(&[
        GrammarEntry {
            name: "xx飯館",
            address: "xx路x段xxx號",
            rating: 4.2,
            reason: "湯頭清甜濃郁、牛肉鮮嫩不柴，現沖現喝最對味，在地人與觀光客必吃的台南經典美食",
            tags: &["百年老店", "在地美食"],
        },
        GrammarEntry {
            name: "xx古蹟",
            address: "xx路x段xxx號",
            rating: 4.2,
            reason: "走進百年古蹟，紅磚歲月低語歷史，文化底蘊深厚，值得細細品味",
            tags: &["名勝古蹟", "打卡勝地"],
        },
    ]);

    format!(
        "你是一位資深的導遊，熟知台灣各處的美食、景點與娛樂\n\
         能夠依照使用者不同的需求，推薦恰當且人性化的地點選擇\n\n\
         你的任務是「根據使用者告訴的地點、旅遊對象以及需求，從中挑選出{picks}個較適合的地點選項，並針對每個地點提供簡短30字的推薦文以及tags，可透過參考資料或上網搜尋」\n\
         推薦文請以資深導遊的口吻來做描述，引發使用者的興趣，感受到是真心推薦給他的地點\n\
         tags請以資深導遊分析這個地方的屬性，提供該地點的專屬標籤，例如:牛肉麵、老店、親子、打卡等簡單幾個字的文字敘述\n\
         同時，若過去你已推薦過使用者該地點，則必須從使用者所給的地點中，挑選出新的且不重複的地點\n\n\
         請嚴格依照回覆格式做回應\n\n\
         回覆格式：\n\
         1. 內容要包含{name}、{address}、{rating}、{reason}、{tags}\n\
         2. 每個推薦選項要用 {delimiter} 做區隔\n\
         3. 要以列點的方式輸出\n\
         4. 不要將你的判斷文字輸出出來，只能有像是範例輸出的格式\n\
         5. 不要輸出任何說明格式或搜尋過程的文字\n\
         6. 請使用半形的冒號，並且在冒號前後都有一個空格\n\
         7. {tags}僅能有最多{max_tags}個，以、或，分隔，並且文字中不要有 etc. 之類的額外文字出現\n\
         8. 務必反覆確認該{name}與使用者給的地點名稱是完全相符的，不要自己創造新的地點名稱\n\
         9. 請從使用者傳的「請幫我從以下的店家去做選擇」之後的「第x家店：」，去做推薦哪間店的判斷\n\
         10. {tags}在不同地點的標籤盡可能做出差異性，針對該地點的屬性去做判斷，例如:老店、當地必吃、網友熱推、觀光勝地等屬性的{tags}\n\n\
         範例輸出：\n{examples}{delimiter}\n...\n",
        picks = grammar.picks,
        name = grammar.name_label,
        address = grammar.address_label,
        rating = grammar.rating_label,
        reason = grammar.reason_label,
        tags = grammar.tags_label,
        delimiter = grammar.delimiter,
        max_tags = grammar.max_tags,
        examples = examples,
    )
}

/// Run one synthesis round.
///
/// `memory` is consumed and handed back inside the output with this round's
/// exchange appended. On failure nothing is recorded; the caller still owns
/// whatever copy it stored.
pub async fn synthesize(
    chat: &dyn ChatCompletion,
    generation: &GenerationConfig,
    grammar: &ReplyGrammar,
    ctx: &RequestContext,
    candidates: &CandidatePlaceSet,
    retrieved: &str,
    mut memory: ConversationMemory,
) -> Result<SynthesisOutput, SynthesisError> {
    let system = system_prompt(grammar);
    let user_prompt = grounded_user_prompt(retrieved, &options_prompt(ctx, candidates, grammar.picks));
    let history = memory.recent();

    info!(
        "Requesting {} picks from {} candidates ({} history turns)",
        grammar.picks,
        candidates.len(),
        history.len()
    );

    let reply = chat
        .complete(&system, &history, &user_prompt, generation)
        .await
        .map_err(|e| {
            error!("Recommendation generation failed: {}", e);
            SynthesisError::from(e)
        })?;

    memory.record_exchange(&user_prompt, &reply);

    Ok(SynthesisOutput {
        reply,
        user_prompt,
        memory,
    })
}
