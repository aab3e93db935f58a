//! User-turn construction: the enumerated store list and the grounded wrapper
//! around it.

use crate::models::{place::CandidatePlaceSet, request::RequestContext};

const UNKNOWN_NAME: &str = "未知名稱";
const UNKNOWN_ADDRESS: &str = "未知地址";

/// Enumerated `第N家店` block listing every candidate with name, address and rating.
pub fn render_store_list(candidates: &CandidatePlaceSet, picks: usize) -> String {
    let mut list = format!(
        "請幫我從以下的店家去做選擇，篩選出{}間符合我需求的地點\n",
        picks
    );

    for (i, place) in candidates.iter().enumerate() {
        let name = if place.name.is_empty() {
            UNKNOWN_NAME
        } else {
            place.name.as_str()
        };
        let address = if place.address.is_empty() {
            UNKNOWN_ADDRESS
        } else {
            place.address.as_str()
        };

        list.push_str(&format!(
            "\n第{}家店：\n\n地點名稱：{}\n地址：{}\n評分：{}\n",
            i + 1,
            name,
            address,
            place.rating
        ));
    }

    list
}

/// The request-specific part of the user turn: who is travelling, what they
/// want, and the stores to choose from.
pub fn options_prompt(ctx: &RequestContext, candidates: &CandidatePlaceSet, picks: usize) -> String {
    format!(
        "我這次旅遊一起的對象是：{}\n並且我希望這些地點能滿足這些需求「{}」\n\n{}",
        ctx.companion,
        ctx.need,
        render_store_list(candidates, picks)
    )
}

/// Wrap a user prompt with the retrieved reference text.
pub fn grounded_user_prompt(retrieved: &str, user_prompt: &str) -> String {
    format!(
        "根據下列資料：\n{}\n\n回答使用者的問題：{}\n若無法回答則請自行上網查找資料。",
        retrieved, user_prompt
    )
}
