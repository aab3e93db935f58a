//! The labeled-field grammar the recommendation model is asked to answer in.
//!
//! Version 1:
//!
//! ```text
//! 推薦地點1:
//!     地點名稱 : xx飯館
//!     地址 : xx路x段xxx號
//!     評分 : 4.2
//!     推薦文 : ...
//!     tags : 百年老店、在地美食
//! ---------
//! 推薦地點2:
//!     ...
//! ```
//!
//! The system prompt is rendered from the same labels the parser matches, so
//! changing a label here changes both sides.

pub const GRAMMAR_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct ReplyGrammar {
    pub version: u32,
    pub entry_heading: &'static str,
    pub name_label: &'static str,
    pub address_label: &'static str,
    pub rating_label: &'static str,
    pub reason_label: &'static str,
    pub tags_label: &'static str,
    pub delimiter: &'static str,
    /// Minimum run of dashes the parser treats as a delimiter line.
    pub min_delimiter_dashes: usize,
    pub picks: usize,
    pub max_tags: usize,
}

impl Default for ReplyGrammar {
    fn default() -> Self {
        Self::v1()
    }
}

/// Field values of one entry, used to render examples.
#[derive(Debug, Clone)]
pub struct GrammarEntry<'a> {
    pub name: &'a str,
    pub address: &'a str,
    pub rating: f64,
    pub reason: &'a str,
    pub tags: &'a [&'a str],
}

impl ReplyGrammar {
    pub fn v1() -> Self {
        Self {
            version: GRAMMAR_VERSION,
            entry_heading: "推薦地點",
            name_label: "地點名稱",
            address_label: "地址",
            rating_label: "評分",
            reason_label: "推薦文",
            tags_label: "tags",
            delimiter: "---------",
            min_delimiter_dashes: 5,
            picks: 5,
            max_tags: 3,
        }
    }

    /// One entry exactly as the model is asked to write it.
    pub fn render_entry(&self, index: usize, entry: &GrammarEntry<'_>) -> String {
        format!(
            "{heading}{index}:\n    {name_label} : {name}\n    {address_label} : {address}\n    {rating_label} : {rating}\n    {reason_label} : {reason}\n    {tags_label} : {tags}\n",
            heading = self.entry_heading,
            name_label = self.name_label,
            name = entry.name,
            address_label = self.address_label,
            address = entry.address,
            rating_label = self.rating_label,
            rating = entry.rating,
            reason_label = self.reason_label,
            reason = entry.reason,
            tags_label = self.tags_label,
            tags = entry.tags.join("、"),
        )
    }

    /// A full reply: entries separated by delimiter lines.
    pub fn render_reply(&self, entries: &[GrammarEntry<'_>]) -> String {
        entries
            .iter()
            .enumerate()
            .map(|(i, entry)| self.render_entry(i + 1, entry))
            .collect::<Vec<_>>()
            .join(&format!("{}\n", self.delimiter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_entry_uses_spaced_colons() {
        let grammar = ReplyGrammar::v1();
        let entry = GrammarEntry {
            name: "阿堂鹹粥",
            address: "台南市南區福吉路",
            rating: 4.3,
            reason: "清晨就排隊的老味道",
            tags: &["老店", "在地美食"],
        };
        let text = grammar.render_entry(1, &entry);
        assert!(text.starts_with("推薦地點1:\n"));
        assert!(text.contains("地點名稱 : 阿堂鹹粥"));
        assert!(text.contains("評分 : 4.3"));
        assert!(text.contains("tags : 老店、在地美食"));
    }

    #[test]
    fn test_render_reply_places_delimiters_between_entries() {
        let grammar = ReplyGrammar::v1();
        let entry = GrammarEntry {
            name: "a",
            address: "b",
            rating: 1.0,
            reason: "c",
            tags: &[],
        };
        let reply = grammar.render_reply(&[entry.clone(), entry.clone(), entry]);
        assert_eq!(reply.matches(grammar.delimiter).count(), 2);
    }
}
