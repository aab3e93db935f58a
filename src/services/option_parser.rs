//! Turns the model's reply back into [`RecommendedOption`]s.
//!
//! The reply is split on dash delimiter lines; each segment is read field by
//! field, resolved against the candidate places for coordinates and given a
//! distance from the origin. Missing fields fall back to defaults instead of
//! dropping the option, unless [`ParseMode::Strict`] is on.

use log::warn;
use regex::Regex;
use std::str::FromStr;

use crate::models::{
    option::RecommendedOption,
    place::CandidatePlaceSet,
    request::{Coordinates, RequestContext},
};
use crate::services::{
    distance_service::distance_info,
    place_resolver::{PlaceResolver, SubstringResolver},
    reply_grammar::ReplyGrammar,
};

/// Category label written on every option.
pub const OPTION_CATEGORY: &str = "美食";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Keep every segment, substituting defaults for missing fields.
    Lenient,
    /// Drop segments without a place name and report them.
    Strict,
}

impl FromStr for ParseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lenient" => Ok(ParseMode::Lenient),
            "strict" => Ok(ParseMode::Strict),
            other => Err(format!("unknown parse mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedSegment {
    pub name: Option<String>,
    pub rating: Option<f64>,
    pub reason: Option<String>,
    pub tags: Vec<String>,
}

/// A segment that did not carry a usable place name.
#[derive(Debug, Clone, PartialEq)]
pub struct UnparseableSegment {
    /// Position among the non-blank segments, starting at 0.
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct ParseReport {
    pub options: Vec<RecommendedOption>,
    /// In lenient mode these segments still produced an option with an empty name.
    pub unparseable: Vec<UnparseableSegment>,
}

pub struct OptionParser {
    grammar: ReplyGrammar,
    mode: ParseMode,
    resolver: Box<dyn PlaceResolver>,
    delimiter: Regex,
    name: Regex,
    rating: Regex,
    reason: Regex,
    tags: Regex,
    tag_separator: Regex,
}

fn field_pattern(label: &str, value: &str, case_insensitive: bool) -> Regex {
    let flags = if case_insensitive { "(?i)" } else { "" };
    let pattern = format!(r"{}{}\s*[:：]\s*{}", flags, regex::escape(label), value);
    Regex::new(&pattern).expect("field pattern built from escaped label")
}

impl OptionParser {
    pub fn new(grammar: ReplyGrammar, mode: ParseMode, resolver: Box<dyn PlaceResolver>) -> Self {
        let delimiter = Regex::new(&format!("-{{{},}}", grammar.min_delimiter_dashes))
            .expect("delimiter pattern");

        Self {
            delimiter,
            name: field_pattern(grammar.name_label, "(.+)", false),
            rating: field_pattern(grammar.rating_label, "([0-9.]+)", false),
            reason: field_pattern(grammar.reason_label, "(.+)", false),
            tags: field_pattern(grammar.tags_label, "(.+)", true),
            tag_separator: Regex::new("[、,，]").expect("tag separator pattern"),
            grammar,
            mode,
            resolver,
        }
    }

    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    pub fn grammar(&self) -> &ReplyGrammar {
        &self.grammar
    }

    /// Non-blank segments between delimiter lines.
    pub fn split_segments<'r>(&self, reply: &'r str) -> Vec<&'r str> {
        self.delimiter
            .split(reply)
            .filter(|segment| !segment.trim().is_empty())
            .collect()
    }

    pub fn parse_segment(&self, segment: &str) -> ParsedSegment {
        let capture = |re: &Regex| {
            re.captures(segment)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
        };

        let tags = capture(&self.tags)
            .map(|raw| {
                self.tag_separator
                    .split(&raw)
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .take(self.grammar.max_tags)
                    .collect()
            })
            .unwrap_or_default();

        ParsedSegment {
            name: capture(&self.name).filter(|n| !n.is_empty()),
            rating: capture(&self.rating).and_then(|r| r.parse::<f64>().ok()),
            reason: capture(&self.reason),
            tags,
        }
    }

    fn enrich(
        &self,
        parsed: ParsedSegment,
        candidates: &CandidatePlaceSet,
        ctx: &RequestContext,
    ) -> RecommendedOption {
        let name = parsed.name.unwrap_or_default();
        let resolved = self
            .resolver
            .resolve(&name, candidates)
            .and_then(|place| place.coordinates());

        // Unresolved names keep the (0, 0) placeholder and the distance it implies.
        let target = resolved.unwrap_or_else(Coordinates::zero);

        RecommendedOption {
            place_name: name,
            category: OPTION_CATEGORY.to_string(),
            time_range: ctx.time_slot.clone(),
            rating: parsed.rating.unwrap_or(0.0),
            tags: parsed.tags,
            ai_reason: parsed.reason.unwrap_or_default(),
            distance_info: distance_info(ctx.origin, target),
            lat: target.lat,
            lng: target.lng,
            resolved: resolved.is_some(),
        }
    }

    pub fn parse_reply_report(
        &self,
        reply: &str,
        candidates: &CandidatePlaceSet,
        ctx: &RequestContext,
    ) -> ParseReport {
        let mut report = ParseReport::default();

        for (index, segment) in self.split_segments(reply).into_iter().enumerate() {
            let parsed = self.parse_segment(segment);

            if parsed.name.is_none() {
                warn!("Reply segment {} has no place name", index);
                report.unparseable.push(UnparseableSegment {
                    index,
                    text: segment.trim().to_string(),
                });
                if self.mode == ParseMode::Strict {
                    continue;
                }
            }

            let option = self.enrich(parsed, candidates, ctx);
            if !option.resolved && !option.place_name.is_empty() {
                warn!("'{}' matched no candidate place", option.place_name);
            }
            report.options.push(option);
        }

        report
    }

    pub fn parse_reply(
        &self,
        reply: &str,
        candidates: &CandidatePlaceSet,
        ctx: &RequestContext,
    ) -> Vec<RecommendedOption> {
        self.parse_reply_report(reply, candidates, ctx).options
    }
}

impl Default for OptionParser {
    fn default() -> Self {
        Self::new(ReplyGrammar::v1(), ParseMode::Lenient, Box::new(SubstringResolver))
    }
}
