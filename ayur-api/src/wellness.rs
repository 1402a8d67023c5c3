//! Rule-based wellness responder
//!
//! Maps a free-text question to one canned Ayurveda-style tip by keyword
//! containment. Rules are checked in order and the first match wins; tips
//! are never combined.

use serde::Serialize;

/// Appended to every reply
pub const DISCLAIMER: &str = "Informational Ayurveda-style tips only. Not medical advice.";

/// Reply when no rule matches (including empty input)
pub const FALLBACK_TIP: &str =
    "General tip: subah garam pani, halka nashta, halki walk. Zyada specific sawal poochiye.";

/// Romanized Hindi markers for the "hinglish" tag
const HINGLISH_MARKERS: &[&str] = &["hoga", "kya", "nahi", "thik", "sardi", "khansi"];

/// Tip category, in rule priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipCategory {
    Cold,
    Cough,
    Digestion,
    Daily,
}

/// One (keywords, tip) rule
#[derive(Debug)]
pub struct TipRule {
    pub category: TipCategory,
    pub keywords: &'static [&'static str],
    pub tip: &'static str,
}

/// Ordered rules; earlier entries take priority
pub const RULES: &[TipRule] = &[
    TipRule {
        category: TipCategory::Cold,
        keywords: &["cold", "sardi", "flu", "nose"],
        tip: "Garam pani me haldi ya tulsi wali chai, din me 2-3 bar. Rest karein. Thandi cheezon se parhez.",
    },
    TipRule {
        category: TipCategory::Cough,
        keywords: &["cough", "khansi"],
        tip: "Honey + ginger warm water (1 tsp madh + adrak), din me 2 bar. Steam lein.",
    },
    TipRule {
        category: TipCategory::Digestion,
        keywords: &["gas", "acidity", "digestion"],
        tip: "Jeera-ajwain warm water, halka khana, zyada tel-masala se parhez.",
    },
    TipRule {
        category: TipCategory::Daily,
        keywords: &["daily", "wellness", "healthy", "fitness"],
        tip: "Subah garam pani, 10-15 min walk/yoga, 2-3L paani, early dinner.",
    },
];

/// Heuristic language tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    /// Devanagari script present
    Hi,
    /// Latin script with romanized Hindi markers
    Hinglish,
    En,
}

/// Chat reply body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WellnessReply {
    pub answer: &'static str,
    pub lang: Lang,
    pub disclaimer: &'static str,
}

/// First rule whose keywords appear in the message, if any
pub fn match_rule(message: &str) -> Option<&'static TipRule> {
    let text = message.trim().to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| text.contains(k)))
}

/// Tag text as Devanagari Hindi, Hinglish or English
pub fn detect_lang(text: &str) -> Lang {
    if text.chars().any(|c| ('\u{0900}'..='\u{097F}').contains(&c)) {
        return Lang::Hi;
    }

    let lowered = text.to_lowercase();
    if HINGLISH_MARKERS.iter().any(|m| lowered.contains(m)) {
        Lang::Hinglish
    } else {
        Lang::En
    }
}

pub fn respond(message: &str) -> WellnessReply {
    WellnessReply {
        answer: match_rule(message).map_or(FALLBACK_TIP, |rule| rule.tip),
        lang: detect_lang(message),
        disclaimer: DISCLAIMER,
    }
}
