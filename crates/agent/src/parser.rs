//! Tolerant reader for model replies.
//!
//! Replies are expected to use `### SECTION` headers, `ITEM:` lines with
//! `||`-separated fields, and a `TAGS:` line. Anything that does not match is
//! left out of the structured view; the full text is always kept verbatim.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use smartshop_core::domain::product::ProductId;

use crate::results::AgentRole;

/// Section used for items that appear before any header.
pub const UNSECTIONED: &str = "ITEMS";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParsedItem {
    pub product_id: ProductId,
    pub score: Option<f64>,
    pub reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParsedReply {
    pub role: AgentRole,
    pub narrative: String,
    pub sections: BTreeMap<String, String>,
    pub items: BTreeMap<String, Vec<ParsedItem>>,
    pub tags: Vec<String>,
}

impl ParsedReply {
    pub fn empty(role: AgentRole) -> Self {
        Self {
            role,
            narrative: String::new(),
            sections: BTreeMap::new(),
            items: BTreeMap::new(),
            tags: Vec::new(),
        }
    }

    /// Non-empty body of `name`, matched case-insensitively.
    pub fn section(&self, name: &str) -> Option<&str> {
        self.sections
            .get(&normalize_header(name))
            .map(String::as_str)
            .filter(|body| !body.is_empty())
    }

    pub fn items_in(&self, name: &str) -> &[ParsedItem] {
        self.items.get(&normalize_header(name)).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First item mentioning `product_id` in any section.
    pub fn find_item(&self, product_id: &ProductId) -> Option<&ParsedItem> {
        self.items.values().flatten().find(|item| &item.product_id == product_id)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// Never fails. Unrecognised structure simply yields empty fields.
    pub fn parse(&self, role: AgentRole, text: &str) -> ParsedReply {
        self.parse_expecting(role, text, &[])
    }

    /// Like [`parse`](Self::parse), but only `headers` may open a section.
    /// Any other header-shaped line stays in the body of the current section.
    pub fn parse_expecting(&self, role: AgentRole, text: &str, headers: &[&str]) -> ParsedReply {
        let expected: Vec<String> = headers.iter().map(|name| normalize_header(name)).collect();
        let mut reply = ParsedReply::empty(role);
        reply.narrative = text.to_string();

        let mut current: Option<String> = None;
        let mut body: Vec<&str> = Vec::new();

        for raw_line in text.lines() {
            let line = raw_line.trim();

            if let Some(header) = header_name(line, &expected) {
                flush_section(&mut reply, current.take(), &mut body);
                current = Some(header);
                continue;
            }

            if let Some(item) = parse_item_line(line) {
                let section = current.clone().unwrap_or_else(|| UNSECTIONED.to_string());
                reply.items.entry(section).or_default().push(item);
                continue;
            }

            if let Some(tags) = strip_prefix_ignore_case(strip_list_marker(line), "TAGS:") {
                for tag in tags.split(',').map(clean_value).filter(|tag| !tag.is_empty()) {
                    if !reply.tags.iter().any(|existing| existing.eq_ignore_ascii_case(&tag)) {
                        reply.tags.push(tag);
                    }
                }
                continue;
            }

            if current.is_some() {
                body.push(raw_line.trim_end());
            }
        }
        flush_section(&mut reply, current, &mut body);

        reply
    }
}

/// Reads a score field. Values in `[0, 1]` are kept, percentages up to 100
/// and `x/y` ratios are scaled, anything else is dropped.
pub fn parse_score(raw: &str) -> Option<f64> {
    let token = raw.split_whitespace().next()?;
    let token = token.trim_matches(|c: char| matches!(c, ',' | ';' | ')' | '(' | '*' | '"'));

    if let Some(percent) = token.strip_suffix('%') {
        let value = percent.trim().parse::<f64>().ok()?;
        return (value.is_finite() && (0.0..=100.0).contains(&value)).then(|| value / 100.0);
    }

    if let Some((numerator, denominator)) = token.split_once('/') {
        let numerator = numerator.trim().parse::<f64>().ok()?;
        let denominator = denominator.trim().parse::<f64>().ok()?;
        let valid = numerator.is_finite()
            && denominator.is_finite()
            && denominator > 0.0
            && (0.0..=denominator).contains(&numerator);
        return valid.then(|| numerator / denominator);
    }

    let value = token.parse::<f64>().ok()?;
    (value.is_finite() && (0.0..=1.0).contains(&value)).then_some(value)
}

fn flush_section(reply: &mut ParsedReply, name: Option<String>, body: &mut Vec<&str>) {
    let text = body.join("\n").trim().to_string();
    body.clear();
    if let Some(name) = name {
        let entry = reply.sections.entry(name).or_default();
        if !entry.is_empty() && !text.is_empty() {
            entry.push_str("\n\n");
        }
        entry.push_str(&text);
    }
}

fn header_name(line: &str, expected: &[String]) -> Option<String> {
    let name = header_candidate(line)?;
    (expected.is_empty() || expected.contains(&name)).then_some(name)
}

/// `# NAME` (any run of `#` followed by a space), `**NAME**` or `NAME:` alone
/// on a line. The last two forms must already be upper case.
fn header_candidate(line: &str) -> Option<String> {
    if let Some(rest) = line.strip_prefix('#') {
        let rest = rest.trim_start_matches('#');
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        return label(rest);
    }

    if let Some(inner) = line.strip_prefix("**") {
        let inner = inner.trim_end_matches(':').trim_end();
        let inner = inner.strip_suffix("**")?.trim_end_matches(':').trim();
        return label(inner).filter(|_| is_upper_label(inner));
    }

    let raw = line.strip_suffix(':')?.trim();
    label(raw).filter(|_| is_upper_label(raw))
}

/// A short run of words without sentence punctuation.
fn label(raw: &str) -> Option<String> {
    let name = normalize_header(raw);
    let shaped = name.chars().any(|c| c.is_ascii_uppercase())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-' | '&'))
        && name.split_whitespace().count() <= 4
        && name.len() <= 40;
    shaped.then_some(name)
}

fn normalize_header(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches(|c: char| matches!(c, '*' | ':' | '#')).trim();
    let without_number = trimmed
        .split_once(". ")
        .filter(|(number, _)| !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()))
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed);
    without_number.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase()
}

fn is_upper_label(label: &str) -> bool {
    let mut has_letter = false;
    for c in label.chars() {
        if c.is_ascii_uppercase() {
            has_letter = true;
        } else if !matches!(c, ' ' | '_' | '-' | '&') {
            return false;
        }
    }
    has_letter
}

fn parse_item_line(line: &str) -> Option<ParsedItem> {
    let rest = strip_prefix_ignore_case(strip_list_marker(line), "ITEM:")?;
    let mut fields = rest.split("||");
    let product_id = clean_value(fields.next()?);
    if product_id.is_empty() || product_id.contains(char::is_whitespace) {
        return None;
    }

    let mut score = None;
    let mut reason = None;
    for field in fields {
        let Some((key, value)) = field.split_once(':') else {
            continue;
        };
        match key.trim().to_ascii_uppercase().as_str() {
            "SCORE" => score = parse_score(value),
            "REASON" => {
                let value = value.trim();
                if !value.is_empty() {
                    reason = Some(value.to_string());
                }
            }
            _ => {}
        }
    }

    Some(ParsedItem { product_id: ProductId(product_id), score, reason })
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim_start_matches(|c: char| matches!(c, '-' | '*' | '•')).trim_start();
    match line.split_once(|c: char| c == '.' || c == ')') {
        Some((number, rest))
            if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) =>
        {
            rest.trim_start()
        }
        _ => line,
    }
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &line[prefix.len()..])
}

fn clean_value(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| matches!(c, '*' | '`' | '"' | '\'' | '[' | ']' | '<' | '>'))
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use smartshop_core::domain::product::ProductId;

    use super::{parse_score, ResponseParser, UNSECTIONED};
    use crate::results::AgentRole;

    #[test]
    fn parses_sections_items_and_tags() {
        let text = "### GUIDE\nWinter is coming.\nLayer up.\n\n### ITEMS\nITEM: P1 || SCORE: 0.9 || REASON: Warm coat\n- ITEM: P2 || SCORE: 85% || REASON: Cozy\nTAGS: winter, cozy, Winter\n";
        let reply = ResponseParser::new().parse(AgentRole::Recommendation, text);

        assert_eq!(reply.narrative, text);
        assert_eq!(reply.section("guide"), Some("Winter is coming.\nLayer up."));
        let items = reply.items_in("ITEMS");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].product_id, ProductId::from("P1"));
        assert_eq!(items[0].score, Some(0.9));
        assert_eq!(items[1].score, Some(0.85));
        assert_eq!(items[1].reason.as_deref(), Some("Cozy"));
        assert_eq!(reply.tags, vec!["winter".to_string(), "cozy".to_string()]);
    }

    #[test]
    fn empty_and_unstructured_text_never_fail() {
        let parser = ResponseParser::new();
        for text in ["", "   ", "just some prose without any markers", "###", "ITEM:", "ITEM: || SCORE: 2"] {
            let reply = parser.parse(AgentRole::Customer, text);
            assert_eq!(reply.narrative, text);
            assert!(reply.items.is_empty());
            assert!(reply.tags.is_empty());
        }

        let reply = parser.parse(AgentRole::Customer, "no delimiters here");
        assert!(reply.sections.is_empty());
        assert!(reply.items.is_empty());
        assert!(reply.tags.is_empty());
    }

    #[test]
    fn malformed_scores_are_dropped() {
        let text = "ITEM: P1 || SCORE: -0.4\nITEM: P2 || SCORE: 1.7\nITEM: P3 || SCORE: high\nITEM: P4 || SCORE: 250%\nITEM: P5 || SCORE: NaN";
        let reply = ResponseParser::new().parse(AgentRole::Recommendation, text);
        let items = reply.items_in(UNSECTIONED);

        assert_eq!(items.len(), 5);
        assert!(items.iter().all(|item| item.score.is_none()));
    }

    #[test]
    fn score_forms() {
        assert_eq!(parse_score("0.42"), Some(0.42));
        assert_eq!(parse_score(" 1 "), Some(1.0));
        assert_eq!(parse_score("85%"), Some(0.85));
        assert_eq!(parse_score("8/10"), Some(0.8));
        assert_eq!(parse_score("0.7 (strong)"), Some(0.7));
        assert_eq!(parse_score("11/10"), None);
        assert_eq!(parse_score("1/0"), None);
        assert_eq!(parse_score(""), None);
        assert_eq!(parse_score("inf"), None);
    }

    #[test]
    fn alternative_header_styles_are_recognised() {
        let text = "**PROFILE**\nLikes gadgets.\nBROWSING:\nMostly electronics.\n## 3. Purchases\nPhones.";
        let reply = ResponseParser::new().parse(AgentRole::Customer, text);

        assert_eq!(reply.section("PROFILE"), Some("Likes gadgets."));
        assert_eq!(reply.section("browsing"), Some("Mostly electronics."));
        assert_eq!(reply.section("PURCHASES"), Some("Phones."));
    }

    #[test]
    fn multibyte_text_is_handled() {
        let text = "### GUIDE\nCafé crème ☕ für alle\nITEM: P1 || REASON: Très bien ✓\nÜBER:";
        let reply = ResponseParser::new().parse(AgentRole::Recommendation, text);
        assert!(reply.section("GUIDE").is_some());
        assert_eq!(reply.items_in("GUIDE").len(), 1);
    }

    #[test]
    fn hash_prefixed_prose_stays_in_the_section_body() {
        let text = "### GUIDE\nThese picks suit you.\n#1 pick is the coat, perfect for winter.\n# Stay warm, stay dry, and enjoy the snow.\nLayer the scarf on top.";
        let reply = ResponseParser::new().parse(AgentRole::Recommendation, text);

        assert_eq!(reply.sections.len(), 1);
        let guide = reply.section("GUIDE").expect("guide should be parsed");
        assert!(guide.starts_with("These picks suit you."));
        assert!(guide.contains("#1 pick is the coat"));
        assert!(guide.ends_with("Layer the scarf on top."));
    }

    #[test]
    fn only_requested_headers_open_sections() {
        let text = "### GUIDE\nWrap up warm.\nNOTE:\nPrices change often.\n**TIP**\nBuy early.\n### ITEMS\nITEM: P4 || SCORE: 0.9";
        let reply = ResponseParser::new().parse_expecting(
            AgentRole::Recommendation,
            text,
            &["GUIDE", "ITEMS"],
        );

        assert_eq!(reply.sections.keys().collect::<Vec<_>>(), vec!["GUIDE", "ITEMS"]);
        assert_eq!(
            reply.section("GUIDE"),
            Some("Wrap up warm.\nNOTE:\nPrices change often.\n**TIP**\nBuy early.")
        );
        assert_eq!(reply.items_in("ITEMS").len(), 1);
    }

    #[test]
    fn item_lines_are_found_by_product() {
        let reply = ResponseParser::new()
            .parse(AgentRole::Product, "### SIMILAR\n1. ITEM: P7 || REASON: Same brand");
        let item = reply.find_item(&ProductId::from("P7")).expect("item should be parsed");
        assert_eq!(item.reason.as_deref(), Some("Same brand"));
        assert_eq!(item.score, None);
    }
}
