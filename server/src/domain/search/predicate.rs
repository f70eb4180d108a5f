//! Attribute-predicate mini-language
//!
//! `key=value,key!=value,...` — pairs conjoined by AND. Parsing is
//! all-or-nothing: if any pair is malformed the whole query is treated as
//! free text and the caller falls back to broad match.

/// Comparison operator of one predicate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateOp {
    Eq,
    Neq,
}

/// One `key op value` pair of an attribute query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePredicate {
    pub key: String,
    pub value: String,
    pub op: PredicateOp,
}

/// Parse an attribute query into a predicate list.
///
/// Returns None when the input is not a valid pair list; an empty input
/// yields an empty list, which callers treat as "match all".
pub fn parse_attribute_query(query: &str) -> Option<Vec<AttributePredicate>> {
    if query.trim().is_empty() {
        return Some(Vec::new());
    }
    if !query.contains('=') {
        return None;
    }

    let mut predicates = Vec::new();
    for pair in query.split(',') {
        // `!=` first so the bang is not folded into the key
        let (op, separator) = if pair.contains("!=") {
            (PredicateOp::Neq, "!=")
        } else if pair.contains('=') {
            (PredicateOp::Eq, "=")
        } else {
            return None;
        };

        let parts: Vec<&str> = pair.split(separator).collect();
        let [key, value] = parts.as_slice() else {
            return None;
        };

        predicates.push(AttributePredicate {
            key: key.trim().to_string(),
            value: value.trim().to_string(),
            op,
        });
    }

    Some(predicates)
}
