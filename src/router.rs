//! Free-text command routing.
//!
//! Intent is decided by ordered keyword predicates over the lowercased input,
//! first match wins: help, load, list, delete, query (leading digits), unknown.
//! Arguments are then pulled out with intent-specific patterns; the question of
//! a query keeps its original casing.

use std::sync::OnceLock;

use regex::Regex;

/// One parsed user utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    /// `path` is `None` when no `.pdf`/`.txt` path could be found
    Load { path: Option<String> },
    List,
    /// `ordinal` is `None` when the keyword was not followed by a number
    Delete { ordinal: Option<String> },
    Query { ordinal: String, question: String },
    Unknown,
}

const HELP_WORDS: &[&str] = &["hi", "hello", "hey", "help"];
const LOAD_WORDS: &[&str] = &["load", "process", "add file", "upload"];
const LIST_WORDS: &[&str] = &["list", "show files", "what files", "data in db"];
const DELETE_WORDS: &[&str] = &["delete", "remove", "erase"];

const EXIT_WORDS: &[&str] = &["exit", "quit", "bye"];

struct Patterns {
    help: Regex,
    load: Regex,
    list: Regex,
    delete: Regex,
    query_start: Regex,
    query: Regex,
    delete_ordinal: Regex,
    paths: [Regex; 3],
}

/// `\b(?:a|b c)\b` over the given words and phrases
fn keyword_regex(words: &[&str]) -> Regex {
    let alternatives = words.iter().map(|w| regex::escape(w)).collect::<Vec<_>>().join("|");
    Regex::new(&format!(r"\b(?:{})\b", alternatives)).expect("Invalid keyword pattern")
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        help: keyword_regex(HELP_WORDS),
        load: keyword_regex(LOAD_WORDS),
        list: keyword_regex(LIST_WORDS),
        delete: keyword_regex(DELETE_WORDS),
        query_start: Regex::new(r"^\d+\s+").expect("Invalid regex pattern"),
        query: Regex::new(r"(?s)^(\d+)\s+(.+)$").expect("Invalid regex pattern"),
        delete_ordinal: Regex::new(r"^(?:delete|remove|erase)\s+(\d+)$").expect("Invalid regex pattern"),
        paths: [
            Regex::new(r#"(?i)["']([^"']+\.(?:pdf|txt))["']"#).expect("Invalid regex pattern"),
            Regex::new(r"(?i)(\S+\.(?:pdf|txt))").expect("Invalid regex pattern"),
            Regex::new(r"(?i)(?:load|process|add)\s+(.+\.(?:pdf|txt))").expect("Invalid regex pattern"),
        ],
    })
}

/// Classify one line of input. Total: every string maps to exactly one command.
pub fn parse_command(input: &str) -> Command {
    let original = input.trim();
    let lowered = original.to_lowercase();
    let p = patterns();

    if p.help.is_match(&lowered) {
        Command::Help
    } else if p.load.is_match(&lowered) {
        Command::Load {
            path: extract_path(original),
        }
    } else if p.list.is_match(&lowered) {
        Command::List
    } else if p.delete.is_match(&lowered) {
        Command::Delete {
            ordinal: p
                .delete_ordinal
                .captures(&lowered)
                .map(|c| c[1].to_string()),
        }
    } else if p.query_start.is_match(&lowered) {
        match p.query.captures(original) {
            Some(c) => Command::Query {
                ordinal: c[1].to_string(),
                question: c[2].trim().to_string(),
            },
            None => Command::Unknown,
        }
    } else {
        Command::Unknown
    }
}

/// First `.pdf`/`.txt` path found: quoted, then bare, then after a load verb.
pub fn extract_path(input: &str) -> Option<String> {
    patterns()
        .paths
        .iter()
        .find_map(|re| re.captures(input))
        .map(|c| c[1].trim().to_string())
}

/// Whether the line ends the session
pub fn is_exit(input: &str) -> bool {
    let lowered = input.trim().to_lowercase();
    EXIT_WORDS.contains(&lowered.as_str())
}
