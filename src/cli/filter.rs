//! Filter expressions such as `likes_count > 100`.
//!
//! An expression compares one record field to a literal. Fields that only
//! full records carry are rejected unless preloading is on, since without
//! preloading the filter sees summaries.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::model::{FieldValue, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// Substring match, case-insensitive.
    Contains,
}

impl Op {
    fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "==" | "=" => Op::Eq,
            "!=" => Op::Ne,
            ">" => Op::Gt,
            ">=" => Op::Ge,
            "<" => Op::Lt,
            "<=" => Op::Le,
            "~" => Op::Contains,
            _ => return None,
        })
    }
}

/// One compiled `field op value` expression.
#[derive(Debug, Clone)]
pub struct FilterExpr {
    field: String,
    op: Op,
    value: String,
}

fn expression_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\s*([a-z_]+)\s*(==|!=|>=|<=|=|>|<|~)\s*(.+?)\s*$").ok())
        .as_ref()
}

impl FilterExpr {
    /// Parse `expr` for records of type `R`.
    pub fn parse<R: Record>(expr: &str, preload: bool) -> Result<Self> {
        let captures = expression_pattern()
            .and_then(|p| p.captures(expr))
            .ok_or_else(|| {
                Error::Usage(format!(
                    "Invalid filter '{}'. Expected: <field> <op> <value>",
                    expr
                ))
            })?;

        let field = captures[1].to_string();
        let op = Op::parse(&captures[2])
            .ok_or_else(|| Error::Usage(format!("Unknown operator in '{}'", expr)))?;
        let value = captures[3].trim_matches(|c| c == '"' || c == '\'').to_string();

        if !R::SUMMARY_FIELDS.contains(&field.as_str()) {
            if R::FULL_FIELDS.contains(&field.as_str()) {
                if !preload {
                    return Err(Error::Usage(format!(
                        "Field '{}' is only available with --preload. Fields without preload: {}",
                        field,
                        R::SUMMARY_FIELDS.join(", ")
                    )));
                }
            } else {
                return Err(Error::Usage(format!(
                    "Unknown {} field '{}'. Available: {}",
                    R::KIND,
                    field,
                    R::SUMMARY_FIELDS
                        .iter()
                        .chain(R::FULL_FIELDS)
                        .copied()
                        .collect::<Vec<_>>()
                        .join(", ")
                )));
            }
        }

        Ok(Self { field, op, value })
    }

    pub fn matches<R: Record>(&self, record: &R) -> bool {
        let Some(actual) = record.field(&self.field) else {
            return false;
        };

        match actual {
            FieldValue::Int(n) => match self.value.parse::<i64>() {
                Ok(expected) => compare(self.op, n.cmp(&expected)),
                Err(_) => false,
            },
            FieldValue::Bool(b) => match (self.value.parse::<bool>(), self.op) {
                (Ok(expected), Op::Eq) => b == expected,
                (Ok(expected), Op::Ne) => b != expected,
                _ => false,
            },
            FieldValue::Text(text) => match self.op {
                Op::Contains => text.to_lowercase().contains(&self.value.to_lowercase()),
                op => compare(op, text.as_str().cmp(self.value.as_str())),
            },
        }
    }
}

fn compare(op: Op, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        Op::Eq => ordering == Equal,
        Op::Ne => ordering != Equal,
        Op::Gt => ordering == Greater,
        Op::Ge => ordering != Less,
        Op::Lt => ordering == Less,
        Op::Le => ordering != Greater,
        Op::Contains => false,
    }
}

/// Compile all expressions into one predicate; every expression must hold.
pub fn compile<R: Record>(
    exprs: &[String],
    preload: bool,
) -> Result<Option<impl Fn(&R) -> bool + Send + Sync + 'static>> {
    if exprs.is_empty() {
        return Ok(None);
    }
    let compiled = exprs
        .iter()
        .map(|e| FilterExpr::parse::<R>(e, preload))
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(move |record: &R| compiled.iter().all(|f| f.matches(record))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Post, Profile};

    fn post(likes: u64, caption: &str) -> Post {
        let mut post = Post::from_shortcode("B1");
        post.likes_count = likes;
        post.caption = Some(caption.into());
        post
    }

    #[test]
    fn test_numeric_and_text_comparisons() {
        let gt = FilterExpr::parse::<Post>("likes_count > 100", false).unwrap();
        assert!(gt.matches(&post(101, "")));
        assert!(!gt.matches(&post(100, "")));

        let contains = FilterExpr::parse::<Post>("caption ~ 'Sunset'", false).unwrap();
        assert!(contains.matches(&post(0, "a sunset at sea")));

        let video = FilterExpr::parse::<Post>("is_video == false", false).unwrap();
        assert!(video.matches(&post(0, "")));
    }

    #[test]
    fn test_full_fields_need_preload() {
        let err = FilterExpr::parse::<Post>("media_count >= 2", false).unwrap_err();
        assert!(matches!(err, Error::Usage(ref m) if m.contains("--preload")));
        assert!(FilterExpr::parse::<Post>("media_count >= 2", true).is_ok());

        assert!(FilterExpr::parse::<Profile>("followers_count > 10", false).is_err());
        assert!(FilterExpr::parse::<Profile>("followers_count > 10", true).is_ok());
    }

    #[test]
    fn test_rejects_unknown_fields_and_syntax() {
        assert!(matches!(
            FilterExpr::parse::<Post>("nope > 1", true),
            Err(Error::Usage(_))
        ));
        assert!(matches!(
            FilterExpr::parse::<Post>("likes_count", true),
            Err(Error::Usage(_))
        ));
    }

    #[test]
    fn test_compile_requires_all() {
        let predicate = compile::<Post>(
            &["likes_count >= 10".to_string(), "caption ~ cat".to_string()],
            false,
        )
        .unwrap()
        .unwrap();
        assert!(predicate(&post(10, "Cat")));
        assert!(!predicate(&post(9, "Cat")));
        assert!(!predicate(&post(10, "dog")));
        assert!(compile::<Post>(&[], false).unwrap().is_none());
    }
}
