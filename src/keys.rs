//! Opaque learning-platform keys
//!
//! Course and usage keys travel as strings on the wire and are handled by the
//! built-in [`StringExtension`](crate::extension::StringExtension)s.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const COURSE_PREFIX: &str = "course-v1:";
const BLOCK_PREFIX: &str = "block-v1:";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind} key: '{raw}'")]
pub struct InvalidKeyError {
    kind: &'static str,
    raw: String,
}

impl InvalidKeyError {
    fn new(kind: &'static str, raw: &str) -> Self {
        Self {
            kind,
            raw: raw.to_string(),
        }
    }
}

/// Course identifier, e.g. `course-v1:edX+DemoX.1+2014`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CourseKey {
    pub org: String,
    pub course: String,
    pub run: String,
}

impl CourseKey {
    pub fn new(org: impl Into<String>, course: impl Into<String>, run: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            course: course.into(),
            run: run.into(),
        }
    }
}

fn split_parts<'a>(body: &'a str, count: usize) -> Option<Vec<&'a str>> {
    let parts: Vec<&str> = body.split('+').collect();
    if parts.len() == count && parts.iter().all(|p| !p.is_empty()) {
        Some(parts)
    } else {
        None
    }
}

impl FromStr for CourseKey {
    type Err = InvalidKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .strip_prefix(COURSE_PREFIX)
            .and_then(|body| split_parts(body, 3))
            .ok_or_else(|| InvalidKeyError::new("course", s))?;
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl fmt::Display for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}+{}+{}", COURSE_PREFIX, self.org, self.course, self.run)
    }
}

/// Block identifier inside a course, e.g.
/// `block-v1:edX+DemoX.1+2014+type@problem+block@intro`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UsageKey {
    pub course_key: CourseKey,
    pub block_type: String,
    pub block_id: String,
}

impl FromStr for UsageKey {
    type Err = InvalidKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidKeyError::new("usage", s);
        let parts = s
            .strip_prefix(BLOCK_PREFIX)
            .and_then(|body| split_parts(body, 5))
            .ok_or_else(invalid)?;
        let block_type = parts[3]
            .strip_prefix("type@")
            .filter(|t| !t.is_empty())
            .ok_or_else(invalid)?;
        let block_id = parts[4]
            .strip_prefix("block@")
            .filter(|b| !b.is_empty())
            .ok_or_else(invalid)?;

        Ok(Self {
            course_key: CourseKey::new(parts[0], parts[1], parts[2]),
            block_type: block_type.to_string(),
            block_id: block_id.to_string(),
        })
    }
}

impl fmt::Display for UsageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let course = &self.course_key;
        write!(
            f,
            "{}{}+{}+{}+type@{}+block@{}",
            BLOCK_PREFIX, course.org, course.course, course.run, self.block_type, self.block_id
        )
    }
}

crate::custom_datum!(CourseKey);
crate::custom_datum!(UsageKey);
