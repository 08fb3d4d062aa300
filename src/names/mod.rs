//! Resource-name addressing.
//!
//! Resource names are slash-delimited paths alternating collection ids and
//! resource ids, e.g. `groups/{groupId}/members/{memberId}`. Every handler
//! that accepts a name parses it through the types in this module.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Collection id for groups.
pub const GROUPS_COLLECTION: &str = "groups";
/// Collection id for members, nested under a group.
pub const MEMBERS_COLLECTION: &str = "members";

const SEPARATOR: char = '/';

/// Errors produced while parsing a resource name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("resource name {name:?} has {actual} segments, expected {expected}")]
    SegmentCount {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("resource name {name:?} has collection {actual:?} at segment {index}, expected {expected:?}")]
    Collection {
        name: String,
        index: usize,
        expected: &'static str,
        actual: String,
    },
    #[error("resource name {name:?} has an empty identifier at segment {index}")]
    EmptyId { name: String, index: usize },
}

/// Split `name` and check it against the expected collection ids.
///
/// Segments at even indices must equal the matching entry of `collections`;
/// segments at odd indices are returned as the resource identifiers.
fn parse_segments<'a>(
    name: &'a str,
    collections: &[&'static str],
) -> Result<Vec<&'a str>, NameError> {
    let segments: Vec<&str> = name.split(SEPARATOR).collect();
    let expected = collections.len() * 2;
    if segments.len() != expected {
        return Err(NameError::SegmentCount {
            name: name.to_string(),
            expected,
            actual: segments.len(),
        });
    }

    let mut ids = Vec::with_capacity(collections.len());
    for (index, segment) in segments.iter().enumerate() {
        if index % 2 == 0 {
            let collection = collections[index / 2];
            if *segment != collection {
                return Err(NameError::Collection {
                    name: name.to_string(),
                    index,
                    expected: collection,
                    actual: segment.to_string(),
                });
            }
        } else if segment.is_empty() {
            return Err(NameError::EmptyId {
                name: name.to_string(),
                index,
            });
        } else {
            ids.push(*segment);
        }
    }

    Ok(ids)
}

/// A parsed `groups/{groupId}` name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupName {
    pub group_id: String,
}

impl GroupName {
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
        }
    }

    pub fn parse(name: &str) -> Result<Self, NameError> {
        let ids = parse_segments(name, &[GROUPS_COLLECTION])?;
        Ok(Self::new(ids[0]))
    }
}

impl FromStr for GroupName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", GROUPS_COLLECTION, self.group_id)
    }
}

/// A parsed `groups/{groupId}/members/{memberId}` name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberName {
    pub group_id: String,
    pub member_id: String,
}

impl MemberName {
    pub fn new(group_id: impl Into<String>, member_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            member_id: member_id.into(),
        }
    }

    pub fn parse(name: &str) -> Result<Self, NameError> {
        let ids = parse_segments(name, &[GROUPS_COLLECTION, MEMBERS_COLLECTION])?;
        Ok(Self::new(ids[0], ids[1]))
    }
}

impl FromStr for MemberName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MemberName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            GROUPS_COLLECTION, self.group_id, MEMBERS_COLLECTION, self.member_id
        )
    }
}
