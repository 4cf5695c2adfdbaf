//! Commit payloads.

use crate::object::ObjectId;
use crate::{Result, StorageError};
use std::fmt;

/// An identity plus the moment it acted: `Name <email> <seconds> <±HHMM>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Display name.
    pub name: String,
    /// Email address, without angle brackets.
    pub email: String,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// UTC offset such as `+0800` or `-0130`.
    pub timezone: String,
}

impl Signature {
    /// Creates a signature.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        timestamp: i64,
        timezone: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            timestamp,
            timezone: timezone.into(),
        }
    }

    /// Parses the value part of an `author`/`committer` line.
    pub fn parse(s: &str) -> Result<Self> {
        let open = s
            .find('<')
            .ok_or_else(|| malformed(format!("signature without email: {}", s)))?;
        let close = s[open..]
            .find('>')
            .map(|i| open + i)
            .ok_or_else(|| malformed(format!("unterminated email: {}", s)))?;

        let name = s[..open].trim_end().to_string();
        let email = s[open + 1..close].to_string();

        let mut rest = s[close + 1..].split_whitespace();
        let timestamp = rest
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| malformed(format!("signature without timestamp: {}", s)))?;
        let timezone = rest.next().unwrap_or("+0000").to_string();

        Ok(Self {
            name,
            email,
            timestamp,
            timezone,
        })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <{}> {} {}",
            self.name, self.email, self.timestamp, self.timezone
        )
    }
}

/// Who wrote a commit and who recorded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMetadata {
    /// Author signature.
    pub author: Signature,
    /// Committer signature.
    pub committer: Signature,
}

impl CommitMetadata {
    /// Uses the same signature for author and committer.
    pub fn single(signature: Signature) -> Self {
        Self {
            author: signature.clone(),
            committer: signature,
        }
    }
}

/// A commit payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Root tree of the snapshot.
    pub tree: ObjectId,
    /// Parent commits, in order.
    pub parents: Vec<ObjectId>,
    /// Author signature.
    pub author: Signature,
    /// Committer signature.
    pub committer: Signature,
    /// Free-text message.
    pub message: String,
}

impl Commit {
    /// Creates a commit with at most one parent.
    pub fn new(
        tree: ObjectId,
        parent: Option<ObjectId>,
        metadata: CommitMetadata,
        message: impl Into<String>,
    ) -> Self {
        Self {
            tree,
            parents: parent.into_iter().collect(),
            author: metadata.author,
            committer: metadata.committer,
            message: message.into(),
        }
    }

    /// Serializes the commit payload. The message always ends in a newline.
    pub fn encode(&self) -> Vec<u8> {
        let mut content = format!("tree {}\n", self.tree);
        for parent in &self.parents {
            content.push_str(&format!("parent {}\n", parent));
        }
        content.push_str(&format!("author {}\n", self.author));
        content.push_str(&format!("committer {}\n", self.committer));
        content.push('\n');
        content.push_str(&self.message);
        if !self.message.ends_with('\n') {
            content.push('\n');
        }
        content.into_bytes()
    }

    /// Parses a commit payload.
    ///
    /// Unknown headers (`gpgsig`, `encoding`, continuation lines) are
    /// skipped.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(payload);
        let (headers, message) = match text.split_once("\n\n") {
            Some((headers, message)) => (headers, message),
            None => (text.trim_end_matches('\n'), ""),
        };

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;

        for line in headers.lines() {
            if let Some(hex) = line.strip_prefix("tree ") {
                tree = Some(ObjectId::from_hex(hex.trim())?);
            } else if let Some(hex) = line.strip_prefix("parent ") {
                parents.push(ObjectId::from_hex(hex.trim())?);
            } else if let Some(sig) = line.strip_prefix("author ") {
                author = Some(Signature::parse(sig)?);
            } else if let Some(sig) = line.strip_prefix("committer ") {
                committer = Some(Signature::parse(sig)?);
            }
        }

        Ok(Self {
            tree: tree.ok_or_else(|| malformed("commit without tree line".to_string()))?,
            parents,
            author: author.ok_or_else(|| malformed("commit without author".to_string()))?,
            committer: committer
                .ok_or_else(|| malformed("commit without committer".to_string()))?,
            message: message.to_string(),
        })
    }
}

fn malformed(detail: String) -> StorageError {
    StorageError::MalformedObject(detail)
}
