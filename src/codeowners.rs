//! Ownership file rendering and parsing.
//!
//! The rotator owns only a delimited section of the file:
//!
//! ```text
//! # BEGIN codeowners-rotator managed section
//! # Rotating reviewers; edits inside this section are overwritten.
//! # Current reviewers: alice, bob
//! * @alice @bob
//! # END codeowners-rotator managed section
//! ```
//!
//! Everything outside the markers is preserved byte for byte. A file without a
//! managed section gets one inserted at the top, so manually curated rules
//! further down keep precedence for the paths they match.

use crate::errors::RenderError;

pub const MANAGED_BEGIN: &str = "# BEGIN codeowners-rotator managed section";
pub const MANAGED_END: &str = "# END codeowners-rotator managed section";

const OWNER_PREFIX: char = '@';

/// One managed line: a path pattern and its owners in selection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipRule {
    pub pattern: String,
    pub owners: Vec<String>,
}

/// Assign the same reviewers to every configured pattern.
pub fn rules_for(patterns: &[String], reviewers: &[String]) -> Vec<OwnershipRule> {
    patterns
        .iter()
        .map(|pattern| OwnershipRule {
            pattern: pattern.clone(),
            owners: reviewers.to_vec(),
        })
        .collect()
}

/// Render just the managed section, markers included, newline terminated.
pub fn render_managed_section(rules: &[OwnershipRule]) -> String {
    let mut everyone: Vec<&str> = Vec::new();
    for owner in rules.iter().flat_map(|r| r.owners.iter()) {
        if !everyone.contains(&owner.as_str()) {
            everyone.push(owner);
        }
    }

    let mut out = String::new();
    out.push_str(MANAGED_BEGIN);
    out.push('\n');
    out.push_str("# Rotating reviewers; edits inside this section are overwritten.\n");
    out.push_str(&format!("# Current reviewers: {}\n", everyone.join(", ")));
    for rule in rules {
        out.push_str(&rule.pattern);
        for owner in &rule.owners {
            out.push(' ');
            out.push(OWNER_PREFIX);
            out.push_str(owner);
        }
        out.push('\n');
    }
    out.push_str(MANAGED_END);
    out.push('\n');
    out
}

/// Render the full ownership file, merging the managed section into `existing`.
pub fn render(existing: Option<&str>, rules: &[OwnershipRule]) -> Result<String, RenderError> {
    let managed = render_managed_section(rules);
    let existing = existing.unwrap_or("");

    match locate_section(existing)? {
        Some((start, end)) => {
            let mut out = String::with_capacity(existing.len() + managed.len());
            out.push_str(&existing[..start]);
            out.push_str(&managed);
            out.push_str(&existing[end..]);
            Ok(out)
        }
        None if existing.is_empty() => Ok(managed),
        None => Ok(format!("{}\n{}", managed, existing)),
    }
}

/// Byte range of the managed section, from the start of the begin marker line
/// through the end of the end marker line (including its newline).
fn locate_section(content: &str) -> Result<Option<(usize, usize)>, RenderError> {
    let mut offset = 0;
    let mut begin: Option<(usize, usize)> = None;

    for (index, line) in content.split_inclusive('\n').enumerate() {
        let marker = line.trim_end();
        match begin {
            None if marker == MANAGED_BEGIN => begin = Some((offset, index + 1)),
            Some((start, _)) if marker == MANAGED_END => {
                return Ok(Some((start, offset + line.len())));
            }
            _ => {}
        }
        offset += line.len();
    }

    match begin {
        Some((_, line)) => Err(RenderError::UnterminatedSection { line }),
        None => Ok(None),
    }
}

/// Owner handles on one rule line, without the `@` prefix.
fn owners_on_line(line: &str) -> impl Iterator<Item = &str> {
    let trimmed = line.trim();
    let rule = if trimmed.starts_with('#') { "" } else { trimmed };
    rule.split_whitespace()
        .take_while(|token| !token.starts_with('#'))
        .filter_map(|token| token.strip_prefix(OWNER_PREFIX))
        .filter(|handle| !handle.is_empty())
}

fn dedup_in_order<'a>(handles: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for handle in handles {
        if !out.iter().any(|h| h == handle) {
            out.push(handle.to_string());
        }
    }
    out
}

/// Every `@owner` named anywhere in the file, in first-seen order.
pub fn parse_owners(content: &str) -> Vec<String> {
    dedup_in_order(content.lines().flat_map(owners_on_line))
}

/// Owners inside the managed section, `None` when the file has no complete section.
pub fn managed_owners(content: &str) -> Option<Vec<String>> {
    let (start, end) = locate_section(content).ok()??;
    Some(parse_owners(&content[start..end]))
}

/// Line diff between two versions of a file: removed lines prefixed with `-`,
/// added lines with `+`. Unchanged lines are omitted.
pub fn line_diff(old: &str, new: &str) -> Vec<String> {
    let a: Vec<&str> = old.lines().collect();
    let b: Vec<&str> = new.lines().collect();

    // Only the changed middle needs the quadratic table.
    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let a = &a[prefix..a.len() - suffix];
    let b = &b[prefix..b.len() - suffix];

    // lcs[i][j] = length of the longest common subsequence of a[i..] and b[j..]
    let mut lcs = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            out.push(format!("-{}", a[i]));
            i += 1;
        } else {
            out.push(format!("+{}", b[j]));
            j += 1;
        }
    }
    out.extend(a[i..].iter().map(|line| format!("-{}", line)));
    out.extend(b[j..].iter().map(|line| format!("+{}", line)));
    out
}
