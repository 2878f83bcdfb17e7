//! LIST / MLSD response parser.
//!
//! Supports three formats:
//! 1. **Unix-style** (`ls -l`): `-rwxr-xr-x 1 owner group 1234 Jan  1 12:00 file.txt`
//! 2. **Windows/IIS-style**: `01-01-26  12:00AM       1234 file.txt`
//! 3. **MLSD facts** (RFC 3659): `type=file;size=1234;modify=20260101120000; file.txt`
//!
//! Self and parent entries (`.`, `..`, `cdir`, `pdir`) are never returned.

use crate::ftp::types::{FtpEntry, FtpEntryKind};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref UNIX_RE: Regex = Regex::new(
        r"(?x)
        ^([dlcbps-][rwxsStT-]{9}[+@.]?)\s+  # permissions
        (\d+)\s+                             # link count
        (\S+)\s+                             # owner
        (\S+)\s+                             # group
        (\d+)\s+                             # size
        (\w{3}\s+\d{1,2}\s+[\d:]+)\s+       # date
        (.+)$                                # filename (possibly with -> target)
        ",
    )
    .expect("valid unix listing regex");
    static ref WINDOWS_RE: Regex = Regex::new(
        r"(?x)
        ^(\d{2}-\d{2}-\d{2,4})\s+           # date
        (\d{1,2}:\d{2}(?:AM|PM)?)\s+        # time
        (<DIR>|\d+)\s+                       # size or <DIR>
        (.+)$                                # filename
        ",
    )
    .expect("valid windows listing regex");
}

/// Parse a full multi-line LIST or MLSD response body.
pub fn parse_listing(raw: &str) -> Vec<FtpEntry> {
    raw.lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty() && !is_total_line(l))
        .filter_map(parse_line)
        .filter(|e| !is_self_or_parent(e))
        .collect()
}

fn is_total_line(line: &str) -> bool {
    line.trim_start()
        .get(..6)
        .map_or(false, |p| p.eq_ignore_ascii_case("total "))
}

fn is_self_or_parent(entry: &FtpEntry) -> bool {
    if entry.name == "." || entry.name == ".." {
        return true;
    }
    matches!(
        entry.facts.get("type").map(|t| t.to_ascii_lowercase()).as_deref(),
        Some("cdir") | Some("pdir")
    )
}

/// Parse a single line from a listing.
fn parse_line(line: &str) -> Option<FtpEntry> {
    if line.contains(';') && line.contains('=') {
        if let Some(e) = parse_mlsd(line) {
            return Some(e);
        }
    }
    parse_unix(line)
        .or_else(|| parse_windows(line))
        .or_else(|| {
            let mut e = FtpEntry::new(line.trim(), FtpEntryKind::Unknown);
            e.raw = Some(line.to_string());
            Some(e)
        })
}

// ─── MLSD parser ─────────────────────────────────────────────────────

/// Parse MLSD fact-line: `fact1=val1;fact2=val2; filename`
fn parse_mlsd(line: &str) -> Option<FtpEntry> {
    // Facts end at the first "; "; everything after it is the name,
    // which may itself contain spaces or semicolons.
    let pos = line.find("; ")?;
    let (facts_str, name) = (&line[..pos + 1], &line[pos + 2..]);
    if name.is_empty() {
        return None;
    }

    let facts: HashMap<String, String> = facts_str
        .split(';')
        .filter_map(|seg| seg.trim().split_once('='))
        .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
        .collect();

    let kind = match facts.get("type").map(|s| s.to_ascii_lowercase()).as_deref() {
        Some("dir") | Some("cdir") | Some("pdir") => FtpEntryKind::Directory,
        Some("file") => FtpEntryKind::File,
        Some(t) if t.starts_with("os.unix=slink") || t.starts_with("os.unix=symlink") => {
            FtpEntryKind::Symlink
        }
        _ => FtpEntryKind::Unknown,
    };

    let mut entry = FtpEntry::new(name, kind);
    entry.size = facts
        .get("size")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    entry.modified = facts.get("modify").and_then(|v| parse_mlsd_time(v));
    entry.permissions = facts.get("unix.mode").cloned();
    entry.owner = facts.get("unix.owner").cloned();
    entry.group = facts.get("unix.group").cloned();
    entry.raw = Some(line.to_string());
    entry.facts = facts;
    Some(entry)
}

/// Parse MLSD timestamp: `YYYYMMDDHHmmSS[.fraction]`
fn parse_mlsd_time(s: &str) -> Option<DateTime<Utc>> {
    let base = s.get(..14).unwrap_or(s);
    NaiveDateTime::parse_from_str(base, "%Y%m%d%H%M%S")
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}

// ─── Unix-style parser ───────────────────────────────────────────────

/// Parse a Unix `ls -l` line:
/// ```text
/// drwxr-xr-x   2 user group  4096 Jan  1 12:00 dirname
/// -rw-r--r--   1 user group  1234 Jan  1  2025 file.txt
/// lrwxrwxrwx   1 user group    42 Jan  1 12:00 link -> target
/// ```
fn parse_unix(line: &str) -> Option<FtpEntry> {
    let caps = UNIX_RE.captures(line)?;

    let perms = caps.get(1)?.as_str();
    let size = caps.get(5)?.as_str().parse::<u64>().unwrap_or(0);
    let name_raw = caps.get(7)?.as_str();

    let kind = match perms.as_bytes().first() {
        Some(b'd') => FtpEntryKind::Directory,
        Some(b'l') => FtpEntryKind::Symlink,
        Some(b'-') => FtpEntryKind::File,
        _ => FtpEntryKind::Unknown,
    };

    let (name, link_target) = match (&kind, name_raw.split_once(" -> ")) {
        (FtpEntryKind::Symlink, Some((n, t))) => (n, Some(t.to_string())),
        _ => (name_raw, None),
    };

    let mut entry = FtpEntry::new(name, kind);
    entry.size = size;
    entry.modified = parse_unix_date(caps.get(6)?.as_str());
    entry.permissions = Some(perms.to_string());
    entry.owner = caps.get(3).map(|m| m.as_str().to_string());
    entry.group = caps.get(4).map(|m| m.as_str().to_string());
    entry.link_target = link_target;
    entry.raw = Some(line.to_string());
    Some(entry)
}

/// Parse the date portion: "Jan  1 12:00" or "Jan  1  2025"
fn parse_unix_date(s: &str) -> Option<DateTime<Utc>> {
    let normalised = s.split_whitespace().collect::<Vec<_>>().join(" ");

    // "Jan 1 12:00" (current year implied)
    if let Ok(dt) = NaiveDateTime::parse_from_str(
        &format!("{} {}", Utc::now().format("%Y"), normalised),
        "%Y %b %d %H:%M",
    ) {
        return Some(Utc.from_utc_datetime(&dt));
    }

    // "Jan 1 2025" (no time)
    let date = NaiveDate::parse_from_str(&normalised, "%b %d %Y").ok()?;
    Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

// ─── Windows-style parser ────────────────────────────────────────────

/// Parse Windows / IIS style line:
/// ```text
/// 01-01-26  12:00AM       1234 file.txt
/// 01-01-26  12:00PM      <DIR> Directory Name
/// ```
fn parse_windows(line: &str) -> Option<FtpEntry> {
    let caps = WINDOWS_RE.captures(line)?;

    let size_or_dir = caps.get(3)?.as_str();
    let (kind, size) = if size_or_dir == "<DIR>" {
        (FtpEntryKind::Directory, 0)
    } else {
        (FtpEntryKind::File, size_or_dir.parse::<u64>().unwrap_or(0))
    };

    let mut entry = FtpEntry::new(caps.get(4)?.as_str(), kind);
    entry.size = size;
    entry.modified = parse_windows_date(caps.get(1)?.as_str(), caps.get(2)?.as_str());
    entry.raw = Some(line.to_string());
    Some(entry)
}

fn parse_windows_date(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let combined = format!("{} {}", date, time);
    ["%m-%d-%y %I:%M%p", "%m-%d-%y %H:%M", "%m-%d-%Y %I:%M%p", "%m-%d-%Y %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&combined, fmt).ok())
        .map(|dt| Utc.from_utc_datetime(&dt))
}
