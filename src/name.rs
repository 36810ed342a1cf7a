//! 8.3 short-name encoding.

use core::fmt;

use heapless::String as ShortString;

use crate::error::{FsError, FsResult};

pub const SHORT_NAME_LEN: usize = 11;
const BASE_LEN: usize = 8;
const EXT_LEN: usize = 3;

/// Space-padded, upper-case `NAME    EXT` record as stored on disk.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShortName(pub [u8; SHORT_NAME_LEN]);

impl ShortName {
    pub const DOT: ShortName = ShortName(*b".          ");
    pub const DOTDOT: ShortName = ShortName(*b"..         ");

    /// Encodes a human-readable name, splitting at the first `.`.
    pub fn encode(name: &str) -> FsResult<Self> {
        match name {
            "." => return Ok(Self::DOT),
            ".." => return Ok(Self::DOTDOT),
            _ => {}
        }
        let (base, ext) = match name.find('.') {
            Some(pos) => (&name[..pos], &name[pos + 1..]),
            None => (name, ""),
        };
        if base.is_empty() || base.len() > BASE_LEN || ext.len() > EXT_LEN {
            return Err(FsError::InvalidName);
        }
        if !base.chars().all(is_short_name_char) || !ext.chars().all(is_short_name_char) {
            return Err(FsError::InvalidName);
        }

        let mut short = [b' '; SHORT_NAME_LEN];
        for (idx, b) in base.bytes().enumerate() {
            short[idx] = b.to_ascii_uppercase();
        }
        for (idx, b) in ext.bytes().enumerate() {
            short[BASE_LEN + idx] = b.to_ascii_uppercase();
        }
        Ok(Self(short))
    }

    /// True when `candidate` encodes to exactly this record.
    pub fn matches(&self, candidate: &str) -> bool {
        match Self::encode(candidate) {
            Ok(encoded) => encoded == *self,
            Err(_) => false,
        }
    }

    pub fn is_dot(&self) -> bool {
        *self == Self::DOT || *self == Self::DOTDOT
    }

    pub fn as_bytes(&self) -> &[u8; SHORT_NAME_LEN] {
        &self.0
    }

    /// Renders the record back as `NAME.EXT`.
    pub fn display(&self) -> ShortString<12> {
        let mut out = ShortString::new();
        let base = &self.0[..BASE_LEN];
        let ext = &self.0[BASE_LEN..];
        for &b in base.iter().take_while(|b| **b != b' ') {
            let _ = out.push(printable(b));
        }
        if ext.iter().any(|b| *b != b' ') && !self.is_dot() {
            let _ = out.push('.');
            for &b in ext.iter().take_while(|b| **b != b' ') {
                let _ = out.push(printable(b));
            }
        }
        out
    }
}

impl fmt::Debug for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortName({:?})", self.display().as_str())
    }
}

impl fmt::Display for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display().as_str())
    }
}

// `.` is not accepted, so a name with a second dot such as `a.b.c` is
// rejected instead of carrying `B.C` as its extension.
fn is_short_name_char(ch: char) -> bool {
    if ch.is_ascii_alphanumeric() {
        return true;
    }
    matches!(
        ch,
        '!' | '#' | '$' | '%' | '&' | '\'' | '(' | ')' | '-' | '@' | '^' | '_' | '`' | '{' | '}' | '~'
    )
}

fn printable(b: u8) -> char {
    if b.is_ascii_graphic() {
        b as char
    } else {
        '?'
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_base_and_extension() {
        assert_eq!(ShortName::encode("readme.txt").unwrap().as_bytes(), b"README  TXT");
        assert_eq!(ShortName::encode("KERNEL").unwrap().as_bytes(), b"KERNEL     ");
        assert_eq!(ShortName::encode("abcdefgh.a").unwrap().as_bytes(), b"ABCDEFGHA  ");
    }

    #[test]
    fn dot_names_bypass_the_split() {
        assert_eq!(ShortName::encode(".").unwrap(), ShortName::DOT);
        assert_eq!(ShortName::encode("..").unwrap(), ShortName::DOTDOT);
        assert!(ShortName::DOTDOT.is_dot());
    }

    #[test]
    fn rejects_names_over_budget() {
        assert_eq!(ShortName::encode("toolongname.txt"), Err(FsError::InvalidName));
        assert_eq!(ShortName::encode("file.text"), Err(FsError::InvalidName));
        assert_eq!(ShortName::encode(""), Err(FsError::InvalidName));
        assert_eq!(ShortName::encode(".hidden"), Err(FsError::InvalidName));
        assert_eq!(ShortName::encode("a.b.c"), Err(FsError::InvalidName));
        assert_eq!(ShortName::encode("my file"), Err(FsError::InvalidName));
        assert_eq!(ShortName::encode("a/b"), Err(FsError::InvalidName));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let name = ShortName::encode("B.TXT").unwrap();
        assert!(name.matches("b.txt"));
        assert!(name.matches("B.txt"));
        assert!(!name.matches("b.tx"));
        assert!(!name.matches("bb.txt"));
        assert!(!ShortName::DOT.matches(".."));
        assert!(ShortName::DOTDOT.matches(".."));
    }

    #[test]
    fn display_restores_dotted_form() {
        assert_eq!(ShortName::encode("notes.md").unwrap().display().as_str(), "NOTES.MD");
        assert_eq!(ShortName::encode("bin").unwrap().display().as_str(), "BIN");
        assert_eq!(ShortName::DOTDOT.display().as_str(), "..");
    }
}
