//! Request path parsing using nom
//!
//! Path format:
//! ```text
//! <base_path><group>/<key>
//! ```
//! Both segments are percent-decoded after the split, so an escaped `/`
//! may appear inside a key.

use nom::{
    bytes::complete::{tag, take_till1},
    character::complete::char,
    combinator::{rest, verify},
    sequence::separated_pair,
    IResult,
};

/// Why a path could not be split into group and key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
    /// Path does not start with the base path
    OutsideBase,
    /// Not exactly two non-empty segments after the base path
    Malformed,
}

fn group_and_key(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(
        take_till1(|c| c == '/'),
        char('/'),
        verify(rest, |key: &str| !key.is_empty()),
    )(input)
}

/// Split `path` into a decoded `(group, key)` pair
pub fn split_path(base_path: &str, path: &str) -> Result<(String, String), PathError> {
    let (tail, _) = tag::<_, _, nom::error::Error<&str>>(base_path)(path)
        .map_err(|_| PathError::OutsideBase)?;

    let (_, (group, key)) = group_and_key(tail).map_err(|_| PathError::Malformed)?;

    let group = urlencoding::decode(group).map_err(|_| PathError::Malformed)?;
    let key = urlencoding::decode(key).map_err(|_| PathError::Malformed)?;

    Ok((group.into_owned(), key.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "/_pigcache/";

    #[test]
    fn test_split_group_and_key() {
        assert_eq!(
            split_path(BASE, "/_pigcache/scores/Tom"),
            Ok(("scores".to_string(), "Tom".to_string()))
        );
    }

    #[test]
    fn test_key_keeps_slashes() {
        assert_eq!(
            split_path(BASE, "/_pigcache/scores/a/b"),
            Ok(("scores".to_string(), "a/b".to_string()))
        );
        assert_eq!(
            split_path(BASE, "/_pigcache/scores/a%2Fb%20c"),
            Ok(("scores".to_string(), "a/b c".to_string()))
        );
    }

    #[test]
    fn test_malformed_paths() {
        for path in [
            "/_pigcache/",
            "/_pigcache/scores",
            "/_pigcache/scores/",
            "/_pigcache//Tom",
            "/_pigcache/scores/%FF",
        ] {
            assert_eq!(split_path(BASE, path), Err(PathError::Malformed), "{}", path);
        }
    }

    #[test]
    fn test_outside_base() {
        assert_eq!(split_path(BASE, "/other/scores/Tom"), Err(PathError::OutsideBase));
        assert_eq!(split_path(BASE, "/_pigcache"), Err(PathError::OutsideBase));
    }
}
