//! Env file decoding.
//!
//! Files use the usual dotenv syntax (`KEY=value`, `#` comments, quoted
//! values, `export` prefixes). Decoding never touches the process
//! environment; the pairs go into the command's env overlay instead.

use std::collections::BTreeMap;

use crate::error::Result;

/// Decoded env file content.
pub type EnvMap = BTreeMap<String, String>;

/// Decodes env file content into key/value pairs. A later duplicate key
/// replaces an earlier one.
///
/// ```
/// use flagtree_sources::parse_env;
///
/// let vars = parse_env("# db\nDB_USER=admin\nDB_PASS=\"s3cret\"\n").unwrap();
/// assert_eq!(vars["DB_USER"], "admin");
/// assert_eq!(vars["DB_PASS"], "s3cret");
/// ```
pub fn parse_env(content: &str) -> Result<EnvMap> {
    let mut vars = EnvMap::new();
    for item in dotenvy::from_read_iter(content.as_bytes()) {
        let (key, value) = item?;
        vars.insert(key, value);
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comments_and_quotes() {
        let vars = parse_env(
            "\
# comment
export BRANCH=stable
NAME='single quoted'
EMPTY=
",
        )
        .unwrap();
        assert_eq!(vars.len(), 3);
        assert_eq!(vars["BRANCH"], "stable");
        assert_eq!(vars["NAME"], "single quoted");
        assert_eq!(vars["EMPTY"], "");
    }

    #[test]
    fn test_later_key_wins() {
        let vars = parse_env("A=1\nA=2\n").unwrap();
        assert_eq!(vars["A"], "2");
    }

    #[test]
    fn test_malformed_line() {
        assert!(parse_env("NOT A PAIR\n").is_err());
    }
}
