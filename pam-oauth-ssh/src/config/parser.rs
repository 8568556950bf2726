//! Line lexer shared by the configuration file and account map files.
//!
//! `#` starts a comment anywhere on a line. Blank lines are skipped. Tokens
//! are separated by whitespace or commas and the first token is the key.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// 1-based line number in the source text.
    pub line: usize,
    pub key: String,
    pub values: Vec<String>,
}

pub fn parse_pairs(text: &str) -> impl Iterator<Item = Directive> + '_ {
    text.lines().enumerate().filter_map(|(index, line)| {
        let content = line.split('#').next().unwrap_or_default();
        let mut tokens = content
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty());

        let key = tokens.next()?;
        Some(Directive {
            line: index + 1,
            key: key.to_string(),
            values: tokens.map(str::to_string).collect(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comments_and_blank_lines() {
        let text = "# header\n\n   \nclient_id abc # trailing\n#client_secret x\n";
        let pairs: Vec<_> = parse_pairs(text).collect();
        assert_eq!(
            pairs,
            vec![Directive {
                line: 4,
                key: "client_id".into(),
                values: vec!["abc".into()],
            }]
        );
    }

    #[test]
    fn test_space_and_comma_delimiters() {
        let pairs: Vec<_> = parse_pairs("permitted_idps a.org, b.org,c.org\td.org").collect();
        assert_eq!(pairs[0].values, vec!["a.org", "b.org", "c.org", "d.org"]);
    }

    #[test]
    fn test_key_without_values() {
        let pairs: Vec<_> = parse_pairs("mfa\n").collect();
        assert_eq!(pairs[0].key, "mfa");
        assert!(pairs[0].values.is_empty());
    }

    #[test]
    fn test_comment_only_after_whitespace_is_blank() {
        assert_eq!(parse_pairs("   # nothing here").count(), 0);
        assert_eq!(parse_pairs(",,,").count(), 0);
    }
}
