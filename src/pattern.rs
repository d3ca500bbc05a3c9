use regex::Regex;
use tracing::debug;

/// A compiled fingerprint pattern.
///
/// The catalog expresses patterns as strings in a small tag language:
/// fields separated by the literal sequence `\;`, the first field being
/// the match body and the rest `name:value` tags (`version`,
/// `confidence`; anything else is ignored). An empty body means the
/// pattern matches whenever the evidence key it is attached to is
/// present at all.
#[derive(Debug, Clone)]
pub struct Pattern {
    /// The raw body, before regex translation. For `implies`/`excludes`
    /// entries this is the name of the referenced technology.
    pub source: String,
    /// `None` when the body is empty or did not compile; such patterns
    /// are inert for value matching.
    pub regex: Option<Regex>,
    /// Version template, substituted with capture groups on a match.
    pub version: String,
    /// 0-100, defaults to 100.
    pub confidence: i32,
}

impl Pattern {
    pub fn parse(input: &str) -> Self {
        let mut parts = input.split("\\;");

        // split always yields at least one element
        let source = parts.next().unwrap().to_string();
        let mut confidence = 100;
        let mut version = String::new();

        for part in parts {
            let Some((key, value)) = part.split_once(':') else {
                continue;
            };
            match key {
                "confidence" => confidence = value.parse().unwrap_or(100),
                "version" => version = value.to_string(),
                _ => {}
            }
        }

        Self {
            regex: compile_body(&source),
            source,
            version,
            confidence,
        }
    }

    /// Whether the pattern's regex matches `value`. Inert and
    /// empty-body patterns never value-match; presence semantics are
    /// the caller's job.
    pub fn matches(&self, value: &str) -> bool {
        self.regex.as_ref().is_some_and(|re| re.is_match(value))
    }

    /// Substitute capture groups from `value` into the version
    /// template. The regex is run globally; when distinct capture sets
    /// yield distinct versions, the lexicographically greatest wins.
    ///
    /// A ternary token `\N?X:Y` resolves to X when group N matched
    /// non-empty and to Y otherwise, with Y extending to the end of the
    /// template.
    pub fn resolve_version(&self, value: &str) -> String {
        let Some(re) = &self.regex else {
            return String::new();
        };
        if self.version.is_empty() {
            return String::new();
        }

        let mut best = String::new();
        for caps in re.captures_iter(value) {
            let mut resolved = self.version.clone();
            for i in 0..caps.len() {
                let group = caps.get(i).map(|m| m.as_str()).unwrap_or("");
                resolved = substitute_ternary(&resolved, i, group);
                resolved = resolved.replace(&format!("\\{i}"), group);
            }
            if !resolved.is_empty() && resolved > best {
                best = resolved;
            }
        }
        best
    }
}

/// Translate a pattern body into an anchored-nowhere, case-insensitive
/// regex. Catalog bodies escape `/` as `\/` (a PCRE habit); undo that,
/// collapse doubled backslashes, then re-escape bare slashes so the
/// compiled source stays faithful to the original intent.
fn compile_body(body: &str) -> Option<Regex> {
    if body.is_empty() {
        return None;
    }
    let source = body
        .replace("\\/", "/")
        .replace("\\\\", "\\")
        .replace('/', "\\/");
    match Regex::new(&format!("(?i){source}")) {
        Ok(re) => Some(re),
        Err(err) => {
            debug!(pattern = body, %err, "pattern failed to compile, ignoring");
            None
        }
    }
}

fn substitute_ternary(template: &str, group_index: usize, group: &str) -> String {
    let token = format!("\\{group_index}?");
    let Some(start) = template.find(&token) else {
        return template.to_string();
    };
    let rest = &template[start + token.len()..];
    let Some(colon) = rest.find(':') else {
        return template.to_string();
    };
    let branch = if group.is_empty() {
        &rest[colon + 1..]
    } else {
        &rest[..colon]
    };
    format!("{}{branch}", &template[..start])
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_body_and_tags() {
        let p = Pattern::parse("abc\\;version:\\1\\;confidence:50");
        assert_eq!(p.source, "abc");
        assert_eq!(p.version, "\\1");
        assert_eq!(p.confidence, 50);
        assert!(p.regex.is_some());
    }

    #[test]
    fn defaults_without_tags() {
        let p = Pattern::parse("jquery");
        assert_eq!(p.confidence, 100);
        assert_eq!(p.version, "");
    }

    #[test]
    fn malformed_confidence_falls_back_to_default() {
        let p = Pattern::parse("abc\\;confidence:lots");
        assert_eq!(p.confidence, 100);
    }

    #[test]
    fn unknown_tags_are_ignored() {
        let p = Pattern::parse("abc\\;flavour:mint\\;confidence:30");
        assert_eq!(p.confidence, 30);
    }

    #[test]
    fn malformed_regex_is_inert() {
        let p = Pattern::parse("ab(c\\;confidence:50");
        assert!(p.regex.is_none());
        assert_eq!(p.confidence, 50);
        assert!(!p.matches("abc"));
    }

    #[test]
    fn empty_body_has_no_regex() {
        let p = Pattern::parse("");
        assert!(p.source.is_empty());
        assert!(p.regex.is_none());
    }

    #[test]
    fn matching_is_case_insensitive() {
        let p = Pattern::parse("NGINX");
        assert!(p.matches("nginx/1.18.0"));
    }

    #[test]
    fn slashes_survive_translation() {
        let p = Pattern::parse("wp-content\\/themes\\/");
        assert!(p.matches("https://blog.example/wp-content/themes/twentytwenty/style.css"));
        let p = Pattern::parse("wp-content/themes/");
        assert!(p.matches("https://blog.example/wp-content/themes/twentytwenty/style.css"));
    }

    #[test]
    fn version_capture() {
        let p = Pattern::parse("nginx(?:/([\\d.]+))?\\;version:\\1");
        assert_eq!(p.resolve_version("nginx/1.18.0"), "1.18.0");
    }

    #[test]
    fn version_group_without_match_yields_empty() {
        let p = Pattern::parse("nginx(?:/([\\d.]+))?\\;version:\\1");
        assert_eq!(p.resolve_version("nginx"), "");
    }

    #[test]
    fn version_ternary_picks_then_branch() {
        let p = Pattern::parse("jquery(?:-([\\d.]+))?\\.js\\;version:\\1?\\1:unknown");
        assert_eq!(p.resolve_version("jquery-3.6.0.js"), "3.6.0");
    }

    #[test]
    fn version_ternary_picks_else_branch_when_group_empty() {
        let p = Pattern::parse("jquery(?:-([\\d.]+))?\\.js\\;version:\\1?\\1:unknown");
        assert_eq!(p.resolve_version("jquery.js"), "unknown");
    }

    #[test]
    fn version_ternary_with_empty_else() {
        let p = Pattern::parse("moodle(?:/([\\d.]+))?\\;version:\\1?\\1:");
        assert_eq!(p.resolve_version("moodle"), "");
        assert_eq!(p.resolve_version("moodle/4.1"), "4.1");
    }

    #[test]
    fn version_template_mixes_literals_and_groups() {
        let p = Pattern::parse("ie (\\d+)\\;version:IE \\1");
        assert_eq!(p.resolve_version("IE 11"), "IE 11");
    }

    #[test]
    fn greatest_version_wins_across_matches() {
        let p = Pattern::parse("v([\\d.]+)\\;version:\\1");
        assert_eq!(p.resolve_version("v1.2 v1.9 v1.4"), "1.9");
    }

    #[test]
    fn no_version_template_resolves_empty() {
        let p = Pattern::parse("nginx/([\\d.]+)");
        assert_eq!(p.resolve_version("nginx/1.18.0"), "");
    }
}
