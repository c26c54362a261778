//! Static checks on untrusted object content.
//!
//! Everything here is a pure function of its input: raw bytes are checked
//! before parsing (size, key path, encoding, dangerous content) and the parsed
//! document is bounded afterwards (depth, collection length, string length).
//! A failing object is skipped by the pipeline; the run continues.

pub mod error;
pub mod rules;

use serde_yaml::Value;

pub use error::{IdentifierField, Result, StructureLimit, ValidationError};
pub use rules::{default_patterns, DangerousPattern, DEFAULT_RULES};

/// Default maximum object size: 50 MiB.
pub const DEFAULT_MAX_OBJECT_SIZE: usize = 50 * 1024 * 1024;
/// Default maximum nesting depth of a parsed document.
pub const DEFAULT_MAX_DEPTH: usize = 20;
/// Default maximum number of entries in a mapping or sequence.
pub const DEFAULT_MAX_COLLECTION_LENGTH: usize = 1000;
/// Default maximum length of a scalar string or mapping key.
pub const DEFAULT_MAX_STRING_LENGTH: usize = 10_000;
/// Default maximum number of resources kept per namespace.
pub const DEFAULT_MAX_RESOURCES_PER_NAMESPACE: usize = 1000;
/// Kubernetes label length limit.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Limits enforced by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLimits {
    pub max_object_size: usize,
    pub max_depth: usize,
    pub max_collection_length: usize,
    pub max_string_length: usize,
    pub max_resources_per_namespace: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_object_size: DEFAULT_MAX_OBJECT_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
            max_collection_length: DEFAULT_MAX_COLLECTION_LENGTH,
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
            max_resources_per_namespace: DEFAULT_MAX_RESOURCES_PER_NAMESPACE,
        }
    }
}

/// Stateless validator configured with limits and dangerous-content rules.
#[derive(Debug, Clone)]
pub struct Validator {
    limits: ValidationLimits,
    patterns: Vec<DangerousPattern>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidationLimits::default(), default_patterns())
    }
}

impl Validator {
    pub fn new(limits: ValidationLimits, patterns: Vec<DangerousPattern>) -> Self {
        Self { limits, patterns }
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Runs every pre-parse check and returns the decoded text.
    pub fn validate<'a>(&self, raw: &'a [u8], source_path: &str) -> Result<&'a str> {
        self.check_size(raw.len())?;
        check_object_path(source_path)?;
        let text = decode_utf8(raw)?;
        self.scan_content(text)?;
        self.check_nesting(text)?;
        Ok(text)
    }

    pub fn check_size(&self, size: usize) -> Result<()> {
        if size > self.limits.max_object_size {
            return Err(ValidationError::SizeExceeded {
                size,
                limit: self.limits.max_object_size,
            });
        }
        Ok(())
    }

    /// Returns the first dangerous-content rule matching `text`.
    pub fn scan_content(&self, text: &str) -> Result<()> {
        match self.patterns.iter().find(|p| p.is_match(text)) {
            Some(pattern) => Err(ValidationError::DangerousContent {
                rule: pattern.name().to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Rejects flow collections (`[…]`, `{…}`) nested deeper than the depth
    /// limit before the text reaches the YAML parser.
    pub fn check_nesting(&self, text: &str) -> Result<()> {
        match flow_depth(text, self.limits.max_depth) {
            Some(line) => Err(ValidationError::StructureLimitExceeded {
                path: format!("line {}", line),
                limit: StructureLimit::Depth(self.limits.max_depth),
            }),
            None => Ok(()),
        }
    }

    /// Bounds a parsed document's depth, collection sizes and string lengths.
    pub fn check_structure(&self, document: &Value) -> Result<()> {
        let mut path = Vec::new();
        self.check_value(document, self.limits.max_depth, &mut path)
    }

    /// `remaining_depth` is the number of collections that may still be
    /// entered; each mapping or sequence consumes one.
    fn check_value(
        &self,
        value: &Value,
        remaining_depth: usize,
        path: &mut Vec<PathSegment>,
    ) -> Result<()> {
        match value {
            Value::String(s) => self.check_string(s, path),
            Value::Tagged(tagged) => self.check_value(&tagged.value, remaining_depth, path),
            Value::Sequence(items) => {
                let remaining_depth = self.enter_collection(items.len(), remaining_depth, path)?;
                for (index, item) in items.iter().enumerate() {
                    path.push(PathSegment::Index(index));
                    self.check_value(item, remaining_depth, path)?;
                    path.pop();
                }
                Ok(())
            }
            Value::Mapping(map) => {
                let remaining_depth = self.enter_collection(map.len(), remaining_depth, path)?;
                for (key, item) in map {
                    let segment = PathSegment::Key(key_label(key));
                    path.push(segment);
                    if let Value::String(k) = key {
                        self.check_string(k, path)?;
                    }
                    self.check_value(item, remaining_depth, path)?;
                    path.pop();
                }
                Ok(())
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => Ok(()),
        }
    }

    fn enter_collection(
        &self,
        len: usize,
        remaining_depth: usize,
        path: &[PathSegment],
    ) -> Result<usize> {
        if remaining_depth == 0 {
            return Err(ValidationError::StructureLimitExceeded {
                path: render_path(path),
                limit: StructureLimit::Depth(self.limits.max_depth),
            });
        }
        if len > self.limits.max_collection_length {
            return Err(ValidationError::StructureLimitExceeded {
                path: render_path(path),
                limit: StructureLimit::CollectionLength(self.limits.max_collection_length),
            });
        }
        Ok(remaining_depth - 1)
    }

    fn check_string(&self, s: &str, path: &[PathSegment]) -> Result<()> {
        if s.chars().count() > self.limits.max_string_length {
            return Err(ValidationError::StructureLimitExceeded {
                path: render_path(path),
                limit: StructureLimit::StringLength(self.limits.max_string_length),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum PathSegment {
    Key(String),
    Index(usize),
}

fn key_label(key: &Value) -> String {
    match key {
        Value::String(s) => s.chars().take(64).collect(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "~".to_string(),
        _ => "<complex key>".to_string(),
    }
}

/// Renders `spec.containers[0].args` style paths; the root is `$`.
fn render_path(path: &[PathSegment]) -> String {
    if path.is_empty() {
        return "$".to_string();
    }
    let mut out = String::new();
    for segment in path {
        match segment {
            PathSegment::Key(k) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(k);
            }
            PathSegment::Index(i) => out.push_str(&format!("[{}]", i)),
        }
    }
    out
}

fn decode_utf8(raw: &[u8]) -> Result<&str> {
    std::str::from_utf8(raw).map_err(|e| ValidationError::EncodingError {
        message: e.to_string(),
    })
}

/// Returns the 1-based line where flow nesting first exceeds `limit`.
///
/// Quoted scalars, comments and block scalar bodies are skipped, and a
/// bracket only opens a collection where a YAML value may start, so the
/// count never exceeds the depth of the parsed document.
fn flow_depth(text: &str, limit: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut block_parent: Option<usize> = None;
    let mut prev_sig: Option<char> = None;

    for (index, line) in text.lines().enumerate() {
        let indent = line.len() - line.trim_start_matches(' ').len();
        if let Some(parent) = block_parent {
            if line.trim().is_empty() || indent > parent {
                continue;
            }
            block_parent = None;
        }
        if depth == 0 && quote.is_none() {
            prev_sig = None;
        }

        let mut prev_raw: Option<char> = None;
        let mut content_end = line.len();
        let mut chars = line.char_indices().peekable();
        while let Some((pos, c)) = chars.next() {
            match quote {
                Some('\'') => {
                    if c == '\'' {
                        if matches!(chars.peek(), Some((_, '\''))) {
                            chars.next();
                        } else {
                            quote = None;
                            prev_sig = Some(c);
                        }
                    }
                    prev_raw = Some(c);
                    continue;
                }
                Some(_) => {
                    if c == '\\' {
                        chars.next();
                    } else if c == '"' {
                        quote = None;
                        prev_sig = Some(c);
                    }
                    prev_raw = Some(c);
                    continue;
                }
                None => {}
            }

            let value_start = match prev_sig {
                None | Some('[' | '{' | ',') => true,
                Some(':' | '-' | '?') => prev_raw.is_some_and(char::is_whitespace),
                _ => false,
            };
            match c {
                ' ' | '\t' => {
                    prev_raw = Some(c);
                    continue;
                }
                '#' if prev_raw.map_or(true, char::is_whitespace) => {
                    content_end = pos;
                    break;
                }
                '\'' | '"' if value_start => quote = Some(c),
                '[' | '{' if value_start => {
                    depth += 1;
                    if depth > limit {
                        return Some(index + 1);
                    }
                }
                ']' | '}' if depth > 0 => depth -= 1,
                _ => {}
            }
            prev_sig = Some(c);
            prev_raw = Some(c);
        }

        if depth == 0 && quote.is_none() {
            let content = line[..content_end].trim_end();
            let last = content.rsplit(char::is_whitespace).next().unwrap_or("");
            if is_block_indicator(last) {
                block_parent = Some(indent);
            }
        }
    }
    None
}

fn is_block_indicator(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some('|' | '>'))
        && chars.all(|c| c == '-' || c == '+' || c.is_ascii_digit())
}

/// Rejects object keys that could escape the namespace root once mapped to
/// the output tree.
pub fn check_object_path(path: &str) -> Result<()> {
    let traversal = || ValidationError::PathTraversal {
        path: path.to_string(),
    };

    if path.is_empty() || path.starts_with('/') || path.contains('\0') || path.contains('\\') {
        return Err(traversal());
    }
    if path.len() >= 2 && path.as_bytes()[1] == b':' {
        return Err(traversal());
    }
    if path.split('/').any(|segment| segment == ".." || segment == ".") {
        return Err(traversal());
    }
    Ok(())
}

/// Validates an RFC 1123 label: lowercase alphanumerics and `-`, at most 63
/// characters, starting and ending with an alphanumeric.
pub fn validate_identifier(field: IdentifierField, value: &str) -> Result<()> {
    let invalid = |reason: &str| ValidationError::InvalidIdentifier {
        field,
        value: value.to_string(),
        reason: reason.to_string(),
    };

    if value.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(invalid(&format!(
            "must be at most {} characters, got {}",
            MAX_IDENTIFIER_LENGTH,
            value.len()
        )));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid(
            "must contain only lowercase alphanumerics and '-'",
        ));
    }
    if value.starts_with('-') || value.ends_with('-') {
        return Err(invalid("must start and end with an alphanumeric character"));
    }
    Ok(())
}
