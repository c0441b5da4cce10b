//! URI manipulation utilities
//!
//! Resource templates are RFC 6570 templates. Expansion goes through
//! `uri-template-system`; matching a concrete URI back to a template only
//! supports the simple `{name}` and reserved `{+name}` forms.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use regex::Regex;
use url::Url;
use uri_template_system::{Template, Value, Values};

use crate::error::Error;

/// Check if a string is a valid URI
pub fn is_valid_uri(uri: &str) -> bool {
    Url::parse(uri).is_ok()
}

/// Expand a URI template with parameters
pub fn expand_template(template: &str, params: &HashMap<String, String>) -> Result<String, Error> {
    let uri_template = Template::parse(template)
        .map_err(|e| Error::ParseError(format!("Invalid URI template: {}", e)))?;

    let mut values = Values::default();
    for (key, value) in params {
        values = values.add(key.clone(), Value::item(value.clone()));
    }

    uri_template
        .expand(&values)
        .map_err(|e| Error::ParseError(format!("Failed to expand URI template: {}", e)))
}

/// Names of the variables a template declares, in order
pub fn template_variables(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else { break };
        let name = rest[start + 1..start + len].trim_start_matches('+');
        names.push(name.to_string());
        rest = &rest[start + len + 1..];
    }
    names
}

/// Compile a template into a regex with one named group per variable
pub fn template_pattern(template: &str) -> Result<Regex, Error> {
    let mut pattern = String::from("^");
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let len = rest[start..]
            .find('}')
            .ok_or_else(|| Error::ParseError(format!("Unclosed variable in URI template: {}", template)))?;
        pattern.push_str(&regex::escape(&rest[..start]));

        let expression = &rest[start + 1..start + len];
        match expression.strip_prefix('+') {
            Some(name) => pattern.push_str(&format!("(?P<{}>.+)", name)),
            None => pattern.push_str(&format!("(?P<{}>[^/]+)", expression)),
        }
        rest = &rest[start + len + 1..];
    }
    pattern.push_str(&regex::escape(rest));
    pattern.push('$');

    Regex::new(&pattern).map_err(|e| Error::ParseError(format!("Unsupported URI template {}: {}", template, e)))
}

/// Match `uri` against a compiled template, returning the captured variables
pub fn match_template(pattern: &Regex, uri: &str) -> Option<HashMap<String, String>> {
    let captures = pattern.captures(uri)?;
    Some(
        pattern
            .capture_names()
            .flatten()
            .filter_map(|name| captures.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
            .collect(),
    )
}

/// Join path segments into a URI
pub fn join_uri_paths(base: &str, path: &str) -> Result<String, Error> {
    let mut url = Url::parse(base)
        .map_err(|e| Error::ParseError(format!("Invalid base URI: {}", e)))?;

    // Normalize path to remove leading/trailing slashes
    let path = path.trim_start_matches('/').trim_end_matches('/');

    let mut url_path = url.path().trim_end_matches('/').to_string();
    url_path.push('/');
    url_path.push_str(path);

    url.set_path(&url_path);

    Ok(url.to_string())
}

/// Resolve `relative` inside the local directory `root`, refusing to escape it
pub fn path_under_root(root: &Path, relative: &str) -> Result<PathBuf, Error> {
    let relative = Path::new(relative.trim_start_matches('/'));
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => {
                return Err(Error::InvalidParams(format!(
                    "Path escapes its root: {}",
                    relative.display()
                )))
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_uri() {
        assert!(is_valid_uri("http://example.com"));
        assert!(is_valid_uri("file:///path/to/file"));
        assert!(!is_valid_uri("invalid uri"));
    }

    #[test]
    fn test_expand_template() {
        let mut params = HashMap::new();
        params.insert("user_id".to_string(), "123".to_string());

        let result = expand_template("users://{user_id}/profile", &params).unwrap();
        assert_eq!(result, "users://123/profile");
    }

    #[test]
    fn test_match_template() {
        let pattern = template_pattern("users://{user_id}/profile").unwrap();
        let params = match_template(&pattern, "users://42/profile").unwrap();
        assert_eq!(params.get("user_id").map(String::as_str), Some("42"));
        assert!(match_template(&pattern, "users://42/settings").is_none());
        assert!(match_template(&pattern, "users://a/b/profile").is_none());

        let reserved = template_pattern("files://{+path}").unwrap();
        let params = match_template(&reserved, "files://docs/readme.md").unwrap();
        assert_eq!(params["path"], "docs/readme.md");

        assert_eq!(template_variables("weather://{city}/{+day}"), vec!["city", "day"]);
    }

    #[test]
    fn test_join_uri_paths() {
        let joined = join_uri_paths("file:///home/user/", "notes/todo.txt").unwrap();
        assert_eq!(joined, "file:///home/user/notes/todo.txt");
    }

    #[test]
    fn test_path_under_root() {
        let root = Path::new("/srv/data");
        assert_eq!(path_under_root(root, "a/b.txt").unwrap(), PathBuf::from("/srv/data/a/b.txt"));
        assert_eq!(path_under_root(root, "/a.txt").unwrap(), PathBuf::from("/srv/data/a.txt"));
        assert!(path_under_root(root, "../etc/passwd").is_err());
    }
}
