/// Split an identifier or file name into lowercase word parts.
///
/// Handles `camelCase`, `PascalCase`, acronyms (`HTTPServer` -> `http`, `server`),
/// `snake_case`, `kebab-case` and dotted names. Empty parts are dropped.
pub fn split_identifier(ident: &str) -> Vec<String> {
    let mut parts = Vec::new();
    for piece in ident.split(|c: char| !c.is_alphanumeric()) {
        if piece.is_empty() {
            continue;
        }
        split_camel_case(piece, &mut parts);
    }
    parts
}

fn split_camel_case(word: &str, out: &mut Vec<String>) {
    let chars: Vec<char> = word.chars().collect();
    let mut current = String::new();

    for (i, &ch) in chars.iter().enumerate() {
        if i > 0 && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|c| c.is_lowercase());
            let boundary = (ch.is_uppercase() && prev.is_lowercase())
                || (ch.is_uppercase() && prev.is_uppercase() && next_is_lower)
                || (ch.is_ascii_digit() != prev.is_ascii_digit() && ch.is_alphabetic() && prev.is_ascii_digit());
            if boundary {
                out.push(current.to_lowercase());
                current.clear();
            }
        }
        current.push(ch);
    }

    if !current.is_empty() {
        out.push(current.to_lowercase());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn split(s: &str) -> Vec<String> {
        split_identifier(s)
    }

    #[test]
    fn camel_and_pascal() {
        assert_eq!(split("validateSession"), vec!["validate", "session"]);
        assert_eq!(split("AuthMiddleware"), vec!["auth", "middleware"]);
    }

    #[test]
    fn acronyms() {
        assert_eq!(split("HTTPServer"), vec!["http", "server"]);
        assert_eq!(split("parseJSON"), vec!["parse", "json"]);
    }

    #[test]
    fn separators() {
        assert_eq!(split("user_service-impl.test.ts"), vec!["user", "service", "impl", "test", "ts"]);
        assert_eq!(split("v2Api"), vec!["v2", "api"]);
        assert!(split("__").is_empty());
    }
}
