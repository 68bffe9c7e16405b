//! Naming helpers shared by discovery and the generator.
//!
//! Handler owners arrive as `TaskController`, `UserProfileHandler` or `tasks` (a module), models
//! as `Task`. These helpers turn them into the words used for tags, summaries and table names.

const HANDLER_SUFFIXES: &[&str] = &["Controller", "Handlers", "Handler"];

/// Returns the last `::` segment of a path.
pub fn short_name(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Strips a `Controller`-like suffix, keeping the name when nothing would remain.
pub fn strip_handler_suffix(name: &str) -> &str {
    for suffix in HANDLER_SUFFIXES {
        if let Some(stripped) = name.strip_suffix(suffix) {
            if !stripped.is_empty() {
                return stripped.trim_end_matches('_');
            }
        }
    }
    name
}

/// Splits `UserProfile`, `user_profile` or `user-profile` into lowercase words.
pub fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in name.chars() {
        if c == '_' || c == '-' || c == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
}

/// `UserProfile` -> `user profile`
pub fn lower_words(name: &str) -> String {
    split_words(name).join(" ")
}

/// `user_profile` -> `User Profile`
pub fn headline(name: &str) -> String {
    split_words(name)
        .iter()
        .map(|w| capitalize(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `UserProfile` -> `user_profile`
pub fn snake_case(name: &str) -> String {
    split_words(name).join("_")
}

pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// English pluralization good enough for resource names.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    let lower = word.to_lowercase();
    if lower.ends_with('s') && !lower.ends_with("ss") {
        return word.to_string();
    }
    if lower.ends_with('y') {
        let before = lower.chars().rev().nth(1);
        if !matches!(before, Some('a' | 'e' | 'i' | 'o' | 'u')) {
            return format!("{}ies", &word[..word.len() - 1]);
        }
    }
    if ["ss", "x", "z", "ch", "sh"].iter().any(|s| lower.ends_with(s)) {
        return format!("{}es", word);
    }
    format!("{}s", word)
}

pub fn singularize(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.ends_with("ies") && word.len() > 3 {
        return format!("{}y", &word[..word.len() - 3]);
    }
    if ["sses", "xes", "zes", "ches", "shes"].iter().any(|s| lower.ends_with(s)) {
        return word[..word.len() - 2].to_string();
    }
    if lower.ends_with('s') && !lower.ends_with("ss") && word.len() > 1 {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

/// Singular resource words for a handler owner: `UserProfilesController` -> `user profile`.
pub fn resource_words(owner: &str) -> String {
    let mut words = split_words(strip_handler_suffix(short_name(owner)));
    if let Some(last) = words.pop() {
        words.push(singularize(&last));
    }
    words.join(" ")
}

/// Default tag for a handler owner: `UserProfileController` -> `User Profiles`.
pub fn resource_tag(owner: &str) -> String {
    let mut words: Vec<String> = split_words(strip_handler_suffix(short_name(owner)))
        .iter()
        .map(|w| capitalize(w))
        .collect();
    if let Some(last) = words.pop() {
        words.push(pluralize(&last));
    }
    words.join(" ")
}

/// Compares identifiers ignoring case and separators, so `user_profile` matches `UserProfile`.
pub fn same_identifier(a: &str, b: &str) -> bool {
    let norm = |s: &str| -> String {
        s.chars()
            .filter(|c| *c != '_' && *c != '-' && *c != ' ')
            .flat_map(char::to_lowercase)
            .collect()
    };
    norm(a) == norm(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("UserProfile"), vec!["user", "profile"]);
        assert_eq!(split_words("user_profile"), vec!["user", "profile"]);
        assert_eq!(split_words("markComplete"), vec!["mark", "complete"]);
        assert_eq!(split_words("Task"), vec!["task"]);
    }

    #[test]
    fn test_headline_and_snake_case() {
        assert_eq!(headline("mark_complete"), "Mark Complete");
        assert_eq!(snake_case("UserProfile"), "user_profile");
        assert_eq!(lower_words("UserProfile"), "user profile");
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("Task"), "Tasks");
        assert_eq!(pluralize("Category"), "Categories");
        assert_eq!(pluralize("Day"), "Days");
        assert_eq!(pluralize("Box"), "Boxes");
        assert_eq!(pluralize("Address"), "Addresses");
        assert_eq!(pluralize("Tasks"), "Tasks");
    }

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("tasks"), "task");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("address"), "address");
        assert_eq!(singularize("task"), "task");
    }

    #[test]
    fn test_resource_names() {
        assert_eq!(resource_tag("TaskController"), "Tasks");
        assert_eq!(resource_tag("app::http::UserProfileController"), "User Profiles");
        assert_eq!(resource_tag("crate::handlers::tasks"), "Tasks");
        assert_eq!(resource_words("UserProfilesController"), "user profile");
        assert_eq!(resource_words("tasks"), "task");
        assert_eq!(strip_handler_suffix("Controller"), "Controller");
    }

    #[test]
    fn test_same_identifier() {
        assert!(same_identifier("user_profile", "UserProfile"));
        assert!(!same_identifier("task", "tasks"));
    }
}
