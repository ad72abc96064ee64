//! Task naming convention.
//!
//! Task names are derived from a verb, a source set name and a noun:
//! `task_name("compile", "test", "Java")` is `compileTestJava`. The mapping
//! is total; source sets that differ only in the case of their first letter
//! (`main` and `Main`) collide, and the registrar rejects the second one.

/// Upper-case the first character.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Build a task name for a source set.
pub fn task_name(verb: &str, source_set: &str, noun: &str) -> String {
    format!("{}{}{}", verb, capitalize(source_set), noun)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_names() {
        assert_eq!(task_name("generate", "main", "Sources"), "generateMainSources");
        assert_eq!(task_name("compile", "test", "Java"), "compileTestJava");
        assert_eq!(task_name("checkstyle", "main", ""), "checkstyleMain");
        assert_eq!(task_name("process", "integrationTest", "Resources"), "processIntegrationTestResources");
    }

    #[test]
    fn test_distinct_source_sets_get_distinct_names() {
        let names = ["main", "test", "integrationTest", "_tools"];
        let mut generated: Vec<_> = names
            .iter()
            .map(|n| task_name("process", n, "Resources"))
            .collect();
        generated.sort();
        generated.dedup();
        assert_eq!(generated.len(), names.len());
    }

    #[test]
    fn test_capitalize_edge_cases() {
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("a"), "A");
        assert_eq!(capitalize("Main"), "Main");
    }
}
