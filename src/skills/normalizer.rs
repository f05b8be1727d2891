//! Skill normalizer (C1).
//!
//! Maps raw skill strings to a canonical vocabulary via a static alias
//! table. This table is the single source of truth shared between
//! ingestion and the query path — both call [`normalize`]/[`normalize_list`]
//! from this module, never a hand-copied duplicate.

use std::collections::HashMap;
use std::sync::OnceLock;

/// `(alias, canonical)` pairs. Roughly 100 entries spanning programming
/// languages, frameworks, ML terms, clouds, and databases.
const ALIASES: &[(&str, &str)] = &[
    ("js", "javascript"),
    ("javascript", "javascript"),
    ("ts", "typescript"),
    ("typescript", "typescript"),
    ("py", "python"),
    ("python3", "python"),
    ("golang", "go"),
    ("go", "go"),
    ("rustlang", "rust"),
    ("c++", "cpp"),
    ("cplusplus", "cpp"),
    ("c#", "csharp"),
    ("c-sharp", "csharp"),
    ("dotnet", "dotnet"),
    (".net", "dotnet"),
    ("asp.net", "aspnet"),
    ("objective-c", "objective-c"),
    ("objc", "objective-c"),
    ("kotlin", "kotlin"),
    ("swift", "swift"),
    ("ruby", "ruby"),
    ("rb", "ruby"),
    ("php", "php"),
    ("scala", "scala"),
    ("perl", "perl"),
    ("r-lang", "r"),
    ("matlab", "matlab"),
    ("sql", "sql"),
    ("pl/sql", "plsql"),
    ("plsql", "plsql"),
    ("t-sql", "tsql"),
    ("tsql", "tsql"),
    ("html5", "html"),
    ("html", "html"),
    ("css3", "css"),
    ("css", "css"),
    ("sass", "sass"),
    ("scss", "sass"),
    ("less", "less"),
    ("react.js", "react"),
    ("reactjs", "react"),
    ("react", "react"),
    ("react-native", "react-native"),
    ("reactnative", "react-native"),
    ("vue.js", "vue"),
    ("vuejs", "vue"),
    ("vue", "vue"),
    ("angular.js", "angular"),
    ("angularjs", "angular"),
    ("angular", "angular"),
    ("node.js", "nodejs"),
    ("nodejs", "nodejs"),
    ("node", "nodejs"),
    ("next.js", "nextjs"),
    ("nextjs", "nextjs"),
    ("nuxt.js", "nuxtjs"),
    ("nuxtjs", "nuxtjs"),
    ("svelte", "svelte"),
    ("express.js", "express"),
    ("expressjs", "express"),
    ("express", "express"),
    ("django", "django"),
    ("flask", "flask"),
    ("fastapi", "fastapi"),
    ("spring boot", "spring"),
    ("springboot", "spring"),
    ("spring", "spring"),
    ("rails", "rails"),
    ("ruby on rails", "rails"),
    ("laravel", "laravel"),
    ("ml", "machine learning"),
    ("machine-learning", "machine learning"),
    ("machine learning", "machine learning"),
    ("dl", "deep learning"),
    ("deep-learning", "deep learning"),
    ("deep learning", "deep learning"),
    ("nlp", "natural language processing"),
    ("natural-language-processing", "natural language processing"),
    ("cv", "computer vision"),
    ("computer-vision", "computer vision"),
    ("pytorch", "pytorch"),
    ("tensorflow", "tensorflow"),
    ("tf", "tensorflow"),
    ("keras", "keras"),
    ("scikit-learn", "scikit-learn"),
    ("sklearn", "scikit-learn"),
    ("pandas", "pandas"),
    ("numpy", "numpy"),
    ("xgboost", "xgboost"),
    ("llm", "large language models"),
    ("llms", "large language models"),
    ("large-language-models", "large language models"),
    ("aws", "aws"),
    ("amazon web services", "aws"),
    ("gcp", "gcp"),
    ("google cloud", "gcp"),
    ("google cloud platform", "gcp"),
    ("azure", "azure"),
    ("microsoft azure", "azure"),
    ("k8s", "kubernetes"),
    ("kubernetes", "kubernetes"),
    ("docker", "docker"),
    ("terraform", "terraform"),
    ("ansible", "ansible"),
    ("jenkins", "jenkins"),
    ("ci/cd", "cicd"),
    ("cicd", "cicd"),
    ("postgres", "postgresql"),
    ("postgresql", "postgresql"),
    ("mysql", "mysql"),
    ("mssql", "sqlserver"),
    ("sql server", "sqlserver"),
    ("mongo", "mongodb"),
    ("mongodb", "mongodb"),
    ("redis", "redis"),
    ("cassandra", "cassandra"),
    ("dynamodb", "dynamodb"),
    ("elasticsearch", "elasticsearch"),
    ("elastic search", "elasticsearch"),
    ("kafka", "kafka"),
    ("rabbitmq", "rabbitmq"),
    ("graphql", "graphql"),
    ("rest api", "rest"),
    ("restful", "rest"),
    ("rest", "rest"),
    ("grpc", "grpc"),
    ("git", "git"),
    ("linux", "linux"),
    ("bash", "bash"),
    ("shell scripting", "bash"),
];

fn alias_map() -> &'static HashMap<&'static str, &'static str> {
    static MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| ALIASES.iter().copied().collect())
}

fn canonical_set() -> &'static std::collections::HashSet<&'static str> {
    static SET: OnceLock<std::collections::HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| ALIASES.iter().map(|(_, canonical)| *canonical).collect())
}

/// Whether `canonical` (already normalized) names a skill in the alias
/// table's vocabulary. Used by the agentic pipeline's intent-extraction
/// stage to pick skill mentions out of free-text query intent.
pub fn is_known_skill(canonical: &str) -> bool {
    canonical_set().contains(canonical)
}

/// Trim whitespace, lowercase, strip trailing `.,;:`, then resolve via the
/// alias table. Returns the cleaned form unchanged if it has no alias entry.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim().to_lowercase();
    let cleaned = trimmed.trim_end_matches(|c| matches!(c, '.' | ',' | ';' | ':'));

    match alias_map().get(cleaned) {
        Some(canonical) => canonical.to_string(),
        None => cleaned.to_string(),
    }
}

/// Normalize each element, de-duplicating while preserving first-seen order.
pub fn normalize_list(raw: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in raw {
        let n = normalize(item);
        if seen.insert(n.clone()) {
            out.push(n);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_aliases() {
        assert_eq!(normalize("ML"), "machine learning");
        assert_eq!(normalize("React.js"), "react");
        assert_eq!(normalize("k8s"), "kubernetes");
    }

    #[test]
    fn passes_through_unknown_terms() {
        assert_eq!(normalize("Quantum Computing"), "quantum computing");
    }

    #[test]
    fn trims_whitespace_and_trailing_punctuation() {
        assert_eq!(normalize("  Python.  "), "python");
        assert_eq!(normalize("Go;"), "go");
    }

    #[test]
    fn idempotent() {
        for raw in ["ML", "react.js", "  Rust  ", "quantum computing"] {
            let once = normalize(raw);
            let twice = normalize(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn normalize_list_dedupes_preserving_first_seen_order() {
        let raw = vec![
            "Python".to_string(),
            "ML".to_string(),
            "python".to_string(),
            "Machine Learning".to_string(),
            "Go".to_string(),
        ];
        let result = normalize_list(&raw);
        assert_eq!(result, vec!["python", "machine learning", "go"]);
    }

    #[test]
    fn normalize_list_empty_input() {
        assert!(normalize_list(&[]).is_empty());
    }
}
