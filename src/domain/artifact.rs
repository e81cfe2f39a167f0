//! Generated test artifacts and filename derivation.

use serde::{Deserialize, Serialize};

/// One generated test file, produced from one source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    /// Language tag ("csharp", "typescript", ...)
    pub language: String,

    /// Complete test file content
    pub code: String,

    /// Derived test file name (e.g. "Invoice.Tests.cs")
    pub filename: String,
}

impl GeneratedArtifact {
    pub fn new(
        language: impl Into<String>,
        code: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            language: language.into(),
            code: code.into(),
            filename: filename.into(),
        }
    }
}

/// Infer a language tag from a source file name's extension.
pub fn detect_language(filename: &str) -> &'static str {
    let ext = filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    match ext.as_str() {
        "cs" => "csharp",
        "js" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "py" => "python",
        "java" => "java",
        _ => "text",
    }
}

/// Derive a test file name from a source file name and language tag.
///
/// Follows each ecosystem's convention: `Foo.Tests.cs`, `foo.test.ts`,
/// `foo_test.py`, `FooTest.java`; unknown languages fall back to
/// `.test.<original extension>`.
pub fn test_filename(source_filename: &str, language: &str) -> String {
    let name = source_filename
        .rsplit('/')
        .next()
        .unwrap_or(source_filename);
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, ext),
        None => (name, ""),
    };

    match language {
        "csharp" => format!("{}.Tests.cs", stem),
        "javascript" => format!("{}.test.js", stem),
        "typescript" => format!("{}.test.ts", stem),
        "python" => format!("{}_test.py", stem),
        "java" => format!("{}Test.java", stem),
        _ if ext.is_empty() => format!("{}.test", stem),
        _ => format!("{}.test.{}", stem, ext),
    }
}
