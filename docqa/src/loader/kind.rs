use lazy_static::lazy_static;
use map_macro::map;
use std::{collections::HashMap, fmt::Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    C,
    Cpp,
    CSharp,
    Ruby,
    Php,
    Swift,
    Kotlin,
    Scala,
    Shell,
    Sql,
    Toml,
    Yaml,
    Json,
    Html,
    Css,
}

/// The parser a file is handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Text,
    Pdf,
    Source(Language),
}

impl Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Pdf => write!(f, "PDF"),
            Self::Source(language) => write!(f, "{language:?} source"),
        }
    }
}

lazy_static! {
    static ref DEFAULT_KINDS: HashMap<&'static str, DocumentKind> = map! {
        "txt" => DocumentKind::Text,
        "md" => DocumentKind::Text,
        "markdown" => DocumentKind::Text,
        "rst" => DocumentKind::Text,
        "pdf" => DocumentKind::Pdf,
        "rs" => DocumentKind::Source(Language::Rust),
        "py" => DocumentKind::Source(Language::Python),
        "js" => DocumentKind::Source(Language::JavaScript),
        "jsx" => DocumentKind::Source(Language::JavaScript),
        "ts" => DocumentKind::Source(Language::TypeScript),
        "tsx" => DocumentKind::Source(Language::TypeScript),
        "go" => DocumentKind::Source(Language::Go),
        "java" => DocumentKind::Source(Language::Java),
        "c" => DocumentKind::Source(Language::C),
        "h" => DocumentKind::Source(Language::C),
        "cpp" => DocumentKind::Source(Language::Cpp),
        "cc" => DocumentKind::Source(Language::Cpp),
        "hpp" => DocumentKind::Source(Language::Cpp),
        "cs" => DocumentKind::Source(Language::CSharp),
        "rb" => DocumentKind::Source(Language::Ruby),
        "php" => DocumentKind::Source(Language::Php),
        "swift" => DocumentKind::Source(Language::Swift),
        "kt" => DocumentKind::Source(Language::Kotlin),
        "scala" => DocumentKind::Source(Language::Scala),
        "sh" => DocumentKind::Source(Language::Shell),
        "sql" => DocumentKind::Source(Language::Sql),
        "toml" => DocumentKind::Source(Language::Toml),
        "yaml" => DocumentKind::Source(Language::Yaml),
        "yml" => DocumentKind::Source(Language::Yaml),
        "json" => DocumentKind::Source(Language::Json),
        "html" => DocumentKind::Source(Language::Html),
        "css" => DocumentKind::Source(Language::Css)
    };
}

/// Maps file extensions to the kind of document they hold.
#[derive(Debug, Clone)]
pub struct Registry {
    kinds: HashMap<String, DocumentKind>,
}

impl Registry {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// Registers (or replaces) the kind used for files ending in `extension`.
    #[must_use]
    pub fn register(mut self, extension: &str, kind: DocumentKind) -> Self {
        self.kinds
            .insert(extension.trim_start_matches('.').to_lowercase(), kind);

        self
    }

    #[must_use]
    pub fn kind_for(&self, extension: &str) -> Option<DocumentKind> {
        self.kinds.get(&extension.to_lowercase()).copied()
    }
}

impl Default for Registry {
    fn default() -> Self {
        DEFAULT_KINDS
            .iter()
            .fold(Self::empty(), |registry, (ext, kind)| {
                registry.register(ext, *kind)
            })
    }
}
