pub type FileId = u64;

/// Half-open byte range inside a source file. Nodes synthesized by the
/// rewrite engine carry a synthetic span, distinguishable from real input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Span {
    pub file: FileId,
    pub lo: u32,
    pub hi: u32,
}

impl Span {
    pub fn new(file: FileId, lo: u32, hi: u32) -> Span {
        Span { file, lo, hi }
    }

    /// Span for nodes constructed by the engine rather than read from input.
    pub fn synthetic() -> Span {
        Span {
            file: u64::MAX,
            lo: 0,
            hi: 0,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.file == u64::MAX
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_synthetic() {
            write!(f, "Span(synthetic)")
        } else {
            write!(f, "Span({}:{}-{})", self.file, self.lo, self.hi)
        }
    }
}
