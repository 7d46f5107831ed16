//! Rendering options and configuration.

/// Options for rendering extracted sections.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Include YAML frontmatter with metadata
    pub include_frontmatter: bool,

    /// Heading level used for top-level sections (1-6)
    pub base_heading_level: u8,

    /// Maximum heading level (1-6); deeper sections are clamped to it
    pub max_heading_level: u8,

    /// Emit sections whose extracted text is empty
    pub include_empty: bool,
}

impl RenderOptions {
    /// Create new render options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable frontmatter.
    pub fn with_frontmatter(mut self, include: bool) -> Self {
        self.include_frontmatter = include;
        self
    }

    /// Set the heading level of top-level sections.
    pub fn with_base_heading(mut self, level: u8) -> Self {
        self.base_heading_level = level.clamp(1, 6);
        self
    }

    /// Set the maximum heading level.
    pub fn with_max_heading(mut self, level: u8) -> Self {
        self.max_heading_level = level.clamp(1, 6);
        self
    }

    /// Keep or drop sections with no text.
    pub fn with_empty_sections(mut self, include: bool) -> Self {
        self.include_empty = include;
        self
    }

    /// Heading level for a section at `depth` (0 = top level).
    pub fn heading_level(&self, depth: usize) -> usize {
        (self.base_heading_level as usize + depth).min(self.max_heading_level as usize)
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            include_frontmatter: false,
            base_heading_level: 2,
            max_heading_level: 6,
            include_empty: true,
        }
    }
}
