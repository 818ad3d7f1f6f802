pub mod directive;
pub mod error;
pub mod expression;

pub use directive::AnalyzerOptions;
pub use error::ParseError;
pub use expression::{parse_expression, parse_expression_list};

use crate::Template;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
    options: AnalyzerOptions,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser {
            source,
            file_id,
            options: AnalyzerOptions::default(),
        }
    }

    /// Pack id used when expanding bare slot names.
    pub fn with_pack(mut self, pack: impl Into<String>) -> Self {
        self.options.pack = pack.into();
        self
    }

    /// Slot group used when expanding bare slot names.
    pub fn with_slot_group(mut self, group: impl Into<String>) -> Self {
        self.options.slot_group = group.into();
        self
    }

    /// Analyze the template source into a complete Template.
    pub fn parse(&self) -> Result<Template, Vec<ParseError>> {
        let blocks = directive::analyze(&self.source, self.file_id, &self.options)?;
        Ok(Template {
            text: self.source.clone(),
            blocks,
            source_id: self.file_id,
        })
    }
}
