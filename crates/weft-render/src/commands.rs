//! Markup render commands
//!
//! The leaf commands a template compiles down to: literal text, element
//! opens/closes, comments, CDATA, doctype. Component-aware commands live
//! with the page element tree; these only touch the writer.

use crate::queue::{RenderCommand, RenderQueue};
use crate::writer::MarkupWriter;
use crate::RenderError;

/// Literal character content.
#[derive(Debug)]
pub struct TextCommand {
    pub text: String,
}

impl RenderCommand for TextCommand {
    fn render(
        &self,
        writer: &mut MarkupWriter,
        _queue: &mut RenderQueue,
    ) -> Result<(), RenderError> {
        writer.write(&self.text);
        Ok(())
    }

    fn label(&self) -> String {
        "text".to_string()
    }
}

/// Open an element with its template attributes.
#[derive(Debug)]
pub struct StartElementCommand {
    pub name: String,
    pub attributes: Vec<(String, String)>,
}

impl RenderCommand for StartElementCommand {
    fn render(
        &self,
        writer: &mut MarkupWriter,
        _queue: &mut RenderQueue,
    ) -> Result<(), RenderError> {
        let attrs: Vec<(&str, &str)> = self
            .attributes
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .collect();
        writer.element(&self.name, &attrs);
        Ok(())
    }

    fn label(&self) -> String {
        format!("<{}>", self.name)
    }
}

/// Close the current element.
#[derive(Debug)]
pub struct EndElementCommand;

impl RenderCommand for EndElementCommand {
    fn render(
        &self,
        writer: &mut MarkupWriter,
        _queue: &mut RenderQueue,
    ) -> Result<(), RenderError> {
        writer.end()
    }

    fn label(&self) -> String {
        "end element".to_string()
    }
}

#[derive(Debug)]
pub struct CommentCommand {
    pub text: String,
}

impl RenderCommand for CommentCommand {
    fn render(
        &self,
        writer: &mut MarkupWriter,
        _queue: &mut RenderQueue,
    ) -> Result<(), RenderError> {
        writer.comment(&self.text);
        Ok(())
    }

    fn label(&self) -> String {
        "comment".to_string()
    }
}

#[derive(Debug)]
pub struct CdataCommand {
    pub text: String,
}

impl RenderCommand for CdataCommand {
    fn render(
        &self,
        writer: &mut MarkupWriter,
        _queue: &mut RenderQueue,
    ) -> Result<(), RenderError> {
        writer.cdata(&self.text);
        Ok(())
    }

    fn label(&self) -> String {
        "cdata".to_string()
    }
}

#[derive(Debug)]
pub struct DtdCommand {
    pub name: String,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
}

impl RenderCommand for DtdCommand {
    fn render(
        &self,
        writer: &mut MarkupWriter,
        _queue: &mut RenderQueue,
    ) -> Result<(), RenderError> {
        writer.dtd(
            &self.name,
            self.public_id.as_deref(),
            self.system_id.as_deref(),
        );
        Ok(())
    }

    fn label(&self) -> String {
        "doctype".to_string()
    }
}
