//! Blocks
//!
//! A block is a named (or anonymous) fragment of template content that
//! renders only when looked up — by id on its owning element, or bound as a
//! block-valued parameter.

use std::rc::Rc;

use weft_render::{CommandRc, MarkupWriter, RenderCommand, RenderError, RenderQueue};
use weft_template::Location;

#[derive(Clone)]
pub struct Block {
    id: Option<String>,
    location: Option<Location>,
    elements: Rc<Vec<CommandRc>>,
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("id", &self.id)
            .field("location", &self.location)
            .field("elements", &self.elements.len())
            .finish()
    }
}

impl Block {
    pub fn new(
        id: Option<String>,
        location: Option<Location>,
        elements: Vec<CommandRc>,
    ) -> Self {
        Self {
            id,
            location,
            elements: Rc::new(elements),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }
}

impl RenderCommand for Block {
    fn render(
        &self,
        _writer: &mut MarkupWriter,
        queue: &mut RenderQueue,
    ) -> Result<(), RenderError> {
        // Reverse push order so the elements pop in document order.
        for element in self.elements.iter().rev() {
            queue.push(element.clone());
        }
        Ok(())
    }

    fn label(&self) -> String {
        match &self.id {
            Some(id) => format!("block:{id}"),
            None => "block".to_string(),
        }
    }
}
