//! Render queue
//!
//! A LIFO stack of render commands. Commands push their successors (and any
//! children to recurse into) instead of calling each other, so arbitrarily
//! deep component trees never touch the native call stack.

use std::rc::Rc;

use crate::writer::MarkupWriter;
use crate::RenderError;

/// Shared handle to a queued render command.
pub type CommandRc = Rc<dyn RenderCommand>;

/// A unit of rendering work.
pub trait RenderCommand {
    /// Perform the work, pushing any follow-up commands onto the queue.
    fn render(&self, writer: &mut MarkupWriter, queue: &mut RenderQueue)
        -> Result<(), RenderError>;

    /// Diagnostic label, used when a command fails.
    fn label(&self) -> String {
        "render command".to_string()
    }
}

/// LIFO work queue driving one page render. Created fresh per render and
/// discarded afterwards; not reusable across pages.
#[derive(Default)]
pub struct RenderQueue {
    stack: Vec<CommandRc>,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: CommandRc) {
        self.stack.push(command);
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Pop and execute commands until the queue drains. The first failure
    /// stops the render; remaining work is dropped.
    pub fn run(&mut self, writer: &mut MarkupWriter) -> Result<(), RenderError> {
        while let Some(command) = self.stack.pop() {
            if let Err(error) = command.render(writer, self) {
                tracing::error!(command = %command.label(), %error, "render command failed");
                self.stack.clear();
                return Err(error);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct WriteText(&'static str);

    impl RenderCommand for WriteText {
        fn render(
            &self,
            writer: &mut MarkupWriter,
            _queue: &mut RenderQueue,
        ) -> Result<(), RenderError> {
            writer.write(self.0);
            Ok(())
        }
    }

    struct PushTwo;

    impl RenderCommand for PushTwo {
        fn render(
            &self,
            _writer: &mut MarkupWriter,
            queue: &mut RenderQueue,
        ) -> Result<(), RenderError> {
            // Reverse push order: "a" pops first.
            queue.push(Rc::new(WriteText("b")));
            queue.push(Rc::new(WriteText("a")));
            Ok(())
        }
    }

    struct Fail;

    impl RenderCommand for Fail {
        fn render(
            &self,
            _writer: &mut MarkupWriter,
            _queue: &mut RenderQueue,
        ) -> Result<(), RenderError> {
            Err(RenderError::NoCurrentElement)
        }
    }

    #[test]
    fn test_lifo_order() {
        let mut queue = RenderQueue::new();
        let mut writer = MarkupWriter::new();
        queue.push(Rc::new(WriteText("2")));
        queue.push(Rc::new(WriteText("1")));
        queue.run(&mut writer).unwrap();
        assert_eq!(writer.to_markup(), "12");
    }

    #[test]
    fn test_commands_push_followups() {
        let mut queue = RenderQueue::new();
        let mut writer = MarkupWriter::new();
        queue.push(Rc::new(WriteText("c")));
        queue.push(Rc::new(PushTwo));
        queue.run(&mut writer).unwrap();
        assert_eq!(writer.to_markup(), "abc");
    }

    #[test]
    fn test_failure_drains_queue() {
        let mut queue = RenderQueue::new();
        let mut writer = MarkupWriter::new();
        queue.push(Rc::new(WriteText("unreached")));
        queue.push(Rc::new(Fail));
        assert!(queue.run(&mut writer).is_err());
        assert!(queue.is_empty());
        assert_eq!(writer.to_markup(), "");
    }
}
