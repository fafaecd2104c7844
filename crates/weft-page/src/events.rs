//! Component events
//!
//! An event carries its type, the nested id of the component it is
//! currently reported as originating from, an activation context, and a
//! callback that classifies handler results. Bubbling itself lives with
//! the element tree.

use weft_render::CommandRc;

use crate::component::ComponentError;
use crate::value::Value;

/// Synthetic event type dispatched when an event handler throws.
pub const EXCEPTION_EVENT: &str = "exception";

/// A value returned by one handler method.
pub enum HandlerResult {
    /// Abort (true) or keep searching (false).
    Bool(bool),
    /// Follow-up render work; never aborts by itself.
    Render(CommandRc),
    /// Anything else, delegated to the event's callback.
    Value(Value),
}

/// Receives classified handler results.
pub trait EventCallback {
    /// Handle a typed result; return true to abort the event.
    fn handle(&mut self, value: Value) -> Result<bool, ComponentError>;

    /// Receive follow-up render work.
    fn command(&mut self, command: CommandRc) -> Result<(), ComponentError> {
        let _ = command;
        Ok(())
    }
}

/// Default callback used when the event trigger supplies none: results are
/// logged and treated as having handled the event, so they do not silently
/// vanish.
pub(crate) struct NotifyCallback;

impl EventCallback for NotifyCallback {
    fn handle(&mut self, value: Value) -> Result<bool, ComponentError> {
        tracing::debug!(?value, "component event result received without a callback");
        Ok(true)
    }
}

/// Callback that only collects follow-up render commands.
#[derive(Default)]
pub struct CommandCollector {
    pub commands: Vec<CommandRc>,
}

impl EventCallback for CommandCollector {
    fn handle(&mut self, value: Value) -> Result<bool, ComponentError> {
        tracing::debug!(?value, "ignoring non-renderable event result");
        Ok(true)
    }

    fn command(&mut self, command: CommandRc) -> Result<(), ComponentError> {
        self.commands.push(command);
        Ok(())
    }
}

/// One named event during a single dispatch step.
pub struct ComponentEvent<'a> {
    event_type: &'a str,
    component_id: String,
    context: &'a [Value],
    aborted: bool,
    callback: &'a mut dyn EventCallback,
}

impl<'a> ComponentEvent<'a> {
    pub(crate) fn new(
        event_type: &'a str,
        component_id: String,
        context: &'a [Value],
        callback: &'a mut dyn EventCallback,
    ) -> Self {
        Self {
            event_type,
            component_id,
            context,
            aborted: false,
            callback,
        }
    }

    pub fn event_type(&self) -> &str {
        self.event_type
    }

    /// Event type comparison, case-insensitive like handler method lookup.
    pub fn matches(&self, event_type: &str) -> bool {
        self.event_type.eq_ignore_ascii_case(event_type)
    }

    /// Nested id of the component the event is reported as originating
    /// from. While bubbling, this is the id of the previous element in the
    /// chain.
    pub fn component_id(&self) -> &str {
        &self.component_id
    }

    pub fn context(&self) -> &[Value] {
        self.context
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Classify one handler result; returns true when event processing
    /// should abort.
    pub fn store_result(&mut self, result: HandlerResult) -> Result<bool, ComponentError> {
        match result {
            HandlerResult::Bool(abort) => {
                if abort {
                    self.aborted = true;
                }
                Ok(abort)
            }
            HandlerResult::Render(command) => {
                self.callback.command(command)?;
                Ok(false)
            }
            HandlerResult::Value(value) => {
                let abort = self.callback.handle(value)?;
                if abort {
                    self.aborted = true;
                }
                Ok(abort)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use weft_render::TextCommand;

    #[test]
    fn test_boolean_results_control_abort() {
        let mut callback = CommandCollector::default();
        let mut event = ComponentEvent::new("action", "x".to_string(), &[], &mut callback);

        assert!(!event.store_result(HandlerResult::Bool(false)).unwrap());
        assert!(!event.is_aborted());
        assert!(event.store_result(HandlerResult::Bool(true)).unwrap());
        assert!(event.is_aborted());
    }

    #[test]
    fn test_render_results_accumulate_without_aborting() {
        let mut callback = CommandCollector::default();
        {
            let mut event =
                ComponentEvent::new("action", "x".to_string(), &[], &mut callback);
            let command = Rc::new(TextCommand {
                text: "extra".to_string(),
            });
            assert!(!event.store_result(HandlerResult::Render(command)).unwrap());
            assert!(!event.is_aborted());
        }
        assert_eq!(callback.commands.len(), 1);
    }

    #[test]
    fn test_value_results_delegate_to_callback() {
        struct Expect;
        impl EventCallback for Expect {
            fn handle(&mut self, value: Value) -> Result<bool, ComponentError> {
                assert_eq!(value, Value::Int(7));
                Ok(true)
            }
        }

        let mut callback = Expect;
        let mut event = ComponentEvent::new("action", "x".to_string(), &[], &mut callback);
        assert!(event
            .store_result(HandlerResult::Value(Value::Int(7)))
            .unwrap());
        assert!(event.is_aborted());
    }
}
