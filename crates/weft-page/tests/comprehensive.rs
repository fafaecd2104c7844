//! Element tree, event, and render-phase tests for weft-page

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use weft_page::{
    BasicInstantiator, Block, CommandCollector, Component, ComponentError,
    ComponentEvent, ComponentModel, ComponentPageElement, ComponentRc,
    ComponentResources, DefaultCoercer, ElementRc, ExpansionCommand, HandlerResult,
    LiteralBinding, Page, PageError, Value, EXCEPTION_EVENT,
};
use weft_render::{
    MarkupWriter, PhaseEvent, RenderError, RenderPhase, RenderQueue, TextCommand,
};

type Log = Rc<RefCell<Vec<String>>>;

fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// How a `Recorder` reacts to events, fixed at instantiation.
#[derive(Default, Clone, Copy)]
struct Behavior {
    /// Fail with an error when this event arrives.
    throw_on: Option<&'static str>,
    /// Consume a synthetic exception event by answering it with a value.
    consume_exception: bool,
    /// Answer this event with a value (the callback decides about
    /// aborting).
    answer_on: Option<&'static str>,
}

/// Logs every lifecycle call and reacts per its configured behavior.
struct Recorder {
    label: String,
    log: Log,
    behavior: Behavior,
}

impl Component for Recorder {
    fn dispatch_component_event(
        &mut self,
        event: &mut ComponentEvent<'_>,
    ) -> Result<bool, ComponentError> {
        self.log.borrow_mut().push(format!(
            "{}:{}:{}",
            self.label,
            event.event_type(),
            event.component_id()
        ));
        if let Some(throw_on) = self.behavior.throw_on {
            if event.matches(throw_on) {
                return Err(ComponentError::msg("kaboom"));
            }
        }
        if self.behavior.consume_exception && event.matches(EXCEPTION_EVENT) {
            event.store_result(HandlerResult::Value(Value::String(
                "handled".to_string(),
            )))?;
            return Ok(true);
        }
        if let Some(answer_on) = self.behavior.answer_on {
            if event.matches(answer_on) {
                event.store_result(HandlerResult::Value(Value::String(
                    "answer".to_string(),
                )))?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn containing_page_did_load(&mut self) -> Result<(), ComponentError> {
        self.log
            .borrow_mut()
            .push(format!("{}:pageDidLoad", self.label));
        Ok(())
    }
}

fn recorder(
    label: &str,
    log: &Log,
    model: ComponentModel,
    behavior: Behavior,
) -> BasicInstantiator<impl Fn(ComponentResources) -> ComponentRc> {
    let label = label.to_string();
    let log = log.clone();
    BasicInstantiator::new(model, move |_resources| {
        Rc::new(RefCell::new(Recorder {
            label: label.clone(),
            log: log.clone(),
            behavior,
        })) as ComponentRc
    })
}

fn empty_model(class: &str) -> ComponentModel {
    ComponentModel::new(class)
}

fn new_page(log: &Log) -> (Page, ElementRc) {
    new_page_with(log, Behavior::default())
}

fn new_page_with(log: &Log, root_behavior: Behavior) -> (Page, ElementRc) {
    let instantiator = recorder("root", log, empty_model("pages/Demo"), root_behavior);
    let mut page = Page::new("Demo", "en");
    let root = ComponentPageElement::new_root(page.shared().clone(), &instantiator, None);
    page.set_root(root.clone());
    page.register_element(root.clone());
    (page, root)
}

fn render_root(root: &ElementRc) -> Result<String, RenderError> {
    let mut writer = MarkupWriter::new();
    let mut queue = RenderQueue::new();
    ComponentPageElement::render(root, &mut writer, &mut queue);
    queue.run(&mut writer)?;
    Ok(writer.to_markup())
}

// ============================================================================
// CHILD AND BLOCK REGISTRATION
// ============================================================================

#[test]
fn test_duplicate_child_id_differing_by_case_fails() {
    let log = new_log();
    let (_page, root) = new_page(&log);

    let first = recorder("a", &log, empty_model("A"), Behavior::default());
    ComponentPageElement::new_child(&root, "widget", None, &first, None).unwrap();

    let second = recorder("b", &log, empty_model("B"), Behavior::default());
    let err =
        ComponentPageElement::new_child(&root, "WIDGET", None, &second, None).unwrap_err();
    assert!(matches!(err, PageError::DuplicateChildId { .. }));
}

#[test]
fn test_child_ids_compose_nested_and_complete_ids() {
    let log = new_log();
    let (_page, root) = new_page(&log);

    let inst = recorder("a", &log, empty_model("A"), Behavior::default());
    let a = ComponentPageElement::new_child(&root, "a", None, &inst, None).unwrap();
    let inst = recorder("b", &log, empty_model("B"), Behavior::default());
    let b = ComponentPageElement::new_child(&a, "b", None, &inst, None).unwrap();

    assert_eq!(b.borrow().nested_id(), "a.b");
    assert_eq!(b.borrow().complete_id(), "Demo:a.b");
    assert!(root.borrow().child("A").is_some());
}

#[test]
fn test_block_lookup_is_case_insensitive() {
    let log = new_log();
    let (_page, root) = new_page(&log);

    let block = Block::new(
        Some("greeting".to_string()),
        None,
        vec![Rc::new(TextCommand {
            text: "Hello".to_string(),
        })],
    );
    root.borrow_mut().add_block("greeting", block).unwrap();

    assert!(root.borrow().find_block("GREETING").is_some());
    assert!(root.borrow().find_block("missing").is_none());
    let err = root.borrow().get_block("missing").unwrap_err();
    assert!(matches!(err, PageError::UnknownBlock { .. }));

    let duplicate = Block::new(Some("Greeting".to_string()), None, Vec::new());
    let err = root
        .borrow_mut()
        .add_block("Greeting", duplicate)
        .unwrap_err();
    assert!(matches!(err, PageError::DuplicateBlockId { .. }));
}

#[test]
fn test_block_renders_its_content() {
    let log = new_log();
    let (_page, root) = new_page(&log);

    let block = Block::new(
        Some("greeting".to_string()),
        None,
        vec![Rc::new(TextCommand {
            text: "Hello".to_string(),
        })],
    );
    root.borrow_mut().add_block("greeting", block).unwrap();

    let found = root.borrow().find_block("greeting").unwrap();
    let mut writer = MarkupWriter::new();
    let mut queue = RenderQueue::new();
    queue.push(Rc::new(found));
    queue.run(&mut writer).unwrap();
    assert_eq!(writer.to_markup(), "Hello");
}

// ============================================================================
// MIXINS AND PARAMETERS
// ============================================================================

#[test]
fn test_mixin_dispatch_order_is_before_core_after() {
    let log = new_log();
    let (mut page, root) = new_page(&log);

    let inst = recorder("core", &log, empty_model("Core"), Behavior::default());
    let element = ComponentPageElement::new_child(&root, "c", None, &inst, None).unwrap();
    page.register_element(element.clone());

    let m1 = recorder("m1", &log, empty_model("mix/MixOne"), Behavior::default());
    let m2 = recorder(
        "m2",
        &log,
        ComponentModel::new("mix/MixTwo").with_mixin_after(),
        Behavior::default(),
    );
    element.borrow_mut().add_mixin(&m1);
    element.borrow_mut().add_mixin(&m2);

    page.loaded().unwrap();
    log.borrow_mut().clear();

    let mut callback = CommandCollector::default();
    ComponentPageElement::trigger_event(&element, "ping", &[], Some(&mut callback)).unwrap();

    let entries = log.borrow();
    let order: Vec<&str> = entries
        .iter()
        .filter(|line| line.contains(":ping:"))
        .map(|line| line.split(':').next().unwrap())
        .collect();
    assert_eq!(&order[..3], &["m1", "core", "m2"]);
}

#[test]
fn test_page_load_notifies_components_in_dispatch_order() {
    let log = new_log();
    let (mut page, root) = new_page(&log);

    let inst = recorder("core", &log, empty_model("Core"), Behavior::default());
    let element = ComponentPageElement::new_child(&root, "c", None, &inst, None).unwrap();
    page.register_element(element.clone());

    let after = recorder(
        "after",
        &log,
        ComponentModel::new("mix/After").with_mixin_after(),
        Behavior::default(),
    );
    let before = recorder("before", &log, empty_model("mix/Before"), Behavior::default());
    element.borrow_mut().add_mixin(&after);
    element.borrow_mut().add_mixin(&before);

    page.loaded().unwrap();

    let entries = log.borrow();
    let loads: Vec<&str> = entries
        .iter()
        .filter(|line| line.ends_with(":pageDidLoad"))
        .map(|line| line.split(':').next().unwrap())
        .collect();
    assert_eq!(loads, vec!["root", "before", "core", "after"]);
}

#[test]
fn test_lifecycle_listeners_observe_load_and_pool_transitions() {
    struct Counts {
        loads: Cell<u32>,
        attaches: Cell<u32>,
        detaches: Cell<u32>,
    }

    struct CountingListener(Rc<Counts>);

    impl weft_page::PageLifecycleListener for CountingListener {
        fn did_load(&self) {
            self.0.loads.set(self.0.loads.get() + 1);
        }

        fn did_attach(&self) {
            self.0.attaches.set(self.0.attaches.get() + 1);
        }

        fn did_detach(&self) {
            self.0.detaches.set(self.0.detaches.get() + 1);
        }
    }

    let counts = Rc::new(Counts {
        loads: Cell::new(0),
        attaches: Cell::new(0),
        detaches: Cell::new(0),
    });
    let log = new_log();
    let (mut page, _root) = new_page(&log);
    page.add_lifecycle_listener(Box::new(CountingListener(counts.clone())));

    page.loaded().unwrap();
    assert_eq!(counts.loads.get(), 1);

    page.attached();
    page.detached();
    assert_eq!(counts.attaches.get(), 1);
    assert_eq!(counts.detaches.get(), 1);
}

#[test]
fn test_dotted_parameter_routes_to_named_mixin() {
    let log = new_log();
    let (_page, root) = new_page(&log);

    let inst = recorder("core", &log, empty_model("Field"), Behavior::default());
    let element = ComponentPageElement::new_child(&root, "f", None, &inst, None).unwrap();

    let validate = recorder(
        "validate",
        &log,
        ComponentModel::new("mixins/validate").with_parameter("minLength", false),
        Behavior::default(),
    );
    element.borrow_mut().add_mixin(&validate);

    element
        .borrow_mut()
        .bind_parameter("validate.minLength", Rc::new(LiteralBinding::new(3_i64)))
        .unwrap();

    let err = element
        .borrow_mut()
        .bind_parameter("nosuch.minLength", Rc::new(LiteralBinding::new(3_i64)))
        .unwrap_err();
    assert!(matches!(err, PageError::UnknownMixin { .. }));
}

#[test]
fn test_core_formal_parameter_wins_over_mixin_informal_fallback() {
    let log = new_log();
    let (_page, root) = new_page(&log);

    let inst = recorder(
        "core",
        &log,
        ComponentModel::new("Field").with_parameter("width", false),
        Behavior::default(),
    );
    let element = ComponentPageElement::new_child(&root, "f", None, &inst, None).unwrap();

    // The mixin would accept anything informally, but the formal wins.
    let sponge = recorder(
        "sponge",
        &log,
        ComponentModel::new("mixins/sponge").with_informal_parameters(),
        Behavior::default(),
    );
    element.borrow_mut().add_mixin(&sponge);

    element
        .borrow_mut()
        .bind_parameter("width", Rc::new(LiteralBinding::new(10_i64)))
        .unwrap();
    element
        .borrow_mut()
        .bind_parameter("title", Rc::new(LiteralBinding::new("x")))
        .unwrap();
}

#[test]
fn test_unmatched_parameter_without_informal_support_fails() {
    let log = new_log();
    let (_page, root) = new_page(&log);

    let plain = recorder("plain", &log, empty_model("Plain"), Behavior::default());
    let bare = ComponentPageElement::new_child(&root, "bare", None, &plain, None).unwrap();
    let err = bare
        .borrow_mut()
        .bind_parameter("anything", Rc::new(LiteralBinding::new(1_i64)))
        .unwrap_err();
    assert!(matches!(err, PageError::UnknownParameter { .. }));
}

#[test]
fn test_unbound_required_parameter_fails_page_load() {
    let log = new_log();
    let (mut page, root) = new_page(&log);

    let inst = recorder(
        "core",
        &log,
        ComponentModel::new("Field").with_parameter("value", true),
        Behavior::default(),
    );
    let element = ComponentPageElement::new_child(&root, "f", None, &inst, None).unwrap();
    page.register_element(element);

    let err = page.loaded().unwrap_err();
    match &err {
        PageError::UnboundParameters { parameters, .. } => {
            assert!(parameters.contains("value"), "got: {parameters}");
        }
        other => panic!("expected UnboundParameters, got {other:?}"),
    }
}

#[test]
fn test_required_mixin_parameter_reported_with_mixin_prefix() {
    let log = new_log();
    let (mut page, root) = new_page(&log);

    let inst = recorder("core", &log, empty_model("Field"), Behavior::default());
    let element = ComponentPageElement::new_child(&root, "f", None, &inst, None).unwrap();
    let validate = recorder(
        "validate",
        &log,
        ComponentModel::new("mixins/validate").with_parameter("max", true),
        Behavior::default(),
    );
    element.borrow_mut().add_mixin(&validate);
    page.register_element(element);

    let err = page.loaded().unwrap_err();
    match &err {
        PageError::UnboundParameters { parameters, .. } => {
            assert!(parameters.contains("validate.max"), "got: {parameters}");
        }
        other => panic!("expected UnboundParameters, got {other:?}"),
    }
}

// ============================================================================
// EVENT BUBBLING
// ============================================================================

fn three_level_chain(
    log: &Log,
    root_behavior: Behavior,
    b_behavior: Behavior,
) -> (Page, ElementRc, ElementRc) {
    let (mut page, root) = new_page_with(log, root_behavior);
    let inst = recorder("a", log, empty_model("A"), Behavior::default());
    let a = ComponentPageElement::new_child(&root, "a", None, &inst, None).unwrap();
    let inst = recorder("b", log, empty_model("B"), b_behavior);
    let b = ComponentPageElement::new_child(&a, "b", None, &inst, None).unwrap();
    page.register_element(a);
    page.register_element(b.clone());
    (page, root, b)
}

#[test]
fn test_bubbling_reports_previous_component_id() {
    let log = new_log();
    let (_page, _root, b) =
        three_level_chain(&log, Behavior::default(), Behavior::default());

    let mut callback = CommandCollector::default();
    ComponentPageElement::trigger_event(&b, "ping", &[], Some(&mut callback)).unwrap();

    let entries = log.borrow();
    assert_eq!(entries[0], "b:ping:a.b");
    assert_eq!(entries[1], "a:ping:a.b");
    // The root sees the event as originating from the intermediate element.
    assert_eq!(entries[2], "root:ping:a");
}

#[test]
fn test_abort_stops_bubbling() {
    let log = new_log();
    let deepest_answers = Behavior {
        answer_on: Some("ping"),
        ..Behavior::default()
    };
    let (_page, _root, b) = three_level_chain(&log, Behavior::default(), deepest_answers);

    // The default notify callback aborts on any value result.
    let handled = ComponentPageElement::trigger_event(&b, "ping", &[], None).unwrap();
    assert!(handled);

    let entries = log.borrow();
    let seen: Vec<&str> = entries
        .iter()
        .filter(|line| line.contains(":ping:"))
        .map(|line| line.split(':').next().unwrap())
        .collect();
    assert_eq!(seen, vec!["b"], "ancestors must not see an aborted event");
}

#[test]
fn test_handler_exception_redispatches_from_failing_component() {
    let log = new_log();
    let throws = Behavior {
        throw_on: Some("boom"),
        ..Behavior::default()
    };
    let (_page, _root, b) = three_level_chain(&log, Behavior::default(), throws);

    let err = ComponentPageElement::trigger_event(&b, "boom", &[], None).unwrap_err();
    match &err {
        PageError::EventHandler { location, .. } => {
            assert!(location.contains("Demo:a.b"), "got: {location}");
        }
        other => panic!("expected EventHandler, got {other:?}"),
    }

    // The synthetic exception event bubbled from the failing component
    // outward before the original failure was rethrown.
    let entries = log.borrow();
    let exception_order: Vec<&str> = entries
        .iter()
        .filter(|line| line.contains(":exception:"))
        .map(|line| line.split(':').next().unwrap())
        .collect();
    assert_eq!(exception_order, vec!["b", "a", "root"]);
}

#[test]
fn test_consumed_exception_event_suppresses_the_failure() {
    let log = new_log();
    let throws = Behavior {
        throw_on: Some("boom"),
        ..Behavior::default()
    };
    let consumes = Behavior {
        consume_exception: true,
        ..Behavior::default()
    };
    let (_page, _root, b) = three_level_chain(&log, consumes, throws);

    let handled = ComponentPageElement::trigger_event(&b, "boom", &[], None).unwrap();
    assert!(handled);
}

#[test]
fn test_second_exception_rethrows_the_first() {
    let log = new_log();
    let throws = Behavior {
        throw_on: Some("boom"),
        ..Behavior::default()
    };
    // The root also fails while handling the exception event; the original
    // failure must win.
    let throws_on_exception = Behavior {
        throw_on: Some(EXCEPTION_EVENT),
        ..Behavior::default()
    };
    let (_page, _root, b) = three_level_chain(&log, throws_on_exception, throws);

    let err = ComponentPageElement::trigger_event(&b, "boom", &[], None).unwrap_err();
    match &err {
        PageError::EventHandler { location, .. } => {
            assert!(
                location.contains("Demo:a.b"),
                "original failure location expected, got: {location}"
            );
        }
        other => panic!("expected EventHandler, got {other:?}"),
    }
}

// ============================================================================
// RENDER PHASES
// ============================================================================

struct OpensElement {
    closes: bool,
}

impl Component for OpensElement {
    fn render_phase(
        &mut self,
        phase: RenderPhase,
        writer: &mut MarkupWriter,
        _event: &mut PhaseEvent,
    ) -> Result<(), ComponentError> {
        match phase {
            RenderPhase::BeginRender => {
                writer.element("div", &[("data-made", "by-component")]);
            }
            RenderPhase::AfterRender if self.closes => {
                writer.end().map_err(ComponentError::msg)?;
            }
            _ => {}
        }
        Ok(())
    }
}

fn opens_element_page(closes: bool) -> (Page, ElementRc) {
    let instantiator = BasicInstantiator::new(empty_model("pages/Demo"), move |_| {
        Rc::new(RefCell::new(OpensElement { closes })) as ComponentRc
    });
    let mut page = Page::new("Demo", "en");
    let root = ComponentPageElement::new_root(page.shared().clone(), &instantiator, None);
    page.set_root(root.clone());
    page.register_element(root.clone());
    (page, root)
}

#[test]
fn test_balanced_component_renders_cleanly() {
    let (page, root) = opens_element_page(true);
    let markup = render_root(&root).unwrap();
    assert_eq!(markup, r#"<div data-made="by-component"></div>"#);
    assert_eq!(page.dirty_count(), 0);
}

#[test]
fn test_unbalanced_component_fails_cleanup() {
    let (page, root) = opens_element_page(false);
    let err = render_root(&root).unwrap_err();
    assert!(matches!(err, RenderError::UnbalancedElements { .. }));
    // The page never returned to clean; it must not be pooled.
    assert_eq!(page.dirty_count(), 1);
}

struct LoopingComponent {
    passes: Cell<u32>,
}

impl Component for LoopingComponent {
    fn render_phase(
        &mut self,
        phase: RenderPhase,
        writer: &mut MarkupWriter,
        event: &mut PhaseEvent,
    ) -> Result<(), ComponentError> {
        match phase {
            RenderPhase::BeginRender => writer.write("x"),
            RenderPhase::AfterRender => {
                if self.passes.get() < 3 {
                    self.passes.set(self.passes.get() + 1);
                    event.veto();
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[test]
fn test_after_render_veto_loops_back_to_begin_render() {
    let instantiator = BasicInstantiator::new(empty_model("pages/Loop"), |_| {
        Rc::new(RefCell::new(LoopingComponent {
            passes: Cell::new(0),
        })) as ComponentRc
    });
    let page = Page::new("Loop", "en");
    let root = ComponentPageElement::new_root(page.shared().clone(), &instantiator, None);

    let markup = render_root(&root).unwrap();
    assert_eq!(markup, "xxxx");
    assert_eq!(page.dirty_count(), 0);
}

struct VetoTemplate;

impl Component for VetoTemplate {
    fn render_phase(
        &mut self,
        phase: RenderPhase,
        _writer: &mut MarkupWriter,
        event: &mut PhaseEvent,
    ) -> Result<(), ComponentError> {
        if phase == RenderPhase::BeforeRenderTemplate {
            event.veto();
        }
        Ok(())
    }
}

#[test]
fn test_before_render_template_veto_skips_template_children() {
    let instantiator = BasicInstantiator::new(empty_model("pages/Veto"), |_| {
        Rc::new(RefCell::new(VetoTemplate)) as ComponentRc
    });
    let page = Page::new("Veto", "en");
    let root = ComponentPageElement::new_root(page.shared().clone(), &instantiator, None);
    root.borrow_mut()
        .set_template_elements(vec![Rc::new(TextCommand {
            text: "T".to_string(),
        })]);
    root.borrow_mut()
        .set_body_elements(vec![Rc::new(TextCommand {
            text: "B".to_string(),
        })]);

    let markup = render_root(&root).unwrap();
    assert_eq!(markup, "B");
    assert_eq!(page.dirty_count(), 0);
}

#[test]
fn test_template_renders_before_body() {
    let log = new_log();
    let (page, root) = new_page(&log);
    root.borrow_mut()
        .set_template_elements(vec![Rc::new(TextCommand {
            text: "T".to_string(),
        })]);
    root.borrow_mut()
        .set_body_elements(vec![Rc::new(TextCommand {
            text: "B".to_string(),
        })]);

    let markup = render_root(&root).unwrap();
    assert_eq!(markup, "TB");
    assert_eq!(page.dirty_count(), 0);
}

// ============================================================================
// EXPANSIONS
// ============================================================================

struct HasProperty;

impl Component for HasProperty {
    fn property(&self, name: &str) -> Option<Value> {
        (name == "count").then_some(Value::Int(42))
    }
}

fn property_page() -> (Page, ElementRc) {
    let instantiator = BasicInstantiator::new(empty_model("pages/Props"), |_| {
        Rc::new(RefCell::new(HasProperty)) as ComponentRc
    });
    let page = Page::new("Props", "en");
    let root = ComponentPageElement::new_root(page.shared().clone(), &instantiator, None);
    (page, root)
}

#[test]
fn test_expansion_reads_property_and_stringifies() {
    let (page, root) = property_page();
    let expansion =
        ExpansionCommand::new(&root, "count".to_string(), Rc::new(DefaultCoercer));
    root.borrow_mut().set_template_elements(vec![Rc::new(expansion)]);

    let markup = render_root(&root).unwrap();
    assert_eq!(markup, "42");
    assert_eq!(page.dirty_count(), 0);
}

#[test]
fn test_unknown_expansion_property_is_a_render_error() {
    let (_page, root) = property_page();
    let expansion =
        ExpansionCommand::new(&root, "missing".to_string(), Rc::new(DefaultCoercer));
    root.borrow_mut().set_template_elements(vec![Rc::new(expansion)]);

    let err = render_root(&root).unwrap_err();
    assert!(matches!(err, RenderError::Lifecycle { .. }));
}
