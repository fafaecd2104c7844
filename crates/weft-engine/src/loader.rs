//! Page loader
//!
//! Assembles a live page from parsed templates: walks the token stream with
//! an explicit frame stack (mirroring the tokenizer's end-tag actions),
//! creating child elements, binding attributes as parameters, registering
//! blocks, and compiling everything else into render commands.

use std::rc::Rc;
use std::sync::Arc;

use weft_page::{
    Block, ComponentPageElement, ElementRc, ElementRenderCommand, ExpansionCommand,
    LiteralBinding, Page, PageError, TypeCoercer, Value,
};
use weft_render::{
    CdataCommand, CommandRc, CommentCommand, DtdCommand, EndElementCommand,
    StartElementCommand, TextCommand,
};
use weft_template::{ComponentTemplate, TemplateParser, TemplateToken, TokenKind};

use crate::cache::TemplateCache;
use crate::registry::ComponentRegistry;
use crate::EngineError;

pub struct PageLoader {
    registry: Rc<ComponentRegistry>,
    cache: Arc<TemplateCache>,
    coercer: Rc<dyn TypeCoercer>,
}

impl PageLoader {
    pub fn new(
        registry: Rc<ComponentRegistry>,
        cache: Arc<TemplateCache>,
        coercer: Rc<dyn TypeCoercer>,
    ) -> Self {
        Self {
            registry,
            cache,
            coercer,
        }
    }

    /// Build and fully load one page instance.
    pub fn load_page(&self, name: &str, locale: &str) -> Result<Page, EngineError> {
        let component_type = self
            .registry
            .page_component(name)
            .ok_or_else(|| EngineError::UnknownPage {
                name: name.to_string(),
            })?
            .to_string();
        let instantiator = self.registry.instantiator(&component_type).ok_or_else(|| {
            EngineError::UnknownComponentType {
                component_type: component_type.clone(),
            }
        })?;

        tracing::debug!(page = name, locale, root = %component_type, "loading page");

        let mut page = Page::new(name, locale);
        let root =
            ComponentPageElement::new_root(page.shared().clone(), &*instantiator, None);
        page.set_root(root.clone());
        page.register_element(root.clone());

        self.assemble(&mut page, &root, &component_type, locale)?;
        page.loaded()?;
        Ok(page)
    }

    /// Fetch (or parse and cache) the template for a component type, if it
    /// has one.
    fn template_for(
        &self,
        component_type: &str,
        locale: &str,
    ) -> Result<Option<Arc<ComponentTemplate>>, EngineError> {
        let Some(resource) = self.registry.template(component_type) else {
            return Ok(None);
        };
        if let Some(template) = self.cache.get(resource.identity(), locale) {
            return Ok(Some(template));
        }
        let mut parser = TemplateParser::new();
        let template = parser.parse(&*resource)?;
        Ok(Some(
            self.cache.store(resource.identity(), locale, template),
        ))
    }

    /// Compile the element's own template (when it has one) into render
    /// commands, creating embedded children along the way.
    fn assemble(
        &self,
        page: &mut Page,
        element: &ElementRc,
        component_type: &str,
        locale: &str,
    ) -> Result<(), EngineError> {
        let Some(template) = self.template_for(component_type, locale)? else {
            return Ok(());
        };
        let commands = self.assemble_tokens(page, element, template.tokens(), locale)?;
        element.borrow_mut().set_template_elements(commands);
        Ok(())
    }

    fn assemble_tokens(
        &self,
        page: &mut Page,
        element: &ElementRc,
        tokens: &[TemplateToken],
        locale: &str,
    ) -> Result<Vec<CommandRc>, EngineError> {
        let mut assembly = Assembly::new();
        let mut index = 0;

        while index < tokens.len() {
            let token = &tokens[index];
            match &token.kind {
                TokenKind::Text { content } => assembly.push(Rc::new(TextCommand {
                    text: content.clone(),
                })),
                TokenKind::Expansion { expression } => {
                    assembly.push(Rc::new(ExpansionCommand::new(
                        element,
                        expression.clone(),
                        self.coercer.clone(),
                    )));
                }
                TokenKind::Comment { content } => assembly.push(Rc::new(CommentCommand {
                    text: content.clone(),
                })),
                TokenKind::Cdata { content } => assembly.push(Rc::new(CdataCommand {
                    text: content.clone(),
                })),
                TokenKind::Dtd {
                    name,
                    public_id,
                    system_id,
                } => assembly.push(Rc::new(DtdCommand {
                    name: name.clone(),
                    public_id: public_id.clone(),
                    system_id: system_id.clone(),
                })),
                TokenKind::Body => {
                    // Body content renders in the dedicated body phase; the
                    // placeholder itself compiles to nothing.
                }
                TokenKind::StartElement { name } => {
                    let (attributes, next) = collect_attributes(tokens, index + 1);
                    index = next - 1;
                    assembly.push(Rc::new(StartElementCommand {
                        name: name.clone(),
                        attributes,
                    }));
                    assembly.frames.push(Frame::Markup);
                }
                TokenKind::StartComponent {
                    element_name,
                    id,
                    component_type,
                    mixins,
                } => {
                    let (attributes, next) = collect_attributes(tokens, index + 1);
                    index = next - 1;
                    let child = self.start_component(
                        page,
                        element,
                        StartComponent {
                            element_name: element_name.as_deref(),
                            id: id.as_deref(),
                            component_type: component_type.as_deref(),
                            mixins: mixins.as_deref(),
                            location: token.location.clone(),
                            attributes,
                        },
                        locale,
                        &mut assembly,
                    )?;
                    assembly.lists.push(Vec::new());
                    assembly.frames.push(Frame::Child { element: child });
                }
                TokenKind::Block { id } => {
                    assembly.lists.push(Vec::new());
                    assembly.frames.push(Frame::Block {
                        id: id.clone(),
                        location: token.location.clone(),
                    });
                }
                TokenKind::Parameter { name } => {
                    let owner = assembly.enclosing_child().ok_or_else(|| {
                        EngineError::TemplateStructure {
                            message: format!(
                                "parameter '{name}' is not nested inside a component"
                            ),
                        }
                    })?;
                    assembly.lists.push(Vec::new());
                    assembly.frames.push(Frame::Parameter {
                        name: name.clone(),
                        owner,
                        location: token.location.clone(),
                    });
                }
                TokenKind::EndElement => {
                    self.end_frame(element, &mut assembly)?;
                }
                TokenKind::Attribute { name, .. } => {
                    // Attributes are consumed with their start token.
                    return Err(EngineError::TemplateStructure {
                        message: format!("stray attribute token '{name}'"),
                    });
                }
            }
            index += 1;
        }

        if !assembly.frames.is_empty() || assembly.lists.len() != 1 {
            return Err(EngineError::TemplateStructure {
                message: "unbalanced template token stream".to_string(),
            });
        }
        Ok(assembly.lists.remove(0))
    }

    fn start_component(
        &self,
        page: &mut Page,
        container: &ElementRc,
        start: StartComponent<'_>,
        locale: &str,
        assembly: &mut Assembly,
    ) -> Result<ElementRc, EngineError> {
        // The declared type wins; otherwise the container's model may
        // declare the embedded id.
        let declared = start.component_type.map(str::to_string);
        let from_model = start.id.and_then(|id| {
            container
                .borrow()
                .component_model()
                .embedded_type(id)
                .map(str::to_string)
        });
        let component_type = declared.or(from_model).ok_or_else(|| {
            EngineError::TemplateStructure {
                message: format!(
                    "component '{}' has neither a type nor an embedded declaration",
                    start.id.unwrap_or("(anonymous)")
                ),
            }
        })?;

        let instantiator = self.registry.instantiator(&component_type).ok_or_else(|| {
            EngineError::UnknownComponentType {
                component_type: component_type.clone(),
            }
        })?;

        let id = match start.id {
            Some(id) => id.to_string(),
            None => assembly.generate_id(&component_type),
        };

        let child = ComponentPageElement::new_child(
            container,
            &id,
            start.element_name.map(str::to_string),
            &*instantiator,
            start.location,
        )?;
        page.register_element(child.clone());

        if let Some(mixins) = start.mixins {
            for mixin_type in mixins.split(',').map(str::trim).filter(|m| !m.is_empty()) {
                let mixin = self.registry.instantiator(mixin_type).ok_or_else(|| {
                    EngineError::UnknownComponentType {
                        component_type: mixin_type.to_string(),
                    }
                })?;
                child.borrow_mut().add_mixin(&*mixin);
            }
        }

        for (name, value) in start.attributes {
            let binding = Rc::new(LiteralBinding::new(Value::String(value)));
            let bound = child.borrow_mut().bind_parameter(&name, binding);
            match bound {
                Ok(()) => {}
                // No component takes informal parameters: the attribute is
                // quietly dropped, matching how unmatched informal
                // attributes behave.
                Err(PageError::UnknownParameter { .. }) => {
                    tracing::debug!(
                        component = %child.borrow().complete_id(),
                        parameter = %name,
                        "dropping unmatched informal parameter"
                    );
                }
                Err(error) => return Err(error.into()),
            }
        }

        // Components can bring their own template, assembled recursively.
        self.assemble(page, &child, &component_type, locale)?;
        Ok(child)
    }

    fn end_frame(&self, element: &ElementRc, assembly: &mut Assembly) -> Result<(), EngineError> {
        let Some(frame) = assembly.frames.pop() else {
            return Err(EngineError::TemplateStructure {
                message: "end token with no open element".to_string(),
            });
        };
        match frame {
            Frame::Markup => assembly.push(Rc::new(EndElementCommand)),
            Frame::Child { element: child } => {
                let body = assembly.pop_list()?;
                child.borrow_mut().set_body_elements(body);
                assembly.push(Rc::new(ElementRenderCommand::new(child)));
            }
            Frame::Block { id, location } => {
                let commands = assembly.pop_list()?;
                match id {
                    Some(id) => {
                        let block = Block::new(Some(id.clone()), location, commands);
                        element.borrow_mut().add_block(&id, block)?;
                    }
                    None => {
                        tracing::debug!("anonymous block is not reachable; dropped");
                    }
                }
            }
            Frame::Parameter {
                name,
                owner,
                location,
            } => {
                let commands = assembly.pop_list()?;
                let block = Block::new(None, location, commands);
                let binding =
                    Rc::new(LiteralBinding::new(Value::Renderable(Rc::new(block))));
                owner.borrow_mut().bind_parameter(&name, binding)?;
            }
        }
        Ok(())
    }
}

/// A start-component token plus its gathered attributes.
struct StartComponent<'t> {
    element_name: Option<&'t str>,
    id: Option<&'t str>,
    component_type: Option<&'t str>,
    mixins: Option<&'t str>,
    location: Option<weft_template::Location>,
    attributes: Vec<(String, String)>,
}

/// What the matching end token closes.
enum Frame {
    Markup,
    Child { element: ElementRc },
    Block {
        id: Option<String>,
        location: Option<weft_template::Location>,
    },
    Parameter {
        name: String,
        owner: ElementRc,
        location: Option<weft_template::Location>,
    },
}

/// In-progress compilation of one template.
struct Assembly {
    /// Command lists; the last is the innermost body/block being collected,
    /// the first is the element's own template list.
    lists: Vec<Vec<CommandRc>>,
    frames: Vec<Frame>,
    anonymous: u32,
}

impl Assembly {
    fn new() -> Self {
        Self {
            lists: vec![Vec::new()],
            frames: Vec::new(),
            anonymous: 0,
        }
    }

    fn push(&mut self, command: CommandRc) {
        if let Some(list) = self.lists.last_mut() {
            list.push(command);
        }
    }

    fn pop_list(&mut self) -> Result<Vec<CommandRc>, EngineError> {
        if self.lists.len() <= 1 {
            return Err(EngineError::TemplateStructure {
                message: "unbalanced template token stream".to_string(),
            });
        }
        Ok(self.lists.pop().unwrap_or_default())
    }

    /// Nearest enclosing embedded component, for parameter elements.
    fn enclosing_child(&self) -> Option<ElementRc> {
        self.frames.iter().rev().find_map(|frame| match frame {
            Frame::Child { element } => Some(element.clone()),
            _ => None,
        })
    }

    /// Stable id for a component declared without one.
    fn generate_id(&mut self, component_type: &str) -> String {
        self.anonymous += 1;
        let base = component_type
            .rsplit('/')
            .next()
            .unwrap_or(component_type)
            .to_lowercase();
        format!("{base}_{}", self.anonymous)
    }
}

/// Gather the attribute tokens that follow a start token. Returns the
/// attributes and the index of the first non-attribute token.
fn collect_attributes(
    tokens: &[TemplateToken],
    mut index: usize,
) -> (Vec<(String, String)>, usize) {
    let mut attributes = Vec::new();
    while let Some(TemplateToken {
        kind: TokenKind::Attribute { name, value },
        ..
    }) = tokens.get(index)
    {
        attributes.push((name.clone(), value.clone()));
        index += 1;
    }
    (attributes, index)
}
