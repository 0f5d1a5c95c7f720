//! Component Runtime
//!
//! Shared construction, configuration and event plumbing for widgets mounted
//! on a root element. A widget implements [`Component`]; the runtime resolves
//! its config, signals initialization and routes [`UiEvent`]s to it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Debug;
use thiserror::Error;
use tracing::{debug, warn};

use crate::dom::{Document, NodeId};

/// Root attribute carrying JSON config overrides authored in markup.
pub const CONFIG_ATTRIBUTE: &str = "data-dough-config";

/// Root attribute naming the component mounted on an element.
pub const COMPONENT_ATTRIBUTE: &str = "data-dough-component";

#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("Component root {0} is not an element")]
    InvalidRoot(NodeId),

    #[error("Invalid component config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Component config must be a JSON object")]
    ConfigNotObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Blur,
    Keyup,
    Change,
    Submit,
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blur" => Ok(Self::Blur),
            "keyup" => Ok(Self::Keyup),
            "change" => Ok(Self::Change),
            "submit" => Ok(Self::Submit),
            other => Err(format!("unknown event kind: {}", other)),
        }
    }
}

/// A UI event delivered to a mounted component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiEvent {
    pub kind: EventKind,
    pub target: NodeId,
    default_prevented: bool,
}

impl UiEvent {
    pub fn new(kind: EventKind, target: NodeId) -> Self {
        Self {
            kind,
            target,
            default_prevented: false,
        }
    }

    /// Cancel the browser's default action (only meaningful for submit).
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

/// One entry of a component's event map.
#[derive(Debug, Clone, Copy)]
pub struct EventBinding<H> {
    pub kind: EventKind,
    /// Tag names the binding is delegated to. Empty binds to the root itself.
    pub targets: &'static [&'static str],
    pub handler: H,
}

impl<H> EventBinding<H> {
    pub const fn new(kind: EventKind, targets: &'static [&'static str], handler: H) -> Self {
        Self {
            kind,
            targets,
            handler,
        }
    }

    fn accepts(&self, doc: &Document, root: NodeId, event: &UiEvent) -> bool {
        if self.kind != event.kind {
            return false;
        }
        if self.targets.is_empty() {
            return event.target == root;
        }
        doc.is_descendant(event.target, root)
            && doc
                .tag(event.target)
                .map_or(false, |tag| self.targets.contains(&tag))
    }
}

/// Outcome reported to the caller-supplied lifecycle signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitStatus {
    Initialised { component: &'static str },
    Failed { component: &'static str, reason: String },
}

pub trait Component: Sized {
    /// Value of `data-dough-component` this component mounts on.
    const NAME: &'static str;
    type Config: DeserializeOwned;
    type Handler: Copy + Debug + 'static;

    fn initialize(doc: &mut Document, root: NodeId, config: Self::Config) -> Result<Self, ComponentError>;

    fn ui_events() -> &'static [EventBinding<Self::Handler>];

    fn root(&self) -> NodeId;

    fn handle(&mut self, handler: Self::Handler, doc: &mut Document, event: &mut UiEvent);
}

/// Merge `overlay` into `base` key by key, recursing into nested objects.
pub fn merge_json(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                merge_json(base_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Resolve a component config: defaults, then the root's
/// `data-dough-config` attribute, then caller overrides.
pub fn resolve_config<T: DeserializeOwned>(
    doc: &Document,
    root: NodeId,
    overrides: Option<&Value>,
) -> Result<T, ComponentError> {
    let mut merged = Value::Object(Map::new());

    if let Some(raw) = doc.attr(root, CONFIG_ATTRIBUTE) {
        let from_markup: Value = serde_json::from_str(raw)?;
        if !from_markup.is_object() {
            return Err(ComponentError::ConfigNotObject);
        }
        merge_json(&mut merged, &from_markup);
    }

    if let Some(overrides) = overrides {
        if !overrides.is_object() {
            return Err(ComponentError::ConfigNotObject);
        }
        merge_json(&mut merged, overrides);
    }

    Ok(serde_json::from_value(merged)?)
}

/// Construct a component and report the outcome through `signal` before
/// returning it.
pub fn boot<C, F>(
    doc: &mut Document,
    root: NodeId,
    overrides: Option<&Value>,
    signal: F,
) -> Result<C, ComponentError>
where
    C: Component,
    F: FnOnce(&InitStatus),
{
    let result = resolve_config::<C::Config>(doc, root, overrides)
        .and_then(|config| C::initialize(doc, root, config));

    match &result {
        Ok(_) => {
            debug!(component = C::NAME, %root, "component initialised");
            signal(&InitStatus::Initialised { component: C::NAME });
        }
        Err(e) => {
            warn!(component = C::NAME, %root, error = %e, "component failed to initialise");
            signal(&InitStatus::Failed {
                component: C::NAME,
                reason: e.to_string(),
            });
        }
    }

    result
}

/// Route an event through the component's event map. Returns whether a
/// binding matched.
pub fn dispatch<C: Component>(component: &mut C, doc: &mut Document, event: &mut UiEvent) -> bool {
    let root = component.root();
    let Some(binding) = C::ui_events().iter().find(|b| b.accepts(doc, root, event)) else {
        return false;
    };
    component.handle(binding.handler, doc, event);
    true
}
